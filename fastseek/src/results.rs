//! Values handed to observers while a search runs.
//!
//! An [`Entry`] is read once from the filesystem and never changes afterwards.
//! Entries travel to observers grouped in a [`MatchBatch`], one batch per
//! traversal step, and every search ends with exactly one [`SearchOutcome`].
use std::path::{Path, PathBuf};

/// What kind of filesystem object an entry refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryKind {
    Directory,
    File,
}

/// A directory or file found during a traversal
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Entry {
    /// Full path of the entry
    pub path: PathBuf,
    /// Final path component, lossily converted to UTF-8
    pub name: String,
    /// Directory or file
    pub kind: EntryKind,
}

impl Entry {
    pub fn new(path: impl Into<PathBuf>, kind: EntryKind) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self { path, name, kind }
    }

    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self::new(path, EntryKind::Directory)
    }

    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self::new(path, EntryKind::File)
    }

    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Matches found at a single traversal step.
///
/// A batch is never empty: [`MatchBatch::from_entries`] refuses to build one
/// from an empty list, so observers never see empty deliveries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchBatch {
    entries: Vec<Entry>,
}

impl MatchBatch {
    /// Wraps `entries`, or returns `None` when there is nothing to deliver
    pub fn from_entries(entries: Vec<Entry>) -> Option<Self> {
        if entries.is_empty() {
            None
        } else {
            Some(Self { entries })
        }
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Entry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn into_entries(self) -> Vec<Entry> {
        self.entries
    }
}

impl IntoIterator for MatchBatch {
    type Item = Entry;
    type IntoIter = std::vec::IntoIter<Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<'a> IntoIterator for &'a MatchBatch {
    type Item = &'a Entry;
    type IntoIter = std::slice::Iter<'a, Entry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// How a search ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchOutcome {
    Completed,
    Canceled,
}

impl SearchOutcome {
    pub fn is_canceled(self) -> bool {
        self == Self::Canceled
    }
}
