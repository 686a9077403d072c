//! Filesystem access used by the traversal.
//!
//! The walker only ever asks two questions of a directory: which child
//! directories it has, and which files it holds. [`FileSystem`] is that seam;
//! [`LocalFs`] answers it from the real filesystem, and tests swap in fakes to
//! inject faults.
use std::fs;
use std::io;
use std::path::Path;
use tracing::trace;

use crate::results::{Entry, EntryKind};

#[cfg(windows)]
const NAME_TOO_LONG: i32 = 206; // ERROR_FILENAME_EXCED_RANGE
#[cfg(any(
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
))]
const NAME_TOO_LONG: i32 = 63;
#[cfg(not(any(
    windows,
    target_os = "macos",
    target_os = "ios",
    target_os = "freebsd",
    target_os = "openbsd",
    target_os = "netbsd",
    target_os = "dragonfly"
)))]
const NAME_TOO_LONG: i32 = 36;

/// Directory listing operations the traversal depends on
pub trait FileSystem: Send + Sync {
    /// Lists the directories directly inside `dir`
    fn list_child_directories(&self, dir: &Path) -> io::Result<Vec<Entry>>;

    /// Lists the files directly inside `dir`
    fn list_files(&self, dir: &Path) -> io::Result<Vec<Entry>>;
}

/// Returns true for faults that mean "this subtree is gone or off limits":
/// access denied, a path that grew too long, or a directory that vanished
/// between being listed and being read.
pub fn is_transient(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        io::ErrorKind::NotFound | io::ErrorKind::PermissionDenied
    ) || err.raw_os_error() == Some(NAME_TOO_LONG)
}

/// The real filesystem, read through `std::fs::read_dir`
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs {
    follow_links: bool,
}

impl LocalFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// When `follow_links` is set, symlinked directories are descended into.
    /// There is no cycle detection: a link pointing at one of its own
    /// ancestors makes the traversal recurse until the path grows too long.
    pub fn with_follow_links(follow_links: bool) -> Self {
        Self { follow_links }
    }

    pub fn follows_links(&self) -> bool {
        self.follow_links
    }

    fn read_entries(&self, dir: &Path, wanted: EntryKind) -> io::Result<Vec<Entry>> {
        let mut entries: Vec<Entry> = fs::read_dir(dir)?
            .filter_map(|dent| dent.ok())
            .filter_map(|dent| {
                let path = dent.path();
                let kind = self.entry_kind(&path, dent.file_type())?;
                (kind == wanted).then(|| Entry::new(path, kind))
            })
            .collect();

        // Stable order so a canceled run stops at a predictable point
        entries.sort_unstable_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    /// Classifies one entry returned by `read_dir`. An entry that vanished or
    /// cannot be inspected is dropped on its own; its siblings still count.
    fn entry_kind(&self, path: &Path, file_type: io::Result<fs::FileType>) -> Option<EntryKind> {
        let mut file_type = match file_type {
            Ok(file_type) => file_type,
            Err(err) => {
                trace!("Dropping entry {}: {}", path.display(), err);
                return None;
            }
        };
        if file_type.is_symlink() {
            // Dangling links are neither files nor directories.
            let target = fs::metadata(path).ok()?;
            if target.is_dir() && !self.follow_links {
                return None;
            }
            file_type = target.file_type();
        }

        if file_type.is_dir() {
            Some(EntryKind::Directory)
        } else if file_type.is_file() {
            Some(EntryKind::File)
        } else {
            None
        }
    }
}

impl FileSystem for LocalFs {
    fn list_child_directories(&self, dir: &Path) -> io::Result<Vec<Entry>> {
        self.read_entries(dir, EntryKind::Directory)
    }

    fn list_files(&self, dir: &Path) -> io::Result<Vec<Entry>> {
        self.read_entries(dir, EntryKind::File)
    }
}
