#![allow(dead_code)]

use fastseek::{Entry, EntryKind, FileSystem, MatchBatch, SearchOutcome, Searcher};
use std::collections::{BTreeSet, HashMap};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// In-memory directory tree with injectable listing faults
#[derive(Default)]
pub struct FakeFs {
    dirs: BTreeSet<PathBuf>,
    files: BTreeSet<PathBuf>,
    faults: HashMap<PathBuf, io::ErrorKind>,
    file_faults: HashMap<PathBuf, io::ErrorKind>,
    listed: Arc<Mutex<Vec<PathBuf>>>,
}

impl FakeFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a directory and all of its ancestors
    pub fn dir(mut self, path: impl AsRef<Path>) -> Self {
        for ancestor in path.as_ref().ancestors() {
            if !ancestor.as_os_str().is_empty() {
                self.dirs.insert(ancestor.to_path_buf());
            }
        }
        self
    }

    pub fn file(mut self, path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            self = self.dir(parent);
        }
        self.files.insert(path.to_path_buf());
        self
    }

    pub fn deny(self, path: impl AsRef<Path>) -> Self {
        self.fail(path, io::ErrorKind::PermissionDenied)
    }

    /// Makes every listing of `path` fail with `kind`
    pub fn fail(mut self, path: impl AsRef<Path>, kind: io::ErrorKind) -> Self {
        self.faults.insert(path.as_ref().to_path_buf(), kind);
        self
    }

    /// Makes only the file listing of `path` fail with `kind`; its child
    /// directories are still listed
    pub fn fail_files(mut self, path: impl AsRef<Path>, kind: io::ErrorKind) -> Self {
        self.file_faults.insert(path.as_ref().to_path_buf(), kind);
        self
    }

    /// Directories whose children were listed, in call order
    pub fn listed(&self) -> Arc<Mutex<Vec<PathBuf>>> {
        Arc::clone(&self.listed)
    }

    fn check(&self, dir: &Path) -> io::Result<()> {
        if let Some(kind) = self.faults.get(dir) {
            return Err(io::Error::from(*kind));
        }
        if !self.dirs.contains(dir) {
            return Err(io::Error::from(io::ErrorKind::NotFound));
        }
        Ok(())
    }
}

fn children_of(set: &BTreeSet<PathBuf>, dir: &Path, kind: EntryKind) -> Vec<Entry> {
    set.iter()
        .filter(|path| path.parent() == Some(dir))
        .map(|path| Entry::new(path.clone(), kind))
        .collect()
}

impl FileSystem for FakeFs {
    fn list_child_directories(&self, dir: &Path) -> io::Result<Vec<Entry>> {
        self.check(dir)?;
        self.listed.lock().unwrap().push(dir.to_path_buf());
        Ok(children_of(&self.dirs, dir, EntryKind::Directory))
    }

    fn list_files(&self, dir: &Path) -> io::Result<Vec<Entry>> {
        self.check(dir)?;
        if let Some(kind) = self.file_faults.get(dir) {
            return Err(io::Error::from(*kind));
        }
        Ok(children_of(&self.files, dir, EntryKind::File))
    }
}

/// Builds a tree below `root` where every directory has `fanout` children
/// down to `depth` levels, and every directory (root included) holds `file`
pub fn wide_tree(root: &Path, fanout: usize, depth: usize, file: &str) -> FakeFs {
    let mut fs = FakeFs::new().file(root.join(file));
    let mut level = vec![root.to_path_buf()];
    for _ in 0..depth {
        let mut next = Vec::new();
        for parent in &level {
            for i in 0..fanout {
                let child = parent.join(format!("d{i}"));
                fs = fs.file(child.join(file));
                next.push(child);
            }
        }
        level = next;
    }
    fs
}

/// Captures everything a search reports
#[derive(Clone, Default)]
pub struct Recorder {
    batches: Arc<Mutex<Vec<MatchBatch>>>,
    outcomes: Arc<Mutex<Vec<SearchOutcome>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attach<F: FileSystem>(&self, searcher: Searcher<F>) -> Searcher<F> {
        let batches = Arc::clone(&self.batches);
        let outcomes = Arc::clone(&self.outcomes);
        searcher
            .on_batch(move |batch| batches.lock().unwrap().push(batch.clone()))
            .on_completed(move |outcome| outcomes.lock().unwrap().push(outcome))
    }

    /// Batches in the order they were delivered
    pub fn batches(&self) -> Vec<MatchBatch> {
        self.batches.lock().unwrap().clone()
    }

    /// Every delivered path, sorted
    pub fn paths(&self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self
            .batches()
            .into_iter()
            .flat_map(|batch| batch.into_entries())
            .map(|entry| entry.path)
            .collect();
        paths.sort();
        paths
    }

    pub fn outcomes(&self) -> Vec<SearchOutcome> {
        self.outcomes.lock().unwrap().clone()
    }
}
