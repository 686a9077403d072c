use rayon::prelude::*;
use std::io;
use std::path::Path;
use tracing::{debug, trace, warn};

use super::cancel::{CancellationGate, Canceled};
use super::matcher::Matcher;
use super::sink::ResultSink;
use crate::config::SearchTarget;
use crate::filesystem::{is_transient, FileSystem};
use crate::metrics::TraversalMetrics;
use crate::results::Entry;

/// Parallel traversal of one root directory.
///
/// The engine runs two fan-out passes before committing to full subtree
/// walks: the root is planned, then every directory of that plan is planned
/// again in parallel, and every directory of the second plans is walked in
/// parallel. Long single-child chains at the top of a tree therefore still
/// produce a wide set of independent subtrees for the worker pool.
///
/// All parallel work runs on the rayon pool the caller installed. The only
/// state shared between workers is the cancellation gate.
pub(crate) struct TraversalEngine<'a, F: FileSystem + ?Sized> {
    pub(crate) fs: &'a F,
    pub(crate) matcher: &'a Matcher,
    pub(crate) gate: &'a CancellationGate,
    pub(crate) sink: &'a ResultSink,
    pub(crate) metrics: &'a TraversalMetrics,
}

impl<F: FileSystem + ?Sized> TraversalEngine<'_, F> {
    /// Searches `root`. Returns `Err(Canceled)` as soon as any branch
    /// observes the gate tripped; branches not yet started are skipped.
    pub(crate) fn run(&self, root: &Path) -> Result<(), Canceled> {
        let first = self.plan(root)?;
        debug!(
            "First fan-out below {}: {} directories",
            root.display(),
            first.len()
        );

        first.par_iter().try_for_each(|dir| {
            let second = self.plan(&dir.path)?;
            trace!(
                "Second fan-out below {}: {} directories",
                dir.path.display(),
                second.len()
            );
            second
                .par_iter()
                .try_for_each(|subtree| self.walk(&subtree.path))
        })
    }

    /// Lists the child directories of `dir`, or `None` when the listing
    /// faulted and the subtree has to be abandoned.
    pub(crate) fn list_children(&self, dir: &Path) -> Option<Vec<Entry>> {
        self.metrics.record_directory();
        match self.fs.list_child_directories(dir) {
            Ok(children) => Some(children),
            Err(err) => {
                self.skip_fault(dir, &err);
                None
            }
        }
    }

    /// Emits the matches found among the direct children of `dir`.
    pub(crate) fn emit_level(&self, dir: &Path, child_dirs: &[Entry]) -> Result<(), Canceled> {
        self.gate.checkpoint()?;

        let candidates = match self.matcher.target() {
            SearchTarget::Directories => child_dirs.to_vec(),
            SearchTarget::Files => match self.fs.list_files(dir) {
                Ok(files) => files,
                Err(err) => {
                    self.skip_fault(dir, &err);
                    return Ok(());
                }
            },
        };

        self.sink.deliver(self.matcher.select(candidates));
        Ok(())
    }

    fn skip_fault(&self, dir: &Path, err: &io::Error) {
        if is_transient(err) {
            debug!("Skipping {}: {}", dir.display(), err);
            self.metrics.record_transient_fault();
        } else {
            warn!("Skipping {} after unexpected error: {}", dir.display(), err);
            self.metrics.record_other_fault();
        }
    }
}
