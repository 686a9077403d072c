use std::path::Path;

use super::cancel::Canceled;
use super::engine::TraversalEngine;
use crate::filesystem::FileSystem;

impl<F: FileSystem + ?Sized> TraversalEngine<'_, F> {
    /// Walks the subtree below `dir` depth-first on the calling thread.
    ///
    /// Children are finished before their parent is matched, so the batches
    /// of one walk arrive in post-order. The gate is checked before any
    /// directory is listed, before every child is entered and before the
    /// level is matched.
    pub(crate) fn walk(&self, dir: &Path) -> Result<(), Canceled> {
        self.gate.checkpoint()?;
        let Some(children) = self.list_children(dir) else {
            return Ok(());
        };

        for child in &children {
            self.gate.checkpoint()?;
            self.walk(&child.path)?;
        }

        self.emit_level(dir, &children)
    }
}
