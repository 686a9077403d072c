use std::path::Path;
use tracing::trace;

use super::cancel::Canceled;
use super::engine::TraversalEngine;
use crate::filesystem::FileSystem;
use crate::results::Entry;

impl<F: FileSystem + ?Sized> TraversalEngine<'_, F> {
    /// Finds the directories to hand out as independent units of work.
    ///
    /// Starting at `dir`, emits the matches of each visited level and follows
    /// the chain while a directory has exactly one child directory. Stops at
    /// the first directory with zero or several child directories and returns
    /// those children. A listing fault abandons the subtree and returns an
    /// empty plan.
    pub(crate) fn plan(&self, dir: &Path) -> Result<Vec<Entry>, Canceled> {
        let mut current = dir.to_path_buf();
        loop {
            self.gate.checkpoint()?;
            let Some(mut children) = self.list_children(&current) else {
                return Ok(Vec::new());
            };
            self.emit_level(&current, &children)?;

            if children.len() != 1 {
                trace!(
                    "Planned {} directories below {}",
                    children.len(),
                    current.display()
                );
                return Ok(children);
            }
            current = children.swap_remove(0).path;
        }
    }
}
