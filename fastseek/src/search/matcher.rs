use glob::{MatchOptions, Pattern};
use std::fmt;
use std::sync::Arc;

use crate::config::SearchTarget;
use crate::errors::{SearchError, SearchResult};
use crate::results::Entry;

/// Caller-supplied selection function
pub type Predicate = Arc<dyn Fn(&Entry) -> bool + Send + Sync>;

/// How entries are selected
#[derive(Clone)]
pub enum MatchRule {
    /// Wildcard pattern over the entry name
    Glob {
        pattern: Pattern,
        options: MatchOptions,
    },
    Predicate(Predicate),
}

/// Decides which entries a search reports.
///
/// A matcher carries its [`SearchTarget`]: at every directory visited, a
/// file matcher is tried against the directory's files and a directory
/// matcher against its child directories.
#[derive(Clone)]
pub struct Matcher {
    target: SearchTarget,
    rule: MatchRule,
}

impl Matcher {
    /// Matches file names against a glob pattern
    pub fn files(pattern: &str) -> SearchResult<Self> {
        Self::glob(SearchTarget::Files, pattern, !cfg!(windows))
    }

    /// Matches directory names against a glob pattern
    pub fn directories(pattern: &str) -> SearchResult<Self> {
        Self::glob(SearchTarget::Directories, pattern, !cfg!(windows))
    }

    /// Compiles `pattern`, rejecting empty or malformed patterns
    pub fn glob(target: SearchTarget, pattern: &str, case_sensitive: bool) -> SearchResult<Self> {
        if pattern.is_empty() {
            return Err(SearchError::invalid_pattern("pattern is empty"));
        }
        let compiled = Pattern::new(pattern)
            .map_err(|e| SearchError::invalid_pattern(format!("{pattern}: {e}")))?;
        let options = MatchOptions {
            case_sensitive,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };

        Ok(Self {
            target,
            rule: MatchRule::Glob {
                pattern: compiled,
                options,
            },
        })
    }

    /// Selects files with an arbitrary predicate
    pub fn files_where<P>(predicate: P) -> Self
    where
        P: Fn(&Entry) -> bool + Send + Sync + 'static,
    {
        Self::predicate(SearchTarget::Files, predicate)
    }

    /// Selects directories with an arbitrary predicate
    pub fn directories_where<P>(predicate: P) -> Self
    where
        P: Fn(&Entry) -> bool + Send + Sync + 'static,
    {
        Self::predicate(SearchTarget::Directories, predicate)
    }

    pub fn predicate<P>(target: SearchTarget, predicate: P) -> Self
    where
        P: Fn(&Entry) -> bool + Send + Sync + 'static,
    {
        Self {
            target,
            rule: MatchRule::Predicate(Arc::new(predicate)),
        }
    }

    pub fn target(&self) -> SearchTarget {
        self.target
    }

    pub fn rule(&self) -> &MatchRule {
        &self.rule
    }

    pub fn is_match(&self, entry: &Entry) -> bool {
        match &self.rule {
            MatchRule::Glob { pattern, options } => pattern.matches_with(&entry.name, *options),
            MatchRule::Predicate(predicate) => predicate(entry),
        }
    }

    /// Keeps the entries that match
    pub fn select(&self, entries: Vec<Entry>) -> Vec<Entry> {
        entries.into_iter().filter(|e| self.is_match(e)).collect()
    }
}

impl fmt::Debug for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = match &self.rule {
            MatchRule::Glob { pattern, .. } => pattern.as_str().to_string(),
            MatchRule::Predicate(_) => "<predicate>".to_string(),
        };
        f.debug_struct("Matcher")
            .field("target", &self.target)
            .field("rule", &rule)
            .finish()
    }
}
