//! Error types for fastseek.
//!
//! Only construction-time problems and cancellation ever reach the caller.
//! Filesystem faults met during a traversal are absorbed by the walker: the
//! affected subtree is skipped and the search carries on.
use std::path::PathBuf;
use thiserror::Error;

use crate::search::cancel::Canceled;

/// Result type for search operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors that can occur when setting up or running a search
#[derive(Error, Debug)]
pub enum SearchError {
    #[error("Root directory not found: {0}")]
    RootNotFound(PathBuf),
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("No root directories to search")]
    NoRoots,
    #[error("Invalid pattern: {0}")]
    InvalidPattern(String),
    #[error("Search was canceled")]
    Canceled,
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Worker pool error: {0}")]
    ThreadPool(String),
    #[error("Search thread panicked")]
    WorkerPanicked,
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl SearchError {
    pub fn root_not_found(path: impl Into<PathBuf>) -> Self {
        Self::RootNotFound(path.into())
    }

    pub fn not_a_directory(path: impl Into<PathBuf>) -> Self {
        Self::NotADirectory(path.into())
    }

    pub fn invalid_pattern(pattern: impl Into<String>) -> Self {
        Self::InvalidPattern(pattern.into())
    }

    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    /// True when the error is the re-raised cancellation signal
    pub fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled)
    }
}

impl From<Canceled> for SearchError {
    fn from(_: Canceled) -> Self {
        Self::Canceled
    }
}

impl From<config::ConfigError> for SearchError {
    fn from(err: config::ConfigError) -> Self {
        Self::ConfigError(err.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for SearchError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        Self::ThreadPool(err.to_string())
    }
}
