pub mod config;
pub mod errors;
pub mod filesystem;
pub mod metrics;
pub mod results;
pub mod search;

pub use config::{DeliveryMode, SearchConfig, SearchTarget};
pub use errors::{SearchError, SearchResult};
pub use filesystem::{FileSystem, LocalFs};
pub use metrics::{TraversalMetrics, TraversalStats};
pub use results::{Entry, EntryKind, MatchBatch, SearchOutcome};
pub use search::{
    list_matches, list_matches_serial, list_matches_with, CancellationGate, Canceled, Matcher,
    SearchEvent, SearchEvents, SearchOptions, Searcher, StopHandle,
};
