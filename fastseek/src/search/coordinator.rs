use crossbeam_channel::{unbounded, Receiver};
use rayon::ThreadPoolBuilder;
use std::fs;
use std::io;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use tracing::{debug, info};

use super::cancel::{CancellationGate, Canceled, StopHandle};
use super::engine::TraversalEngine;
use super::matcher::Matcher;
use super::sink::{BatchObserver, CompletionObserver, ResultSink};
use crate::config::{default_thread_count, DeliveryMode, SearchConfig};
use crate::errors::{SearchError, SearchResult};
use crate::filesystem::{FileSystem, LocalFs};
use crate::metrics::TraversalMetrics;
use crate::results::{Entry, MatchBatch, SearchOutcome};

/// Options for how a search runs, independent of what it looks for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchOptions {
    /// Where "batch found" observers run
    pub delivery: DeliveryMode,
    /// When false, a canceled search returns `Err(SearchError::Canceled)`
    /// once the completion observers have run
    pub suppress_cancel_error: bool,
    /// Size of the worker pool
    pub thread_count: NonZeroUsize,
}

impl Default for SearchOptions {
    fn default() -> Self {
        Self {
            delivery: DeliveryMode::Inline,
            suppress_cancel_error: true,
            thread_count: default_thread_count(),
        }
    }
}

impl SearchOptions {
    pub fn with_delivery(mut self, delivery: DeliveryMode) -> Self {
        self.delivery = delivery;
        self
    }

    pub fn with_suppress_cancel_error(mut self, suppress: bool) -> Self {
        self.suppress_cancel_error = suppress;
        self
    }

    pub fn with_thread_count(mut self, thread_count: NonZeroUsize) -> Self {
        self.thread_count = thread_count;
        self
    }
}

/// A configured search over one or more root directories.
///
/// Roots are searched one after the other, each with the parallel traversal
/// engine, and all of them share one cancellation gate: stopping the search
/// while the first root is running means later roots are never started.
/// Observers are registered with [`on_batch`](Self::on_batch) and
/// [`on_completed`](Self::on_completed) before the search starts; the
/// completion observers run exactly once per search, whatever the outcome.
///
/// ```no_run
/// use fastseek::{Matcher, SearchOptions, Searcher};
///
/// let outcome = Searcher::new("/var/log", Matcher::files("*.log")?, SearchOptions::default())?
///     .on_batch(|batch| {
///         for entry in batch {
///             println!("{}", entry.path.display());
///         }
///     })
///     .start()?;
/// # Ok::<(), fastseek::SearchError>(())
/// ```
pub struct Searcher<F: FileSystem = LocalFs> {
    roots: Vec<PathBuf>,
    matcher: Matcher,
    options: SearchOptions,
    fs: F,
    gate: CancellationGate,
    batch_observers: Vec<BatchObserver>,
    completion_observers: Vec<CompletionObserver>,
    metrics: Arc<TraversalMetrics>,
}

impl Searcher<LocalFs> {
    /// Creates a search of a single root directory
    pub fn new(
        root: impl Into<PathBuf>,
        matcher: Matcher,
        options: SearchOptions,
    ) -> SearchResult<Self> {
        Self::multiple(vec![root.into()], matcher, options)
    }

    /// Creates a search of several root directories, searched in order
    pub fn multiple<I, P>(
        roots: I,
        matcher: Matcher,
        options: SearchOptions,
    ) -> SearchResult<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let roots: Vec<PathBuf> = roots.into_iter().map(Into::into).collect();
        for root in &roots {
            validate_root(root)?;
        }
        Self::with_filesystem(roots, matcher, options, LocalFs::new())
    }

    /// Creates the search described by a loaded configuration
    pub fn from_config(config: &SearchConfig) -> SearchResult<Self> {
        let mut searcher = Self::multiple(
            config.roots.clone(),
            config.matcher()?,
            config.search_options(),
        )?;
        searcher.fs = LocalFs::with_follow_links(config.follow_links);
        Ok(searcher)
    }
}

impl<F: FileSystem> Searcher<F> {
    /// Creates a search over an arbitrary filesystem layer. Roots are not
    /// checked against the real filesystem.
    pub fn with_filesystem(
        roots: Vec<PathBuf>,
        matcher: Matcher,
        options: SearchOptions,
        fs: F,
    ) -> SearchResult<Self> {
        if roots.is_empty() {
            return Err(SearchError::NoRoots);
        }

        Ok(Self {
            roots,
            matcher,
            options,
            fs,
            gate: CancellationGate::new(),
            batch_observers: Vec::new(),
            completion_observers: Vec::new(),
            metrics: Arc::new(TraversalMetrics::new()),
        })
    }

    /// Registers a "batch found" observer
    pub fn on_batch<O>(mut self, observer: O) -> Self
    where
        O: Fn(&MatchBatch) + Send + Sync + 'static,
    {
        self.batch_observers.push(Arc::new(observer));
        self
    }

    /// Registers a "search completed" observer
    pub fn on_completed<O>(mut self, observer: O) -> Self
    where
        O: Fn(SearchOutcome) + Send + Sync + 'static,
    {
        self.completion_observers.push(Arc::new(observer));
        self
    }

    /// Returns a handle that can stop this search from any thread
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle::new(self.gate.clone())
    }

    /// Requests cancellation before or during the search
    pub fn stop(&self) {
        self.gate.request();
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    pub fn options(&self) -> &SearchOptions {
        &self.options
    }

    /// Counters shared with the running search
    pub fn metrics(&self) -> Arc<TraversalMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Runs the search to the end on the calling thread.
    ///
    /// Returns the outcome after every observer has finished. A canceled
    /// search returns `Ok(SearchOutcome::Canceled)`, or
    /// `Err(SearchError::Canceled)` when cancel errors are not suppressed.
    pub fn start(self) -> SearchResult<SearchOutcome> {
        let Searcher {
            roots,
            matcher,
            options,
            fs,
            gate,
            batch_observers,
            completion_observers,
            metrics,
        } = self;

        info!(
            "Starting search of {} root(s) with {} threads ({:?} delivery)",
            roots.len(),
            options.thread_count,
            options.delivery
        );

        let pool = ThreadPoolBuilder::new()
            .num_threads(options.thread_count.get())
            .thread_name(|i| format!("fastseek-{i}"))
            .build()?;
        let sink = ResultSink::new(
            options.delivery,
            batch_observers,
            completion_observers,
            gate.clone(),
            Arc::clone(&metrics),
        )?;

        let engine = TraversalEngine {
            fs: &fs,
            matcher: &matcher,
            gate: &gate,
            sink: &sink,
            metrics: &metrics,
        };
        let outcome = match pool.install(|| run_roots(&engine, &roots)) {
            Ok(()) => SearchOutcome::Completed,
            Err(Canceled) => SearchOutcome::Canceled,
        };

        let outcome = sink.complete(outcome);
        metrics.log_stats();

        if outcome.is_canceled() {
            info!("Search canceled");
            if !options.suppress_cancel_error {
                return Err(SearchError::Canceled);
            }
        } else {
            info!("Search completed");
        }
        Ok(outcome)
    }

    /// Runs the search on a dedicated thread. Joining the handle yields what
    /// [`start`](Self::start) would have returned.
    pub fn spawn(self) -> SearchResult<JoinHandle<SearchResult<SearchOutcome>>>
    where
        F: 'static,
    {
        let handle = thread::Builder::new()
            .name("fastseek-search".to_string())
            .spawn(move || self.start())?;
        Ok(handle)
    }

    /// Runs the search on a dedicated thread and streams its notifications
    /// as [`SearchEvent`]s. The channel closes after the `Completed` event.
    pub fn events(self) -> SearchResult<SearchEvents>
    where
        F: 'static,
    {
        let (sender, receiver) = unbounded();
        let stop = self.stop_handle();

        let batches = sender.clone();
        let worker = self
            .on_batch(move |batch| {
                // The receiver may already be gone; there is nobody to tell.
                let _ = batches.send(SearchEvent::Batch(batch.clone()));
            })
            .on_completed(move |outcome| {
                let _ = sender.send(SearchEvent::Completed(outcome));
            })
            .spawn()?;

        Ok(SearchEvents {
            receiver,
            stop,
            worker,
        })
    }
}

/// Notification of a running search, in channel form
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchEvent {
    Batch(MatchBatch),
    Completed(SearchOutcome),
}

/// Receiving end of [`Searcher::events`]
pub struct SearchEvents {
    receiver: Receiver<SearchEvent>,
    stop: StopHandle,
    worker: JoinHandle<SearchResult<SearchOutcome>>,
}

impl SearchEvents {
    pub fn receiver(&self) -> &Receiver<SearchEvent> {
        &self.receiver
    }

    /// Blocks for each event until the search finishes
    pub fn iter(&self) -> crossbeam_channel::Iter<'_, SearchEvent> {
        self.receiver.iter()
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub fn stop(&self) {
        self.stop.stop();
    }

    /// Waits for the search thread and returns its result
    pub fn join(self) -> SearchResult<SearchOutcome> {
        self.worker
            .join()
            .unwrap_or(Err(SearchError::WorkerPanicked))
    }
}

fn run_roots<F: FileSystem + ?Sized>(
    engine: &TraversalEngine<'_, F>,
    roots: &[PathBuf],
) -> Result<(), Canceled> {
    for root in roots {
        engine.gate.checkpoint()?;
        debug!("Searching root {}", root.display());
        engine.run(root)?;
    }
    // A stop requested while the last batch was being delivered
    engine.gate.checkpoint()
}

fn validate_root(root: &Path) -> SearchResult<()> {
    match fs::metadata(root) {
        Ok(metadata) if metadata.is_dir() => Ok(()),
        Ok(_) => Err(SearchError::not_a_directory(root)),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Err(SearchError::root_not_found(root)),
        Err(e) => Err(e.into()),
    }
}

fn collector(found: &Arc<Mutex<Vec<Entry>>>) -> BatchObserver {
    let found = Arc::clone(found);
    Arc::new(move |batch: &MatchBatch| {
        found
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(batch.iter().cloned());
    })
}

fn take_collected(found: &Mutex<Vec<Entry>>) -> Vec<Entry> {
    std::mem::take(&mut *found.lock().unwrap_or_else(PoisonError::into_inner))
}

/// Collects every match below `root` using one worker per CPU
pub fn list_matches(root: impl AsRef<Path>, matcher: &Matcher) -> SearchResult<Vec<Entry>> {
    list_matches_with(root, matcher, default_thread_count())
}

/// Collects every match below `root` using `thread_count` workers.
///
/// Runs the same traversal as [`Searcher::start`]; the order of the
/// returned entries depends on scheduling.
pub fn list_matches_with(
    root: impl AsRef<Path>,
    matcher: &Matcher,
    thread_count: NonZeroUsize,
) -> SearchResult<Vec<Entry>> {
    let found = Arc::new(Mutex::new(Vec::new()));
    let options = SearchOptions {
        delivery: DeliveryMode::Inline,
        suppress_cancel_error: false,
        thread_count,
    };

    let mut searcher = Searcher::new(root.as_ref(), matcher.clone(), options)?;
    searcher.batch_observers.push(collector(&found));
    searcher.start()?;

    Ok(take_collected(&found))
}

/// Collects every match below `root` with a plain depth-first walk on the
/// calling thread. Entries come back in post-order.
pub fn list_matches_serial(
    root: impl AsRef<Path>,
    matcher: &Matcher,
) -> SearchResult<Vec<Entry>> {
    let root = root.as_ref();
    validate_root(root)?;

    let found = Arc::new(Mutex::new(Vec::new()));
    let gate = CancellationGate::new();
    let metrics = Arc::new(TraversalMetrics::new());
    let sink = ResultSink::new(
        DeliveryMode::Inline,
        vec![collector(&found)],
        Vec::new(),
        gate.clone(),
        Arc::clone(&metrics),
    )?;
    let fs = LocalFs::new();

    let engine = TraversalEngine {
        fs: &fs,
        matcher,
        gate: &gate,
        sink: &sink,
        metrics: &metrics,
    };
    engine.walk(root)?;
    sink.complete(SearchOutcome::Completed);

    Ok(take_collected(&found))
}
