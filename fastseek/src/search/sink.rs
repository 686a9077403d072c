use crossbeam_channel::{unbounded, Receiver, Sender};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, warn};

use super::cancel::CancellationGate;
use crate::config::DeliveryMode;
use crate::metrics::TraversalMetrics;
use crate::results::{Entry, MatchBatch, SearchOutcome};

/// Observer for "batch found" notifications
pub type BatchObserver = Arc<dyn Fn(&MatchBatch) + Send + Sync>;

/// Observer for the final "search completed" notification
pub type CompletionObserver = Arc<dyn Fn(SearchOutcome) + Send + Sync>;

enum Delivery {
    Inline(Vec<BatchObserver>),
    Deferred {
        pending: Sender<MatchBatch>,
        dispatcher: JoinHandle<DrainReport>,
    },
}

/// What the dispatcher saw by the time the pending queue was drained
#[derive(Debug, Default, Clone, Copy)]
struct DrainReport {
    delivered: usize,
    skipped: usize,
    failed: usize,
}

/// Hands match batches to observers and reports completion.
///
/// Inline delivery calls the observers on the worker that found the batch.
/// Deferred delivery queues the batch for a dispatcher thread; every queued
/// batch is a pending callback, and [`complete`](Self::complete) waits for the
/// queue to drain before the completion observers run. A single FIFO queue
/// keeps the order in which one worker emitted its batches.
pub(crate) struct ResultSink {
    delivery: Delivery,
    completed: Vec<CompletionObserver>,
    gate: CancellationGate,
    metrics: Arc<TraversalMetrics>,
}

impl ResultSink {
    pub(crate) fn new(
        mode: DeliveryMode,
        observers: Vec<BatchObserver>,
        completed: Vec<CompletionObserver>,
        gate: CancellationGate,
        metrics: Arc<TraversalMetrics>,
    ) -> std::io::Result<Self> {
        let delivery = match mode {
            DeliveryMode::Inline => Delivery::Inline(observers),
            DeliveryMode::Deferred => {
                let (pending, queue) = unbounded();
                let dispatcher_gate = gate.clone();
                let dispatcher_metrics = Arc::clone(&metrics);
                let dispatcher = thread::Builder::new()
                    .name("fastseek-dispatch".to_string())
                    .spawn(move || {
                        dispatch(queue, &observers, &dispatcher_gate, &dispatcher_metrics)
                    })?;
                Delivery::Deferred {
                    pending,
                    dispatcher,
                }
            }
        };

        Ok(Self {
            delivery,
            completed,
            gate,
            metrics,
        })
    }

    /// Delivers the entries found at one traversal step. Empty lists are
    /// dropped without notifying anyone.
    pub(crate) fn deliver(&self, entries: Vec<Entry>) {
        let Some(batch) = MatchBatch::from_entries(entries) else {
            return;
        };
        self.metrics.record_batch(batch.len());

        match &self.delivery {
            Delivery::Inline(observers) => notify(observers, &batch),
            Delivery::Deferred { pending, .. } => {
                self.metrics.record_callback_dispatched();
                // The dispatcher only goes away after `complete` drops the sender.
                if pending.send(batch).is_err() {
                    self.metrics.record_callback_failed();
                }
            }
        }
    }

    /// Waits for outstanding deferred callbacks, then notifies the completion
    /// observers exactly once. Returns the final outcome, which turns into
    /// `Canceled` if a stop was requested at any point before this call
    /// returned, including from inside an observer.
    pub(crate) fn complete(self, outcome: SearchOutcome) -> SearchOutcome {
        let mut outcome = outcome;

        if let Delivery::Deferred {
            pending,
            dispatcher,
        } = self.delivery
        {
            drop(pending);
            match dispatcher.join() {
                Ok(report) => {
                    debug!(
                        "Deferred callbacks drained: {} delivered, {} skipped, {} failed",
                        report.delivered, report.skipped, report.failed
                    );
                    if report.skipped > 0 {
                        outcome = SearchOutcome::Canceled;
                    }
                }
                Err(_) => warn!("Deferred callback dispatcher panicked"),
            }
        }

        if self.gate.is_canceled() {
            outcome = SearchOutcome::Canceled;
        }

        for observer in &self.completed {
            observer(outcome);
        }
        outcome
    }
}

fn notify(observers: &[BatchObserver], batch: &MatchBatch) {
    for observer in observers {
        observer(batch);
    }
}

fn dispatch(
    queue: Receiver<MatchBatch>,
    observers: &[BatchObserver],
    gate: &CancellationGate,
    metrics: &TraversalMetrics,
) -> DrainReport {
    let mut report = DrainReport::default();

    for batch in queue {
        if gate.is_canceled() {
            report.skipped += 1;
            metrics.record_callback_skipped();
            continue;
        }

        match panic::catch_unwind(AssertUnwindSafe(|| notify(observers, &batch))) {
            Ok(()) => report.delivered += 1,
            Err(_) => {
                warn!("Batch observer panicked; continuing with the next batch");
                report.failed += 1;
                metrics.record_callback_failed();
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    fn counting_observer(count: &Arc<AtomicUsize>) -> BatchObserver {
        let count = Arc::clone(count);
        Arc::new(move |batch: &MatchBatch| {
            count.fetch_add(batch.len(), Ordering::SeqCst);
        })
    }

    fn recording_completion(seen: &Arc<Mutex<Vec<SearchOutcome>>>) -> CompletionObserver {
        let seen = Arc::clone(seen);
        Arc::new(move |outcome: SearchOutcome| seen.lock().unwrap().push(outcome))
    }

    #[test]
    fn test_inline_delivery_skips_empty_batches() {
        let count = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));
        let metrics = Arc::new(TraversalMetrics::new());
        let sink = ResultSink::new(
            DeliveryMode::Inline,
            vec![counting_observer(&count)],
            vec![recording_completion(&seen)],
            CancellationGate::new(),
            Arc::clone(&metrics),
        )
        .unwrap();

        sink.deliver(Vec::new());
        sink.deliver(vec![Entry::file("/a/x"), Entry::file("/a/y")]);
        assert_eq!(count.load(Ordering::SeqCst), 2);

        assert_eq!(sink.complete(SearchOutcome::Completed), SearchOutcome::Completed);
        assert_eq!(*seen.lock().unwrap(), vec![SearchOutcome::Completed]);
        assert_eq!(metrics.get_stats().batches_delivered, 1);
    }

    #[test]
    fn test_deferred_completion_waits_for_callbacks() {
        let finished = Arc::new(AtomicUsize::new(0));
        let observed_at_completion = Arc::new(AtomicUsize::new(usize::MAX));

        let slow = {
            let finished = Arc::clone(&finished);
            Arc::new(move |_: &MatchBatch| {
                std::thread::sleep(Duration::from_millis(20));
                finished.fetch_add(1, Ordering::SeqCst);
            }) as BatchObserver
        };
        let completion = {
            let finished = Arc::clone(&finished);
            let observed = Arc::clone(&observed_at_completion);
            Arc::new(move |_: SearchOutcome| {
                observed.store(finished.load(Ordering::SeqCst), Ordering::SeqCst)
            }) as CompletionObserver
        };

        let sink = ResultSink::new(
            DeliveryMode::Deferred,
            vec![slow],
            vec![completion],
            CancellationGate::new(),
            Arc::new(TraversalMetrics::new()),
        )
        .unwrap();
        for i in 0..5 {
            sink.deliver(vec![Entry::file(format!("/f{i}"))]);
        }

        assert_eq!(sink.complete(SearchOutcome::Completed), SearchOutcome::Completed);
        assert_eq!(observed_at_completion.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_deferred_keeps_emission_order() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let recorder = {
            let order = Arc::clone(&order);
            Arc::new(move |batch: &MatchBatch| {
                order.lock().unwrap().push(batch.entries()[0].name.clone())
            }) as BatchObserver
        };

        let sink = ResultSink::new(
            DeliveryMode::Deferred,
            vec![recorder],
            Vec::new(),
            CancellationGate::new(),
            Arc::new(TraversalMetrics::new()),
        )
        .unwrap();
        for name in ["deep", "middle", "top"] {
            sink.deliver(vec![Entry::file(format!("/{name}"))]);
        }
        sink.complete(SearchOutcome::Completed);

        assert_eq!(*order.lock().unwrap(), vec!["deep", "middle", "top"]);
    }

    #[test]
    fn test_cancellation_during_drain_folds_into_outcome() {
        let gate = CancellationGate::new();
        let delivered = Arc::new(AtomicUsize::new(0));
        let seen = Arc::new(Mutex::new(Vec::new()));

        let canceling = {
            let gate = gate.clone();
            let delivered = Arc::clone(&delivered);
            Arc::new(move |_: &MatchBatch| {
                delivered.fetch_add(1, Ordering::SeqCst);
                gate.request();
            }) as BatchObserver
        };

        let sink = ResultSink::new(
            DeliveryMode::Deferred,
            vec![canceling],
            vec![recording_completion(&seen)],
            gate.clone(),
            Arc::new(TraversalMetrics::new()),
        )
        .unwrap();
        sink.deliver(vec![Entry::file("/one")]);
        sink.deliver(vec![Entry::file("/two")]);
        sink.deliver(vec![Entry::file("/three")]);

        assert_eq!(sink.complete(SearchOutcome::Completed), SearchOutcome::Canceled);
        assert_eq!(delivered.load(Ordering::SeqCst), 1);
        assert_eq!(*seen.lock().unwrap(), vec![SearchOutcome::Canceled]);
    }

    #[test]
    fn test_stop_from_last_batch_reports_canceled() {
        for mode in [DeliveryMode::Inline, DeliveryMode::Deferred] {
            let gate = CancellationGate::new();
            let seen = Arc::new(Mutex::new(Vec::new()));
            let stopping = {
                let gate = gate.clone();
                Arc::new(move |_: &MatchBatch| gate.request()) as BatchObserver
            };

            let sink = ResultSink::new(
                mode,
                vec![stopping],
                vec![recording_completion(&seen)],
                gate.clone(),
                Arc::new(TraversalMetrics::new()),
            )
            .unwrap();
            sink.deliver(vec![Entry::file("/only")]);

            assert_eq!(sink.complete(SearchOutcome::Completed), SearchOutcome::Canceled);
            assert_eq!(*seen.lock().unwrap(), vec![SearchOutcome::Canceled]);
        }
    }

    #[test]
    fn test_panicking_observer_does_not_block_completion() {
        let metrics = Arc::new(TraversalMetrics::new());
        let panicking = Arc::new(|_: &MatchBatch| panic!("observer failure")) as BatchObserver;

        let sink = ResultSink::new(
            DeliveryMode::Deferred,
            vec![panicking],
            Vec::new(),
            CancellationGate::new(),
            Arc::clone(&metrics),
        )
        .unwrap();
        sink.deliver(vec![Entry::file("/boom")]);

        assert_eq!(sink.complete(SearchOutcome::Completed), SearchOutcome::Completed);
        assert_eq!(metrics.get_stats().callbacks_failed, 1);
    }
}
