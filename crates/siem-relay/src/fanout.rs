//! Fan-out Coordinator
//!
//! Delivers one batch to every registered sink concurrently. Each sink runs
//! in its own task; a failing or panicking sink never affects the others.

use crate::event::Event;
use crate::sink::{DeliveryOutcome, Sink, SinkKind};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Result of one batch for one sink
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SinkReport {
    pub sink: String,
    #[serde(serialize_with = "serialize_kind")]
    pub kind: SinkKind,
    pub outcome: DeliveryOutcome,
}

fn serialize_kind<S: serde::Serializer>(kind: &SinkKind, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(kind.as_str())
}

/// Result of one batch across all sinks
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct FanoutReport {
    pub batch_size: usize,
    /// One entry per sink, in registration order
    pub sinks: Vec<SinkReport>,
}

impl FanoutReport {
    /// Sum over all sinks
    pub fn totals(&self) -> DeliveryOutcome {
        let mut total = DeliveryOutcome::default();
        for report in &self.sinks {
            total += report.outcome;
        }
        total
    }

    pub fn for_sink(&self, name: &str) -> Option<&SinkReport> {
        self.sinks.iter().find(|r| r.sink == name)
    }
}

pub struct FanoutCoordinator {
    sinks: Vec<Arc<dyn Sink>>,
    permits: Arc<Semaphore>,
}

impl FanoutCoordinator {
    pub fn new(sinks: Vec<Arc<dyn Sink>>) -> Self {
        let permits = Arc::new(Semaphore::new(sinks.len().max(1)));
        Self { sinks, permits }
    }

    pub fn sink_count(&self) -> usize {
        self.sinks.len()
    }

    /// Dispatch `events` to every sink and wait for all of them.
    pub async fn dispatch(&self, events: Vec<Event>) -> FanoutReport {
        let batch_size = events.len();
        if batch_size == 0 || self.sinks.is_empty() {
            if batch_size > 0 {
                tracing::warn!(events = batch_size, "No sinks registered, batch discarded");
            }
            return FanoutReport { batch_size, sinks: Vec::new() };
        }

        let batch: Arc<[Event]> = events.into();

        let tasks: Vec<_> = self
            .sinks
            .iter()
            .map(|sink| {
                let name = sink.name().to_string();
                let kind = sink.kind();
                let sink = Arc::clone(sink);
                let batch = Arc::clone(&batch);
                let permits = Arc::clone(&self.permits);

                let handle = tokio::spawn(async move {
                    let _permit = permits.acquire_owned().await.ok();
                    sink.submit(&batch).await
                });
                (name, kind, handle)
            })
            .collect();

        let mut reports = Vec::with_capacity(tasks.len());
        for (name, kind, handle) in tasks {
            let outcome = match handle.await {
                Ok(outcome) => outcome,
                Err(e) => {
                    tracing::error!(sink = %name, error = %e, "Sink task aborted");
                    DeliveryOutcome::failed(batch_size)
                }
            };

            if outcome.is_complete_success() {
                tracing::info!(
                    sink = %name,
                    kind = %kind,
                    events = batch_size,
                    delivered = outcome.delivered,
                    failed = outcome.failed,
                    "Batch forwarded"
                );
            } else {
                tracing::warn!(
                    sink = %name,
                    kind = %kind,
                    events = batch_size,
                    delivered = outcome.delivered,
                    failed = outcome.failed,
                    "Batch forwarded with failures"
                );
            }

            reports.push(SinkReport { sink: name, kind, outcome });
        }

        FanoutReport { batch_size, sinks: reports }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SinkError;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        name: String,
        batch: bool,
        fail: bool,
        panic: bool,
        delay: Option<Duration>,
        seen: Mutex<Vec<Vec<String>>>,
    }

    impl Recorder {
        fn named(name: &str) -> Self {
            Self { name: name.into(), ..Default::default() }
        }
    }

    #[async_trait]
    impl Sink for Recorder {
        fn name(&self) -> &str {
            &self.name
        }

        fn kind(&self) -> SinkKind {
            SinkKind::Custom
        }

        async fn send_event(&self, event: &Event) -> Result<(), SinkError> {
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.panic {
                panic!("sink exploded");
            }
            self.seen.lock().push(vec![event.id().to_string()]);
            if self.fail {
                Err(SinkError::Connection("refused".into()))
            } else {
                Ok(())
            }
        }

        fn supports_batch(&self) -> bool {
            self.batch
        }

        async fn send_batch(&self, events: &[Event]) -> Result<(), SinkError> {
            self.seen
                .lock()
                .push(events.iter().map(|e| e.id().to_string()).collect());
            if self.fail {
                Err(SinkError::Timeout)
            } else {
                Ok(())
            }
        }
    }

    fn batch(n: usize) -> Vec<Event> {
        (0..n)
            .map(|i| Event::threat("t", "u@corp.com", 0.5, "m").id(format!("e{}", i)).build())
            .collect()
    }

    #[tokio::test]
    async fn test_failing_sink_isolated() {
        let good_batch = Arc::new(Recorder { batch: true, ..Recorder::named("hec") });
        let bad = Arc::new(Recorder { fail: true, ..Recorder::named("syslog") });
        let good_single = Arc::new(Recorder::named("webhook"));
        let coordinator = FanoutCoordinator::new(vec![
            good_batch.clone() as Arc<dyn Sink>,
            bad.clone(),
            good_single.clone(),
        ]);

        let report = coordinator.dispatch(batch(4)).await;

        assert_eq!(report.batch_size, 4);
        assert_eq!(report.for_sink("hec").unwrap().outcome, DeliveryOutcome::delivered(4));
        assert_eq!(report.for_sink("syslog").unwrap().outcome, DeliveryOutcome::failed(4));
        assert_eq!(report.for_sink("webhook").unwrap().outcome, DeliveryOutcome::delivered(4));
        assert_eq!(report.totals(), DeliveryOutcome { delivered: 8, failed: 4 });
        assert_eq!(bad.seen.lock().len(), 4);
    }

    #[tokio::test]
    async fn test_batch_sink_sees_whole_batch_in_order() {
        let sink = Arc::new(Recorder { batch: true, ..Recorder::named("hec") });
        let coordinator = FanoutCoordinator::new(vec![sink.clone() as Arc<dyn Sink>]);

        coordinator.dispatch(batch(3)).await;

        assert_eq!(*sink.seen.lock(), vec![vec!["e0", "e1", "e2"]]);
    }

    #[tokio::test]
    async fn test_panicking_sink_counted_as_failed() {
        let boom = Arc::new(Recorder { panic: true, ..Recorder::named("boom") });
        let ok = Arc::new(Recorder::named("ok"));
        let coordinator =
            FanoutCoordinator::new(vec![boom as Arc<dyn Sink>, ok.clone() as Arc<dyn Sink>]);

        let report = coordinator.dispatch(batch(2)).await;

        assert_eq!(report.sinks[0].outcome, DeliveryOutcome::failed(2));
        assert_eq!(report.sinks[1].outcome, DeliveryOutcome::delivered(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sinks_run_concurrently() {
        let sinks: Vec<Arc<dyn Sink>> = (0..3)
            .map(|i| {
                Arc::new(Recorder {
                    delay: Some(Duration::from_secs(1)),
                    ..Recorder::named(&format!("slow{}", i))
                }) as Arc<dyn Sink>
            })
            .collect();
        let coordinator = FanoutCoordinator::new(sinks);

        let start = tokio::time::Instant::now();
        let report = coordinator.dispatch(batch(2)).await;

        // Sequential within a sink (2 x 1s), parallel across sinks.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(2));
        assert!(elapsed < Duration::from_secs(3));
        assert_eq!(report.totals(), DeliveryOutcome::delivered(6));
    }

    #[tokio::test]
    async fn test_no_sinks_or_empty_batch() {
        let coordinator = FanoutCoordinator::new(Vec::new());
        let report = coordinator.dispatch(batch(2)).await;
        assert!(report.sinks.is_empty());

        let sink = Arc::new(Recorder::named("ok"));
        let coordinator = FanoutCoordinator::new(vec![sink.clone() as Arc<dyn Sink>]);
        let report = coordinator.dispatch(Vec::new()).await;
        assert!(report.sinks.is_empty());
        assert!(sink.seen.lock().is_empty());
    }
}
