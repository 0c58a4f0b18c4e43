//! Forwarder statistics and observation hooks

use crate::error::QueueError;
use crate::event::Event;
use crate::fanout::FanoutReport;
use std::sync::atomic::{AtomicU64, Ordering};

/// Why an event never reached the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    /// Queue full, incoming event rejected
    QueueFull,
    /// Queue full, event evicted to make room for a newer one
    Evicted,
    /// Queue closed
    Closed,
}

/// Observer injected into the forwarding manager.
///
/// Every method has a no-op default; implement what you need.
pub trait ForwardObserver: Send + Sync {
    fn on_event_dropped(&self, _event: &Event, _reason: DropReason) {}

    fn on_batch_dispatched(&self, _report: &FanoutReport) {}

    fn on_loop_error(&self, _error: &QueueError) {}
}

/// Observer that ignores everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl ForwardObserver for NoopObserver {}

#[derive(Debug, Default)]
pub(crate) struct ForwarderStats {
    events_enqueued: AtomicU64,
    events_dropped: AtomicU64,
    batches_dispatched: AtomicU64,
    events_delivered: AtomicU64,
    events_failed: AtomicU64,
    loop_errors: AtomicU64,
}

impl ForwarderStats {
    pub(crate) fn record_enqueued(&self) {
        self.events_enqueued.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_dropped(&self) {
        self.events_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_batch(&self, report: &FanoutReport) {
        self.batches_dispatched.fetch_add(1, Ordering::Relaxed);
        let totals = report.totals();
        self.events_delivered.fetch_add(totals.delivered as u64, Ordering::Relaxed);
        self.events_failed.fetch_add(totals.failed as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_loop_error(&self) {
        self.loop_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self, queue_depth: usize) -> ForwarderMetrics {
        ForwarderMetrics {
            events_enqueued: self.events_enqueued.load(Ordering::Relaxed),
            events_dropped: self.events_dropped.load(Ordering::Relaxed),
            batches_dispatched: self.batches_dispatched.load(Ordering::Relaxed),
            events_delivered: self.events_delivered.load(Ordering::Relaxed),
            events_failed: self.events_failed.load(Ordering::Relaxed),
            loop_errors: self.loop_errors.load(Ordering::Relaxed),
            queue_depth,
        }
    }
}

/// Point-in-time forwarder counters.
///
/// Delivered/failed count per-sink deliveries: one event sent to three sinks
/// counts three times.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ForwarderMetrics {
    pub events_enqueued: u64,
    pub events_dropped: u64,
    pub batches_dispatched: u64,
    pub events_delivered: u64,
    pub events_failed: u64,
    pub loop_errors: u64,
    pub queue_depth: usize,
}
