#![allow(dead_code)]

use async_trait::async_trait;
use parking_lot::Mutex;
use siem_relay::{
    DropReason, Event, FanoutReport, ForwardObserver, ForwarderConfig, QueueError, Sink,
    SinkError, SinkKind,
};

/// Sink that records every call and optionally fails.
pub struct RecordingSink {
    name: String,
    batch: bool,
    fail: bool,
    calls: Mutex<Vec<Vec<String>>>,
}

impl RecordingSink {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            batch: false,
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn batching(mut self) -> Self {
        self.batch = true;
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Event ids per call
    pub fn calls(&self) -> Vec<Vec<String>> {
        self.calls.lock().clone()
    }

    /// Every delivered event id, in delivery order
    pub fn event_ids(&self) -> Vec<String> {
        self.calls.lock().iter().flatten().cloned().collect()
    }

    fn record(&self, events: &[Event]) -> Result<(), SinkError> {
        self.calls
            .lock()
            .push(events.iter().map(|e| e.id().to_string()).collect());
        if self.fail {
            Err(SinkError::Connection(format!("{} unreachable", self.name)))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Sink for RecordingSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Custom
    }

    async fn send_event(&self, event: &Event) -> Result<(), SinkError> {
        self.record(std::slice::from_ref(event))
    }

    fn supports_batch(&self) -> bool {
        self.batch
    }

    async fn send_batch(&self, events: &[Event]) -> Result<(), SinkError> {
        self.record(events)
    }
}

/// Observer that keeps everything it is told.
#[derive(Default)]
pub struct RecordingObserver {
    pub drops: Mutex<Vec<(String, DropReason)>>,
    pub reports: Mutex<Vec<FanoutReport>>,
    pub loop_errors: Mutex<Vec<QueueError>>,
}

impl ForwardObserver for RecordingObserver {
    fn on_event_dropped(&self, event: &Event, reason: DropReason) {
        self.drops.lock().push((event.id().to_string(), reason));
    }

    fn on_batch_dispatched(&self, report: &FanoutReport) {
        self.reports.lock().push(report.clone());
    }

    fn on_loop_error(&self, error: &QueueError) {
        self.loop_errors.lock().push(*error);
    }
}

pub fn event(id: impl Into<String>) -> Event {
    Event::threat("Phishing Detector", "alice@corp.com", 0.9, "Credential phishing link")
        .id(id)
        .recipient("bob@corp.com")
        .indicator("hxxp://login-corp.example")
        .action_taken("quarantined")
        .build()
}

pub fn forwarder(batch_size: usize, window_ms: u64) -> ForwarderConfig {
    ForwarderConfig {
        batch_size,
        batch_timeout_ms: window_ms,
        ..ForwarderConfig::default()
    }
}
