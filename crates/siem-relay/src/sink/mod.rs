//! SIEM Sinks
//!
//! One implementation per backend protocol. Sinks report failures as
//! counts; nothing escapes `submit`.

use crate::error::SinkError;
use crate::event::Event;
use async_trait::async_trait;

pub mod hec;
pub mod syslog;
pub mod webhook;

pub use hec::HecSink;
pub use syslog::SyslogSink;
pub use webhook::WebhookSink;

/// Backend protocol of a sink
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SinkKind {
    Hec,
    Syslog,
    Webhook,
    /// Externally provided implementation
    Custom,
}

impl SinkKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hec => "hec",
            Self::Syslog => "syslog",
            Self::Webhook => "webhook",
            Self::Custom => "custom",
        }
    }
}

impl std::fmt::Display for SinkKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Delivered/failed counts for one submission
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct DeliveryOutcome {
    pub delivered: usize,
    pub failed: usize,
}

impl DeliveryOutcome {
    pub fn delivered(n: usize) -> Self {
        Self { delivered: n, failed: 0 }
    }

    pub fn failed(n: usize) -> Self {
        Self { delivered: 0, failed: n }
    }

    pub fn is_complete_success(&self) -> bool {
        self.failed == 0
    }
}

impl std::ops::AddAssign for DeliveryOutcome {
    fn add_assign(&mut self, rhs: Self) {
        self.delivered += rhs.delivered;
        self.failed += rhs.failed;
    }
}

#[async_trait]
pub trait Sink: Send + Sync {
    /// Destination identity used in logs
    fn name(&self) -> &str;

    fn kind(&self) -> SinkKind;

    /// Deliver one event
    async fn send_event(&self, event: &Event) -> Result<(), SinkError>;

    /// Whether `send_batch` delivers a whole batch in one call
    fn supports_batch(&self) -> bool {
        false
    }

    /// Deliver a batch in one protocol operation
    async fn send_batch(&self, _events: &[Event]) -> Result<(), SinkError> {
        Err(SinkError::BatchUnsupported)
    }

    /// Deliver `events`, never failing past this boundary.
    ///
    /// Batch-capable sinks get one `send_batch` call; others get one
    /// `send_event` per event, in order.
    async fn submit(&self, events: &[Event]) -> DeliveryOutcome {
        if events.is_empty() {
            return DeliveryOutcome::default();
        }

        if self.supports_batch() {
            return match self.send_batch(events).await {
                Ok(()) => {
                    tracing::debug!(sink = %self.name(), events = events.len(), "Batch delivered");
                    DeliveryOutcome::delivered(events.len())
                }
                Err(e) => {
                    tracing::error!(
                        sink = %self.name(),
                        kind = %self.kind(),
                        error_kind = e.kind(),
                        events = events.len(),
                        error = %e,
                        "Batch delivery failed"
                    );
                    DeliveryOutcome::failed(events.len())
                }
            };
        }

        let mut outcome = DeliveryOutcome::default();
        for event in events {
            match self.send_event(event).await {
                Ok(()) => {
                    tracing::debug!(sink = %self.name(), event_id = %event.id(), "Event delivered");
                    outcome.delivered += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        sink = %self.name(),
                        kind = %self.kind(),
                        error_kind = e.kind(),
                        event_id = %event.id(),
                        error = %e,
                        "Event delivery failed"
                    );
                    outcome.failed += 1;
                }
            }
        }
        outcome
    }
}

/// Map an HTTP response to success (2xx) or a status error.
pub(crate) async fn check_status(response: reqwest::Response) -> Result<(), SinkError> {
    let status = response.status();
    if status.is_success() {
        return Ok(());
    }
    let body = response.text().await.unwrap_or_default();
    Err(SinkError::Status {
        status: status.as_u16(),
        body,
    })
}
