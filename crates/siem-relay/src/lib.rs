//! OpenSASE SIEM Relay
//!
//! Batched, multi-destination forwarding of security events to SIEM
//! backends.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                           OPENSASE SIEM RELAY                           │
//! │                                                                         │
//! │   Detection pipeline ──► ForwardingManager::enqueue(Event)              │
//! │                                    │                                    │
//! │  ┌─────────────────────────────────▼─────────────────────────────────┐  │
//! │  │                       DELIVERY QUEUE                              │  │
//! │  │           bounded FIFO | DropNewest / DropOldest                  │  │
//! │  └─────────────────────────────────┬─────────────────────────────────┘  │
//! │                                    │                                    │
//! │  ┌─────────────────────────────────▼─────────────────────────────────┐  │
//! │  │                       BATCH SCHEDULER                             │  │
//! │  │          window closes on batch_size or batch_timeout             │  │
//! │  └─────────────────────────────────┬─────────────────────────────────┘  │
//! │                                    │                                    │
//! │  ┌─────────────────────────────────▼─────────────────────────────────┐  │
//! │  │                     FAN-OUT COORDINATOR                           │  │
//! │  │              one task per sink, isolated outcomes                 │  │
//! │  └──────────┬──────────────────────┬──────────────────────┬──────────┘  │
//! │             │                      │                      │             │
//! │      ┌──────▼──────┐        ┌──────▼──────┐        ┌──────▼──────┐      │
//! │      │  HEC (JSON) │        │ Syslog (CEF)│        │   Webhook   │      │
//! │      └─────────────┘        └─────────────┘        └─────────────┘      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod event;
pub mod fanout;
pub mod format;
pub mod manager;
pub mod queue;
pub mod sink;
pub mod stats;

pub use config::{
    ForwarderConfig, HecConfig, OverflowPolicy, RelayConfig, SyslogConfig, SyslogTransport,
    WebhookConfig,
};
pub use error::{ConfigError, QueueError, RelayError, Result, SinkError};
pub use event::{Event, EventBuilder, EventCategory, Severity};
pub use fanout::{FanoutCoordinator, FanoutReport, SinkReport};
pub use format::{CefFormatter, HecFormatter};
pub use manager::{ForwardingManager, ManagerState};
pub use queue::DeliveryQueue;
pub use sink::{DeliveryOutcome, HecSink, Sink, SinkKind, SyslogSink, WebhookSink};
pub use stats::{DropReason, ForwardObserver, ForwarderMetrics, NoopObserver};
