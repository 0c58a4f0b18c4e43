//! Error taxonomy
//!
//! Configuration errors are fatal at construction time. Delivery errors never
//! leave a sink: `Sink::submit` folds them into a `DeliveryOutcome`.

use thiserror::Error;

/// Invalid or incomplete configuration. A sink that fails with this is never
/// registered.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid syslog transport '{0}' (expected 'tcp' or 'udp')")]
    InvalidTransport(String),

    #[error("missing required field: {0}")]
    MissingField(&'static str),

    #[error("invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("invalid header name '{0}'")]
    InvalidHeader(String),

    #[error("invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(String),

    #[error("failed to read config file: {0}")]
    Io(String),

    #[error("failed to parse config: {0}")]
    Parse(String),
}

/// Transient delivery failure for one destination.
#[derive(Error, Debug)]
pub enum SinkError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("request timed out")]
    Timeout,

    #[error("unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("batch submission not supported")]
    BatchUnsupported,
}

impl SinkError {
    /// Short label used in structured log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Timeout => "timeout",
            Self::Status { .. } => "status",
            Self::Serialization(_) => "serialization",
            Self::Io(_) => "io",
            Self::BatchUnsupported => "unsupported",
        }
    }
}

impl From<reqwest::Error> for SinkError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Connection(e.to_string())
        }
    }
}

/// Failure while the scheduler waits on the delivery queue.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    #[error("delivery queue closed")]
    Closed,
}

/// Crate-level error
#[derive(Error, Debug)]
pub enum RelayError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("sinks cannot be registered while forwarding is active")]
    ManagerRunning,
}

pub type Result<T> = std::result::Result<T, RelayError>;
