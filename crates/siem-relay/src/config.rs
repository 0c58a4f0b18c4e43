//! Relay Configuration
//!
//! Forwarder tuning plus one optional section per destination. Loaded from a
//! JSON file or from environment variables.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Full relay configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    #[serde(default)]
    pub forwarder: ForwarderConfig,
    #[serde(default)]
    pub hec: Option<HecConfig>,
    #[serde(default)]
    pub syslog: Option<SyslogConfig>,
    #[serde(default)]
    pub webhook: Option<WebhookConfig>,
}

impl RelayConfig {
    /// Load from JSON file
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io(e.to_string()))?;
        Self::from_json(&content)
    }

    /// Parse a JSON document. The syslog transport name is case-insensitive
    /// and an unknown one is reported as [`ConfigError::InvalidTransport`].
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let mut document: serde_json::Value =
            serde_json::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;

        if let Some(transport) = document.pointer_mut("/syslog/transport") {
            let parsed = transport
                .as_str()
                .map(str::parse::<SyslogTransport>)
                .transpose()?;
            if let Some(parsed) = parsed {
                *transport = serde_json::Value::String(parsed.to_string());
            }
        }

        let config: Self =
            serde_json::from_value(document).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.forwarder.validate()?;
        Ok(config)
    }

    /// Load from process environment
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        let mut forwarder = ForwarderConfig::default();
        if let Some(v) = get("SIEM_BATCH_SIZE") {
            forwarder.batch_size = parse_value("SIEM_BATCH_SIZE", &v)?;
        }
        if let Some(v) = get("SIEM_BATCH_TIMEOUT") {
            let secs: u64 = parse_value("SIEM_BATCH_TIMEOUT", &v)?;
            forwarder.batch_timeout_ms =
                secs.checked_mul(1000).ok_or_else(|| ConfigError::InvalidValue {
                    key: "SIEM_BATCH_TIMEOUT".into(),
                    value: v.clone(),
                })?;
        }
        if let Some(v) = get("SIEM_QUEUE_CAPACITY") {
            forwarder.queue_capacity = parse_value("SIEM_QUEUE_CAPACITY", &v)?;
        }
        forwarder.validate()?;

        let hec = match (get("SPLUNK_URL"), get("SPLUNK_HEC_TOKEN")) {
            (Some(url), Some(token)) => {
                let mut hec = HecConfig::new(url, token);
                if let Some(index) = get("SPLUNK_INDEX") {
                    hec.index = index;
                }
                if let Some(verify) = get("SPLUNK_VERIFY_SSL") {
                    hec.verify_tls = verify.eq_ignore_ascii_case("true");
                }
                Some(hec)
            }
            _ => None,
        };

        let syslog = match get("SYSLOG_HOST") {
            Some(host) => {
                let port = match get("SYSLOG_PORT") {
                    Some(p) => parse_value("SYSLOG_PORT", &p)?,
                    None => DEFAULT_SYSLOG_PORT,
                };
                let transport = get("SYSLOG_PROTOCOL").unwrap_or_else(|| "tcp".into());
                Some(SyslogConfig::new(host, port, &transport)?)
            }
            None => None,
        };

        let webhook = get("SIEM_ENDPOINT_URL").map(|url| WebhookConfig {
            url,
            token: get("SIEM_AUTH_TOKEN"),
            auth_header: get("SIEM_AUTH_HEADER").unwrap_or_else(default_auth_header),
        });

        Ok(Self {
            forwarder,
            hec,
            syslog,
            webhook,
        })
    }

    /// True when at least one destination is configured.
    pub fn has_destinations(&self) -> bool {
        self.hec.is_some() || self.syslog.is_some() || self.webhook.is_some()
    }
}

fn parse_value<T: FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

/// What to do when the delivery queue is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Reject the incoming event
    #[default]
    DropNewest,
    /// Evict the oldest queued event to make room
    DropOldest,
}

/// Batching and queue settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ForwarderConfig {
    /// Maximum events per batch
    pub batch_size: usize,
    /// Collection window (milliseconds)
    pub batch_timeout_ms: u64,
    /// Pause after a queue failure (milliseconds)
    pub error_backoff_ms: u64,
    /// Maximum queued events
    pub queue_capacity: usize,
    pub overflow_policy: OverflowPolicy,
}

impl Default for ForwarderConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            batch_timeout_ms: 30_000,
            error_backoff_ms: 5_000,
            queue_capacity: 10_000,
            overflow_policy: OverflowPolicy::DropNewest,
        }
    }
}

impl ForwarderConfig {
    pub fn batch_timeout(&self) -> Duration {
        Duration::from_millis(self.batch_timeout_ms)
    }

    pub fn error_backoff(&self) -> Duration {
        Duration::from_millis(self.error_backoff_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.batch_size == 0 {
            return Err(ConfigError::InvalidValue {
                key: "batch_size".into(),
                value: "0".into(),
            });
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue {
                key: "queue_capacity".into(),
                value: "0".into(),
            });
        }
        Ok(())
    }
}

/// HTTP Event Collector destination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HecConfig {
    /// Collector base URL
    pub url: String,
    pub token: String,
    #[serde(default = "default_index")]
    pub index: String,
    #[serde(default = "default_source")]
    pub source: String,
    #[serde(default = "default_sourcetype")]
    pub sourcetype: String,
    /// Authorization scheme prefixed to the token
    #[serde(default = "default_auth_scheme")]
    pub auth_scheme: String,
    #[serde(default = "default_true")]
    pub verify_tls: bool,
}

impl HecConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            index: default_index(),
            source: default_source(),
            sourcetype: default_sourcetype(),
            auth_scheme: default_auth_scheme(),
            verify_tls: true,
        }
    }
}

fn default_index() -> String {
    "security".into()
}

fn default_source() -> String {
    "opensase_siem_relay".into()
}

fn default_sourcetype() -> String {
    "opensase:security_event".into()
}

fn default_auth_scheme() -> String {
    "Splunk".into()
}

fn default_true() -> bool {
    true
}

pub const DEFAULT_SYSLOG_PORT: u16 = 514;

/// Syslog transport
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", try_from = "String")]
pub enum SyslogTransport {
    Tcp,
    Udp,
}

impl FromStr for SyslogTransport {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "tcp" => Ok(Self::Tcp),
            "udp" => Ok(Self::Udp),
            _ => Err(ConfigError::InvalidTransport(s.to_string())),
        }
    }
}

impl TryFrom<String> for SyslogTransport {
    type Error = ConfigError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl std::fmt::Display for SyslogTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp => f.write_str("tcp"),
            Self::Udp => f.write_str("udp"),
        }
    }
}

/// Syslog destination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyslogConfig {
    pub host: String,
    #[serde(default = "default_syslog_port")]
    pub port: u16,
    #[serde(default = "default_transport")]
    pub transport: SyslogTransport,
    /// RFC-3164 tag
    #[serde(default = "default_tag")]
    pub tag: String,
}

impl SyslogConfig {
    /// Build from a transport name, rejecting anything but tcp/udp.
    pub fn new(host: impl Into<String>, port: u16, transport: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            host: host.into(),
            port,
            transport: transport.parse()?,
            tag: default_tag(),
        })
    }
}

fn default_syslog_port() -> u16 {
    DEFAULT_SYSLOG_PORT
}

fn default_transport() -> SyslogTransport {
    SyslogTransport::Tcp
}

fn default_tag() -> String {
    "opensase".into()
}

/// Generic webhook destination
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    pub url: String,
    /// Bearer token, sent only when present
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default = "default_auth_header")]
    pub auth_header: String,
}

impl WebhookConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            token: None,
            auth_header: default_auth_header(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}

fn default_auth_header() -> String {
    "Authorization".into()
}
