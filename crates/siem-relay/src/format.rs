//! Wire Format Adapters
//!
//! Maps an [`Event`] onto the structured-index (HEC) document and the Common
//! Event Format line. Both adapters are pure: no clock reads, no lookups per
//! call, identical output for identical input.

use crate::event::Event;

/// CEF device vendor
pub const CEF_VENDOR: &str = "OpenSASE";
/// CEF device product
pub const CEF_PRODUCT: &str = "Email Security Platform";
/// CEF device version
pub const CEF_VERSION: &str = "1.0";

/// Structured-index formatter
///
/// Routing metadata comes from the destination, never from the event.
#[derive(Debug, Clone)]
pub struct HecFormatter {
    source: String,
    sourcetype: String,
    index: String,
}

impl HecFormatter {
    pub fn new(
        source: impl Into<String>,
        sourcetype: impl Into<String>,
        index: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            sourcetype: sourcetype.into(),
            index: index.into(),
        }
    }

    /// Format event as a HEC document
    pub fn format(&self, event: &Event) -> serde_json::Value {
        serde_json::json!({
            "time": event.timestamp_iso(),
            "event": {
                "event_id": event.id(),
                "event_type": event.category().as_str(),
                "severity": event.severity().as_str(),
                "source_module": event.source_module(),
                "user_email": event.user_email(),
                "recipient_emails": event.recipient_emails(),
                "risk_score": event.risk_score(),
                "message": event.message(),
                "indicators": event.indicators(),
                "action_taken": event.action_taken(),
                "tenant_id": event.tenant_id(),
                "message_id": event.message_id(),
                "metadata": event.metadata(),
            },
            "source": self.source,
            "sourcetype": self.sourcetype,
            "index": self.index,
        })
    }

    /// Newline-delimited batch body, one document per line.
    pub fn format_batch(&self, events: &[Event]) -> Result<String, serde_json::Error> {
        let mut body = String::new();
        for (i, event) in events.iter().enumerate() {
            if i > 0 {
                body.push('\n');
            }
            body.push_str(&serde_json::to_string(&self.format(event))?);
        }
        Ok(body)
    }
}

/// CEF formatter
#[derive(Debug, Clone)]
pub struct CefFormatter {
    vendor: String,
    product: String,
    version: String,
    source_host: String,
}

impl CefFormatter {
    /// Create formatter reporting `source_host` as `src`.
    pub fn with_host(source_host: impl Into<String>) -> Self {
        Self {
            vendor: CEF_VENDOR.into(),
            product: CEF_PRODUCT.into(),
            version: CEF_VERSION.into(),
            source_host: source_host.into(),
        }
    }

    /// Format event to CEF
    pub fn format(&self, event: &Event) -> String {
        // CEF:Version|Device Vendor|Device Product|Device Version|Signature ID|Name|Severity|Extension
        let mut extensions = vec![
            format!("src={}", Self::escape_value(&self.source_host)),
            format!("suser={}", Self::escape_value(event.user_email())),
            format!("duser={}", Self::escape_value(&event.recipient_emails().join(","))),
            "cs1Label=RiskScore".to_string(),
            format!("cs1={:?}", event.risk_score()),
            "cs2Label=Module".to_string(),
            format!("cs2={}", Self::escape_value(event.source_module())),
            "cs3Label=ActionTaken".to_string(),
            format!("cs3={}", Self::escape_value(event.action_taken())),
            "cs4Label=Indicators".to_string(),
            format!("cs4={}", Self::escape_value(&event.indicators().join(";"))),
            "deviceCustomDate1Label=EventTime".to_string(),
            format!("deviceCustomDate1={}", event.timestamp_iso()),
        ];

        if let Some(tenant) = event.tenant_id() {
            extensions.push("cs5Label=TenantId".into());
            extensions.push(format!("cs5={}", Self::escape_value(tenant)));
        }

        if let Some(message_id) = event.message_id() {
            extensions.push("cs6Label=MessageId".into());
            extensions.push(format!("cs6={}", Self::escape_value(message_id)));
        }

        format!(
            "CEF:0|{}|{}|{}|{}|{}|{}|{}",
            Self::escape_header(&self.vendor),
            Self::escape_header(&self.product),
            Self::escape_header(&self.version),
            event.category().as_str(),
            Self::escape_header(event.message()),
            event.severity().cef_level(),
            extensions.join(" ")
        )
    }

    /// Escape CEF header field
    fn escape_header(s: &str) -> String {
        s.replace('\\', "\\\\")
            .replace('|', "\\|")
            .replace('\n', " ")
            .replace('\r', " ")
    }

    /// Escape CEF extension value
    fn escape_value(s: &str) -> String {
        s.replace('\\', "\\\\")
            .replace('=', "\\=")
            .replace('\n', "\\n")
            .replace('\r', "\\r")
    }
}

/// Hostname of this machine, `localhost` if it cannot be resolved.
pub fn local_hostname() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| "localhost".to_string())
}
