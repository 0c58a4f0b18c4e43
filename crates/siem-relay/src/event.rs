//! Security Event Model
//!
//! Immutable event record handed to the relay by the detection pipeline.
//! Severity is always derived from the risk score.

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Event category
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EventCategory {
    ThreatDetected,
    PolicyViolation,
    DataExfiltration,
    PhishingAttempt,
    Impersonation,
    BehavioralAnomaly,
    UserTraining,
    SystemAlert,
}

impl EventCategory {
    /// Wire value, also used as the CEF device event class id.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ThreatDetected => "threat_detected",
            Self::PolicyViolation => "policy_violation",
            Self::DataExfiltration => "data_exfiltration",
            Self::PhishingAttempt => "phishing_attempt",
            Self::Impersonation => "impersonation",
            Self::BehavioralAnomaly => "behavioral_anomaly",
            Self::UserTraining => "user_training",
            Self::SystemAlert => "system_alert",
        }
    }

    fn id_prefix(&self) -> &'static str {
        match self {
            Self::ThreatDetected => "threat",
            Self::PolicyViolation => "policy",
            Self::DataExfiltration => "exfil",
            Self::PhishingAttempt => "phish",
            Self::Impersonation => "imperson",
            Self::BehavioralAnomaly => "anomaly",
            Self::UserTraining => "training",
            Self::SystemAlert => "system",
        }
    }
}

impl std::fmt::Display for EventCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Event severity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// Derive severity from a risk score. The score is clamped first.
    pub fn from_risk_score(score: f64) -> Self {
        let score = clamp_risk_score(score);
        if score >= 0.8 {
            Self::Critical
        } else if score >= 0.6 {
            Self::High
        } else if score >= 0.3 {
            Self::Medium
        } else {
            Self::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// CEF severity on the 0-10 scale.
    pub fn cef_level(&self) -> u8 {
        match self {
            Self::Low => 1,
            Self::Medium => 5,
            Self::High => 8,
            Self::Critical => 10,
        }
    }
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Clamp a risk score into [0, 1]. NaN maps to 0.
pub fn clamp_risk_score(score: f64) -> f64 {
    if score.is_nan() {
        0.0
    } else {
        score.clamp(0.0, 1.0)
    }
}

/// Security event
///
/// Construct through [`Event::builder`] or one of the factories; fields are
/// read-only afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    #[serde(rename = "event_id")]
    id: String,
    #[serde(serialize_with = "serialize_timestamp")]
    timestamp: DateTime<Utc>,
    #[serde(rename = "event_type")]
    category: EventCategory,
    severity: Severity,
    source_module: String,
    user_email: String,
    recipient_emails: Vec<String>,
    risk_score: f64,
    message: String,
    indicators: Vec<String>,
    action_taken: String,
    metadata: BTreeMap<String, serde_json::Value>,
    tenant_id: Option<String>,
    message_id: Option<String>,
}

fn serialize_timestamp<S: Serializer>(ts: &DateTime<Utc>, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&format_timestamp(ts))
}

/// ISO-8601 rendering shared by every wire format.
pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl Event {
    /// Start building an event.
    pub fn builder(
        category: EventCategory,
        user_email: impl Into<String>,
        message: impl Into<String>,
    ) -> EventBuilder {
        EventBuilder::new(category, user_email.into(), message.into())
    }

    /// Threat detection event. Severity follows the risk score.
    pub fn threat(
        source_module: impl Into<String>,
        user_email: impl Into<String>,
        risk_score: f64,
        message: impl Into<String>,
    ) -> EventBuilder {
        Self::builder(EventCategory::ThreatDetected, user_email, message)
            .source_module(source_module)
            .risk_score(risk_score)
    }

    /// Policy violation raised by the policy engine.
    pub fn policy_violation(
        user_email: impl Into<String>,
        policy_name: impl Into<String>,
        violation_details: impl Into<String>,
    ) -> EventBuilder {
        let policy_name = policy_name.into();
        Self::builder(
            EventCategory::PolicyViolation,
            user_email,
            format!("Policy violation: {}", policy_name),
        )
        .source_module("Policy Engine")
        .risk_score(0.7)
        .indicator(violation_details)
        .metadata("policy_name", serde_json::Value::String(policy_name))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Timestamp as ISO-8601 (UTC, microseconds, `Z` suffix).
    pub fn timestamp_iso(&self) -> String {
        format_timestamp(&self.timestamp)
    }

    pub fn category(&self) -> EventCategory {
        self.category
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn source_module(&self) -> &str {
        &self.source_module
    }

    pub fn user_email(&self) -> &str {
        &self.user_email
    }

    pub fn recipient_emails(&self) -> &[String] {
        &self.recipient_emails
    }

    pub fn risk_score(&self) -> f64 {
        self.risk_score
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn indicators(&self) -> &[String] {
        &self.indicators
    }

    pub fn action_taken(&self) -> &str {
        &self.action_taken
    }

    pub fn metadata(&self) -> &BTreeMap<String, serde_json::Value> {
        &self.metadata
    }

    pub fn tenant_id(&self) -> Option<&str> {
        self.tenant_id.as_deref()
    }

    pub fn message_id(&self) -> Option<&str> {
        self.message_id.as_deref()
    }
}

/// Builder for [`Event`]
#[derive(Debug, Clone)]
pub struct EventBuilder {
    id: Option<String>,
    timestamp: Option<DateTime<Utc>>,
    category: EventCategory,
    source_module: String,
    user_email: String,
    recipient_emails: Vec<String>,
    risk_score: f64,
    message: String,
    indicators: Vec<String>,
    action_taken: String,
    metadata: BTreeMap<String, serde_json::Value>,
    tenant_id: Option<String>,
    message_id: Option<String>,
}

impl EventBuilder {
    fn new(category: EventCategory, user_email: String, message: String) -> Self {
        Self {
            id: None,
            timestamp: None,
            category,
            source_module: "unknown".into(),
            user_email,
            recipient_emails: Vec::new(),
            risk_score: 0.0,
            message,
            indicators: Vec::new(),
            action_taken: "logged".into(),
            metadata: BTreeMap::new(),
            tenant_id: None,
            message_id: None,
        }
    }

    /// Use a caller-supplied identifier. Empty identifiers are ignored.
    pub fn id(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !id.is_empty() {
            self.id = Some(id);
        }
        self
    }

    /// Pin the creation time. Intended for replay and synthetic events.
    pub fn at(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn source_module(mut self, module: impl Into<String>) -> Self {
        self.source_module = module.into();
        self
    }

    pub fn recipient(mut self, email: impl Into<String>) -> Self {
        self.recipient_emails.push(email.into());
        self
    }

    pub fn recipients<I, S>(mut self, emails: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.recipient_emails.extend(emails.into_iter().map(Into::into));
        self
    }

    pub fn risk_score(mut self, score: f64) -> Self {
        self.risk_score = score;
        self
    }

    pub fn indicator(mut self, indicator: impl Into<String>) -> Self {
        self.indicators.push(indicator.into());
        self
    }

    pub fn indicators<I, S>(mut self, indicators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.indicators.extend(indicators.into_iter().map(Into::into));
        self
    }

    pub fn action_taken(mut self, action: impl Into<String>) -> Self {
        self.action_taken = action.into();
        self
    }

    pub fn metadata(mut self, key: impl Into<String>, value: serde_json::Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    pub fn tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn message_id(mut self, message_id: impl Into<String>) -> Self {
        self.message_id = Some(message_id.into());
        self
    }

    pub fn build(self) -> Event {
        let risk_score = clamp_risk_score(self.risk_score);
        let id = self.id.unwrap_or_else(|| {
            format!("{}_{}", self.category.id_prefix(), Uuid::new_v4().simple())
        });

        Event {
            id,
            timestamp: self.timestamp.unwrap_or_else(Utc::now),
            category: self.category,
            severity: Severity::from_risk_score(risk_score),
            source_module: self.source_module,
            user_email: self.user_email,
            recipient_emails: self.recipient_emails,
            risk_score,
            message: self.message,
            indicators: self.indicators,
            action_taken: self.action_taken,
            metadata: self.metadata,
            tenant_id: self.tenant_id,
            message_id: self.message_id,
        }
    }
}
