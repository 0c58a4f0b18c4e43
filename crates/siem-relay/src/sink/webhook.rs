//! Generic webhook sink
//!
//! Posts the full event as JSON, one request per event.

use super::{check_status, Sink, SinkKind};
use crate::config::WebhookConfig;
use crate::error::{ConfigError, SinkError};
use crate::event::Event;
use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue};
use reqwest::Url;
use std::time::Duration;

pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct WebhookSink {
    name: String,
    url: Url,
    auth: Option<(HeaderName, HeaderValue)>,
    client: reqwest::Client,
}

impl WebhookSink {
    pub fn new(config: &WebhookConfig) -> Result<Self, ConfigError> {
        let url = Url::parse(&config.url).map_err(|e| ConfigError::InvalidUrl {
            url: config.url.clone(),
            reason: e.to_string(),
        })?;

        let auth = match config.token.as_deref().filter(|t| !t.is_empty()) {
            Some(token) => {
                let name = HeaderName::from_bytes(config.auth_header.as_bytes())
                    .map_err(|_| ConfigError::InvalidHeader(config.auth_header.clone()))?;
                let mut value = HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|_| ConfigError::InvalidHeader(config.auth_header.clone()))?;
                value.set_sensitive(true);
                Some((name, value))
            }
            None => None,
        };

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            name: format!("webhook:{}", config.url),
            url,
            auth,
            client,
        })
    }
}

#[async_trait]
impl Sink for WebhookSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Webhook
    }

    async fn send_event(&self, event: &Event) -> Result<(), SinkError> {
        let mut request = self.client.post(self.url.clone()).json(event);
        if let Some((name, value)) = &self.auth {
            request = request.header(name.clone(), value.clone());
        }

        let response = request.send().await?;
        check_status(response).await?;

        tracing::debug!(sink = %self.name, event_id = %event.id(), "Sent event");
        Ok(())
    }
}
