//! HTTP Event Collector sink
//!
//! Single events go out as JSON, batches as one newline-delimited body.

use super::{check_status, Sink, SinkKind};
use crate::config::HecConfig;
use crate::error::{ConfigError, SinkError};
use crate::event::Event;
use crate::format::HecFormatter;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::Url;
use std::time::Duration;

/// Collector path appended to the configured base URL
pub const COLLECTOR_PATH: &str = "/services/collector/event";

/// Per-request timeout
pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct HecSink {
    name: String,
    endpoint: Url,
    authorization: String,
    formatter: HecFormatter,
    client: reqwest::Client,
}

impl HecSink {
    pub fn new(config: &HecConfig) -> Result<Self, ConfigError> {
        if config.token.is_empty() {
            return Err(ConfigError::MissingField("token"));
        }

        let endpoint = Url::parse(config.url.trim_end_matches('/'))
            .and_then(|base| base.join(COLLECTOR_PATH))
            .map_err(|e| ConfigError::InvalidUrl {
                url: config.url.clone(),
                reason: e.to_string(),
            })?;

        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .danger_accept_invalid_certs(!config.verify_tls)
            .build()
            .map_err(|e| ConfigError::HttpClient(e.to_string()))?;

        Ok(Self {
            name: format!("hec:{}", config.url.trim_end_matches('/')),
            endpoint,
            authorization: format!("{} {}", config.auth_scheme, config.token),
            formatter: HecFormatter::new(&config.source, &config.sourcetype, &config.index),
            client,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[async_trait]
impl Sink for HecSink {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> SinkKind {
        SinkKind::Hec
    }

    async fn send_event(&self, event: &Event) -> Result<(), SinkError> {
        let document = self.formatter.format(event);

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(AUTHORIZATION, &self.authorization)
            .json(&document)
            .send()
            .await?;

        check_status(response).await?;
        tracing::debug!(sink = %self.name, event_id = %event.id(), "Sent event");
        Ok(())
    }

    fn supports_batch(&self) -> bool {
        true
    }

    async fn send_batch(&self, events: &[Event]) -> Result<(), SinkError> {
        let body = self.formatter.format_batch(events)?;

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(AUTHORIZATION, &self.authorization)
            .header(CONTENT_TYPE, "text/plain")
            .body(body)
            .send()
            .await?;

        check_status(response).await?;
        tracing::debug!(sink = %self.name, events = events.len(), "Sent batch");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::DeliveryOutcome;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn event(id: &str) -> Event {
        Event::threat("Defender", "alice@corp.com", 0.9, "blocked").id(id).build()
    }

    fn config(url: &str) -> HecConfig {
        let mut config = HecConfig::new(url, "secret-token");
        config.source = "relay-test".into();
        config
    }

    #[test]
    fn test_endpoint_and_validation() {
        let sink = HecSink::new(&config("https://splunk.corp:8088/")).unwrap();
        assert_eq!(
            sink.endpoint().as_str(),
            "https://splunk.corp:8088/services/collector/event"
        );
        assert_eq!(sink.kind(), SinkKind::Hec);
        assert!(sink.supports_batch());

        assert!(matches!(
            HecSink::new(&config("not a url")),
            Err(ConfigError::InvalidUrl { .. })
        ));
        assert!(matches!(
            HecSink::new(&HecConfig::new("https://splunk.corp", "")),
            Err(ConfigError::MissingField("token"))
        ));
    }

    #[tokio::test]
    async fn test_single_event_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(COLLECTOR_PATH))
            .and(header("authorization", "Splunk secret-token"))
            .and(header("content-type", "application/json"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sink = HecSink::new(&config(&server.uri())).unwrap();
        sink.send_event(&event("e1")).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["event"]["event_id"], "e1");
        assert_eq!(body["source"], "relay-test");
        assert_eq!(body["index"], "security");
    }

    #[tokio::test]
    async fn test_batch_is_single_ndjson_request() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(COLLECTOR_PATH))
            .and(header("content-type", "text/plain"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let sink = HecSink::new(&config(&server.uri())).unwrap();
        let events = vec![event("a"), event("b"), event("c")];
        let outcome = sink.submit(&events).await;

        assert_eq!(outcome, DeliveryOutcome::delivered(3));
        let requests = server.received_requests().await.unwrap();
        let body = String::from_utf8(requests[0].body.clone()).unwrap();
        let ids: Vec<String> = body
            .lines()
            .map(|line| {
                let doc: serde_json::Value = serde_json::from_str(line).unwrap();
                doc["event"]["event_id"].as_str().unwrap().to_string()
            })
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_non_success_status_fails_batch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("server busy"))
            .mount(&server)
            .await;

        let sink = HecSink::new(&config(&server.uri())).unwrap();
        let outcome = sink.submit(&[event("a"), event("b")]).await;
        assert_eq!(outcome, DeliveryOutcome::failed(2));

        match sink.send_event(&event("c")).await {
            Err(SinkError::Status { status, body }) => {
                assert_eq!(status, 503);
                assert_eq!(body, "server busy");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_accepted_status_is_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(202))
            .mount(&server)
            .await;

        let sink = HecSink::new(&config(&server.uri())).unwrap();
        assert!(sink.send_event(&event("a")).await.is_ok());
    }

    #[tokio::test]
    async fn test_connection_refused_counts_failed() {
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };

        let sink = HecSink::new(&config(&format!("http://127.0.0.1:{}", port))).unwrap();
        let outcome = sink.submit(&[event("a")]).await;

        assert_eq!(outcome, DeliveryOutcome::failed(1));
    }
}
