//! Posts log records to the log-collection service.
//!
//! Delivery is best effort and at most once: every failure becomes a local diagnostic and nothing
//! is retried, queued or surfaced to the request being audited.

use axum::http::header::CONTENT_TYPE;
use reqwest::StatusCode;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, warn};
use url::Url;

use crate::config::DeliveryConfig;
use crate::error::DeliveryError;
use crate::types::LogRecord;
use crate::{spawn_delivery, RecordSink};

/// HTTP client for the log-collection service.
///
/// Each record is sent as a single `POST` with `Content-Type: application/json`. Only
/// `201 Created` counts as success; any other status is reported together with the response body.
/// Every request is bounded by [`DeliveryConfig::timeout`].
///
/// # Examples
///
/// ```rust,no_run
/// use audit_relay::{DeliveryClient, DeliveryConfig, LogRecord, TraceId};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = DeliveryClient::new(DeliveryConfig::from_env()?)?;
///
/// // Fire and forget; failures only show up in the tracing output
/// client.dispatch(LogRecord::new(Default::default(), &TraceId::generate()));
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct DeliveryClient {
    client: reqwest::Client,
    endpoint: Url,
}

impl DeliveryClient {
    /// Build a client for the configured endpoint.
    pub fn new(config: DeliveryConfig) -> Result<Self, DeliveryError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Serialize and post one record, waiting for the outcome.
    ///
    /// A serialization failure returns before any network call is made.
    pub async fn send(&self, record: &LogRecord) -> Result<(), DeliveryError> {
        let payload = serde_json::to_vec(record)?;

        let response = self
            .client
            .post(self.endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(payload)
            .send()
            .await?;

        let status = response.status();
        if status != StatusCode::CREATED {
            let body = match response.text().await {
                Ok(body) => body,
                Err(e) => format!("<unreadable response body: {e}>"),
            };
            return Err(DeliveryError::UnexpectedStatus { status, body });
        }

        Ok(())
    }

    /// Validate the record and post it on its own task without waiting.
    ///
    /// Returns the task handle, or `None` if the record failed validation and was dropped.
    pub fn dispatch(&self, record: LogRecord) -> Option<JoinHandle<()>> {
        spawn_delivery(Arc::new(self.clone()), record)
    }
}

impl RecordSink for DeliveryClient {
    async fn deliver(&self, record: LogRecord) {
        match self.send(&record).await {
            Ok(()) => {
                debug!(trace_id = %record.trace_id, "Log record delivered");
            }
            Err(DeliveryError::Serialize(e)) => {
                error!(trace_id = %record.trace_id, error = %e, "Error marshaling log data");
            }
            Err(DeliveryError::Transport(e)) => {
                error!(
                    trace_id = %record.trace_id,
                    endpoint = %self.endpoint,
                    error = %e,
                    timeout = e.is_timeout(),
                    "Error posting log data"
                );
            }
            Err(DeliveryError::UnexpectedStatus { status, body }) => {
                warn!(
                    trace_id = %record.trace_id,
                    status = %status,
                    body = %body,
                    "Unexpected response from log service"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TraceId;
    use serde_json::{json, Map};
    use std::time::Duration;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_record() -> LogRecord {
        let mut data = Map::new();
        data.insert("method".into(), json!("GET"));
        data.insert("url".into(), json!("/health"));
        LogRecord::new(data, &TraceId::from("trace-42"))
    }

    fn client_for(server: &MockServer) -> DeliveryClient {
        let config = DeliveryConfig::from_url(&format!("{}/log", server.uri())).unwrap();
        DeliveryClient::new(config).unwrap()
    }

    #[tokio::test]
    async fn test_send_posts_json() {
        let server = MockServer::start().await;
        let record = sample_record();
        Mock::given(method("POST"))
            .and(path("/log"))
            .and(header("content-type", "application/json"))
            .and(body_json(&record))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server).send(&record).await.unwrap();
    }

    #[tokio::test]
    async fn test_non_created_status_is_reported_with_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
            .mount(&server)
            .await;

        let err = client_for(&server).send(&sample_record()).await.unwrap_err();
        match err {
            DeliveryError::UnexpectedStatus { status, body } => {
                assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
                assert_eq!(body, "database unavailable");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_ok_is_not_created() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let err = client_for(&server).send(&sample_record()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::UnexpectedStatus { .. }));
    }

    #[tokio::test]
    async fn test_timeout_is_enforced() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_secs(2)))
            .mount(&server)
            .await;

        let config = DeliveryConfig::from_url(&format!("{}/log", server.uri()))
            .unwrap()
            .with_timeout(Duration::from_millis(100));
        let client = DeliveryClient::new(config).unwrap();

        match client.send(&sample_record()).await {
            Err(DeliveryError::Transport(e)) => assert!(e.is_timeout()),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_connection_failure_is_transport_error() {
        // Nothing listens on the discard port
        let config = DeliveryConfig::from_url("http://127.0.0.1:9/log").unwrap();
        let client = DeliveryClient::new(config).unwrap();

        let err = client.send(&sample_record()).await.unwrap_err();
        assert!(matches!(err, DeliveryError::Transport(_)));
    }

    #[tokio::test]
    async fn test_deliver_swallows_failures() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        // Must complete without panicking or returning anything
        client_for(&server).deliver(sample_record()).await;
    }

    #[tokio::test]
    async fn test_dispatch_runs_in_background() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&server)
            .await;

        let handle = client_for(&server).dispatch(sample_record()).unwrap();
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn test_dispatch_drops_invalid_record() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(201))
            .expect(0)
            .mount(&server)
            .await;

        let mut record = sample_record();
        record.trace_id.clear();
        assert!(client_for(&server).dispatch(record).is_none());
    }
}
