//! Audit logging for outbound calls made with `reqwest`.
//!
//! Services often call other services while handling a request. [`AuditedClient`] records those
//! calls the same way the middleware records inbound traffic, under the caller's trace id, so one
//! trace covers the whole chain.

use axum::http::{HeaderMap, StatusCode};
use bytes::Bytes;
use chrono::Utc;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

use crate::{shaper, spawn_delivery, LogRecord, RecordSink, TraceId};

/// Response of an audited call, fully buffered.
///
/// The body had to be read to log it, so it is handed back as bytes.
#[derive(Debug, Clone)]
pub struct AuditedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl AuditedResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Body as text, replacing invalid UTF-8.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_slice(&self.body)
    }
}

/// A `reqwest::Client` that emits request, response and error records for every call.
///
/// # Examples
///
/// ```rust,no_run
/// use audit_relay::{AuditedClient, TraceId, TracingSink};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let client = AuditedClient::new(reqwest::Client::new(), TracingSink);
/// let trace_id = TraceId::generate();
///
/// let request = client.inner().get("http://auth.internal/verify").build()?;
/// let response = client.execute(request, &trace_id).await?;
/// println!("{}", response.text());
/// # Ok(())
/// # }
/// ```
pub struct AuditedClient<H> {
    client: reqwest::Client,
    sink: Arc<H>,
}

impl<H> Clone for AuditedClient<H> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            sink: self.sink.clone(),
        }
    }
}

impl<H: RecordSink> AuditedClient<H> {
    pub fn new(client: reqwest::Client, sink: H) -> Self {
        Self::from_shared(client, Arc::new(sink))
    }

    pub fn from_shared(client: reqwest::Client, sink: Arc<H>) -> Self {
        Self { client, sink }
    }

    /// The wrapped client, for building requests.
    pub fn inner(&self) -> &reqwest::Client {
        &self.client
    }

    /// Send `request`, logging it, its response and any transport failure under `trace_id`.
    ///
    /// Streaming request bodies are logged as empty. Errors are returned to the caller as they are
    /// after the error record has been dispatched.
    pub async fn execute(
        &self,
        request: reqwest::Request,
        trace_id: &TraceId,
    ) -> Result<AuditedResponse, reqwest::Error> {
        let start_time = Utc::now();
        let started_at = Instant::now();

        let body = request
            .body()
            .and_then(|body| body.as_bytes())
            .unwrap_or_default();
        let data = shaper::request_data(
            request.method(),
            request.url().as_str(),
            request.headers(),
            body,
            start_time,
        );
        spawn_delivery(self.sink.clone(), LogRecord::new(data, trace_id));

        debug!(trace_id = %trace_id, url = %request.url(), "Sending audited request");
        let response = match self.client.execute(request).await {
            Ok(response) => response,
            Err(e) => {
                self.log_error(&e.to_string(), trace_id);
                return Err(e);
            }
        };

        let status = response.status();
        let headers = response.headers().clone();
        let body = match response.bytes().await {
            Ok(body) => body,
            Err(e) => {
                self.log_error(&e.to_string(), trace_id);
                return Err(e);
            }
        };

        let data = shaper::response_data(
            status,
            &headers,
            &body,
            start_time,
            Utc::now(),
            started_at.elapsed(),
        );
        spawn_delivery(self.sink.clone(), LogRecord::new(data, trace_id));

        Ok(AuditedResponse {
            status,
            headers,
            body,
        })
    }

    /// Emit a stand-alone error record.
    pub fn log_error(&self, message: &str, trace_id: &TraceId) {
        let data = shaper::error_data(message, trace_id);
        spawn_delivery(self.sink.clone(), LogRecord::new(data, trace_id));
    }
}
