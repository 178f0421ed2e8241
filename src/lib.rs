//! # Audit Relay
//!
//! An Axum middleware that gives every HTTP transaction an audit trail: it captures each request
//! and response, tags both with a shared trace id, and relays them as structured log records to a
//! separate log-collection service, without ever blocking or failing the request being logged.
//!
//! ## Features
//!
//! - **Non-intrusive body capture**: the request body is read once and restored, the response body
//!   is mirrored while it streams to the client
//! - **Trace correlation**: request and response records share one trace id, reused from the
//!   request extensions when an upstream layer already set one
//! - **Fire-and-forget delivery**: every record is posted on its own task with a bounded timeout;
//!   failures only show up as local diagnostics
//! - **Extensible**: records go to any [`RecordSink`], and sinks can be combined with [`MultiSink`]
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use audit_relay::{AuditLayer, CaptureConfig, DeliveryClient, DeliveryConfig};
//! use axum::{routing::get, Router};
//!
//! async fn health() -> &'static str {
//!     "ok"
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // LOG_SERVICE_URL=http://logs.internal:8080/log
//!     let client = DeliveryClient::new(DeliveryConfig::from_env()?)?;
//!     let layer = AuditLayer::new(CaptureConfig::default(), client);
//!
//!     let app = Router::new().route("/health", get(health)).layer(layer);
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await?;
//!     axum::serve(listener, app).await?;
//!     Ok(())
//! }
//! ```
//!
//! ## Custom Sinks
//!
//! Implement the [`RecordSink`] trait to send records somewhere else:
//!
//! ```rust
//! use audit_relay::{LogRecord, RecordSink};
//!
//! #[derive(Debug)]
//! struct StdoutSink;
//!
//! impl RecordSink for StdoutSink {
//!     async fn deliver(&self, record: LogRecord) {
//!         println!("{}", serde_json::to_string(&record).unwrap_or_default());
//!     }
//! }
//! ```

use axum::{body::Body, extract::Request, response::Response};
use bytes::Bytes;
use chrono::Utc;
use std::{
    pin::Pin,
    sync::Arc,
    task::{Context, Poll},
    time::Instant,
};
use tokio::task::JoinHandle;
use tower::{Layer, Service};
use tracing::{debug, debug_span, error, instrument, warn, Instrument};

pub mod body_wrapper;
use body_wrapper::{capture_request_body, create_body_capture_stream};

pub mod client;
pub use client::{AuditedClient, AuditedResponse};

pub mod config;
pub use config::{CaptureConfig, DeliveryConfig};

pub mod delivery;
pub use delivery::DeliveryClient;

pub mod error;
pub use error::{ConfigError, DeliveryError, RecordError};

pub mod logging_sink;
pub use logging_sink::TracingSink;

pub mod multi_sink;
pub use multi_sink::MultiSink;

pub mod shaper;

pub mod trace;
pub use trace::TraceId;

pub mod types;
pub use types::{LogRecord, LogType};

/// Destination for audit records.
///
/// The middleware never awaits a sink: each record is handed over on its own task via
/// [`spawn_delivery`], so a slow or failing sink cannot affect the request being logged.
/// Implementations should report their own failures (typically through `tracing`) rather than
/// panic.
///
/// # Examples
///
/// ```rust
/// use audit_relay::{LogRecord, RecordSink};
/// use tracing::info;
///
/// #[derive(Debug)]
/// struct MySink;
///
/// impl RecordSink for MySink {
///     async fn deliver(&self, record: LogRecord) {
///         info!(trace_id = %record.trace_id, keys = record.data.len(), "Audit record");
///     }
/// }
/// ```
pub trait RecordSink: Send + Sync + 'static {
    /// Deliver one validated record.
    fn deliver(&self, record: LogRecord) -> impl std::future::Future<Output = ()> + Send;
}

/// Validate a record and deliver it to `sink` on a new task.
///
/// Invalid records are dropped with a warning and `None` is returned. The returned handle may be
/// ignored; the task runs to completion on its own.
pub fn spawn_delivery<H: RecordSink>(sink: Arc<H>, record: LogRecord) -> Option<JoinHandle<()>> {
    if let Err(e) = record.validate() {
        warn!(trace_id = %record.trace_id, error = %e, "Dropping invalid log record");
        return None;
    }
    Some(tokio::spawn(async move { sink.deliver(record).await }))
}

/// Tower layer for the audit middleware.
///
/// # Examples
///
/// ```rust,no_run
/// use audit_relay::{AuditLayer, CaptureConfig, TracingSink};
/// use axum::{routing::get, Router};
/// use tower::ServiceBuilder;
///
/// # async fn hello() -> &'static str { "Hello" }
/// # #[tokio::main]
/// # async fn main() {
/// let layer = AuditLayer::new(CaptureConfig::default(), TracingSink);
///
/// let app: Router = Router::new()
///     .route("/hello", get(hello))
///     .layer(ServiceBuilder::new().layer(layer));
/// # }
/// ```
pub struct AuditLayer<H> {
    config: CaptureConfig,
    sink: Arc<H>,
}

impl<H: RecordSink> AuditLayer<H> {
    /// Create a new audit layer that hands records to `sink`.
    pub fn new(config: CaptureConfig, sink: H) -> Self {
        Self::from_shared(config, Arc::new(sink))
    }

    /// Same as [`AuditLayer::new`], for a sink that is shared with other code.
    pub fn from_shared(config: CaptureConfig, sink: Arc<H>) -> Self {
        Self { config, sink }
    }
}

impl<H> Clone for AuditLayer<H> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            sink: self.sink.clone(),
        }
    }
}

impl<S, H> Layer<S> for AuditLayer<H> {
    type Service = AuditService<S, H>;

    fn layer(&self, inner: S) -> Self::Service {
        AuditService {
            inner,
            config: self.config.clone(),
            sink: self.sink.clone(),
        }
    }
}

/// Tower service implementation for the audit middleware.
///
/// Per request it:
///
/// 1. takes the start time and the trace id (reused from the request extensions, or generated and
///    stored there so handlers can extract it),
/// 2. reads and restores the request body and dispatches the request record,
/// 3. calls the inner service,
/// 4. wraps the response body so that, once it has been fully sent, the response record is
///    dispatched with the captured body, end time and duration.
///
/// If the inner service fails, an error record is dispatched and the error is returned untouched.
///
/// Users typically don't interact with this type directly - it's created by [`AuditLayer`].
pub struct AuditService<S, H> {
    inner: S,
    config: CaptureConfig,
    sink: Arc<H>,
}

impl<S: Clone, H> Clone for AuditService<S, H> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            config: self.config.clone(),
            sink: self.sink.clone(),
        }
    }
}

impl<S, H> Service<Request> for AuditService<S, H>
where
    S: Service<Request, Response = Response> + Clone + Send + 'static,
    S::Future: Send + 'static,
    S::Error: std::error::Error + Send + Sync + 'static,
    H: RecordSink,
{
    type Response = Response;
    type Error = S::Error;
    type Future =
        Pin<Box<dyn std::future::Future<Output = Result<Self::Response, Self::Error>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    #[instrument(skip_all)]
    fn call(&mut self, mut request: Request) -> Self::Future {
        let start_time = Utc::now();
        let started_at = Instant::now();
        let trace_id = TraceId::from_request_or_generate(&mut request);

        let method = request.method().clone();
        let url = shaper::request_url(request.uri(), request.headers());
        let headers = request.headers().clone();

        debug!(trace_id = %trace_id, method = %method, url = %url, "Extracted request metadata");

        let config = self.config.clone();
        let sink = self.sink.clone();

        // The ready service is the one that must be called
        let clone = self.inner.clone();
        let mut inner = std::mem::replace(&mut self.inner, clone);

        let span = debug_span!("audit", trace_id = %trace_id);

        Box::pin(
            async move {
                let request_body = if config.capture_request_body {
                    match capture_request_body(&mut request).await {
                        Ok(body) => Some(body),
                        Err(e) => {
                            warn!(error = %e, "Skipping request log, body could not be read");
                            None
                        }
                    }
                } else {
                    Some(Bytes::new())
                };

                if let Some(body) = request_body {
                    let data = shaper::request_data(&method, &url, &headers, &body, start_time);
                    spawn_delivery(sink.clone(), LogRecord::new(data, &trace_id));
                }

                debug!("Awaiting inner service response");
                let mut response = match inner.call(request).await {
                    Ok(response) => response,
                    Err(e) => {
                        error!(error = %e, "Inner service failed");
                        let data = shaper::error_data(&e.to_string(), &trace_id);
                        spawn_delivery(sink, LogRecord::new(data, &trace_id));
                        return Err(e);
                    }
                };
                debug!("Inner service response received");

                let status = response.status();
                let response_headers = response.headers().clone();

                if !config.capture_response_body {
                    let data = shaper::response_data(
                        status,
                        &response_headers,
                        &[],
                        start_time,
                        Utc::now(),
                        started_at.elapsed(),
                    );
                    spawn_delivery(sink, LogRecord::new(data, &trace_id));
                    return Ok(response);
                }

                debug!("Wrapping response body for capture");
                let body = std::mem::replace(response.body_mut(), Body::empty());
                let (body_stream, capture_future) = create_body_capture_stream(body);
                *response.body_mut() = body_stream;

                // Outlives the request/response lifecycle: resolves once the client has the body
                tokio::spawn(
                    async move {
                        let data = match capture_future.await {
                            Ok(body) => shaper::response_data(
                                status,
                                &response_headers,
                                &body,
                                start_time,
                                Utc::now(),
                                started_at.elapsed(),
                            ),
                            Err(e) => {
                                error!(error = %e, "Error capturing response body");
                                shaper::error_data(&e.to_string(), &trace_id)
                            }
                        };
                        spawn_delivery(sink, LogRecord::new(data, &trace_id));
                    }
                    .in_current_span(),
                );

                Ok(response)
            }
            .instrument(span),
        )
    }
}
