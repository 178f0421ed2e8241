use audit_relay::*;
use axum::{
    body::{Body, Bytes},
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Extension, Json, Router,
};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::{net::TcpListener, time::sleep};
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Stand-in for the log-collection service: keeps every record in memory
#[derive(Debug, Clone, Default)]
struct Collector {
    records: Arc<Mutex<Vec<LogRecord>>>,
}

async fn collect_log(State(collector): State<Collector>, Json(record): Json<LogRecord>) -> StatusCode {
    if record.validate().is_err() {
        return StatusCode::BAD_REQUEST;
    }
    if let Ok(mut records) = collector.records.lock() {
        records.push(record);
    }
    StatusCode::CREATED
}

async fn list_logs(State(collector): State<Collector>) -> impl IntoResponse {
    let records = collector
        .records
        .lock()
        .map(|records| records.clone())
        .unwrap_or_default();
    Json(serde_json::json!({
        "total_records": records.len(),
        "records": records,
    }))
}

// Handlers for our demo server
async fn health_handler() -> impl IntoResponse {
    "ok"
}

async fn echo_handler(Extension(trace_id): Extension<TraceId>, body: Bytes) -> impl IntoResponse {
    sleep(Duration::from_millis(50)).await; // Simulate some work
    info!(trace_id = %trace_id, "Echoing request body");
    format!("Echo: {}", String::from_utf8_lossy(&body))
}

async fn streaming_handler() -> impl IntoResponse {
    use futures::stream;
    use tokio::time::interval;

    let stream = stream::unfold(0u32, |count| async move {
        if count >= 5 {
            None
        } else {
            let mut interval = interval(Duration::from_millis(200));
            interval.tick().await;
            Some((
                Ok::<_, std::convert::Infallible>(Bytes::from(format!("chunk-{count}\n"))),
                count + 1,
            ))
        }
    });

    Response::builder()
        .header("content-type", "text/plain")
        .body(Body::from_stream(stream))
        .unwrap_or_default()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,audit_relay=debug")),
        )
        .init();

    // Local log collector on :3001 unless LOG_SERVICE_URL points elsewhere
    let collector = Collector::default();
    let collector_app = Router::new()
        .route("/log", post(collect_log).get(list_logs))
        .with_state(collector);
    let collector_listener = TcpListener::bind("127.0.0.1:3001").await?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(collector_listener, collector_app).await {
            tracing::error!(error = %e, "Log collector stopped");
        }
    });

    let delivery_config = match DeliveryConfig::from_env() {
        Ok(config) => config,
        Err(ConfigError::Missing(_)) => DeliveryConfig::from_url("http://127.0.0.1:3001/log")?,
        Err(e) => return Err(e.into()),
    };
    info!(endpoint = %delivery_config.endpoint, "Delivering audit records");

    // Post to the log service and mirror every record to the local log
    let sink = MultiSink::new()
        .with(DeliveryClient::new(delivery_config)?)
        .with(TracingSink);

    let app = Router::new()
        .route("/health", get(health_handler))
        .route("/echo", post(echo_handler))
        .route("/streaming", get(streaming_handler))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(AuditLayer::new(CaptureConfig::default(), sink))
                .into_inner(),
        );

    info!("Demo server endpoints:");
    info!("  GET  /health     - Health check");
    info!("  POST /echo       - Echo request body");
    info!("  GET  /streaming  - Streaming response");
    info!("Try these commands:");
    info!("  curl http://localhost:3000/health");
    info!("  curl -X POST -d 'Hello from client' http://localhost:3000/echo");
    info!("  curl http://localhost:3000/streaming");
    info!("  curl http://localhost:3001/log");

    let listener = TcpListener::bind("0.0.0.0:3000").await?;
    info!("Demo server listening on http://localhost:3000");

    axum::serve(listener, app).await?;

    Ok(())
}
