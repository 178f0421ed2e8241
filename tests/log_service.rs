//! End-to-end tests against a mock log-collection service.

use audit_relay::{
    AuditLayer, CaptureConfig, DeliveryClient, DeliveryConfig, LogRecord, LogType, MultiSink,
    TracingSink,
};
use axum::{http::StatusCode, routing::get, Router};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

async fn health() -> &'static str {
    "ok"
}

fn delivery_client(log_service: &MockServer) -> DeliveryClient {
    let config = DeliveryConfig::from_url(&format!("{}/log", log_service.uri()))
        .unwrap()
        .with_timeout(Duration::from_secs(1));
    DeliveryClient::new(config).unwrap()
}

fn app_with(client: DeliveryClient) -> Router {
    Router::new()
        .route("/health", get(health))
        .layer(AuditLayer::new(CaptureConfig::default(), client))
}

/// Poll the mock until it has seen `count` requests.
async fn wait_for_requests(server: &MockServer, count: usize) -> Vec<Request> {
    for _ in 0..200 {
        let received = server.received_requests().await.unwrap_or_default();
        if received.len() >= count {
            return received;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("log service did not receive {count} requests");
}

#[tokio::test]
async fn test_records_are_posted_to_log_service() {
    let log_service = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/log"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(201))
        .expect(2)
        .mount(&log_service)
        .await;

    let server = axum_test::TestServer::new(app_with(delivery_client(&log_service))).unwrap();
    let response = server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);

    let received = wait_for_requests(&log_service, 2).await;
    let records: Vec<LogRecord> = received
        .iter()
        .map(|request| serde_json::from_slice(&request.body).unwrap())
        .collect();

    assert!(records.iter().all(|r| r.log_type == LogType::Api));
    assert!(records.iter().all(|r| r.validate().is_ok()));
    assert_eq!(records[0].trace_id, records[1].trace_id);

    // Delivery order between the two phases is not guaranteed
    let request_record = records
        .iter()
        .find(|r| r.data.contains_key("method"))
        .unwrap();
    let response_record = records
        .iter()
        .find(|r| r.data.contains_key("responseStatus"))
        .unwrap();
    assert_eq!(request_record.data["method"], "GET");
    assert_eq!(request_record.data["requestBody"], "");
    assert_eq!(response_record.data["responseStatus"], 200);

    // The wire format round-trips
    let raw: serde_json::Value = serde_json::from_slice(&received[0].body).unwrap();
    assert_eq!(raw["type"], "API");
    assert!(raw["traceId"].is_string());
    assert!(raw["timestamp"].is_string());
    assert_eq!(
        serde_json::to_value(&records[0]).unwrap(),
        raw,
        "re-serialized record should match what was sent"
    );
}

#[tokio::test]
async fn test_log_service_error_does_not_affect_request() {
    let log_service = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500).set_body_string("storage offline"))
        .mount(&log_service)
        .await;

    let server = axum_test::TestServer::new(app_with(delivery_client(&log_service))).unwrap();
    let response = server.get("/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "ok");
    wait_for_requests(&log_service, 2).await;
}

#[tokio::test]
async fn test_slow_log_service_does_not_block_request() {
    let log_service = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201).set_delay(Duration::from_secs(3)))
        .mount(&log_service)
        .await;

    let server = axum_test::TestServer::new(app_with(delivery_client(&log_service))).unwrap();

    let started = std::time::Instant::now();
    let response = server.get("/health").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(started.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn test_unreachable_log_service_does_not_affect_request() {
    let config = DeliveryConfig::from_url("http://127.0.0.1:9/log").unwrap();
    let client = DeliveryClient::new(config).unwrap();

    let server = axum_test::TestServer::new(app_with(client)).unwrap();
    let response = server.get("/health").await;

    assert_eq!(response.status_code(), StatusCode::OK);
    assert_eq!(response.text(), "ok");
}

#[tokio::test]
async fn test_multi_sink_delivers_to_log_service() {
    let log_service = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(201))
        .expect(2)
        .mount(&log_service)
        .await;

    let sink = MultiSink::new()
        .with(delivery_client(&log_service))
        .with(TracingSink);
    let app = Router::new()
        .route("/health", get(health))
        .layer(AuditLayer::new(CaptureConfig::default(), sink));

    let server = axum_test::TestServer::new(app).unwrap();
    server.get("/health").await.assert_status_ok();

    wait_for_requests(&log_service, 2).await;
}
