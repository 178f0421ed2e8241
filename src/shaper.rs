//! Builds the `data` bag of a [`LogRecord`](crate::LogRecord) for each phase.
//!
//! Key names are part of the wire contract with the log-collection service:
//!
//! | phase    | keys |
//! |----------|------|
//! | request  | `method`, `url`, `requestHeaders`, `requestBody`, `startTime` |
//! | response | `responseStatus`, `responseHeaders`, `responseBody`, `startTime`, `endTime`, `duration` |
//! | error    | `error`, `traceID`, `timestamp` |

use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use chrono::{DateTime, Utc};
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;

use crate::trace::TraceId;

/// Convert a header map to a JSON object of `name -> [values...]`.
///
/// Repeated headers keep every value, in order. Values that are not valid UTF-8 are rendered
/// lossily.
pub fn headers_to_json(headers: &HeaderMap) -> Value {
    let mut result: HashMap<String, Vec<String>> = HashMap::new();
    for (name, value) in headers {
        result
            .entry(name.as_str().to_owned())
            .or_insert_with(Vec::new)
            .push(String::from_utf8_lossy(value.as_bytes()).into_owned());
    }
    json!(result)
}

/// Human-readable duration, e.g. `1.5s`, `12.03ms`, `830ns`.
pub fn format_duration(duration: Duration) -> String {
    format!("{duration:?}")
}

/// The URL a request was made to.
///
/// Origin-form targets (`/path?query`) are made absolute from the `Host` header when there is one.
pub fn request_url(uri: &Uri, headers: &HeaderMap) -> String {
    if uri.authority().is_some() {
        return uri.to_string();
    }
    let host = headers
        .get(header::HOST)
        .and_then(|value| value.to_str().ok());
    match host {
        Some(host) => {
            let path_and_query = uri.path_and_query().map(|pq| pq.as_str()).unwrap_or("/");
            format!("http://{host}{path_and_query}")
        }
        None => uri.to_string(),
    }
}

fn body_text(body: &[u8]) -> String {
    String::from_utf8_lossy(body).into_owned()
}

/// Data bag for the request phase.
pub fn request_data(
    method: &Method,
    url: &str,
    headers: &HeaderMap,
    body: &[u8],
    start: DateTime<Utc>,
) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("method".into(), json!(method.as_str()));
    data.insert("url".into(), json!(url));
    data.insert("requestHeaders".into(), headers_to_json(headers));
    data.insert("requestBody".into(), json!(body_text(body)));
    data.insert("startTime".into(), json!(start));
    data
}

/// Data bag for the response phase.
pub fn response_data(
    status: StatusCode,
    headers: &HeaderMap,
    body: &[u8],
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    duration: Duration,
) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("responseStatus".into(), json!(status.as_u16()));
    data.insert("responseHeaders".into(), headers_to_json(headers));
    data.insert("responseBody".into(), json!(body_text(body)));
    data.insert("startTime".into(), json!(start));
    data.insert("endTime".into(), json!(end));
    data.insert("duration".into(), json!(format_duration(duration)));
    data
}

/// Data bag for an out-of-band failure that has no request/response pair.
pub fn error_data(message: &str, trace_id: &TraceId) -> Map<String, Value> {
    let mut data = Map::new();
    data.insert("error".into(), json!(message));
    data.insert("traceID".into(), json!(trace_id.as_str()));
    data.insert("timestamp".into(), json!(Utc::now()));
    data
}
