//! The audit record sent to the log-collection service.
//!
//! A [`LogRecord`] is built fresh for every phase of every request (request, response and
//! optionally error), handed to a [`RecordSink`](crate::RecordSink) and then dropped. It is never
//! mutated after construction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::error::RecordError;
use crate::trace::TraceId;

/// Category of a log record.
///
/// `API` is the only category the log-collection service recognises. Any other string read off
/// the wire is kept as [`LogType::Unknown`] so that it survives a round trip and can be rejected
/// by [`LogRecord::validate`] instead of failing deserialization outright.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LogType {
    Api,
    Unknown(String),
}

impl LogType {
    pub fn as_str(&self) -> &str {
        match self {
            LogType::Api => "API",
            LogType::Unknown(other) => other,
        }
    }

    /// Returns an error unless this is a recognised category.
    pub fn validate(&self) -> Result<(), RecordError> {
        match self {
            LogType::Api => Ok(()),
            LogType::Unknown(other) => Err(RecordError::UnknownType(other.clone())),
        }
    }
}

impl From<String> for LogType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "API" => LogType::Api,
            _ => LogType::Unknown(value),
        }
    }
}

impl From<LogType> for String {
    fn from(value: LogType) -> Self {
        match value {
            LogType::Api => "API".to_string(),
            LogType::Unknown(other) => other,
        }
    }
}

impl fmt::Display for LogType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One structured log entry, serialized as
///
/// ```json
/// { "type": "API", "data": { ... }, "traceId": "...", "timestamp": "2024-01-01T00:00:00Z" }
/// ```
///
/// `data` is a free-form bag whose keys depend on the phase; consumers must tolerate missing keys.
///
/// # Examples
///
/// ```rust
/// use audit_relay::{LogRecord, LogType, TraceId};
/// use serde_json::{json, Map};
///
/// let mut data = Map::new();
/// data.insert("method".into(), json!("GET"));
///
/// let record = LogRecord::new(data, &TraceId::generate());
/// assert_eq!(record.log_type, LogType::Api);
/// assert!(record.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    #[serde(rename = "type")]
    pub log_type: LogType,
    pub data: Map<String, Value>,
    pub trace_id: String,
    /// When the record was constructed, not when the HTTP event happened
    pub timestamp: DateTime<Utc>,
}

impl LogRecord {
    /// Build an `API` record for the given trace, stamped with the current time.
    pub fn new(data: Map<String, Value>, trace_id: &TraceId) -> Self {
        Self {
            log_type: LogType::Api,
            data,
            trace_id: trace_id.to_string(),
            timestamp: Utc::now(),
        }
    }

    /// Check the record before it is sent: the type must be recognised and the trace id non-empty.
    pub fn validate(&self) -> Result<(), RecordError> {
        self.log_type.validate()?;
        if self.trace_id.is_empty() {
            return Err(RecordError::MissingTraceId);
        }
        Ok(())
    }
}
