//! Error types for the logging path.
//!
//! None of these ever reach the request pipeline being audited. They are returned from the
//! lower-level building blocks ([`LogRecord::validate`](crate::LogRecord::validate),
//! [`DeliveryClient::send`](crate::DeliveryClient::send), [`DeliveryConfig::from_env`](crate::DeliveryConfig::from_env))
//! so callers and tests can inspect them; the middleware turns them into diagnostics.

use reqwest::StatusCode;

/// A constructed [`LogRecord`](crate::LogRecord) failed its pre-send check.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum RecordError {
    #[error("unknown log type: {0}")]
    UnknownType(String),
    #[error("trace id not found")]
    MissingTraceId,
}

/// Failure to hand a record to the log-collection service.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    #[error("failed to serialize log record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to post log record: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("unexpected response from log service ({status}): {body}")]
    UnexpectedStatus { status: StatusCode, body: String },
}

/// Invalid or missing delivery configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    Missing(&'static str),
    #[error("invalid log service url {url:?}: {source}")]
    InvalidUrl {
        url: String,
        #[source]
        source: url::ParseError,
    },
    #[error("invalid delivery timeout {0:?}: expected a positive number of milliseconds")]
    InvalidTimeout(String),
}
