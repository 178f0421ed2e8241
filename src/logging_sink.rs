//! Sink that writes audit records to the local `tracing` stream.
//!
//! Useful during development, and in combination with [`MultiSink`](crate::MultiSink) to keep a
//! local copy of everything sent to the log-collection service.

use tracing::info;

use crate::{LogRecord, RecordSink};

/// Logs each record as a structured `tracing` event at `INFO` level.
///
/// The event carries the trace id, the record type and the `data` bag rendered as JSON.
///
/// # Examples
///
/// ```rust,no_run
/// use audit_relay::{AuditLayer, CaptureConfig, TracingSink};
///
/// # #[tokio::main]
/// # async fn main() {
/// let layer = AuditLayer::new(CaptureConfig::default(), TracingSink);
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct TracingSink;

impl RecordSink for TracingSink {
    async fn deliver(&self, record: LogRecord) {
        let phase = if record.data.contains_key("error") {
            "error"
        } else if record.data.contains_key("responseStatus") {
            "response"
        } else {
            "request"
        };
        let data = serde_json::Value::Object(record.data);

        info!(
            trace_id = %record.trace_id,
            log_type = %record.log_type,
            phase,
            timestamp = %record.timestamp.to_rfc3339(),
            data = %data,
            "Audit record"
        );
    }
}
