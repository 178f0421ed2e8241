//! Per-request correlation identifiers.

use axum::extract::Request;
use std::fmt;
use uuid::Uuid;

/// Opaque identifier shared by every record emitted for one request/response cycle.
///
/// The middleware keeps it in the request extensions, so handlers further down the stack can read
/// it with `axum::Extension<TraceId>` and pass it to an [`AuditedClient`](crate::AuditedClient).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TraceId(String);

impl TraceId {
    /// A fresh random (UUID v4) identifier.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Reuse the identifier already stored on the request, or generate one and store it.
    ///
    /// After this call the request extensions always hold the returned id.
    pub fn from_request_or_generate(request: &mut Request) -> Self {
        if let Some(existing) = request.extensions().get::<TraceId>() {
            return existing.clone();
        }
        let trace_id = Self::generate();
        request.extensions_mut().insert(trace_id.clone());
        trace_id
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TraceId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TraceId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for TraceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
