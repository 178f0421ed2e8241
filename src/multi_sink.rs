//! Composite sink for fanning records out to several destinations.
//!
//! [`MultiSink`] holds any number of [`RecordSink`] implementations and delivers each record to
//! all of them concurrently.
//!
//! # Example
//!
//! ```rust
//! use audit_relay::{MultiSink, TracingSink};
//!
//! // Create a composite sink
//! let sink = MultiSink::new()
//!     .with(TracingSink);
//!
//! // Use with AuditLayer
//! // let layer = AuditLayer::new(config, sink);
//! ```

use crate::{LogRecord, RecordSink};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Type alias for boxed futures used in the dyn-compatible wrapper.
type BoxFuture<'a> = Pin<Box<dyn Future<Output = ()> + Send + 'a>>;

/// Dyn-compatible counterpart of [`RecordSink`], so sinks of different types can share a `Vec`.
trait DynSink: Send + Sync + 'static {
    fn deliver_boxed(&self, record: LogRecord) -> BoxFuture<'_>;
}

struct SinkWrapper<H: RecordSink> {
    inner: H,
}

impl<H: RecordSink> DynSink for SinkWrapper<H> {
    fn deliver_boxed(&self, record: LogRecord) -> BoxFuture<'_> {
        Box::pin(self.inner.deliver(record))
    }
}

/// A sink that delegates to multiple inner sinks.
///
/// Each inner sink receives its own clone of the record. Deliveries run concurrently, so a slow
/// sink does not hold back the others within one record.
pub struct MultiSink {
    sinks: Vec<Arc<dyn DynSink>>,
}

impl MultiSink {
    /// Create a new empty MultiSink.
    pub fn new() -> Self {
        Self { sinks: Vec::new() }
    }

    /// Add a sink. Returns self for builder pattern.
    ///
    /// # Example
    ///
    /// ```rust
    /// use audit_relay::{MultiSink, TracingSink};
    ///
    /// let sink = MultiSink::new()
    ///     .with(TracingSink);
    /// ```
    pub fn with<H: RecordSink>(mut self, sink: H) -> Self {
        self.sinks.push(Arc::new(SinkWrapper { inner: sink }));
        self
    }

    /// Returns true if no sinks have been added.
    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }

    /// Returns the number of sinks.
    pub fn len(&self) -> usize {
        self.sinks.len()
    }
}

impl Default for MultiSink {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordSink for MultiSink {
    async fn deliver(&self, record: LogRecord) {
        let futures: Vec<_> = self
            .sinks
            .iter()
            .map(|sink| {
                let record = record.clone();
                let sink = sink.clone();
                async move { sink.deliver_boxed(record).await }
            })
            .collect();
        futures::future::join_all(futures).await;
    }
}
