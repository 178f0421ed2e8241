//! Body capture utilities.
//!
//! Request bodies are read once and restored so the downstream handler still sees an unconsumed
//! body. Response bodies are wrapped in a pass-through stream that mirrors every chunk into a
//! buffer while the client receives the same bytes, in the same order.

use axum::body::{Body, Bytes, HttpBody};
use axum::extract::Request;
use bytes::BytesMut;
use futures::{Future, StreamExt};
use http_body_util::BodyExt;
use std::pin::Pin;
use tokio::sync::mpsc;
use tracing::error;

/// Error type for body capture operations
#[derive(Debug, thiserror::Error)]
pub enum BodyCaptureError {
    #[error("Body stream error: {0}")]
    StreamError(String),
}

type CapturedBody = Pin<Box<dyn Future<Output = Result<Bytes, BodyCaptureError>> + Send>>;

/// Reads the request body to completion and puts an identical, unread copy back on the request.
///
/// Exactly one read happens against the original body. A body that is already at end of stream is
/// left alone and reported as empty.
///
/// If reading fails, the request gets a body that yields the same error to whoever reads it next,
/// and the error is returned so the caller can skip logging the body. Partial bytes are discarded.
///
/// # Examples
///
/// ```rust
/// use audit_relay::body_wrapper::capture_request_body;
/// use axum::{body::Body, extract::Request};
/// use http_body_util::BodyExt;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let mut request = Request::new(Body::from("payload"));
/// let captured = capture_request_body(&mut request).await?;
/// assert_eq!(captured, "payload");
///
/// // The handler still gets the full body
/// let restored = request.into_body().collect().await?.to_bytes();
/// assert_eq!(restored, "payload");
/// # Ok(())
/// # }
/// ```
pub async fn capture_request_body(request: &mut Request) -> Result<Bytes, BodyCaptureError> {
    if request.body().is_end_stream() {
        return Ok(Bytes::new());
    }

    let body = std::mem::replace(request.body_mut(), Body::empty());
    match body.collect().await {
        Ok(collected) => {
            let bytes = collected.to_bytes();
            *request.body_mut() = Body::from(bytes.clone());
            Ok(bytes)
        }
        Err(e) => {
            let message = e.to_string();
            error!(error = %message, "Failed to read request body");
            *request.body_mut() =
                Body::from_stream(futures::stream::once(async move { Err::<Bytes, _>(e) }));
            Err(BodyCaptureError::StreamError(message))
        }
    }
}

/// Creates a body capture stream that captures chunks as they flow through without blocking.
///
/// This function takes an HTTP body and returns a new body stream along with a future
/// that resolves to the captured body content. The returned body stream can be used
/// normally while the capture future collects all the chunks in the background.
///
/// The future resolves once the new body has been fully consumed or dropped. If the body is
/// dropped early, it resolves with whatever was sent so far.
///
/// # Arguments
///
/// * `body` - The original HTTP body to capture
///
/// # Returns
///
/// A tuple containing:
/// - A new body stream that passes through all data
/// - A future that resolves to the captured body bytes
///
/// # Examples
///
/// ```rust
/// use audit_relay::body_wrapper::create_body_capture_stream;
/// use axum::body::Body;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let original_body = Body::from("Hello, World!");
/// let (new_body, capture_future) = create_body_capture_stream(original_body);
///
/// // Use new_body normally in your response
/// // capture_future will resolve to the captured bytes
/// # drop(new_body);
/// let captured = capture_future.await?;
/// # Ok(())
/// # }
/// ```
pub fn create_body_capture_stream<B>(body: B) -> (Body, CapturedBody)
where
    B: HttpBody<Data = Bytes, Error = axum::Error> + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel();

    // Turn the body into a stream, and relay the chunks to the channel
    let capture_stream = body.into_data_stream().map(move |result| {
        let result_for_channel = match &result {
            Ok(chunk) => Ok(chunk.clone()),
            Err(e) => {
                error!(error = %e, "Stream error during body capture");
                Err(BodyCaptureError::StreamError(e.to_string()))
            }
        };
        let _ = tx.send(result_for_channel);
        result // pass through original
    });

    let new_body = Body::from_stream(capture_stream);

    // Concatenates all chunks received via the channel. Resolves when the stream is finished
    // (sender dropped), or errors.
    let capture_future = Box::pin(async move {
        let mut buffer = BytesMut::new();
        while let Some(chunk_result) = rx.recv().await {
            match chunk_result {
                Ok(chunk) => buffer.extend_from_slice(&chunk),
                Err(e) => return Err(e),
            }
        }
        Ok::<_, BodyCaptureError>(buffer.freeze())
    });

    (new_body, capture_future)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use http_body_util::BodyExt;

    #[tokio::test]
    async fn test_streaming_body_capture() {
        let body = Body::from("Hello, World!");

        let (new_body, capture_future) = create_body_capture_stream(body);

        // Start collecting both the new body and captured chunks concurrently
        let collect_task = tokio::spawn(async move {
            let collected = new_body.collect().await.unwrap();
            collected.to_bytes()
        });

        let capture_task = tokio::spawn(async move { capture_future.await.unwrap() });

        let (body_content, captured_content) = tokio::join!(collect_task, capture_task);
        let body_content = body_content.unwrap();
        let captured_content = captured_content.unwrap();

        assert_eq!(body_content, "Hello, World!");
        assert_eq!(captured_content, "Hello, World!");
    }

    #[tokio::test]
    async fn test_chunk_order_is_preserved() {
        let chunks = vec!["alpha-", "beta-", "gamma"];
        let stream = futures::stream::iter(
            chunks
                .clone()
                .into_iter()
                .map(|c| Ok::<_, std::convert::Infallible>(Bytes::from(c))),
        );
        let body = Body::from_stream(stream);

        let (new_body, capture_future) = create_body_capture_stream(body);

        let delivered = new_body.collect().await.unwrap().to_bytes();
        let captured = capture_future.await.unwrap();

        assert_eq!(delivered, "alpha-beta-gamma");
        assert_eq!(captured, delivered);
    }

    #[tokio::test]
    async fn test_dropped_body_resolves_capture() {
        let (new_body, capture_future) = create_body_capture_stream(Body::from("unsent"));
        drop(new_body);

        let captured = capture_future.await.unwrap();
        assert!(captured.is_empty());
    }

    #[tokio::test]
    async fn test_stream_error_is_reported() {
        let stream = futures::stream::iter(vec![
            Ok(Bytes::from("partial")),
            Err(std::io::Error::other("connection reset")),
        ]);
        let (new_body, capture_future) = create_body_capture_stream(Body::from_stream(stream));

        assert!(new_body.collect().await.is_err());
        assert!(matches!(
            capture_future.await,
            Err(BodyCaptureError::StreamError(_))
        ));
    }

    #[tokio::test]
    async fn test_request_body_is_restored() {
        let mut request = Request::new(Body::from(r#"{"user":"alice"}"#));

        let captured = capture_request_body(&mut request).await.unwrap();
        assert_eq!(captured, r#"{"user":"alice"}"#);

        let restored = request.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(restored, captured);
    }

    #[tokio::test]
    async fn test_empty_request_body() {
        let mut request = Request::new(Body::empty());

        let captured = capture_request_body(&mut request).await.unwrap();
        assert!(captured.is_empty());

        let restored = request.into_body().collect().await.unwrap().to_bytes();
        assert!(restored.is_empty());
    }

    #[tokio::test]
    async fn test_request_body_read_failure() {
        let stream = futures::stream::iter(vec![
            Ok(Bytes::from("half")),
            Err(std::io::Error::other("client went away")),
        ]);
        let mut request = Request::new(Body::from_stream(stream));

        let result = capture_request_body(&mut request).await;
        assert!(matches!(result, Err(BodyCaptureError::StreamError(_))));

        // Downstream sees the failure rather than a truncated body
        assert!(request.into_body().collect().await.is_err());
    }
}
