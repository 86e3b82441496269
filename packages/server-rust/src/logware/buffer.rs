//! Makes single-pass request and response bodies readable twice.
//!
//! Both sides collect the body into one in-memory `Bytes`, take its text for
//! the audit trail, and hand a fresh body over the very same bytes to the next
//! consumer. The buffer is owned by the call future: it is released on every
//! exit path, including when the future is dropped because the caller went
//! away.

use axum::body::{to_bytes, Body};
use axum::extract::Request;
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use http_body::Body as _;

/// Failure to buffer a body, typically because it exceeded the size limit
/// or the underlying stream errored.
#[derive(Debug, thiserror::Error)]
pub enum BufferError {
    #[error("RequestBodyUnreadable")]
    Request(#[source] axum::Error),
    #[error("ResponseBodyUnreadable")]
    Response(#[source] axum::Error),
}

/// Buffers the request body and returns the request with a replayable body
/// plus the body text.
///
/// # Errors
///
/// Returns `BufferError::Request` if the body cannot be read within `limit` bytes.
pub async fn capture_request(
    request: Request,
    limit: usize,
) -> Result<(Request, String), BufferError> {
    let (parts, body) = request.into_parts();
    let bytes = to_bytes(body, limit).await.map_err(BufferError::Request)?;
    let text = String::from_utf8_lossy(&bytes).into_owned();

    Ok((Request::from_parts(parts, Body::from(bytes)), text))
}

/// Buffers the response body and returns a response that forwards exactly
/// the same bytes, status and headers, plus the body text.
///
/// Responses that already are final no-content bodies, and streaming
/// responses, are returned untouched with an empty text.
///
/// # Errors
///
/// Returns `BufferError::Response` if the body cannot be read within `limit` bytes.
pub async fn capture_response(
    response: Response,
    limit: usize,
) -> Result<(Response, String), BufferError> {
    if skips_capture(&response) {
        return Ok((response, String::new()));
    }

    let (parts, body) = response.into_parts();
    let bytes = to_bytes(body, limit).await.map_err(BufferError::Response)?;
    let text = String::from_utf8_lossy(&bytes).into_owned();

    Ok((Response::from_parts(parts, Body::from(bytes)), text))
}

/// Whether the response is passed through without capture and replacement.
fn skips_capture(response: &Response) -> bool {
    let status = response.status();
    if status == StatusCode::NO_CONTENT || status == StatusCode::NOT_MODIFIED {
        return true;
    }
    if status == StatusCode::OK && response.body().size_hint().exact() == Some(0) {
        return true;
    }
    is_event_stream(response.headers())
}

fn is_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("text/event-stream"))
}
