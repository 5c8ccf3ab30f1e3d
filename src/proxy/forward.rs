//! Single-target upstream forwarding with timeout and error classification.
//!
//! [`forward`] issues the rewritten request and collects the full
//! upstream response (status, headers, body). Failures are classified
//! into [`ForwardError`] variants, each carrying the gateway status it
//! maps to: 504 for timeouts, 502 for everything else.

use std::time::{Duration, Instant};

use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};

use crate::server::HttpClient;

/// Status, headers, and collected body of an upstream response.
#[derive(Debug)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub latency_ms: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum ForwardError {
    #[error("upstream request timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("could not connect to upstream: {source}")]
    Connect {
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    #[error("upstream request failed: {source}")]
    Transport {
        #[source]
        source: hyper_util::client::legacy::Error,
    },

    #[error("failed to read upstream response body: {source}")]
    BodyRead {
        #[source]
        source: hyper::Error,
    },

    #[error("invalid forward target '{target}': {message}")]
    InvalidTarget { target: String, message: String },
}

impl ForwardError {
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Timeout { .. } => StatusCode::GATEWAY_TIMEOUT,
            _ => StatusCode::BAD_GATEWAY,
        }
    }

    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Timeout { .. } => "timeout",
            Self::Connect { .. } => "connect",
            _ => "upstream",
        }
    }
}

impl IntoResponse for ForwardError {
    fn into_response(self) -> Response {
        (
            self.status(),
            Json(serde_json::json!({
                "error": self.to_string(),
                "kind": self.kind(),
            })),
        )
            .into_response()
    }
}

#[allow(clippy::cast_possible_truncation)]
pub async fn forward(
    client: &HttpClient,
    method: Method,
    target: &str,
    headers: HeaderMap,
    body: Bytes,
    timeout: Duration,
) -> Result<UpstreamResponse, ForwardError> {
    let uri: hyper::Uri =
        target
            .parse()
            .map_err(|e: http::uri::InvalidUri| ForwardError::InvalidTarget {
                target: target.to_string(),
                message: e.to_string(),
            })?;

    let mut builder = hyper::Request::builder().method(method).uri(uri);
    for (key, value) in &headers {
        builder = builder.header(key, value);
    }
    let request = builder
        .body(Full::new(body))
        .map_err(|e| ForwardError::InvalidTarget {
            target: target.to_string(),
            message: e.to_string(),
        })?;

    let start = Instant::now();
    let response = match tokio::time::timeout(timeout, client.request(request)).await {
        Ok(Ok(response)) => response,
        Ok(Err(e)) if e.is_connect() => return Err(ForwardError::Connect { source: e }),
        Ok(Err(e)) => return Err(ForwardError::Transport { source: e }),
        Err(_) => {
            return Err(ForwardError::Timeout {
                timeout_ms: timeout.as_millis() as u64,
            })
        }
    };

    let status = response.status();
    let response_headers = response.headers().clone();
    let collected = response
        .into_body()
        .collect()
        .await
        .map_err(|e| ForwardError::BodyRead { source: e })?;

    Ok(UpstreamResponse {
        status,
        headers: response_headers,
        body: collected.to_bytes(),
        latency_ms: start.elapsed().as_millis() as u64,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_maps_to_504() {
        let err = ForwardError::Timeout { timeout_ms: 100 };
        assert_eq!(err.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(err.kind(), "timeout");
    }

    #[test]
    fn invalid_target_maps_to_502() {
        let err = ForwardError::InvalidTarget {
            target: "not a uri".into(),
            message: "invalid uri character".into(),
        };
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(err.kind(), "upstream");
    }

    #[test]
    fn error_messages_name_the_failure() {
        let err = ForwardError::Timeout { timeout_ms: 250 };
        assert_eq!(err.to_string(), "upstream request timed out after 250ms");
    }
}
