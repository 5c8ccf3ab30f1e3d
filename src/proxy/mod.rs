//! The gateway request pipeline.
//!
//! The [`forward_handler`] function is the Axum fallback that receives
//! every non-`/health` request and runs it through the pipeline:
//! authorization gate ([`auth`]), path rewrite ([`rewrite`]), header
//! construction ([`headers`]), upstream forwarding ([`forward`]), and
//! response relay.

pub mod auth;
pub mod forward;
pub mod headers;
pub mod rewrite;

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Bytes;
use axum::extract::{ConnectInfo, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};

use crate::server::AppState;

use self::forward::UpstreamResponse;

pub async fn forward_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    method: Method,
    uri: Uri,
    req_headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path = uri.path();
    let correlation_id = req_headers
        .get("x-correlation-id")
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);

    // Clone the Arc<Config> (cheap refcount bump) to release the RwLock before .await
    let config = {
        let config_guard = state.config.read().await;
        Arc::clone(&config_guard.config)
    };

    if config.auth.enforce && !auth::has_authorization(&req_headers) {
        state.stats.rejected.fetch_add(1, Ordering::Relaxed);
        tracing::info!(
            correlation_id = %correlation_id,
            method = %method,
            path = %path,
            "rejected: no authorization header"
        );
        return auth::unauthorized_response();
    }

    let target = rewrite::forward_target(&config.upstream.url, &uri);

    // The upstream base was validated at config load, so this only fails
    // on request paths that produce an unparseable combined URL.
    let parsed_target = match url::Url::parse(&target) {
        Ok(u) => u,
        Err(e) => {
            tracing::error!(
                correlation_id = %correlation_id,
                target = %target,
                error = %e,
                "invalid forward target"
            );
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
            return forward::ForwardError::InvalidTarget {
                target,
                message: e.to_string(),
            }
            .into_response();
        }
    };

    let forwarded_headers = headers::build_forwarded_headers(
        &req_headers,
        &addr.ip().to_string(),
        &parsed_target,
        &config.forwarding,
        &correlation_id,
    );

    tracing::info!(
        correlation_id = %correlation_id,
        method = %method,
        path = %path,
        target = %target,
        "forwarding request"
    );

    let outcome = forward::forward(
        &state.http_client,
        method,
        &target,
        forwarded_headers,
        body,
        Duration::from_millis(config.forwarding.timeout),
    )
    .await;

    match outcome {
        Ok(upstream) => {
            state.stats.forwarded.fetch_add(1, Ordering::Relaxed);
            tracing::info!(
                correlation_id = %correlation_id,
                status = upstream.status.as_u16(),
                latency_ms = upstream.latency_ms,
                "upstream responded"
            );
            relay_response(upstream, &correlation_id)
        }
        Err(e) => {
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
            tracing::warn!(
                correlation_id = %correlation_id,
                target = %target,
                error = %e,
                "forward failed"
            );
            e.into_response()
        }
    }
}

/// Relay the collected upstream response: status code propagated
/// explicitly, hop-by-hop headers dropped, body sent verbatim.
fn relay_response(mut upstream: UpstreamResponse, correlation_id: &str) -> Response {
    headers::strip_response_hop_by_hop(&mut upstream.headers);

    let mut builder = Response::builder().status(upstream.status);
    for (key, value) in &upstream.headers {
        builder = builder.header(key, value);
    }
    builder
        .header("x-correlation-id", correlation_id)
        .body(axum::body::Body::from(upstream.body))
        .unwrap_or_else(|e| {
            tracing::error!(
                correlation_id = %correlation_id,
                error = %e,
                "failed to build relayed response"
            );
            StatusCode::BAD_GATEWAY.into_response()
        })
}
