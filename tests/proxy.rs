//! End-to-end tests for the gateway pipeline against a stub upstream.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use axum::extract::State;
use axum::http::{StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;

use authgate::config::model::Config;
use authgate::config::ConfigVersion;
use authgate::server::{self, AppState, LoadedConfig, Stats};

#[derive(Default)]
struct StubState {
    hits: AtomicU64,
    last_path: Mutex<Option<String>>,
}

async fn stub_handler(State(state): State<Arc<StubState>>, uri: Uri) -> Response {
    state.hits.fetch_add(1, Ordering::SeqCst);
    let seen = uri
        .path_and_query()
        .map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string());
    *state.last_path.lock().unwrap() = Some(seen);

    match uri.path() {
        "/teapot" => (
            StatusCode::IM_A_TEAPOT,
            [("x-stub", "teapot")],
            "short and stout",
        )
            .into_response(),
        "/slow" => {
            tokio::time::sleep(Duration::from_millis(400)).await;
            "eventually".into_response()
        }
        other => (StatusCode::OK, [("x-stub", "ok")], format!("echo:{other}")).into_response(),
    }
}

async fn start_stub_upstream() -> (SocketAddr, Arc<StubState>) {
    let state = Arc::new(StubState::default());
    let router = Router::new()
        .fallback(stub_handler)
        .with_state(state.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    (addr, state)
}

async fn start_gateway(upstream: &str, enforce: bool, timeout_ms: u64) -> SocketAddr {
    let mut config = Config::for_upstream(upstream);
    config.auth.enforce = enforce;
    config.forwarding.timeout = timeout_ms;

    let state = Arc::new(AppState {
        config: tokio::sync::RwLock::new(LoadedConfig {
            config: Arc::new(config),
            version: ConfigVersion::Hash("test-hash".into()),
            source_name: "test".into(),
            loaded_at: Instant::now(),
        }),
        http_client: server::build_http_client(),
        start_time: Instant::now(),
        stats: Stats::new(),
    });

    let router = server::build_router(state, 1_048_576, None);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .unwrap();
    });

    addr
}

/// A loopback port with nothing listening on it.
async fn closed_port() -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

#[tokio::test]
async fn missing_authorization_header_is_rejected() {
    let (upstream_addr, upstream) = start_stub_upstream().await;
    let gateway = start_gateway(&format!("http://{upstream_addr}"), true, 5_000).await;

    let resp = reqwest::get(format!("http://{gateway}/iip/anything"))
        .await
        .unwrap();

    assert_eq!(resp.status(), 401);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(
        body,
        serde_json::json!({ "error": "No authorization header set" })
    );
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn authorized_request_relays_the_upstream_response() {
    let (upstream_addr, upstream) = start_stub_upstream().await;
    let gateway = start_gateway(&format!("http://{upstream_addr}"), true, 5_000).await;

    let resp = reqwest::Client::new()
        .get(format!("http://{gateway}/iip/teapot"))
        .header("authorization", "Bearer anything")
        .send()
        .await
        .unwrap();

    // Upstream status, headers, and body all relay verbatim
    assert_eq!(resp.status(), 418);
    assert_eq!(resp.headers().get("x-stub").unwrap(), "teapot");
    assert_eq!(resp.text().await.unwrap(), "short and stout");

    assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);
    assert_eq!(
        upstream.last_path.lock().unwrap().as_deref(),
        Some("/teapot")
    );
}

#[tokio::test]
async fn first_path_segment_is_stripped() {
    let (upstream_addr, upstream) = start_stub_upstream().await;
    let gateway = start_gateway(&format!("http://{upstream_addr}"), true, 5_000).await;

    reqwest::Client::new()
        .get(format!("http://{gateway}/gateway/echo/deep?z=3&x=1"))
        .header("authorization", "token")
        .send()
        .await
        .unwrap();

    assert_eq!(
        upstream.last_path.lock().unwrap().as_deref(),
        Some("/echo/deep?z=3&x=1")
    );
}

#[tokio::test]
async fn single_segment_path_degenerates_to_upstream_root() {
    let (upstream_addr, upstream) = start_stub_upstream().await;
    let gateway = start_gateway(&format!("http://{upstream_addr}"), true, 5_000).await;

    let resp = reqwest::Client::new()
        .get(format!("http://{gateway}/foo"))
        .header("authorization", "token")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(upstream.last_path.lock().unwrap().as_deref(), Some("/"));
}

#[tokio::test]
async fn enforcement_disabled_forwards_without_the_header() {
    let (upstream_addr, upstream) = start_stub_upstream().await;
    let gateway = start_gateway(&format!("http://{upstream_addr}"), false, 5_000).await;

    let resp = reqwest::get(format!("http://{gateway}/iip/open"))
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "echo:/open");
    assert_eq!(upstream.hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn unreachable_upstream_returns_502_with_structured_body() {
    let port = closed_port().await;
    let gateway = start_gateway(&format!("http://127.0.0.1:{port}"), true, 5_000).await;

    let resp = reqwest::Client::new()
        .get(format!("http://{gateway}/iip/anything"))
        .header("authorization", "token")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 502);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "connect");
    assert!(body["error"].as_str().unwrap().contains("upstream"));
}

#[tokio::test]
async fn slow_upstream_times_out_with_504() {
    let (upstream_addr, _upstream) = start_stub_upstream().await;
    let gateway = start_gateway(&format!("http://{upstream_addr}"), true, 100).await;

    let resp = reqwest::Client::new()
        .get(format!("http://{gateway}/iip/slow"))
        .header("authorization", "token")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 504);
    let body: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(body["kind"], "timeout");
}

#[tokio::test]
async fn repeated_requests_relay_identically() {
    let (upstream_addr, _upstream) = start_stub_upstream().await;
    let gateway = start_gateway(&format!("http://{upstream_addr}"), true, 5_000).await;

    let client = reqwest::Client::new();
    let mut results = Vec::new();
    for _ in 0..2 {
        let resp = client
            .get(format!("http://{gateway}/iip/teapot"))
            .header("authorization", "token")
            .send()
            .await
            .unwrap();
        results.push((resp.status(), resp.text().await.unwrap()));
    }

    assert_eq!(results[0], results[1]);
}

#[tokio::test]
async fn post_method_is_forwarded() {
    let (upstream_addr, upstream) = start_stub_upstream().await;
    let gateway = start_gateway(&format!("http://{upstream_addr}"), true, 5_000).await;

    let resp = reqwest::Client::new()
        .post(format!("http://{gateway}/iip/submit"))
        .header("authorization", "token")
        .body("payload")
        .send()
        .await
        .unwrap();

    assert_eq!(resp.status(), 200);
    assert_eq!(
        upstream.last_path.lock().unwrap().as_deref(),
        Some("/submit")
    );
}
