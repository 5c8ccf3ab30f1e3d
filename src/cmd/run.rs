//! `authgate run` — start the gateway.
//!
//! Resolves a config source (file or `--upstream` flag), applies CLI
//! and legacy environment overrides, starts the Axum HTTP server with
//! graceful shutdown, and spawns a background config refresh loop for
//! hot-reloading.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::cli::RunArgs;
use crate::config::{sources, validation, ConfigSource};
use crate::error::GatewayError;
use crate::logging;
use crate::proxy::auth;
use crate::server::{self, AppState, LoadedConfig, Stats};

pub async fn execute(args: RunArgs) -> Result<(), GatewayError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    let source = resolve_config_source(&args).await?;
    let (mut config, version) = source.load().await?;

    // CLI overrides
    if let Some(timeout) = args.timeout {
        config.forwarding.timeout = timeout;
    }
    if args.no_auth {
        config.auth.enforce = false;
    }

    // Legacy env override, kept for deployments that already set it
    config.auth.enforce = auth::resolve_enforce(
        config.auth.enforce,
        std::env::var("CHECK_HEADER").ok().as_deref(),
    );

    // Overrides can invalidate a previously valid config (e.g. --timeout 0)
    if let Err(errors) = validation::validate(&config) {
        return Err(GatewayError::ConfigValidation { errors });
    }

    let upstream = config.upstream.url.clone();
    let auth_enforced = config.auth.enforce;

    let state = Arc::new(AppState {
        config: tokio::sync::RwLock::new(LoadedConfig {
            config: Arc::new(config),
            version,
            source_name: source.name().to_string(),
            loaded_at: Instant::now(),
        }),
        http_client: server::build_http_client(),
        start_time: Instant::now(),
        stats: Stats::new(),
    });

    // Shutdown signal: dropping shutdown_tx closes the channel and stops the refresh loop
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    // Spawn config refresh loop with cancellation
    let refresh_state = state.clone();
    let poll_interval = args.poll_interval;
    let refresh_handle = tokio::spawn(async move {
        config_refresh_loop(refresh_state, source, poll_interval, shutdown_rx).await;
    });

    let router = server::build_router(state, args.max_body, args.max_inflight);

    let addr: SocketAddr = format!("{}:{}", args.host, args.port).parse()?;

    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        upstream = %upstream,
        auth_enforced,
        "authgate started"
    );

    // Wrap the shutdown signal to also stop the config refresh loop immediately
    let graceful_shutdown = async move {
        server::shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    };

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(graceful_shutdown)
    .await?;

    // Wait for the config refresh task to finish (catches panics)
    if let Err(e) = refresh_handle.await {
        tracing::error!(error = %e, "config refresh task failed");
    }

    tracing::info!("authgate stopped");
    Ok(())
}

async fn resolve_config_source(args: &RunArgs) -> Result<Box<dyn ConfigSource>, GatewayError> {
    if let Some(source) = resolve_file_source(args.config.as_deref()).await? {
        return Ok(source);
    }

    if let Some(ref url) = args.upstream {
        return Ok(Box::new(sources::flag::FlagSource::new(url)));
    }

    Err(GatewayError::NoConfigSource {
        hint: "Provide --config <file> or --upstream <url>.\n  \
               Run 'authgate init' to create a config file."
            .into(),
    })
}

async fn resolve_file_source(
    explicit: Option<&std::path::Path>,
) -> Result<Option<Box<dyn ConfigSource>>, GatewayError> {
    if let Some(path) = explicit {
        return create_file_source(path).map(Some);
    }

    // Auto-detect in current directory
    let candidates = [
        "authgate.yaml",
        "authgate.yml",
        "authgate.json",
        "authgate.toml",
    ];

    for name in &candidates {
        let path = PathBuf::from(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!(path = %path.display(), "auto-detected config file");
            return create_file_source(&path).map(Some);
        }
    }

    Ok(None)
}

fn create_file_source(path: &std::path::Path) -> Result<Box<dyn ConfigSource>, GatewayError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => Ok(Box::new(sources::yaml::new(path.to_path_buf()))),

        #[cfg(feature = "json")]
        "json" => Ok(Box::new(sources::json::new(path.to_path_buf()))),

        #[cfg(feature = "toml")]
        "toml" => Ok(Box::new(sources::toml_source::new(path.to_path_buf()))),

        other => Err(GatewayError::UnsupportedFormat(other.to_string())),
    }
}

async fn config_refresh_loop(
    state: Arc<AppState>,
    source: Box<dyn ConfigSource>,
    interval_secs: u64,
    mut shutdown: tokio::sync::watch::Receiver<bool>,
) {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.tick().await; // Skip first immediate tick

    loop {
        tokio::select! {
            _ = interval.tick() => {}
            _ = shutdown.changed() => {
                tracing::debug!("config refresh loop shutting down");
                return;
            }
        }

        let current_version = {
            let config = state.config.read().await;
            config.version.clone()
        };

        match source.has_changed(&current_version).await {
            Ok(true) => {
                tracing::info!("config change detected, reloading");
                match source.load().await {
                    Ok((config, version)) => {
                        let upstream = config.upstream.url.clone();
                        let mut loaded = state.config.write().await;
                        loaded.config = Arc::new(config);
                        loaded.version = version;
                        loaded.loaded_at = std::time::Instant::now();
                        drop(loaded);
                        state
                            .stats
                            .config_reloads
                            .fetch_add(1, std::sync::atomic::Ordering::Relaxed);
                        tracing::info!(upstream = %upstream, "config reloaded");
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "config reload failed, keeping current config");
                    }
                }
            }
            Ok(false) => {}
            Err(e) => {
                tracing::warn!(error = %e, "config change check failed");
            }
        }
    }
}
