//! `gateway-server` — boots a declarative API gateway from a single
//! [`GatewayConfig`] file, with every external collaborator (database,
//! events store, auth, rate limiting) left at its unconfigured default
//! unless a deployment wires one in via [`gateway_server::Dependencies`].

#![forbid(unsafe_code)]

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use gateway_conventions::GatewayConfig;
use gateway_server::{build_router, AppState, Dependencies};
use tracing_subscriber::EnvFilter;

/// Run the declarative API gateway.
#[derive(Parser)]
#[command(name = "gateway-server", version, about)]
struct Cli {
    /// Path to a `GatewayConfig` TOML file. Missing file falls back to
    /// defaults (permissive CORS, anonymous auth, CRUD/`/qa` enabled,
    /// events/proxy disabled) with a warning.
    #[arg(short, long, default_value = "gateway.toml")]
    config: PathBuf,

    /// Emit structured JSON logs instead of the default human-readable
    /// format.
    #[arg(long)]
    json_logs: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.json_logs);

    let config = load_config(&cli.config)?;
    if config.confirm.secret.is_empty() {
        tracing::warn!("confirm.secret is empty; mutation confirmation hashes are forgeable in this configuration");
    }

    let bind_address = config.server.bind_address.clone();
    let rate_limiter = gateway_runtime::WindowRateLimiter::new(config.rate_limit.max_requests, config.rate_limit.window_secs);
    let deps = Dependencies {
        rate_limiter: std::sync::Arc::new(rate_limiter),
        ..Dependencies::default()
    };
    let state = AppState::new(config, deps);
    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("failed to bind {bind_address}"))?;
    tracing::info!(%bind_address, "gateway-server listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")
}

fn load_config(path: &PathBuf) -> anyhow::Result<GatewayConfig> {
    if path.exists() {
        GatewayConfig::load(path)
    } else {
        tracing::warn!(path = %path.display(), "config file not found, starting from defaults");
        Ok(GatewayConfig::default())
    }
}

/// `RUST_LOG`-driven `tracing` init, matching the rest of the pack:
/// pretty output for a terminal, `json` when `--json-logs` is set (for a
/// log-shipping pipeline that expects structured records).
fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
