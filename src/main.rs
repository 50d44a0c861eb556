#![forbid(unsafe_code)]

//! `session-broker` — session manager binary.
//!
//! Bootstraps configuration, starts the HTTP manager surface, the liveness
//! sweeper, and the IPC server for `session-broker-ctl`.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use session_broker::api::server::serve_http;
use session_broker::config::GlobalConfig;
use session_broker::ipc::server::ControlSocket;
use session_broker::ipc::token::{generate_token, token_path, write_token};
use session_broker::orchestrator::sweeper::spawn_sweeper;
use session_broker::runtime::{build_runtime, init_tracing, shutdown_signal, LogFormat};
use session_broker::state::AppState;
use session_broker::Result;

#[derive(Debug, Parser)]
#[command(name = "session-broker", about = "Per-session worker process manager", version, long_about = None)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(long)]
    config: PathBuf,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Override the configured HTTP port.
    #[arg(long)]
    http_port: Option<u16>,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;
    info!("session-broker bootstrap");

    build_runtime()?.block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    // ── Load configuration ──────────────────────────────
    let mut config = GlobalConfig::load_from_path(&args.config)?;
    if let Some(port) = args.http_port {
        config.http_port = port;
    }
    info!(
        http_port = config.http_port,
        pool_start = config.port_pool.start,
        pool_end = config.port_pool.end,
        "configuration loaded"
    );

    // ── Build shared application state ──────────────────
    let token = generate_token();
    let token_file = token_path(&config.ipc_name);
    write_token(&token_file, &token)?;
    info!(token_file = %token_file.display(), "control token written");

    let mut state = AppState::from_config(config)?;
    state.ipc_auth_token = Some(token);
    let state = Arc::new(state);

    let ct = CancellationToken::new();

    // ── Start background services ───────────────────────
    let sweeper_handle = state.config.sweep_interval().map(|interval| {
        spawn_sweeper(Arc::clone(&state.sessions), interval, ct.clone())
    });

    let ipc_handle = match ControlSocket::bind(&state.config.ipc_name) {
        Ok(socket) => Some(socket.spawn(Arc::clone(&state), ct.clone())),
        Err(err) => {
            warn!(%err, "control socket unavailable; continuing without local control");
            None
        }
    };

    let http_ct = ct.clone();
    let http_state = Arc::clone(&state);
    let http_handle = tokio::spawn(async move {
        if let Err(err) = serve_http(http_state, http_ct.clone()).await {
            error!(%err, "HTTP surface failed");
            http_ct.cancel();
        }
    });

    info!("session-broker ready");

    // ── Wait for shutdown signal ────────────────────────
    tokio::select! {
        () = shutdown_signal() => info!("shutdown signal received"),
        () = ct.cancelled() => warn!("service failure, shutting down"),
    }
    ct.cancel();

    // ── Terminate every worker ──────────────────────────
    let ended = state.sessions.shutdown_all().await;
    info!(sessions = ended, "all sessions terminated");

    // ── Wait for background tasks ───────────────────────
    let _ = http_handle.await;
    if let Some(handle) = ipc_handle {
        let _ = handle.await;
    }
    if let Some(handle) = sweeper_handle {
        let _ = handle.await;
    }
    if let Err(err) = std::fs::remove_file(&token_file) {
        warn!(%err, "failed to remove control token file");
    }
    info!("session-broker shut down");

    Ok(())
}
