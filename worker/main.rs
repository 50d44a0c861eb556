#![forbid(unsafe_code)]

//! `session-worker` — reference worker spawned by `session-broker`.
//!
//! Binds a REP endpoint on the port passed as the last argument and serves
//! JSON commands until it receives ctrl-c or `SIGTERM`.

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::info;

use session_broker::protocol::WORKER_HOST;
use session_broker::runtime::{build_runtime, init_tracing, shutdown_signal, LogFormat};
use session_broker::worker::server::WorkerServer;
use session_broker::Result;

#[derive(Debug, Parser)]
#[command(name = "session-worker", about = "Per-session command worker", version, long_about = None)]
struct Cli {
    /// Interface to bind.
    #[arg(long, default_value = WORKER_HOST)]
    host: String,

    /// Log output format (text or json).
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Port assigned by the broker.
    port: u16,
}

fn main() -> Result<()> {
    let args = Cli::parse();
    init_tracing(args.log_format)?;

    build_runtime()?.block_on(run(args))
}

async fn run(args: Cli) -> Result<()> {
    let server = WorkerServer::bind(&args.host, args.port).await?;

    let ct = CancellationToken::new();
    let signal_ct = ct.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_ct.cancel();
    });

    server.serve(ct).await?;
    info!(port = args.port, "session-worker shut down");
    Ok(())
}
