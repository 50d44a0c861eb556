#![forbid(unsafe_code)]

//! `session-broker-ctl` — operate a running broker from the same host.
//!
//! Sends one [`ControlRequest`] over the broker's control socket and
//! prints the outcome as JSON. The auth token comes from `--auth-token`,
//! `SESSION_BROKER_IPC_TOKEN`, or the token file the broker writes.

use std::io::{BufRead, BufReader, Write};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use interprocess::local_socket::{traits::Stream as _, GenericNamespaced, Stream, ToNsName};
use serde_json::Value;

use session_broker::control::{ControlCommand, ControlRequest, ControlResponse};
use session_broker::ipc::token::{read_token, token_path};
use session_broker::{AppError, Result};

#[derive(Debug, Parser)]
#[command(
    name = "session-broker-ctl",
    about = "Operate a running session-broker",
    version,
    long_about = None
)]
struct Cli {
    /// Control socket name (the broker's `ipc_name`).
    #[arg(long, default_value = "session-broker")]
    ipc_name: String,

    /// Auth token; defaults to the broker's token file.
    #[arg(long, env = "SESSION_BROKER_IPC_TOKEN")]
    auth_token: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List live sessions.
    List,
    /// Launch a session.
    Start,
    /// End a session and release its port.
    End {
        /// Session ID.
        session_id: String,
    },
    /// Show one session.
    Info {
        /// Session ID.
        session_id: String,
    },
    /// Show worker memory in MB, for one session or all of them.
    Memory {
        /// Session ID; every session when omitted.
        session_id: Option<String>,
    },
    /// Show the port pool.
    Ports,
    /// Relay a JSON command to a session's worker.
    Send {
        /// Session ID.
        session_id: String,
        /// Command document, e.g. '{"cmd":"status"}'.
        #[arg(value_parser = parse_json)]
        payload: Value,
    },
}

impl From<Command> for ControlCommand {
    fn from(command: Command) -> Self {
        match command {
            Command::List => Self::List,
            Command::Start => Self::Start,
            Command::End { session_id } => Self::End { session_id },
            Command::Info { session_id } => Self::Info { session_id },
            Command::Memory {
                session_id: Some(session_id),
            } => Self::Memory { session_id },
            Command::Memory { session_id: None } => Self::MemoryAll,
            Command::Ports => Self::Ports,
            Command::Send {
                session_id,
                payload,
            } => Self::Send {
                session_id,
                payload,
            },
        }
    }
}

fn parse_json(raw: &str) -> std::result::Result<Value, String> {
    serde_json::from_str(raw).map_err(|err| format!("not valid JSON: {err}"))
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let auth_token = cli
        .auth_token
        .or_else(|| read_token(&token_path(&cli.ipc_name)).ok());
    let request = ControlRequest {
        auth_token,
        command: cli.command.into(),
    };

    match call(&cli.ipc_name, &request) {
        Ok(ControlResponse {
            ok: true, data, ..
        }) => {
            let data = data.unwrap_or(Value::Null);
            println!("{}", serde_json::to_string_pretty(&data).unwrap_or_default());
            ExitCode::SUCCESS
        }
        Ok(ControlResponse { error, .. }) => {
            eprintln!("Error: {}", error.as_deref().unwrap_or("unknown error"));
            ExitCode::FAILURE
        }
        Err(err) => {
            eprintln!("{err}");
            eprintln!("Is session-broker running with ipc_name '{}'?", cli.ipc_name);
            ExitCode::FAILURE
        }
    }
}

/// One request/response exchange over the control socket.
fn call(ipc_name: &str, request: &ControlRequest) -> Result<ControlResponse> {
    let name = ipc_name
        .to_ns_name::<GenericNamespaced>()
        .map_err(|err| AppError::Ipc(format!("invalid socket name '{ipc_name}': {err}")))?;
    let mut stream = Stream::connect(name)
        .map_err(|err| AppError::Ipc(format!("cannot connect to '{ipc_name}': {err}")))?;

    let mut line = serde_json::to_vec(request)
        .map_err(|err| AppError::Ipc(format!("failed to encode request: {err}")))?;
    line.push(b'\n');
    stream.write_all(&line)?;
    stream.flush()?;

    let mut reply = String::new();
    BufReader::new(&stream).read_line(&mut reply)?;
    serde_json::from_str(reply.trim())
        .map_err(|err| AppError::Ipc(format!("malformed response: {err}")))
}
