//! Worker command set and dispatch.
//!
//! The worker registers a closed set of commands. Each one is a variant of
//! [`WorkerCommand`], and [`WorkerState::dispatch`] matches on it, so adding
//! a command means adding a variant and a match arm.

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use crate::protocol::{WorkerReply, WorkerRequest};
use crate::{AppError, Result};

/// Commands understood by the reference worker.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkerCommand {
    /// Liveness check.
    Ping,
    /// Report port, pid and uptime.
    Status,
    /// Read one parameter.
    GetValue {
        /// Parameter name.
        name: String,
    },
    /// Write one parameter.
    SetValue {
        /// Parameter name.
        name: String,
        /// New value.
        value: Value,
    },
    /// Dump every parameter.
    ListParameters,
    /// Run the model. The reference worker only spends `duration_ms`.
    RunCompute {
        /// Simulated compute time in milliseconds.
        duration_ms: u64,
    },
}

#[derive(Debug, Deserialize)]
struct NameParams {
    name: String,
}

#[derive(Debug, Deserialize)]
struct SetValueParams {
    name: String,
    value: Value,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RunComputeParams {
    duration_ms: u64,
}

impl WorkerCommand {
    /// Names of every registered command, in registration order.
    pub const NAMES: [&'static str; 6] = [
        "ping",
        "status",
        "get_value",
        "set_value",
        "list_parameters",
        "run_compute",
    ];

    /// Whether `name` is a registered command.
    #[must_use]
    pub fn is_registered(name: &str) -> bool {
        Self::NAMES.contains(&name)
    }

    /// Build a command from a request.
    ///
    /// # Errors
    ///
    /// Returns `AppError::InvalidInput` for unknown names or bad params.
    pub fn parse(request: WorkerRequest) -> Result<Self> {
        let WorkerRequest { cmd, params } = request;
        match cmd.as_str() {
            "ping" => Ok(Self::Ping),
            "status" => Ok(Self::Status),
            "list_parameters" => Ok(Self::ListParameters),
            "get_value" => {
                let NameParams { name } = params_of(&cmd, params)?;
                Ok(Self::GetValue { name })
            }
            "set_value" => {
                let SetValueParams { name, value } = params_of(&cmd, params)?;
                Ok(Self::SetValue { name, value })
            }
            "run_compute" => {
                let RunComputeParams { duration_ms } = match params {
                    Some(params) => params_of(&cmd, Some(params))?,
                    None => RunComputeParams::default(),
                };
                Ok(Self::RunCompute { duration_ms })
            }
            other => Err(AppError::InvalidInput(format!("Unknown command: {other}"))),
        }
    }
}

fn params_of<T: DeserializeOwned>(cmd: &str, params: Option<Value>) -> Result<T> {
    let params =
        params.ok_or_else(|| AppError::InvalidInput(format!("{cmd} requires params")))?;
    serde_json::from_value(params)
        .map_err(|err| AppError::InvalidInput(format!("bad params for {cmd}: {err}")))
}

/// Parameters a fresh worker starts with.
#[must_use]
pub fn default_parameters() -> BTreeMap<String, Value> {
    [
        ("period@binary", json!(1.0)),
        ("incl@binary", json!(90.0)),
        ("sma@binary", json!(5.3)),
        ("q@binary", json!(1.0)),
        ("teff@primary", json!(6000.0)),
        ("teff@secondary", json!(6000.0)),
        ("requiv@primary", json!(1.0)),
        ("requiv@secondary", json!(1.0)),
    ]
    .into_iter()
    .map(|(name, value)| (name.to_owned(), value))
    .collect()
}

/// State owned by one worker process.
#[derive(Debug)]
pub struct WorkerState {
    port: u16,
    started: Instant,
    parameters: BTreeMap<String, Value>,
}

impl WorkerState {
    /// Fresh state for a worker bound to `port`.
    #[must_use]
    pub fn new(port: u16) -> Self {
        Self {
            port,
            started: Instant::now(),
            parameters: default_parameters(),
        }
    }

    /// Execute one command.
    ///
    /// # Errors
    ///
    /// Returns `AppError::NotFound` when reading an unknown parameter.
    pub async fn dispatch(&mut self, command: WorkerCommand) -> Result<Value> {
        match command {
            WorkerCommand::Ping => Ok(json!("pong")),
            WorkerCommand::Status => Ok(json!({
                "status": "ok",
                "port": self.port,
                "pid": std::process::id(),
                "uptime_seconds": self.started.elapsed().as_secs(),
            })),
            WorkerCommand::GetValue { name } => self
                .parameters
                .get(&name)
                .cloned()
                .ok_or_else(|| AppError::NotFound(format!("parameter {name}"))),
            WorkerCommand::SetValue { name, value } => {
                let previous = self.parameters.insert(name.clone(), value.clone());
                Ok(json!({ "name": name, "value": value, "previous": previous }))
            }
            WorkerCommand::ListParameters => Ok(json!(self.parameters)),
            WorkerCommand::RunCompute { duration_ms } => {
                tokio::time::sleep(Duration::from_millis(duration_ms)).await;
                Ok(json!({ "computed": true, "duration_ms": duration_ms }))
            }
        }
    }

    /// Turn one raw request payload into exactly one reply.
    pub async fn handle(&mut self, payload: &[u8]) -> WorkerReply {
        let request: WorkerRequest = match serde_json::from_slice(payload) {
            Ok(request) => request,
            Err(err) => return WorkerReply::failure(format!("invalid request: {err}")),
        };

        if !WorkerCommand::is_registered(&request.cmd) {
            debug!(cmd = %request.cmd, "unknown command");
            return WorkerReply::unknown_command(&request.cmd, &WorkerCommand::NAMES);
        }

        debug!(cmd = %request.cmd, "dispatching command");
        let outcome = match WorkerCommand::parse(request) {
            Ok(command) => self.dispatch(command).await,
            Err(err) => Err(err),
        };
        match outcome {
            Ok(result) => WorkerReply::ok(result),
            Err(err) => WorkerReply::failure(err.to_string()),
        }
    }
}
