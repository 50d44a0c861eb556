//! Manager HTTP routes.
//!
//! | Method | Path                          | Purpose                         |
//! |--------|-------------------------------|---------------------------------|
//! | GET    | `/health`                     | liveness check                  |
//! | GET    | `/sessions`                   | list sessions (sweeps first)    |
//! | POST   | `/start-session`              | launch a session                |
//! | POST   | `/end-session/{id}`           | shut a session down             |
//! | POST   | `/session-info/{id}`          | one session's metadata          |
//! | POST   | `/update-user-info/{id}`      | set the display name            |
//! | GET    | `/session-memory`             | memory (MB) of every session    |
//! | POST   | `/session-memory/{id}`        | memory (MB) of one session      |
//! | GET    | `/port-status`                | port pool snapshot              |
//! | POST   | `/send/{id}`                  | proxy a command to the worker   |
//!
//! Handlers only translate paths and bodies into a [`ControlCommand`].

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::Value;

use crate::control::{execute, ControlCommand, ControlOutcome};
use crate::state::AppState;
use crate::Result;

type SharedState = State<Arc<AppState>>;
type Outcome = Result<Json<ControlOutcome>>;

/// Build the manager router over shared state.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/sessions", get(list_sessions))
        .route("/start-session", post(start_session))
        .route("/end-session/{session_id}", post(end_session))
        .route("/session-info/{session_id}", post(session_info))
        .route("/update-user-info/{session_id}", post(update_user_info))
        .route("/session-memory", get(session_memory_all))
        .route("/session-memory/{session_id}", post(session_memory))
        .route("/port-status", get(port_status))
        .route("/send/{session_id}", post(send))
        .with_state(state)
}

/// Body of `POST /update-user-info/{id}`.
#[derive(Debug, Deserialize)]
pub struct UserInfoRequest {
    /// Given name.
    #[serde(default)]
    pub first_name: String,
    /// Family name.
    #[serde(default)]
    pub last_name: String,
}

async fn run(state: &AppState, command: ControlCommand) -> Outcome {
    Ok(Json(execute(state, command).await?))
}

async fn health() -> &'static str {
    "ok"
}

async fn list_sessions(State(state): SharedState) -> Outcome {
    run(&state, ControlCommand::List).await
}

async fn start_session(State(state): SharedState) -> Outcome {
    run(&state, ControlCommand::Start).await
}

async fn end_session(State(state): SharedState, Path(session_id): Path<String>) -> Outcome {
    run(&state, ControlCommand::End { session_id }).await
}

async fn session_info(State(state): SharedState, Path(session_id): Path<String>) -> Outcome {
    run(&state, ControlCommand::Info { session_id }).await
}

async fn update_user_info(
    State(state): SharedState,
    Path(session_id): Path<String>,
    Json(body): Json<UserInfoRequest>,
) -> Outcome {
    let UserInfoRequest {
        first_name,
        last_name,
    } = body;
    run(
        &state,
        ControlCommand::UserInfo {
            session_id,
            first_name,
            last_name,
        },
    )
    .await
}

async fn session_memory_all(State(state): SharedState) -> Outcome {
    run(&state, ControlCommand::MemoryAll).await
}

async fn session_memory(State(state): SharedState, Path(session_id): Path<String>) -> Outcome {
    run(&state, ControlCommand::Memory { session_id }).await
}

async fn port_status(State(state): SharedState) -> Outcome {
    run(&state, ControlCommand::Ports).await
}

async fn send(
    State(state): SharedState,
    Path(session_id): Path<String>,
    Json(payload): Json<Value>,
) -> Outcome {
    run(
        &state,
        ControlCommand::Send {
            session_id,
            payload,
        },
    )
    .await
}
