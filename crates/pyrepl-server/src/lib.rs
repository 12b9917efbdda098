//! HTTP protocol layer for the pyrepl execution server.
//!
//! Three routes around one session coordinator:
//! - `GET /health` answers immediately, busy or not
//! - `POST /execute` runs a snippet and responds once the outcome is known
//! - `POST /reset` clears the REPL scope under the same admission rules
//!
//! A busy session maps to 409; a malformed body to 400; a dead engine to
//! 500. Code that merely raised stays 200 with `success: false` in the
//! body, so callers can tell "my code failed" from "the server failed".

use std::sync::Arc;

use anyhow::Context;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use tower_http::trace::TraceLayer;

use pyrepl_core::{ExecutionRequest, Interpreter};
use pyrepl_session::{Coordinator, SessionError};

pub mod protocol;

use protocol::{ErrorReply, ExecuteBody, ExecuteReply, HealthReply, StatusReply};

/// Build the application router around one session coordinator.
pub fn create_router<I>(coordinator: Arc<Coordinator<I>>) -> Router
where
    I: Interpreter + 'static,
{
    Router::new()
        .route("/health", get(health::<I>))
        .route("/execute", post(execute::<I>))
        .route("/reset", post(reset::<I>))
        .layer(TraceLayer::new_for_http())
        .with_state(coordinator)
}

/// Serve until the listener fails or the process is killed.
///
/// # Errors
/// Returns an error when the listener address cannot be read or the server
/// loop fails.
pub async fn run_server<I>(
    listener: tokio::net::TcpListener,
    coordinator: Arc<Coordinator<I>>,
) -> anyhow::Result<()>
where
    I: Interpreter + 'static,
{
    let addr = listener
        .local_addr()
        .context("failed to read server bind address")?;
    tracing::info!("server running on http://{addr}");

    axum::serve(listener, create_router(coordinator))
        .await
        .context("server error")
}

async fn health<I>(State(coordinator): State<Arc<Coordinator<I>>>) -> Json<HealthReply>
where
    I: Interpreter + 'static,
{
    Json(HealthReply {
        status: "alive".to_owned(),
        session_id: coordinator.id().to_string(),
    })
}

async fn execute<I>(
    State(coordinator): State<Arc<Coordinator<I>>>,
    body: Result<Json<ExecuteBody>, JsonRejection>,
) -> Response
where
    I: Interpreter + 'static,
{
    let Json(body) = match body {
        Ok(body) => body,
        Err(rejection) => {
            return error_response(
                StatusCode::BAD_REQUEST,
                format!("Failed to parse request: {rejection}"),
            );
        }
    };

    let request = ExecutionRequest::from(body);
    match coordinator.execute(&request).await {
        Ok(outcome) => (StatusCode::OK, Json(ExecuteReply::from(outcome))).into_response(),
        Err(err) => session_error_response(&err),
    }
}

async fn reset<I>(State(coordinator): State<Arc<Coordinator<I>>>) -> Response
where
    I: Interpreter + 'static,
{
    match coordinator.reset().await {
        Ok(()) => (
            StatusCode::OK,
            Json(StatusReply {
                status: "ok".to_owned(),
            }),
        )
            .into_response(),
        Err(err) => session_error_response(&err),
    }
}

fn session_error_response(err: &SessionError) -> Response {
    let status = match err {
        SessionError::Busy => StatusCode::CONFLICT,
        SessionError::Interpreter(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    error_response(status, err.to_string())
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorReply {
            error: message.into(),
        }),
    )
        .into_response()
}
