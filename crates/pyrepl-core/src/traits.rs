//! The seam between the execution coordinator and the interpreter engine.

use async_trait::async_trait;
use thiserror::Error;

use crate::ExecutionOutcome;

/// Engine error.
///
/// Failures of the *submitted code* are not errors here; they come back as
/// unsuccessful [`ExecutionOutcome`]s. These variants cover the engine
/// itself misbehaving, which callers surface as a server-side fault.
#[derive(Debug, Error)]
pub enum InterpreterError {
    #[error("interpreter failed to start: {0}")]
    Init(String),
    #[error("interpreter worker is no longer running")]
    Unavailable,
    #[error("interpreter internal failure: {0}")]
    Internal(String),
}

/// A stateful interpreter running source against a persistent namespace.
#[async_trait]
pub trait Interpreter: Send + Sync {
    /// Run a block of source text. Namespace mutations persist across calls.
    async fn run(&self, source: &str) -> Result<ExecutionOutcome, InterpreterError>;

    /// Clear the namespace back to its initial pre-loaded state.
    async fn reset(&self) -> Result<(), InterpreterError>;
}
