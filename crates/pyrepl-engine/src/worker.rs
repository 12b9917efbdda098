//! Worker thread owning the interpreter.

use std::thread;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use pyrepl_core::{ExecutionOutcome, Interpreter, InterpreterError};

use crate::python::PythonSession;

enum EngineCommand {
    Execute {
        source: String,
        reply: oneshot::Sender<Result<ExecutionOutcome, InterpreterError>>,
    },
    Reset {
        reply: oneshot::Sender<()>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Async handle to the interpreter worker thread.
///
/// RustPython values are not `Send`, so a dedicated thread owns the
/// [`PythonSession`] and commands cross over a channel. The channel also
/// serializes interpreter access mechanically; admission control lives a
/// level up, in the session coordinator.
#[derive(Clone)]
pub struct EngineHandle {
    sender: mpsc::UnboundedSender<EngineCommand>,
}

impl EngineHandle {
    /// Spawn the worker and wait for the interpreter to come up.
    ///
    /// # Errors
    /// Returns [`InterpreterError::Init`] when the thread cannot start or
    /// dies while initializing the VM.
    pub async fn spawn(preload: Vec<String>) -> Result<Self, InterpreterError> {
        let (sender, mut receiver) = mpsc::unbounded_channel();
        let (ready_tx, ready_rx) = oneshot::channel();

        thread::Builder::new()
            .name("pyrepl-engine".to_owned())
            .spawn(move || {
                let mut session = PythonSession::new(preload);
                if ready_tx.send(()).is_err() {
                    return;
                }
                tracing::debug!("engine worker started");
                while let Some(command) = receiver.blocking_recv() {
                    match command {
                        EngineCommand::Execute { source, reply } => {
                            let _ = reply.send(session.run(&source));
                        }
                        EngineCommand::Reset { reply } => {
                            session.reset();
                            let _ = reply.send(());
                        }
                        EngineCommand::Shutdown { reply } => {
                            let _ = reply.send(());
                            break;
                        }
                    }
                }
                tracing::debug!("engine worker stopped");
            })
            .map_err(|err| InterpreterError::Init(err.to_string()))?;

        ready_rx
            .await
            .map_err(|_| InterpreterError::Init("engine worker died during startup".to_owned()))?;
        Ok(Self { sender })
    }

    /// Stop the worker thread once queued commands have drained.
    pub async fn shutdown(&self) -> Result<(), InterpreterError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(EngineCommand::Shutdown { reply })
            .map_err(|_| InterpreterError::Unavailable)?;
        rx.await.map_err(|_| InterpreterError::Unavailable)
    }
}

#[async_trait]
impl Interpreter for EngineHandle {
    async fn run(&self, source: &str) -> Result<ExecutionOutcome, InterpreterError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(EngineCommand::Execute {
                source: source.to_owned(),
                reply,
            })
            .map_err(|_| InterpreterError::Unavailable)?;
        rx.await.map_err(|_| InterpreterError::Unavailable)?
    }

    async fn reset(&self) -> Result<(), InterpreterError> {
        let (reply, rx) = oneshot::channel();
        self.sender
            .send(EngineCommand::Reset { reply })
            .map_err(|_| InterpreterError::Unavailable)?;
        rx.await.map_err(|_| InterpreterError::Unavailable)
    }
}
