//! Admission control and execution orchestration for the single session.

use chrono::{DateTime, Local};
use uuid::Uuid;

use pyrepl_core::{ExecutionOutcome, ExecutionRequest, Interpreter, InterpreterError};

use crate::gate::ExecutionGate;
use crate::transcript::TranscriptWriter;

/// Coordination error.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Server is busy executing previous code")]
    Busy,
    #[error(transparent)]
    Interpreter(#[from] InterpreterError),
}

/// The session: one interpreter, one busy gate, an optional transcript.
///
/// Owned state is explicit rather than process-global so tests can stand up
/// independent sessions side by side.
pub struct Coordinator<I>
where
    I: Interpreter,
{
    id: Uuid,
    created_at: DateTime<Local>,
    interpreter: I,
    gate: ExecutionGate,
    transcript: Option<TranscriptWriter>,
}

impl<I> Coordinator<I>
where
    I: Interpreter,
{
    #[must_use]
    pub fn new(interpreter: I, transcript: Option<TranscriptWriter>) -> Self {
        Self {
            id: Uuid::new_v4(),
            created_at: Local::now(),
            interpreter,
            gate: ExecutionGate::new(),
            transcript,
        }
    }

    #[must_use]
    pub fn id(&self) -> Uuid {
        self.id
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Local> {
        self.created_at
    }

    /// Whether an execution or reset currently holds the gate.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.gate.is_busy()
    }

    /// Run one request to completion and return its outcome.
    ///
    /// An empty request short-circuits to an empty successful outcome
    /// without contending for the gate or reaching the interpreter.
    ///
    /// # Errors
    /// [`SessionError::Busy`] when another execution or reset is in flight;
    /// [`SessionError::Interpreter`] when the engine itself has failed.
    pub async fn execute(
        &self,
        request: &ExecutionRequest,
    ) -> Result<ExecutionOutcome, SessionError> {
        let source = request.source();
        if source.trim().is_empty() {
            return Ok(ExecutionOutcome::empty());
        }

        let _guard = self.gate.try_acquire().ok_or(SessionError::Busy)?;
        tracing::info!("executing {} line(s)", request.lines().len());
        tracing::debug!(source = %source, "admitted");

        let outcome = self.interpreter.run(&source).await?;
        if !outcome.success {
            tracing::warn!("execution failed: {}", outcome.error.trim());
        }
        // recorded while the gate is still held, so entries keep admission order
        if let Some(transcript) = &self.transcript {
            transcript.record(request.lines(), &outcome);
        }
        Ok(outcome)
    }

    /// Clear the namespace. Identical admission discipline to [`execute`]:
    /// resetting under a running execution is unsafe, so a busy gate means
    /// rejection, not waiting.
    ///
    /// [`execute`]: Coordinator::execute
    ///
    /// # Errors
    /// [`SessionError::Busy`] or [`SessionError::Interpreter`], as above.
    pub async fn reset(&self) -> Result<(), SessionError> {
        let _guard = self.gate.try_acquire().ok_or(SessionError::Busy)?;
        self.interpreter.reset().await?;
        tracing::info!("cleared REPL scope");
        if let Some(transcript) = &self.transcript {
            transcript.record_reset();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use async_trait::async_trait;
    use tokio::sync::Semaphore;

    use super::*;

    /// Interpreter double that parks inside `run` until a permit arrives.
    struct GatedInterpreter {
        runs: Arc<AtomicUsize>,
        permits: Arc<Semaphore>,
    }

    #[async_trait]
    impl Interpreter for GatedInterpreter {
        async fn run(&self, _source: &str) -> Result<ExecutionOutcome, InterpreterError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let _permit = self.permits.acquire().await;
            Ok(ExecutionOutcome::empty())
        }

        async fn reset(&self) -> Result<(), InterpreterError> {
            Ok(())
        }
    }

    struct FailingInterpreter;

    #[async_trait]
    impl Interpreter for FailingInterpreter {
        async fn run(&self, _source: &str) -> Result<ExecutionOutcome, InterpreterError> {
            Err(InterpreterError::Unavailable)
        }

        async fn reset(&self) -> Result<(), InterpreterError> {
            Err(InterpreterError::Unavailable)
        }
    }

    fn request(line: &str) -> ExecutionRequest {
        ExecutionRequest::new(vec![line.to_owned()])
    }

    #[tokio::test]
    async fn overlapping_execute_and_reset_are_rejected() {
        let runs = Arc::new(AtomicUsize::new(0));
        let permits = Arc::new(Semaphore::new(0));
        let coordinator = Arc::new(Coordinator::new(
            GatedInterpreter {
                runs: Arc::clone(&runs),
                permits: Arc::clone(&permits),
            },
            None,
        ));

        let in_flight = {
            let coordinator = Arc::clone(&coordinator);
            tokio::spawn(async move { coordinator.execute(&request("x = 1")).await })
        };
        while !coordinator.is_busy() {
            tokio::task::yield_now().await;
        }

        assert!(matches!(
            coordinator.execute(&request("y = 2")).await,
            Err(SessionError::Busy)
        ));
        assert!(matches!(coordinator.reset().await, Err(SessionError::Busy)));
        // the rejected calls never reached the interpreter
        assert_eq!(runs.load(Ordering::SeqCst), 1);

        permits.add_permits(1);
        let outcome = in_flight.await.expect("task completes").expect("admitted run");
        assert!(outcome.success);

        // gate released: the next call is admitted
        permits.add_permits(1);
        assert!(coordinator.execute(&request("z = 3")).await.is_ok());
    }

    #[tokio::test]
    async fn interpreter_failure_still_releases_the_gate() {
        let coordinator = Coordinator::new(FailingInterpreter, None);

        let first = coordinator.execute(&request("x")).await;
        assert!(matches!(first, Err(SessionError::Interpreter(_))));
        assert!(!coordinator.is_busy());

        // a busy error would mean the guard leaked; we expect the engine
        // failure again instead
        let second = coordinator.execute(&request("x")).await;
        assert!(matches!(second, Err(SessionError::Interpreter(_))));
    }

    #[tokio::test]
    async fn empty_request_bypasses_gate_and_interpreter() {
        let runs = Arc::new(AtomicUsize::new(0));
        let permits = Arc::new(Semaphore::new(0));
        let coordinator = Coordinator::new(
            GatedInterpreter {
                runs: Arc::clone(&runs),
                permits,
            },
            None,
        );

        let outcome = coordinator
            .execute(&ExecutionRequest::new(vec!["   ".into(), String::new()]))
            .await
            .expect("empty request succeeds");
        assert!(outcome.success);
        assert!(outcome.output.is_empty());
        assert_eq!(runs.load(Ordering::SeqCst), 0);
        assert!(!coordinator.is_busy());
    }

    #[tokio::test]
    async fn distinct_sessions_do_not_share_a_gate() {
        let permits = Arc::new(Semaphore::new(0));
        let runs = Arc::new(AtomicUsize::new(0));
        let first = Arc::new(Coordinator::new(
            GatedInterpreter {
                runs: Arc::clone(&runs),
                permits: Arc::clone(&permits),
            },
            None,
        ));
        let second = Coordinator::new(FailingInterpreter, None);

        let in_flight = {
            let first = Arc::clone(&first);
            tokio::spawn(async move { first.execute(&request("a")).await })
        };
        while !first.is_busy() {
            tokio::task::yield_now().await;
        }

        // the second session answers on its own terms while the first is busy
        assert!(matches!(
            second.execute(&request("b")).await,
            Err(SessionError::Interpreter(_))
        ));

        permits.add_permits(1);
        in_flight.await.expect("task completes").expect("admitted run");
    }
}
