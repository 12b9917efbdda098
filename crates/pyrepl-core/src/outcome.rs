//! Result of running one snippet against the session namespace.

use serde::{Deserialize, Serialize};

/// Captured result of one execution.
///
/// Transient: it lives long enough to build a response and, when logging is
/// enabled, a transcript entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExecutionOutcome {
    /// Captured standard output.
    pub output: String,
    /// Captured standard error, including the rendered traceback when the
    /// snippet raised.
    pub error: String,
    /// Repr of a trailing bare expression, REPL style. A `None` result is
    /// not echoed.
    pub value: Option<String>,
    /// False when the snippet raised or failed to parse.
    pub success: bool,
}

impl ExecutionOutcome {
    /// Outcome of running nothing at all.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            success: true,
            ..Self::default()
        }
    }

    /// Failed outcome carrying only an error message.
    #[must_use]
    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            ..Self::default()
        }
    }
}
