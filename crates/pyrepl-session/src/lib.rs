//! Session state, admission control, and the transcript log.
//!
//! One server process owns one session. The [`Coordinator`] serializes
//! access to the interpreter behind a busy gate: overlapping requests are
//! rejected immediately, never queued.

mod coordinator;
mod gate;
mod transcript;

pub use coordinator::{Coordinator, SessionError};
pub use gate::{ExecutionGate, GateGuard};
pub use transcript::TranscriptWriter;
