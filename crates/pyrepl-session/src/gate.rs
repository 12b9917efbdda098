//! The busy gate: single-admission control for the shared interpreter.

use std::sync::atomic::{AtomicBool, Ordering};

/// Mutual-exclusion flag guarding the interpreter.
///
/// `try_acquire` never waits. An admitted caller holds the returned guard
/// for the duration of the critical section; the flag clears when the guard
/// drops, whichever way the execution exits.
#[derive(Debug, Default)]
pub struct ExecutionGate {
    busy: AtomicBool,
}

impl ExecutionGate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Attempt admission. Returns `None` without waiting when an execution
    /// is already in flight.
    #[must_use]
    pub fn try_acquire(&self) -> Option<GateGuard<'_>> {
        self.busy
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| GateGuard { gate: self })
    }

    /// Whether an execution currently holds the gate.
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::Acquire)
    }
}

/// Admission token; dropping it releases the gate.
#[derive(Debug)]
pub struct GateGuard<'a> {
    gate: &'a ExecutionGate,
}

impl Drop for GateGuard<'_> {
    fn drop(&mut self) {
        self.gate.busy.store(false, Ordering::Release);
    }
}
