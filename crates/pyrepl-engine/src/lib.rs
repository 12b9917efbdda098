//! Embedded Python interpreter engine.
//!
//! [`PythonSession`] owns the VM and the live namespace; [`EngineHandle`]
//! drives it from async code via a dedicated worker thread.

mod python;
mod worker;

pub use python::PythonSession;
pub use worker::EngineHandle;
