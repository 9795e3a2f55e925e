//! Execution trace recording and replay
//!
//! Tracing is a first-class deliverable here, not a log side-effect: every
//! execution returns its full reasoning trace, and the recorder can persist
//! traces for later inspection.

pub mod recorder;
pub mod step;

pub use recorder::{TraceArchive, TraceRecorder};
pub use step::{ExecutionTrace, Step, StepAction};
