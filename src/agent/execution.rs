//! Agent execution result structures

use crate::trace::ExecutionTrace;
use serde::{Deserialize, Serialize};

/// Why an execution reached its terminal state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TerminatedReason {
    /// The model produced a final answer
    Answered,

    /// The iteration budget ran out before an answer
    BudgetExhausted,

    /// The model provider failed beyond recovery
    FatalError,

    /// The caller cancelled the execution
    Cancelled,
}

/// Result of one `execute()` call
///
/// Recoverable trouble never surfaces as an error from `execute()`; it is
/// encoded here, in the terminal reason and the trace.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    /// Final answer content; best-effort partial content when the budget
    /// ran out, empty on fatal error or cancellation
    pub content: String,

    /// The full reasoning trace of this execution
    pub trace: ExecutionTrace,

    /// Number of iterations consumed
    pub iterations_used: usize,

    /// The terminal state reached
    pub terminated: TerminatedReason,

    /// Total execution time in milliseconds
    pub duration_ms: u64,

    /// Description of the fatal condition, when `terminated` is `FatalError`
    pub error: Option<String>,
}

impl ExecutionResult {
    /// Whether the execution produced a final answer
    pub fn is_answered(&self) -> bool {
        self.terminated == TerminatedReason::Answered
    }
}
