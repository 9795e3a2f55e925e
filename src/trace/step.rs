//! Step and trace structures

use crate::tools::Observation;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened on one loop iteration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StepAction {
    /// The model requested a tool invocation
    ToolCall {
        tool_name: String,
        tool_input: String,
    },

    /// The model produced its final answer
    FinalAnswer { content: String },

    /// The model's output could not be parsed into a decision
    ParseFailure { message: String },
}

/// One loop iteration's record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    /// 1-based iteration index within the execution
    pub index: usize,

    /// Reasoning text the model emitted alongside its decision.
    /// For parse failures this holds the raw output, so the trace stays
    /// auditable even when the model misbehaves.
    pub thought: String,

    /// The action taken this iteration
    pub action: StepAction,

    /// The observation received; absent for a final answer
    pub observation: Option<Observation>,

    /// When the iteration started
    pub timestamp: DateTime<Utc>,

    /// How long the iteration took in milliseconds
    pub duration_ms: u64,
}

/// The ordered record of one `execute()` call
///
/// Append-only while the execution runs, owned exclusively by that call,
/// immutable once returned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionTrace {
    /// Unique identifier for this execution
    pub execution_id: String,

    /// The task this execution worked on
    pub task: String,

    /// When the execution started
    pub started_at: DateTime<Utc>,

    /// When the execution reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,

    /// The steps, strictly ordered by iteration index
    pub steps: Vec<Step>,
}

impl ExecutionTrace {
    /// Start a fresh trace for one execution
    pub fn new<S: Into<String>>(execution_id: S, task: S) -> Self {
        Self {
            execution_id: execution_id.into(),
            task: task.into(),
            started_at: Utc::now(),
            completed_at: None,
            steps: Vec::new(),
        }
    }

    /// Number of recorded steps
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Whether no steps were recorded
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// The most recent observation, if any step produced one
    pub fn last_observation(&self) -> Option<&Observation> {
        self.steps.iter().rev().find_map(|s| s.observation.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_round_trips_through_json() {
        let mut trace = ExecutionTrace::new("exec-1", "what is 2+2");
        trace.steps.push(Step {
            index: 1,
            thought: "simple arithmetic".to_string(),
            action: StepAction::FinalAnswer {
                content: "4".to_string(),
            },
            observation: None,
            timestamp: Utc::now(),
            duration_ms: 3,
        });
        trace.completed_at = Some(Utc::now());

        let json = serde_json::to_string(&trace).unwrap();
        let back: ExecutionTrace = serde_json::from_str(&json).unwrap();
        assert_eq!(trace, back);
    }

    #[test]
    fn last_observation_skips_answer_steps() {
        let mut trace = ExecutionTrace::new("exec-2", "task");
        trace.steps.push(Step {
            index: 1,
            thought: String::new(),
            action: StepAction::ToolCall {
                tool_name: "echo".to_string(),
                tool_input: "hi".to_string(),
            },
            observation: Some(Observation::success("echo: hi")),
            timestamp: Utc::now(),
            duration_ms: 1,
        });
        trace.steps.push(Step {
            index: 2,
            thought: String::new(),
            action: StepAction::FinalAnswer {
                content: "done".to_string(),
            },
            observation: None,
            timestamp: Utc::now(),
            duration_ms: 1,
        });

        assert_eq!(trace.last_observation().unwrap().content, "echo: hi");
    }
}
