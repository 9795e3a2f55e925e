//! Base tool trait and observation structures

use crate::error::ToolError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Trait for all tools
///
/// A tool is a named, described capability the model can invoke by name.
/// Implementations must be safe to call from concurrent executions.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Get the name of the tool (unique, stable identifier)
    fn name(&self) -> &str;

    /// Get the description of the tool (shown to the model)
    fn description(&self) -> &str;

    /// Invoke the tool with the given input
    async fn invoke(&self, input: &str) -> Result<Observation, ToolError>;
}

/// Result of one tool invocation, as fed back to the model
///
/// Dispatch failures are folded into an `Observation` too (with `error`
/// set), so a failed tool never aborts an execution: the model sees what
/// went wrong and can route around it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    /// Whether the invocation succeeded
    pub success: bool,

    /// Observation content (what the model gets to read)
    pub content: String,

    /// Optional structured data
    pub data: Option<serde_json::Value>,

    /// Invocation duration in milliseconds
    pub duration_ms: Option<u64>,

    /// The dispatch failure, when there was one
    pub error: Option<ToolError>,
}

impl Observation {
    /// Create a successful observation
    pub fn success<S: Into<String>>(content: S) -> Self {
        Self {
            success: true,
            content: content.into(),
            data: None,
            duration_ms: None,
            error: None,
        }
    }

    /// Create an observation for a failed dispatch
    pub fn failure(error: ToolError) -> Self {
        Self {
            success: false,
            content: error.to_string(),
            data: None,
            duration_ms: None,
            error: Some(error),
        }
    }

    /// Attach structured data
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = Some(data);
        self
    }

    /// Attach the invocation duration
    pub fn with_duration(mut self, duration_ms: u64) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }
}
