//! Agent configuration structures and builder

use crate::error::{ConfigError, Result};
use crate::llm::ModelProvider;
use crate::memory::Memory;
use crate::parser::TieBreak;
use crate::tools::Tool;
use crate::trace::TraceRecorder;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Execution mode for the agent
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionMode {
    /// Step-by-step execution
    #[default]
    Standard,

    /// Autonomous execution. Currently treated the same as `Standard`;
    /// carried for config passthrough and forward compatibility.
    Yolo,
}

/// Bounded retry policy for model provider calls
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per model call, including the first
    pub max_attempts: u32,

    /// Backoff before the first retry; doubles on each subsequent one
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_backoff: Duration::from_millis(500),
        }
    }
}

/// Configuration for an agent
///
/// Immutable once an execution starts: the loop reads a snapshot and never
/// writes back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Maximum number of loop iterations per execution
    pub max_iterations: usize,

    /// Temperature hint passed to the model provider
    pub temperature: f32,

    /// Execution mode
    #[serde(default)]
    pub mode: ExecutionMode,

    /// Opaque passthrough metadata
    #[serde(default)]
    pub metadata: HashMap<String, String>,

    /// Maximum tokens per model response
    #[serde(default)]
    pub max_tokens: Option<u32>,

    /// Bounded wait per tool dispatch
    #[serde(default = "default_tool_timeout")]
    pub tool_timeout: Duration,

    /// Retry policy for provider calls
    #[serde(default)]
    pub retry: RetryPolicy,

    /// Policy when one response carries both a tool call and a final answer
    #[serde(default)]
    pub tie_break: TieBreak,
}

fn default_tool_timeout() -> Duration {
    Duration::from_secs(30)
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_iterations: 8,
            temperature: 0.7,
            mode: ExecutionMode::default(),
            metadata: HashMap::new(),
            max_tokens: None,
            tool_timeout: default_tool_timeout(),
            retry: RetryPolicy::default(),
            tie_break: TieBreak::default(),
        }
    }
}

impl AgentConfig {
    /// Validate the configuration
    ///
    /// Called before any execution; an invalid config never reaches the
    /// loop.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        if self.max_iterations == 0 {
            return Err(ConfigError::InvalidValue {
                field: "max_iterations".to_string(),
                value: "0".to_string(),
            });
        }

        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::InvalidValue {
                field: "temperature".to_string(),
                value: self.temperature.to_string(),
            });
        }

        if self.tool_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                field: "tool_timeout".to_string(),
                value: "0".to_string(),
            });
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_attempts".to_string(),
                value: "0".to_string(),
            });
        }

        Ok(())
    }
}

/// Builder for assembling an [`Agent`](crate::agent::Agent)
pub struct AgentBuilder {
    model: Arc<dyn ModelProvider>,
    config: AgentConfig,
    memory: Option<Arc<dyn Memory>>,
    recorder: Option<TraceRecorder>,
    tools: Vec<Arc<dyn Tool>>,
}

impl AgentBuilder {
    /// Create a new builder around a model provider
    pub fn new(model: Arc<dyn ModelProvider>) -> Self {
        Self {
            model,
            config: AgentConfig::default(),
            memory: None,
            recorder: None,
            tools: Vec::new(),
        }
    }

    /// Set the agent configuration
    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the iteration budget
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.config.max_iterations = max_iterations;
        self
    }

    /// Set the temperature hint
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Attach a memory port
    pub fn with_memory(mut self, memory: Arc<dyn Memory>) -> Self {
        self.memory = Some(memory);
        self
    }

    /// Attach a trace recorder
    pub fn with_trace_recorder(mut self, recorder: TraceRecorder) -> Self {
        self.recorder = Some(recorder);
        self
    }

    /// Register a tool
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Build the agent
    ///
    /// Fails with [`ConfigError`] for invalid config values or duplicate
    /// tool names; setup misuse is rejected before any execution starts.
    pub async fn build(self) -> Result<crate::agent::Agent> {
        crate::agent::Agent::assemble(
            self.model,
            self.config,
            self.tools,
            self.memory,
            self.recorder,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        assert!(AgentConfig::default().validate().is_ok());
    }

    #[test]
    fn zero_iterations_is_rejected() {
        let config = AgentConfig {
            max_iterations: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field, .. }) if field == "max_iterations"
        ));
    }

    #[test]
    fn out_of_range_temperature_is_rejected() {
        let config = AgentConfig {
            temperature: 2.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn config_round_trips_through_json() {
        let mut config = AgentConfig::default();
        config.metadata.insert("purpose".to_string(), "research".to_string());

        let json = serde_json::to_string(&config).unwrap();
        let back: AgentConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(back.max_iterations, config.max_iterations);
        assert_eq!(back.metadata.get("purpose").map(String::as_str), Some("research"));
        assert_eq!(back.mode, ExecutionMode::Standard);
    }
}
