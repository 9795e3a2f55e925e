//! Tool registry: registration, lookup, and bounded dispatch

use crate::error::{ConfigError, Result, ToolError};
use crate::tools::{Observation, Tool};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Name and description of a registered tool, for prompt construction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInfo {
    pub name: String,
    pub description: String,
}

/// Registry of the tools available to an agent
///
/// Tools are kept in registration order so tool listings (and therefore
/// prompts) are deterministic. Safe for concurrent dispatch from
/// independent executions.
pub struct ToolRegistry {
    tools: RwLock<Vec<Arc<dyn Tool>>>,
}

impl ToolRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(Vec::new()),
        }
    }

    /// Register a tool
    ///
    /// Names are unique: registering a second tool under an existing name
    /// fails with [`ConfigError::DuplicateTool`].
    pub async fn register(&self, tool: Arc<dyn Tool>) -> Result<()> {
        let mut tools = self.tools.write().await;

        if tools.iter().any(|t| t.name() == tool.name()) {
            return Err(ConfigError::DuplicateTool {
                name: tool.name().to_string(),
            }
            .into());
        }

        tools.push(tool);
        Ok(())
    }

    /// Get a tool by name
    pub async fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools
            .read()
            .await
            .iter()
            .find(|t| t.name() == name)
            .cloned()
    }

    /// List all registered tools, in registration order
    pub async fn list(&self) -> Vec<ToolInfo> {
        self.tools
            .read()
            .await
            .iter()
            .map(|t| ToolInfo {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    /// Number of registered tools
    pub async fn len(&self) -> usize {
        self.tools.read().await.len()
    }

    /// Whether the registry is empty
    pub async fn is_empty(&self) -> bool {
        self.tools.read().await.is_empty()
    }

    /// Invoke a tool under a bounded wait
    ///
    /// Never fails: an unknown name, a tool fault, or a timeout all come
    /// back as an error-kind [`Observation`] so the agent loop can record
    /// the outcome and keep going.
    pub async fn dispatch(&self, name: &str, input: &str, timeout: Duration) -> Observation {
        let Some(tool) = self.get(name).await else {
            return Observation::failure(ToolError::NotFound {
                name: name.to_string(),
            });
        };

        let started = Instant::now();
        let outcome = tokio::time::timeout(timeout, tool.invoke(input)).await;
        let duration_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(observation)) => observation.with_duration(duration_ms),
            Ok(Err(error)) => {
                tracing::warn!(tool = name, %error, "tool invocation failed");
                Observation::failure(normalize_tool_error(name, error)).with_duration(duration_ms)
            }
            Err(_) => {
                tracing::warn!(tool = name, timeout_ms = timeout.as_millis() as u64, "tool timed out");
                Observation::failure(ToolError::Timeout {
                    name: name.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                })
                .with_duration(duration_ms)
            }
        }
    }
}

/// Tools report faults however they like; the observation always names the
/// tool that produced them.
fn normalize_tool_error(name: &str, error: ToolError) -> ToolError {
    match error {
        ToolError::InvalidInput { message } => ToolError::ExecutionFailed {
            name: name.to_string(),
            message: format!("invalid input: {}", message),
        },
        ToolError::ExecutionFailed { message, .. } => ToolError::ExecutionFailed {
            name: name.to_string(),
            message,
        },
        other => other,
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}
