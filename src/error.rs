//! Error types and handling for reagent

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for reagent operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for reagent
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Model provider errors
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    /// Tool dispatch errors
    #[error("Tool error: {0}")]
    Tool(#[from] ToolError),

    /// Memory port errors
    #[error("Memory error: {0}")]
    Memory(#[from] MemoryError),

    /// Model output parsing errors
    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    /// Trace recording errors
    #[error("Trace error: {0}")]
    Trace(#[from] TraceError),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Prompt template errors
    #[error("Template error: {0}")]
    Template(String),
}

/// Configuration-specific errors
///
/// These reject a setup before any execution starts; nothing in this
/// enum is recoverable at run time.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("A tool named '{name}' is already registered")]
    DuplicateTool { name: String },

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("Invalid value for field '{field}': {value}")]
    InvalidValue { field: String, value: String },
}

/// Model provider errors
#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {message}")]
    Network { message: String },

    #[error("Malformed provider response: {message}")]
    MalformedResponse { message: String },
}

impl ProviderError {
    /// Whether the agent loop may retry the request.
    ///
    /// Transient conditions (throttling, transport faults, server-side 5xx)
    /// are retryable; authentication and client-side request errors are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            ProviderError::RateLimit => true,
            ProviderError::Network { .. } => true,
            ProviderError::Api { status, .. } => *status >= 500,
            ProviderError::Authentication { .. } => false,
            ProviderError::MalformedResponse { .. } => false,
        }
    }
}

/// Tool dispatch errors
///
/// Serializable so the registry can fold a failed dispatch into the step's
/// observation instead of aborting the execution.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ToolError {
    #[error("Tool not found: {name}")]
    NotFound { name: String },

    #[error("Tool execution failed: {name} - {message}")]
    ExecutionFailed { name: String, message: String },

    #[error("Tool timed out after {timeout_ms}ms: {name}")]
    Timeout { name: String, timeout_ms: u64 },

    #[error("Invalid tool input: {message}")]
    InvalidInput { message: String },
}

/// Memory port errors
///
/// Always non-fatal to an execution: the loop degrades to no-memory mode.
#[derive(Error, Debug)]
pub enum MemoryError {
    #[error("Memory backend unavailable: {message}")]
    Unavailable { message: String },
}

/// Model output parsing errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("No recognizable tool call or final answer in model output")]
    Unrecognized,

    #[error("Action marker present but tool name is empty")]
    MissingToolName,
}

/// Trace recording errors
#[derive(Error, Debug)]
pub enum TraceError {
    #[error("Failed to record trace: {message}")]
    RecordingFailed { message: String },

    #[error("Failed to load trace: {path}")]
    LoadFailed { path: String },

    #[error("Invalid trace format")]
    InvalidFormat,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn provider_retryability_classification() {
        assert!(ProviderError::RateLimit.is_retryable());
        assert!(ProviderError::Network {
            message: "connection reset".to_string()
        }
        .is_retryable());
        assert!(ProviderError::Api {
            status: 503,
            message: "overloaded".to_string()
        }
        .is_retryable());

        assert!(!ProviderError::Api {
            status: 400,
            message: "bad request".to_string()
        }
        .is_retryable());
        assert!(!ProviderError::Authentication {
            message: "bad key".to_string()
        }
        .is_retryable());
        assert!(!ProviderError::MalformedResponse {
            message: "no choices".to_string()
        }
        .is_retryable());
    }

    #[test]
    fn tool_error_round_trips_through_json() {
        let err = ToolError::Timeout {
            name: "search".to_string(),
            timeout_ms: 30_000,
        };
        let json = serde_json::to_string(&err).unwrap();
        let back: ToolError = serde_json::from_str(&json).unwrap();
        assert_eq!(err, back);
    }
}
