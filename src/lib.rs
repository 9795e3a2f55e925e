//! # reagent
//!
//! A reasoning-and-acting agent loop for language models.
//!
//! An [`Agent`] repeatedly queries a model, interprets the output as either
//! a tool invocation or a final answer, executes the requested tool, folds
//! the observation back into context, and repeats until an answer is
//! produced or the iteration budget is exhausted. Model providers, tools,
//! and memory backends plug in through traits; every execution returns a
//! full reasoning trace.

// Core modules
pub mod agent;
pub mod config;
pub mod error;
pub mod llm;
pub mod memory;
pub mod parser;
pub mod tools;
pub mod trace;

// Re-export commonly used types
pub use agent::{
    Agent, AgentBuilder, AgentConfig, ExecutionMode, ExecutionResult, RetryPolicy,
    TerminatedReason,
};
pub use config::{ModelParams, ModelSettings};
pub use error::{Error, Result};
pub use llm::{CompletionOptions, ModelProvider, OpenAiClient};
pub use memory::{InMemoryStore, Memory};
pub use parser::{parse, parse_with_policy, Decision, TieBreak};
pub use tools::{Observation, Tool, ToolInfo, ToolRegistry};
pub use trace::{ExecutionTrace, Step, StepAction, TraceRecorder};

#[cfg(feature = "redis-memory")]
pub use memory::RedisMemory;

/// Current version of the reagent library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize tracing for the library
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();
}

/// Initialize tracing with a specific debug mode
pub fn init_tracing_with_debug(debug: bool) {
    let filter = if debug { "debug" } else { "info" };

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(filter))
        .init();
}
