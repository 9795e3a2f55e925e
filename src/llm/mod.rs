//! Model port abstraction and provider implementations

pub mod provider;
pub mod providers;

pub use provider::{CompletionOptions, ModelProvider};
pub use providers::OpenAiClient;
