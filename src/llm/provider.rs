//! Model provider trait and request options

use crate::error::ProviderError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Trait for model providers (the model port)
///
/// One call, one completion: providers are stateless per call and hold no
/// conversation. Retry policy lives in the agent loop, not here, so behavior
/// is uniform across providers.
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Produce a completion for the given prompt
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, ProviderError>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the provider name
    fn provider_name(&self) -> &str;
}

/// Per-request options for a completion
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CompletionOptions {
    /// Temperature for generation
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,

    /// Override the provider's configured model for this request
    pub model_hint: Option<String>,
}
