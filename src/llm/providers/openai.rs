//! OpenAI-compatible chat completions client

use crate::config::ModelSettings;
use crate::error::{Error, ProviderError};
use crate::llm::{CompletionOptions, ModelProvider};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// System message pinning the response format.
///
/// The agent's parser expects one JSON object per response; stating that up
/// front measurably reduces unparsable output from chat-tuned models.
const SYSTEM_MESSAGE: &str = "You are a helpful AI assistant that always responds with a single \
     valid JSON object. Your responses are either tool usage requests or \
     final answers. Always maintain the specified JSON structure.";

/// Client for OpenAI-compatible chat completion APIs
///
/// Works against api.openai.com and any endpoint speaking the same wire
/// format (proxies, local inference servers).
pub struct OpenAiClient {
    client: Client,
    settings: ModelSettings,
}

impl OpenAiClient {
    /// Create a new client from resolved model settings
    pub fn new(settings: ModelSettings) -> Result<Self, Error> {
        settings.validate()?;

        Ok(Self {
            client: Client::new(),
            settings,
        })
    }

    fn build_request(&self, prompt: &str, options: &CompletionOptions) -> ChatRequest {
        let model = options
            .model_hint
            .clone()
            .unwrap_or_else(|| self.settings.model.clone());

        ChatRequest {
            model,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: SYSTEM_MESSAGE.to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: prompt.to_string(),
                },
            ],
            temperature: options.temperature.or(self.settings.params.temperature),
            max_tokens: options.max_tokens.or(self.settings.params.max_tokens),
            top_p: self.settings.params.top_p,
            stop: self.settings.params.stop_sequences.clone(),
            response_format: Some(ResponseFormat {
                format_type: "json_object".to_string(),
            }),
        }
    }
}

#[async_trait]
impl ModelProvider for OpenAiClient {
    async fn complete(
        &self,
        prompt: &str,
        options: &CompletionOptions,
    ) -> Result<String, ProviderError> {
        let request = self.build_request(prompt, options);

        let url = format!(
            "{}/chat/completions",
            self.settings.base_url.trim_end_matches('/')
        );

        let mut builder = self
            .client
            .post(&url)
            .bearer_auth(&self.settings.api_key)
            .header("content-type", "application/json");

        for (key, value) in &self.settings.headers {
            builder = builder.header(key, value);
        }

        let response = builder
            .json(&request)
            .send()
            .await
            .map_err(|e| ProviderError::Network {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                401 | 403 => ProviderError::Authentication { message },
                429 => ProviderError::RateLimit,
                code => ProviderError::Api {
                    status: code,
                    message,
                },
            });
        }

        let chat_response: ChatResponse =
            response
                .json()
                .await
                .map_err(|e| ProviderError::MalformedResponse {
                    message: format!("Failed to parse response body: {}", e),
                })?;

        let choice =
            chat_response
                .choices
                .into_iter()
                .next()
                .ok_or_else(|| ProviderError::MalformedResponse {
                    message: "Response contained no choices".to_string(),
                })?;

        if let Some(usage) = chat_response.usage {
            tracing::debug!(
                prompt_tokens = usage.prompt_tokens,
                completion_tokens = usage.completion_tokens,
                "completion received"
            );
        }

        Ok(choice.message.content.unwrap_or_default())
    }

    fn model_name(&self) -> &str {
        &self.settings.model
    }

    fn provider_name(&self) -> &str {
        "openai"
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: u32,
    completion_tokens: u32,
}
