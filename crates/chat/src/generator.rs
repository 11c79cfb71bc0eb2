//! Generation backend client
//!
//! The engine talks to any chat-completions compatible backend through the
//! `ChatGenerator` trait; tests substitute scripted implementations.

use async_trait::async_trait;
use medsearch_common::{config::GenerationConfig, errors::Result, AppError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// One message on the generation backend wire
#[derive(Debug, Clone, Serialize)]
pub struct GenerationMessage {
    pub role: String,
    pub content: String,
}

impl GenerationMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// Generation backend contract
#[async_trait]
pub trait ChatGenerator: Send + Sync {
    /// Produce a completion for the given system prompt and conversation
    async fn generate(&self, system: &str, messages: &[GenerationMessage]) -> Result<String>;

    /// Model identifier, used as a metrics label
    fn model_name(&self) -> &str;
}

/// Client for an OpenAI-compatible chat-completions endpoint
pub struct OpenAiGenerator {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    timeout_secs: u64,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [GenerationMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiGenerator {
    /// Create a new client from configuration
    ///
    /// Fails when no API key is configured; the chat surface cannot run
    /// without a generation backend.
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = config.api_key.clone().ok_or_else(|| AppError::Configuration {
            message: "generation.api_key is required for the chat surface".to_string(),
        })?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| AppError::Configuration {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            client,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
            timeout_secs: config.timeout_secs,
        })
    }
}

#[async_trait]
impl ChatGenerator for OpenAiGenerator {
    async fn generate(&self, system: &str, messages: &[GenerationMessage]) -> Result<String> {
        let mut wire = Vec::with_capacity(messages.len() + 1);
        wire.push(GenerationMessage::new("system", system));
        wire.extend_from_slice(messages);

        let request = CompletionRequest {
            model: &self.model,
            messages: &wire,
            temperature: 0.2,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.api_base))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    AppError::GenerationTimeout {
                        timeout_secs: self.timeout_secs,
                    }
                } else {
                    AppError::GenerationError {
                        message: e.to_string(),
                    }
                }
            })?;

        if !response.status().is_success() {
            return Err(AppError::GenerationError {
                message: format!("HTTP {}", response.status().as_u16()),
            });
        }

        let completion: CompletionResponse =
            response.json().await.map_err(|e| AppError::GenerationError {
                message: format!("Malformed completion response: {}", e),
            })?;

        completion
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .filter(|content| !content.trim().is_empty())
            .ok_or_else(|| AppError::GenerationError {
                message: "Backend returned an empty completion".to_string(),
            })
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
