use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, error};

use shared_config::AppConfig;

use crate::models::{ChatCompletionRequest, ChatCompletionResponse, ChatMessage, NoteGenerationError};

const TEMPERATURE: f64 = 0.3;

/// Single-turn text completion.
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, NoteGenerationError>;
}

/// Groq's OpenAI-compatible chat completions endpoint.
pub struct GroqClient {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GroqClient {
    pub fn new(config: &AppConfig) -> Result<Self, NoteGenerationError> {
        if !config.is_llm_configured() {
            return Err(NoteGenerationError::NotConfigured);
        }

        Ok(Self {
            client: Client::new(),
            api_key: config.groq_api_key.clone(),
            base_url: config.groq_base_url.trim_end_matches('/').to_string(),
            model: config.groq_model.clone(),
        })
    }
}

#[async_trait]
impl CompletionProvider for GroqClient {
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, NoteGenerationError> {
        let url = format!("{}/chat/completions", self.base_url);
        let request = ChatCompletionRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            temperature: TEMPERATURE,
            max_tokens,
        };

        debug!("Requesting completion from {} ({})", url, self.model);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&request)
            .send()
            .await
            .map_err(|e| NoteGenerationError::CompletionError(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| NoteGenerationError::CompletionError(e.to_string()))?;

        if !status.is_success() {
            error!("Groq completion failed: {} - {}", status, body);
            return Err(NoteGenerationError::CompletionError(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let parsed: ChatCompletionResponse = serde_json::from_str(&body).map_err(|e| {
            NoteGenerationError::CompletionError(format!("Failed to parse completion: {}", e))
        })?;

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| NoteGenerationError::CompletionError("Completion had no content".to_string()))
    }
}
