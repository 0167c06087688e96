use crate::config::LedgerConfig;
use crate::error::{EditStep, LedgerError, Result};
use crate::llm::types::*;
use crate::llm::GenerationService;
use async_trait::async_trait;
use log::debug;
use reqwest::Client;
use std::time::Duration;

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";

/// Groq's OpenAI-compatible chat-completions endpoint.
#[derive(Clone)]
pub struct GroqClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: Option<f32>,
}

impl GroqClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: GROQ_BASE_URL.to_string(),
            temperature: None,
        }
    }

    /// Builds a client from the API key and model in `config`.
    pub fn from_config(config: &LedgerConfig) -> Result<Self> {
        let api_key = config
            .groq_api_key
            .clone()
            .ok_or_else(|| LedgerError::Config("groq_api_key is not set".to_string()))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(config.generation_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            api_key,
            model: config.groq_default_model.clone(),
            base_url: GROQ_BASE_URL.to_string(),
            temperature: None,
        })
    }

    /// Points the client at another OpenAI-compatible endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl GenerationService for GroqClient {
    async fn generate(&self, system: &str, user: &str) -> Result<String> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));

        let payload = ChatCompletionRequest {
            model: self.model.clone(),
            messages: vec![ChatMessage::system(system), ChatMessage::user(user)],
            temperature: self.temperature,
        };

        debug!("Sending chat completion request to {} ({})", url, self.model);
        let res = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| LedgerError::generation(EditStep::Generation, e.to_string()))?;
        let status = res.status();

        if !status.is_success() {
            let err_text = res.text().await.unwrap_or_default();
            return Err(LedgerError::generation(
                EditStep::Generation,
                format!("Groq API Error (status {}): {}", status, err_text),
            ));
        }

        let body: ChatCompletionResponse = res
            .json()
            .await
            .map_err(|e| LedgerError::generation(EditStep::Generation, e.to_string()))?;

        let text = body
            .choices
            .ok_or_else(|| LedgerError::generation(EditStep::Generation, "No choices returned"))?
            .into_iter()
            .next()
            .ok_or_else(|| LedgerError::generation(EditStep::Generation, "Empty choices list"))?
            .message
            .content
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(LedgerError::generation(
                EditStep::Generation,
                "Model returned an empty response",
            ));
        }

        Ok(text)
    }
}
