//! Text generation through a hosted chat model.

use crate::config::{Credentials, Settings};
use crate::error::{Result, RoadSafeError};
use crate::openai::create_client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs};
use async_openai::Client;
use async_trait::async_trait;
use tracing::{debug, instrument};

/// Turns a prompt into model text.
#[async_trait]
pub trait Generator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Generator backed by an OpenAI-compatible `/chat/completions` endpoint.
///
/// The prompt is sent as a single user message. There is no streaming and no retry.
pub struct OpenAIGenerator {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
}

impl OpenAIGenerator {
    pub fn new(client: Client<OpenAIConfig>, model: &str, temperature: f32) -> Self {
        Self {
            client,
            model: model.to_string(),
            temperature,
        }
    }

    /// Create a generator for the configured provider and chat model.
    pub fn from_settings(settings: &Settings, credentials: &Credentials) -> Result<Self> {
        let client = create_client(&settings.provider, credentials)?;
        Ok(Self::new(client, &settings.rag.model, settings.rag.temperature))
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

#[async_trait]
impl Generator for OpenAIGenerator {
    #[instrument(skip(self, prompt), fields(model = %self.model, prompt_chars = prompt.len()))]
    async fn generate(&self, prompt: &str) -> Result<String> {
        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(prompt)
            .build()
            .map_err(|e| RoadSafeError::Rag(e.to_string()))?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![message.into()])
            .temperature(self.temperature)
            .build()
            .map_err(|e| RoadSafeError::Rag(e.to_string()))?;

        let response = self.client.chat().create(request).await.map_err(|e| {
            RoadSafeError::OpenAI(format!("Failed to generate response: {}", e))
        })?;

        let answer = response
            .choices
            .first()
            .and_then(|c| c.message.content.as_ref())
            .ok_or_else(|| RoadSafeError::Rag("Empty response from LLM".to_string()))?
            .clone();

        debug!("Generated {} characters", answer.len());
        Ok(answer)
    }
}
