//! OpenAI-compatible completion client
//!
//! Calls any OpenAI-compatible chat endpoint via async_openai (configurable
//! base_url); the persona becomes the system message. Every call runs under a
//! hard timeout so the collaborator fails closed instead of hanging a turn.

use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
    ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, StopConfiguration,
};
use async_openai::Client;
use async_trait::async_trait;
use tokio::time::timeout;

use crate::core::error::{OrchestratorError, Result};
use crate::llm::{CompletionClient, GenerationParams};

/// Chat-completion client with a per-call deadline
pub struct OpenAiCompletion {
    client: Client<OpenAIConfig>,
    model: String,
    request_timeout: Duration,
}

impl OpenAiCompletion {
    pub fn new(
        base_url: Option<&str>,
        model: &str,
        api_key: Option<&str>,
        request_timeout_secs: u64,
    ) -> Self {
        let api_key = api_key
            .map(String::from)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
            .unwrap_or_else(|| "sk-placeholder".to_string());

        let config = if let Some(url) = base_url {
            OpenAIConfig::new().with_api_base(url).with_api_key(api_key)
        } else {
            OpenAIConfig::new().with_api_key(api_key)
        };

        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            request_timeout: Duration::from_secs(request_timeout_secs),
        }
    }

    fn build_messages(&self, prompt: &str, persona: &str) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut messages = Vec::with_capacity(2);
        if !persona.is_empty() {
            messages.push(ChatCompletionRequestMessage::System(
                ChatCompletionRequestSystemMessageArgs::default()
                    .content(persona.to_string())
                    .build()
                    .map_err(|e| OrchestratorError::CompletionFailure(e.to_string()))?,
            ));
        }
        messages.push(ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(prompt.to_string())
                .build()
                .map_err(|e| OrchestratorError::CompletionFailure(e.to_string()))?,
        ));
        Ok(messages)
    }
}

#[async_trait]
impl CompletionClient for OpenAiCompletion {
    async fn complete(
        &self,
        prompt: &str,
        persona: &str,
        params: &GenerationParams,
    ) -> Result<String> {
        let mut builder = CreateChatCompletionRequestArgs::default();
        builder
            .model(&self.model)
            .messages(self.build_messages(prompt, persona)?)
            .temperature(params.temperature)
            .max_tokens(u32::from(params.max_tokens));
        if !params.stop.is_empty() {
            builder.stop(StopConfiguration::StringArray(params.stop.clone()));
        }
        let request = builder
            .build()
            .map_err(|e| OrchestratorError::CompletionFailure(e.to_string()))?;

        let response = timeout(self.request_timeout, self.client.chat().create(request))
            .await
            .map_err(|_| OrchestratorError::CompletionFailure("request timed out".to_string()))?
            .map_err(|e| OrchestratorError::CompletionFailure(e.to_string()))?;

        let content = response
            .choices
            .first()
            .and_then(|c| c.message.content.clone())
            .unwrap_or_default();

        if content.trim().is_empty() {
            return Err(OrchestratorError::CompletionFailure(
                "empty completion".to_string(),
            ));
        }
        Ok(content)
    }
}
