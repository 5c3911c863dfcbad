
use anyhow::{Context, anyhow};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{ChatMessage, ChatModel};
use crate::config::Config;
use crate::openai::OpenAiClient;
use crate::{RagError, Result};

/// Chat model backed by the `/chat/completions` endpoint
#[derive(Debug, Clone)]
pub struct OpenAiChat {
    client: OpenAiClient,
    model: String,
}

#[derive(Debug, Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ResponseMessage {
    content: Option<String>,
}

impl OpenAiChat {
    #[inline]
    pub fn new(client: OpenAiClient, config: &Config) -> Self {
        Self {
            client,
            model: config.chat.model.clone(),
        }
    }

    #[inline]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[inline]
    pub fn model(&self) -> &str {
        &self.model
    }

    fn complete(&self, messages: &[ChatMessage]) -> anyhow::Result<String> {
        let request = CompletionRequest {
            model: &self.model,
            messages,
        };

        let response_text = self
            .client
            .post_json("chat/completions", &request)
            .context("Chat completion request failed")?;

        parse_completion(&response_text)
    }
}

fn parse_completion(body: &str) -> anyhow::Result<String> {
    let response: CompletionResponse =
        serde_json::from_str(body).context("Failed to parse chat completion response")?;

    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| anyhow!("Chat completion response contained no message"))
}

impl ChatModel for OpenAiChat {
    fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        debug!("Requesting completion from {} with {} messages", self.model, messages.len());

        self.complete(messages)
            .map_err(|e| RagError::GenerationProvider(format!("{:#}", e)))
    }
}
