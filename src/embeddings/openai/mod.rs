
use anyhow::Context;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Embedding, EmbeddingProvider};
use crate::config::Config;
use crate::openai::OpenAiClient;
use crate::{RagError, Result};

/// Embedding provider backed by the `/embeddings` endpoint
#[derive(Debug, Clone)]
pub struct OpenAiEmbeddings {
    client: OpenAiClient,
    model: String,
    batch_size: usize,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

impl OpenAiEmbeddings {
    #[inline]
    pub fn new(client: OpenAiClient, config: &Config) -> Self {
        Self {
            client,
            model: config.embedding.model.clone(),
            batch_size: (config.embedding.batch_size as usize).max(1),
        }
    }

    #[inline]
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    #[inline]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    fn embed_single_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Embedding>> {
        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };

        let response_text = self
            .client
            .post_json("embeddings", &request)
            .context("Failed to generate embeddings")?;

        let mut response: EmbedResponse = serde_json::from_str(&response_text)
            .context("Failed to parse embedding response")?;

        if response.data.len() != texts.len() {
            return Err(anyhow::anyhow!(
                "Mismatch between request and response counts: {} vs {}",
                texts.len(),
                response.data.len()
            ));
        }

        response.data.sort_by_key(|item| item.index);

        Ok(response
            .data
            .into_iter()
            .map(|item| item.embedding)
            .collect())
    }
}

impl EmbeddingProvider for OpenAiEmbeddings {
    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Embedding>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!("Generating embeddings for {} texts", texts.len());

        let mut embeddings = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let batch_embeddings = self
                .embed_single_batch(batch)
                .with_context(|| format!("Failed to process batch of {} texts", batch.len()))
                .map_err(|e| RagError::EmbeddingProvider(format!("{:#}", e)))?;

            embeddings.extend(batch_embeddings);
        }

        debug!("Generated {} embeddings total", embeddings.len());
        Ok(embeddings)
    }

    fn embed_one(&self, text: &str) -> Result<Embedding> {
        let input = [text.to_string()];

        self.embed_single_batch(&input)
            .map_err(|e| RagError::EmbeddingProvider(format!("{:#}", e)))?
            .pop()
            .ok_or_else(|| RagError::EmbeddingProvider("Empty embedding response".to_string()))
    }
}
