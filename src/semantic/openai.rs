//! OpenAI-compatible embeddings client.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::EmbeddingConfig;
use crate::semantic::embeddings::{Embedder, EmbeddingError};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    embedding: Vec<f32>,
    index: usize,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Deserialize)]
struct ApiErrorDetail {
    message: String,
}

pub struct OpenAiEmbedder {
    client: reqwest::blocking::Client,
    endpoint: String,
    api_key: String,
    model: String,
    batch_size: usize,
    name: String,
}

impl OpenAiEmbedder {
    /// Build a client from config, reading the API key from the configured
    /// environment variable.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Self, EmbeddingError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty())
            .ok_or_else(|| EmbeddingError::MissingApiKey(config.api_key_env.clone()))?;

        Self::new(config, api_key)
    }

    pub fn new(config: &EmbeddingConfig, api_key: String) -> Result<Self, EmbeddingError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/embeddings", config.api_base.trim_end_matches('/')),
            api_key,
            model: config.model.clone(),
            batch_size: config.batch_size.max(1),
            name: format!("openai:{}", config.model),
        })
    }

    fn embed_chunk(&self, chunk: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        log::debug!("requesting {} embeddings from {}", chunk.len(), self.endpoint);

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.model,
                input: chunk,
            })
            .send()?;

        let status = resp.status();
        let body = resp.text()?;

        if !status.is_success() {
            return Err(api_error(status.as_u16(), &body));
        }

        parse_response(&body, chunk.len())
    }
}

impl Embedder for OpenAiEmbedder {
    fn name(&self) -> &str {
        &self.name
    }

    fn embed_documents(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbeddingError> {
        let mut embeddings = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(self.batch_size) {
            embeddings.extend(self.embed_chunk(chunk)?);
        }
        Ok(embeddings)
    }
}

/// Decode a successful response, restoring input order.
fn parse_response(body: &str, expected: usize) -> Result<Vec<Vec<f32>>, EmbeddingError> {
    let mut resp: EmbeddingResponse = serde_json::from_str(body)
        .map_err(|e| EmbeddingError::EmbeddingFailed(format!("Malformed response: {e}")))?;

    if resp.data.len() != expected {
        return Err(EmbeddingError::EmbeddingFailed(format!(
            "Expected {expected} embeddings, got {}",
            resp.data.len()
        )));
    }

    resp.data.sort_by_key(|item| item.index);
    Ok(resp.data.into_iter().map(|item| item.embedding).collect())
}

fn api_error(status: u16, body: &str) -> EmbeddingError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .map(|err| err.error.message)
        .unwrap_or_else(|_| body.trim().to_string());

    EmbeddingError::Api { status, message }
}
