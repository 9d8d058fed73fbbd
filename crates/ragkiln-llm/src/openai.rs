//! OpenAI-compatible HTTP backends for [`LlmProvider`] and
//! [`EmbeddingProvider`]. Works unmodified against OpenAI itself, a local
//! Ollama-compatible gateway, or any compatible proxy — only `base_url` and
//! `model` differ, both of which are configuration.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::chat::LlmError;
use crate::embeddings::EmbeddingError;
use crate::{EmbeddingProvider, LlmProvider};

pub struct OpenAiChatProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiChatProvider {
    pub fn new(http: reqwest::Client, base_url: String, api_key: String, model: String) -> Self {
        Self {
            http,
            base_url,
            api_key,
            model,
        }
    }
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessageBody,
}

#[derive(Deserialize)]
struct ChatMessageBody {
    content: String,
}

fn classify_status(status: reqwest::StatusCode, body: String) -> LlmError {
    if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        LlmError::Transient(format!("HTTP {status}: {body}"))
    } else {
        LlmError::Permanent(format!("HTTP {status}: {body}"))
    }
}

#[async_trait]
impl LlmProvider for OpenAiChatProvider {
    async fn complete(&self, prompt: &str) -> Result<String, LlmError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
        });

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(status, text));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Parse("no choices in chat completion response".into()))
    }
}

pub struct OpenAiEmbeddingProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl OpenAiEmbeddingProvider {
    pub fn new(http: reqwest::Client, base_url: String, api_key: String, model: String) -> Self {
        Self {
            http,
            base_url,
            api_key,
            model,
        }
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Deserialize)]
struct EmbeddingDatum {
    embedding: EmbeddingShape,
    index: usize,
}

/// Some providers return a flat `[f32]`, others a nested `[[f32]]` per
/// item; this accepts either and flattens one level.
#[derive(Deserialize)]
#[serde(untagged)]
enum EmbeddingShape {
    Flat(Vec<f32>),
    Nested(Vec<Vec<f32>>),
}

impl EmbeddingShape {
    fn into_flat(self) -> Vec<f32> {
        match self {
            EmbeddingShape::Flat(v) => v,
            EmbeddingShape::Nested(v) => v.into_iter().flatten().collect(),
        }
    }
}

fn classify_embedding_status(status: reqwest::StatusCode, body: String) -> EmbeddingError {
    if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        EmbeddingError::Transient(format!("HTTP {status}: {body}"))
    } else {
        EmbeddingError::Permanent(format!("HTTP {status}: {body}"))
    }
}

#[async_trait]
impl EmbeddingProvider for OpenAiEmbeddingProvider {
    async fn embed_batch_raw(&self, texts: &[String]) -> Result<Vec<Option<Vec<f32>>>, EmbeddingError> {
        let url = format!("{}/embeddings", self.base_url.trim_end_matches('/'));
        let body = EmbeddingRequest {
            model: &self.model,
            input: texts,
        };

        let response = self
            .http
            .post(url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| EmbeddingError::Transient(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_embedding_status(status, text));
        }

        let parsed: EmbeddingResponse = response
            .json()
            .await
            .map_err(|e| EmbeddingError::Permanent(e.to_string()))?;

        let mut out: Vec<Option<Vec<f32>>> = vec![None; texts.len()];
        for datum in parsed.data {
            if let Some(slot) = out.get_mut(datum.index) {
                *slot = Some(datum.embedding.into_flat());
            }
        }
        Ok(out)
    }
}
