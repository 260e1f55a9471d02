use super::{
    join_url, map_status_error, map_transport_error, read_streamed_lines, LLMClient,
    STREAM_TIMEOUT_SECS,
};
use crate::domain::conversation::ChatMessage;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{CompletionOptions, LLMConfig};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    options: Option<OllamaOptions>,
}

#[derive(Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(rename = "num_predict", skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
}

#[derive(Deserialize)]
pub(crate) struct OllamaChatResponse {
    message: Option<OllamaMessage>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
pub(crate) struct OllamaTagsResponse {
    #[serde(default)]
    models: Vec<OllamaModelInfo>,
}

#[derive(Deserialize)]
struct OllamaModelInfo {
    name: String,
}

/// Local inference server. Often not running, so connection errors are expected.
pub struct OllamaClient {
    client: reqwest::Client,
}

impl OllamaClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }
}

pub(crate) fn parse_chat_response(response: OllamaChatResponse, config: &LLMConfig) -> Result<String> {
    if let Some(error) = response.error {
        let lowered = error.to_ascii_lowercase();
        if lowered.contains("not found") {
            return Err(AppError::ModelNotFound(format!(
                "'{}' is not served by ollama: {}",
                config.model, error
            )));
        }
        return Err(AppError::LLMError(error));
    }
    response
        .message
        .map(|message| message.content)
        .ok_or_else(|| AppError::LLMError("Invalid response format: missing message".to_string()))
}

/// One NDJSON line of a streamed chat. Undecodable lines are skipped.
pub(crate) fn parse_stream_line(line: &str, config: &LLMConfig) -> Result<Option<String>> {
    let Ok(chunk) = serde_json::from_str::<OllamaChatResponse>(line) else {
        return Ok(None);
    };
    if chunk.error.is_some() {
        return parse_chat_response(chunk, config).map(Some);
    }
    Ok(chunk
        .message
        .map(|message| message.content)
        .filter(|content| !content.is_empty()))
}

pub(crate) fn model_names(tags: OllamaTagsResponse) -> Vec<String> {
    tags.models
        .into_iter()
        .map(|model| model.name)
        .filter(|name| !name.trim().is_empty())
        .collect()
}

#[async_trait]
impl LLMClient for OllamaClient {
    async fn complete(
        &self,
        config: &LLMConfig,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String> {
        let url = join_url(&config.base_url, "api/chat");
        let body = OllamaChatRequest {
            model: &config.model,
            messages,
            stream: false,
            options: Some(OllamaOptions {
                temperature: options.temperature,
                max_tokens: options.max_tokens,
            }),
        };

        let response = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(config.timeout_secs))
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(e, config))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, &text, config));
        }

        let parsed: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| AppError::LLMError(format!("Failed to parse JSON: {}", e)))?;

        parse_chat_response(parsed, config)
    }

    async fn stream(
        &self,
        config: &LLMConfig,
        messages: &[ChatMessage],
        options: &CompletionOptions,
        on_chunk: &mut (dyn FnMut(String) + Send),
    ) -> Result<String> {
        let url = join_url(&config.base_url, "api/chat");
        let body = OllamaChatRequest {
            model: &config.model,
            messages,
            stream: true,
            options: Some(OllamaOptions {
                temperature: options.temperature,
                max_tokens: options.max_tokens,
            }),
        };

        let response = self
            .client
            .post(&url)
            .timeout(Duration::from_secs(config.timeout_secs.max(STREAM_TIMEOUT_SECS)))
            .json(&body)
            .send()
            .await
            .map_err(|e| map_transport_error(e, config))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, &text, config));
        }

        read_streamed_lines(response, config, parse_stream_line, on_chunk).await
    }

    async fn list_models(&self, config: &LLMConfig) -> Result<Vec<String>> {
        let url = join_url(&config.base_url, "api/tags");

        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(config.timeout_secs.min(10)))
            .send()
            .await
            .map_err(|e| AppError::Unavailable(format!("Cannot connect to Ollama. Is it running? {}", e)))?;

        if !response.status().is_success() {
            return Err(AppError::Unavailable(format!(
                "Ollama server not responding ({})",
                response.status()
            )));
        }

        let tags: OllamaTagsResponse = response
            .json()
            .await
            .map_err(|e| AppError::LLMError(format!("Failed to parse JSON: {}", e)))?;

        Ok(model_names(tags))
    }
}
