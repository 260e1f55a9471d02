use super::{
    join_url, map_status_error, map_transport_error, read_streamed_lines, LLMClient,
    STREAM_TIMEOUT_SECS,
};
use crate::domain::conversation::ChatMessage;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{CompletionOptions, LLMConfig};
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

const TITLE_HEADER: &str = "EXACODE SWE(API)";

/// OpenAI-compatible remote service; every call needs a bearer key.
pub struct ExacodeClient {
    client: reqwest::Client,
}

impl ExacodeClient {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    fn chat_body(
        config: &LLMConfig,
        messages: &[ChatMessage],
        options: &CompletionOptions,
        stream: bool,
    ) -> serde_json::Value {
        let mut body = json!({
            "model": config.model,
            "messages": messages,
            "temperature": options.temperature.unwrap_or(0.2),
            "stream": stream,
        });
        if let Some(max_tokens) = options.max_tokens {
            body["max_tokens"] = json!(max_tokens);
        }
        body
    }

    fn api_key(config: &LLMConfig) -> Result<String> {
        config
            .api_key
            .clone()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| {
                AppError::Authentication(
                    "EXACODE API key not configured. Set it in the configuration.".to_string(),
                )
            })
    }
}

pub(crate) fn parse_completion(json: &serde_json::Value) -> Result<String> {
    let choice = json["choices"]
        .get(0)
        .ok_or_else(|| AppError::LLMError("Invalid response format: no choices".to_string()))?;
    // A null content is an empty answer, not a malformed one.
    match &choice["message"]["content"] {
        serde_json::Value::String(text) => Ok(text.clone()),
        serde_json::Value::Null => Ok(String::new()),
        _ => Err(AppError::LLMError("Invalid response format".to_string())),
    }
}

/// One server-sent event line. Only `data:` lines with a content delta carry text.
pub(crate) fn parse_sse_line(line: &str, _config: &LLMConfig) -> Result<Option<String>> {
    let Some(data) = line.strip_prefix("data:").map(str::trim) else {
        return Ok(None);
    };
    if data == "[DONE]" {
        return Ok(None);
    }
    let Ok(event) = serde_json::from_str::<serde_json::Value>(data) else {
        return Ok(None);
    };
    if let Some(message) = event["error"]["message"].as_str() {
        return Err(AppError::LLMError(message.to_string()));
    }
    Ok(event["choices"][0]["delta"]["content"]
        .as_str()
        .filter(|content| !content.is_empty())
        .map(str::to_string))
}

pub(crate) fn parse_model_list(json: &serde_json::Value) -> Result<Vec<String>> {
    let models = json["data"]
        .as_array()
        .ok_or_else(|| {
            AppError::LLMError("Invalid response format: missing data array".to_string())
        })?
        .iter()
        .filter_map(|m| m["id"].as_str())
        .map(|id| id.to_string())
        .collect();
    Ok(models)
}

#[async_trait]
impl LLMClient for ExacodeClient {
    async fn complete(
        &self,
        config: &LLMConfig,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String> {
        let api_key = Self::api_key(config)?;
        let url = join_url(&config.base_url, "chat/completions");

        let body = Self::chat_body(config, messages, options, false);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .header("X-Title", TITLE_HEADER)
            .header("X-Model", &config.model)
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

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::LLMError(format!("Failed to parse JSON: {}", e)))?;

        parse_completion(&json)
    }

    async fn stream(
        &self,
        config: &LLMConfig,
        messages: &[ChatMessage],
        options: &CompletionOptions,
        on_chunk: &mut (dyn FnMut(String) + Send),
    ) -> Result<String> {
        let api_key = Self::api_key(config)?;
        let url = join_url(&config.base_url, "chat/completions");
        let body = Self::chat_body(config, messages, options, true);

        let response = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .header("X-Title", TITLE_HEADER)
            .header("X-Model", &config.model)
            .header("Accept", "text/event-stream")
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

        read_streamed_lines(response, config, parse_sse_line, on_chunk).await
    }

    async fn list_models(&self, config: &LLMConfig) -> Result<Vec<String>> {
        let api_key = Self::api_key(config)?;
        let url = join_url(&config.base_url, "models");

        let response = self
            .client
            .get(&url)
            .bearer_auth(api_key)
            .timeout(Duration::from_secs(config.timeout_secs))
            .send()
            .await
            .map_err(|e| map_transport_error(e, config))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(map_status_error(status, &text, config));
        }

        let json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AppError::LLMError(format!("Failed to parse JSON: {}", e)))?;

        parse_model_list(&json)
    }
}
