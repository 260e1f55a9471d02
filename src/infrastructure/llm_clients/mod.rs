pub mod exacode;
pub mod ollama;

use crate::domain::conversation::ChatMessage;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{CompletionOptions, LLMConfig, LLMProvider};
use async_trait::async_trait;
use exacode::ExacodeClient;
use ollama::OllamaClient;
use reqwest::StatusCode;

#[async_trait]
pub trait LLMClient {
    async fn complete(
        &self,
        config: &LLMConfig,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String>;
    /// Hands each piece of the answer to `on_chunk` as it arrives and returns the full text.
    async fn stream(
        &self,
        config: &LLMConfig,
        messages: &[ChatMessage],
        options: &CompletionOptions,
        on_chunk: &mut (dyn FnMut(String) + Send),
    ) -> Result<String>;
    async fn list_models(&self, config: &LLMConfig) -> Result<Vec<String>>;
}

pub struct RouterClient {
    exacode: ExacodeClient,
    ollama: OllamaClient,
}

impl RouterClient {
    pub fn new() -> Self {
        Self {
            exacode: ExacodeClient::new(),
            ollama: OllamaClient::new(),
        }
    }
}

#[async_trait]
impl LLMClient for RouterClient {
    async fn complete(
        &self,
        config: &LLMConfig,
        messages: &[ChatMessage],
        options: &CompletionOptions,
    ) -> Result<String> {
        match config.provider {
            LLMProvider::Exacode => self.exacode.complete(config, messages, options).await,
            LLMProvider::Ollama => self.ollama.complete(config, messages, options).await,
        }
    }

    async fn stream(
        &self,
        config: &LLMConfig,
        messages: &[ChatMessage],
        options: &CompletionOptions,
        on_chunk: &mut (dyn FnMut(String) + Send),
    ) -> Result<String> {
        match config.provider {
            LLMProvider::Exacode => self.exacode.stream(config, messages, options, on_chunk).await,
            LLMProvider::Ollama => self.ollama.stream(config, messages, options, on_chunk).await,
        }
    }

    async fn list_models(&self, config: &LLMConfig) -> Result<Vec<String>> {
        match config.provider {
            LLMProvider::Exacode => self.exacode.list_models(config).await,
            LLMProvider::Ollama => self.ollama.list_models(config).await,
        }
    }
}

/// Streamed answers can run much longer than a single completion.
pub(crate) const STREAM_TIMEOUT_SECS: u64 = 300;

/// Splits a byte stream into trimmed, non-empty lines.
#[derive(Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(bytes);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line).trim().to_string();
            if !text.is_empty() {
                lines.push(text);
            }
        }
        lines
    }
}

/// Reads a line-oriented streaming body. `parse` turns one line into an optional piece of text.
pub(crate) async fn read_streamed_lines(
    mut response: reqwest::Response,
    config: &LLMConfig,
    parse: fn(&str, &LLMConfig) -> Result<Option<String>>,
    on_chunk: &mut (dyn FnMut(String) + Send),
) -> Result<String> {
    let mut buffer = LineBuffer::default();
    let mut full = String::new();
    loop {
        let bytes = response
            .chunk()
            .await
            .map_err(|e| map_transport_error(e, config))?;
        // A final newline flushes a last line the server left unterminated.
        let lines = match &bytes {
            Some(bytes) => buffer.push(bytes),
            None => buffer.push(b"\n"),
        };
        for line in lines {
            if let Some(piece) = parse(&line, config)? {
                full.push_str(&piece);
                on_chunk(piece);
            }
        }
        if bytes.is_none() {
            return Ok(full);
        }
    }
}

pub(crate) fn join_url(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}

/// Connection refused and timeouts mean the backend is not running.
pub(crate) fn map_transport_error(err: reqwest::Error, config: &LLMConfig) -> AppError {
    if err.is_connect() || err.is_timeout() {
        AppError::Unavailable(format!("{} at {}: {}", config.provider, config.base_url, err))
    } else {
        AppError::LLMError(format!("Request failed: {}", err))
    }
}

pub(crate) fn map_status_error(status: StatusCode, body: &str, config: &LLMConfig) -> AppError {
    let lowered = body.to_ascii_lowercase();
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AppError::Authentication(format!(
            "{} rejected the API key ({})",
            config.provider, status
        )),
        StatusCode::NOT_FOUND => AppError::ModelNotFound(format!(
            "'{}' is not served by {}",
            config.model, config.provider
        )),
        StatusCode::BAD_GATEWAY | StatusCode::SERVICE_UNAVAILABLE | StatusCode::GATEWAY_TIMEOUT => {
            AppError::Unavailable(format!("{} answered {}", config.provider, status))
        }
        _ if lowered.contains("model") && lowered.contains("not found") => AppError::ModelNotFound(
            format!("'{}' is not served by {}", config.model, config.provider),
        ),
        _ => AppError::LLMError(format!("API error ({}): {}", status, body)),
    }
}
