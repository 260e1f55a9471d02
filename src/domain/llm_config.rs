use crate::domain::error::AppError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum LLMProvider {
    /// Remote OpenAI-compatible service, API key required.
    Exacode,
    /// Local inference server, no credential.
    Ollama,
}

impl fmt::Display for LLMProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LLMProvider::Exacode => write!(f, "exacode"),
            LLMProvider::Ollama => write!(f, "ollama"),
        }
    }
}

impl FromStr for LLMProvider {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "exacode" => Ok(LLMProvider::Exacode),
            "ollama" => Ok(LLMProvider::Ollama),
            other => Err(AppError::UnknownModel(format!("unknown provider '{}'", other))),
        }
    }
}

/// Fully resolved connection settings for one provider+model pair.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LLMConfig {
    pub provider: LLMProvider,
    pub base_url: String,
    pub model: String,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for LLMConfig {
    fn default() -> Self {
        Self {
            provider: LLMProvider::Ollama,
            base_url: "http://localhost:11434".to_string(),
            model: "llama3:8b".to_string(),
            api_key: None,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CompletionOptions {
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl Default for CompletionOptions {
    fn default() -> Self {
        Self {
            temperature: Some(0.2),
            max_tokens: None,
        }
    }
}

/// The fixed set of selectable provider+model pairs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ModelSelector {
    Exacode,
    OllamaLlama3,
    OllamaQwen3,
}

impl ModelSelector {
    pub const ALL: [ModelSelector; 3] = [
        ModelSelector::Exacode,
        ModelSelector::OllamaLlama3,
        ModelSelector::OllamaQwen3,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ModelSelector::Exacode => "exacode",
            ModelSelector::OllamaLlama3 => "ollama-llama3",
            ModelSelector::OllamaQwen3 => "ollama-qwen3",
        }
    }

    pub fn provider(&self) -> LLMProvider {
        match self {
            ModelSelector::Exacode => LLMProvider::Exacode,
            ModelSelector::OllamaLlama3 | ModelSelector::OllamaQwen3 => LLMProvider::Ollama,
        }
    }

    /// Local model tag; the remote model name comes from configuration.
    pub fn local_model(&self) -> Option<&'static str> {
        match self {
            ModelSelector::Exacode => None,
            ModelSelector::OllamaLlama3 => Some("llama3:8b"),
            ModelSelector::OllamaQwen3 => Some("qwen3:8b"),
        }
    }
}

impl Default for ModelSelector {
    fn default() -> Self {
        ModelSelector::OllamaLlama3
    }
}

impl fmt::Display for ModelSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ModelSelector {
    type Err = AppError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let needle = value.trim();
        ModelSelector::ALL
            .into_iter()
            .find(|selector| selector.as_str() == needle)
            .ok_or_else(|| AppError::UnknownModel(format!("'{}' is not a selectable model", needle)))
    }
}

impl TryFrom<String> for ModelSelector {
    type Error = AppError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ModelSelector> for String {
    fn from(value: ModelSelector) -> Self {
        value.as_str().to_string()
    }
}

/// Runtime change to one provider's connection settings. Absent fields keep their value.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(rename_all = "camelCase")]
pub struct LlmSettingsUpdate {
    #[serde(default)]
    pub provider: Option<LLMProvider>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub model: Option<String>,
}
