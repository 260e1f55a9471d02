use crate::domain::conversation::ChatMessage;
use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::{
    CompletionOptions, LLMConfig, LLMProvider, LlmSettingsUpdate, ModelSelector,
};
use crate::infrastructure::config::LlmSettings;
use crate::infrastructure::llm_clients::LLMClient;
use crate::infrastructure::response::clean_llm_response;
use serde::Serialize;
use std::sync::{Arc, RwLock};
use tracing::{info, warn};

/// Provider settings as shown to clients. The API key is reported only as present or not.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProviderSettingsView {
    pub provider: LLMProvider,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub exacode_base_url: String,
    pub exacode_model: String,
    pub exacode_api_key_set: bool,
    pub ollama_base_url: String,
    pub models: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionCheck {
    pub provider: LLMProvider,
    pub success: bool,
    pub message: String,
    pub models: Vec<String>,
}

/// Resolves model selectors against the current provider settings and forwards completions.
pub struct ModelProvider {
    llm_client: Arc<dyn LLMClient + Send + Sync>,
    settings: RwLock<LlmSettings>,
}

impl ModelProvider {
    pub fn new(llm_client: Arc<dyn LLMClient + Send + Sync>, settings: LlmSettings) -> Self {
        Self {
            llm_client,
            settings: RwLock::new(settings),
        }
    }

    fn read_settings(&self) -> Result<LlmSettings> {
        self.settings
            .read()
            .map(|settings| settings.clone())
            .map_err(|_| AppError::Internal("LLM settings lock poisoned".to_string()))
    }

    fn provider_config(settings: &LlmSettings, provider: LLMProvider, model: String) -> Result<LLMConfig> {
        match provider {
            LLMProvider::Exacode => {
                let api_key = settings.exacode.api_key.trim();
                if api_key.is_empty() {
                    return Err(AppError::Authentication(
                        "EXACODE API key is not configured".to_string(),
                    ));
                }
                Ok(LLMConfig {
                    provider,
                    base_url: settings.exacode.base_url.clone(),
                    model,
                    api_key: Some(api_key.to_string()),
                    timeout_secs: settings.timeout_secs,
                })
            }
            LLMProvider::Ollama => Ok(LLMConfig {
                provider,
                base_url: settings.ollama.base_url.clone(),
                model,
                api_key: None,
                timeout_secs: settings.timeout_secs,
            }),
        }
    }

    pub fn resolve(&self, selector: ModelSelector) -> Result<LLMConfig> {
        let settings = self.read_settings()?;
        let model = match selector.local_model() {
            Some(model) => model.to_string(),
            None => settings.exacode.model.clone(),
        };
        Self::provider_config(&settings, selector.provider(), model)
    }

    pub fn default_options(&self) -> CompletionOptions {
        let temperature = self
            .settings
            .read()
            .map(|settings| settings.temperature)
            .unwrap_or(0.2);
        CompletionOptions {
            temperature: Some(temperature),
            max_tokens: None,
        }
    }

    /// Raw completion text with reasoning blocks removed.
    pub async fn complete(&self, selector: ModelSelector, messages: &[ChatMessage]) -> Result<String> {
        let config = self.resolve(selector)?;
        let options = self.default_options();
        let raw = self
            .llm_client
            .complete(&config, messages, &options)
            .await
            .map_err(|e| {
                warn!(model = %selector, provider = %config.provider, error = %e, "Completion failed");
                e
            })?;
        Ok(clean_llm_response(&raw))
    }

    /// Raw pieces go to `on_chunk`; the returned full text is cleaned like a completion.
    pub async fn stream(
        &self,
        selector: ModelSelector,
        messages: &[ChatMessage],
        on_chunk: &mut (dyn FnMut(String) + Send),
    ) -> Result<String> {
        let config = self.resolve(selector)?;
        let options = self.default_options();
        let raw = self
            .llm_client
            .stream(&config, messages, &options, on_chunk)
            .await
            .map_err(|e| {
                warn!(model = %selector, provider = %config.provider, error = %e, "Streamed completion failed");
                e
            })?;
        Ok(clean_llm_response(&raw))
    }

    pub async fn list_available_models(&self, provider: LLMProvider) -> Result<Vec<String>> {
        let settings = self.read_settings()?;
        let model = match provider {
            LLMProvider::Exacode => settings.exacode.model.clone(),
            LLMProvider::Ollama => String::new(),
        };
        let config = Self::provider_config(&settings, provider, model)?;
        self.llm_client.list_models(&config).await
    }

    pub async fn test_connection(&self, provider: LLMProvider) -> ConnectionCheck {
        match self.list_available_models(provider).await {
            Ok(models) => ConnectionCheck {
                provider,
                success: true,
                message: format!("Connected to {} ({} models available)", provider, models.len()),
                models,
            },
            Err(e) => ConnectionCheck {
                provider,
                success: false,
                message: e.to_string(),
                models: Vec::new(),
            },
        }
    }

    pub fn update(&self, update: LlmSettingsUpdate) -> Result<ProviderSettingsView> {
        if let Some(base_url) = update.base_url.as_deref() {
            url::Url::parse(base_url.trim()).map_err(|e| {
                AppError::ValidationError(format!("'{}' is not a valid base URL: {}", base_url, e))
            })?;
        }

        {
            let mut settings = self
                .settings
                .write()
                .map_err(|_| AppError::Internal("LLM settings lock poisoned".to_string()))?;
            let target = update.provider.unwrap_or(settings.provider);
            settings.provider = target;
            match target {
                LLMProvider::Exacode => {
                    if let Some(api_key) = update.api_key {
                        settings.exacode.api_key = api_key.trim().to_string();
                    }
                    if let Some(base_url) = update.base_url {
                        settings.exacode.base_url = base_url.trim().to_string();
                    }
                    if let Some(model) = update.model.filter(|m| !m.trim().is_empty()) {
                        settings.exacode.model = model.trim().to_string();
                    }
                }
                LLMProvider::Ollama => {
                    if let Some(base_url) = update.base_url {
                        settings.ollama.base_url = base_url.trim().to_string();
                    }
                }
            }
            info!(provider = %target, "LLM settings updated");
        }

        self.view()
    }

    pub fn view(&self) -> Result<ProviderSettingsView> {
        let settings = self.read_settings()?;
        Ok(ProviderSettingsView {
            provider: settings.provider,
            timeout_secs: settings.timeout_secs,
            temperature: settings.temperature,
            exacode_base_url: settings.exacode.base_url,
            exacode_model: settings.exacode.model,
            exacode_api_key_set: !settings.exacode.api_key.trim().is_empty(),
            ollama_base_url: settings.ollama.base_url,
            models: ModelSelector::ALL.iter().map(|s| s.as_str()).collect(),
        })
    }
}
