use crate::domain::error::{AppError, Result};
use crate::domain::llm_config::LLMProvider;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const CONFIG_FILE: &str = "automation_hub.toml";
pub const ENV_PREFIX: &str = "AUTOMATION_HUB_";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub app_name: String,
    pub server: ServerSettings,
    pub llm: LlmSettings,
    pub codebeamer: CodeBeamerSettings,
    pub chat: ChatSettings,
    pub syntax_checker: SyntaxCheckerSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    pub provider: LLMProvider,
    pub timeout_secs: u64,
    pub temperature: f32,
    pub exacode: ExacodeSettings,
    pub ollama: OllamaSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExacodeSettings {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaSettings {
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeBeamerSettings {
    pub url: String,
    pub username: String,
    pub password: String,
    pub ssl_verify: bool,
    pub max_calls_per_minute: usize,
    pub cache_ttl_secs: u64,
    pub timeout_secs: u64,
}

impl CodeBeamerSettings {
    pub fn is_configured(&self) -> bool {
        !self.url.trim().is_empty()
            && !self.username.trim().is_empty()
            && !self.password.is_empty()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSettings {
    /// Prior turns sent with each chat request.
    pub max_history_turns: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CheckerMode {
    Builtin,
    Robot,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyntaxCheckerSettings {
    pub mode: CheckerMode,
    pub robot_command: String,
    pub timeout_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            app_name: "AI Automation Hub".to_string(),
            server: ServerSettings {
                host: "127.0.0.1".to_string(),
                port: 8000,
            },
            llm: LlmSettings {
                provider: LLMProvider::Ollama,
                timeout_secs: 120,
                temperature: 0.2,
                exacode: ExacodeSettings {
                    api_key: String::new(),
                    base_url: "http://exacode-chat.lge.com/v1".to_string(),
                    model: "Chat-EXACODE-A".to_string(),
                },
                ollama: OllamaSettings {
                    base_url: "http://localhost:11434".to_string(),
                },
            },
            codebeamer: CodeBeamerSettings {
                url: String::new(),
                username: String::new(),
                password: String::new(),
                ssl_verify: true,
                max_calls_per_minute: 60,
                cache_ttl_secs: 300,
                timeout_secs: 30,
            },
            chat: ChatSettings {
                max_history_turns: 20,
            },
            syntax_checker: SyntaxCheckerSettings {
                mode: CheckerMode::Builtin,
                robot_command: "robot".to_string(),
                timeout_secs: 60,
            },
        }
    }
}

impl Settings {
    /// Defaults, then `automation_hub.toml`, then `AUTOMATION_HUB_*` env vars (`__` nests).
    pub fn load() -> Result<Self> {
        let _ = dotenvy::dotenv();
        Self::load_from(Path::new(CONFIG_FILE))
    }

    pub fn load_from(config_file: &Path) -> Result<Self> {
        let settings: Settings = Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()
            .map_err(|e| AppError::ConfigError(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("llm.exacode.base_url", &self.llm.exacode.base_url),
            ("llm.ollama.base_url", &self.llm.ollama.base_url),
        ] {
            url::Url::parse(value)
                .map_err(|e| AppError::ConfigError(format!("{} is not a valid URL: {}", name, e)))?;
        }
        if !self.codebeamer.url.trim().is_empty() {
            url::Url::parse(&self.codebeamer.url).map_err(|e| {
                AppError::ConfigError(format!("codebeamer.url is not a valid URL: {}", e))
            })?;
        }
        if self.chat.max_history_turns == 0 {
            return Err(AppError::ConfigError(
                "chat.max_history_turns must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
