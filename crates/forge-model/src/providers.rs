//! LLM provider resolution and API request/response types.

use crate::gateway::GatewayError;
use crate::ollama::{detect_ollama, model_is_available};
use forge_core::config::LlmConfig;
use serde::{Deserialize, Serialize};

const ANTHROPIC_DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const OPENAI_DEFAULT_MODEL: &str = "gpt-4o-mini";
const MOONSHOT_DEFAULT_MODEL: &str = "kimi-k2.5";
const MOONSHOT_BASE_URL: &str = "https://api.moonshot.ai/v1";

/// LLM provider configuration.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    Anthropic {
        api_key: String,
        model: String,
    },
    OpenAI {
        api_key: String,
        model: String,
    },
    /// Any OpenAI-compatible API with Bearer token auth (Moonshot, Together, OpenRouter, etc.)
    OpenAICompatible {
        api_key: String,
        base_url: String,
        model: String,
    },
    Ollama {
        base_url: String,
        model: String,
    },
    Local {
        base_url: String,
        model: String,
    },
}

fn env_key(var: &str) -> Option<String> {
    std::env::var(var).ok().filter(|v| !v.trim().is_empty())
}

fn missing_key(provider: &str, var: &str) -> GatewayError {
    GatewayError::Config(format!("provider={} but {} is not set", provider, var))
}

impl LlmProvider {
    /// Resolve a provider from config and environment.
    ///
    /// Priority chain:
    /// 1. `config.provider` forced -> use that provider
    /// 2. `ANTHROPIC_API_KEY` -> Anthropic
    /// 3. `OPENAI_API_KEY` -> OpenAI
    /// 4. `MOONSHOT_API_KEY` -> Moonshot (Kimi)
    /// 5. Ollama on `config.local_url` with `config.local_model` installed
    /// 6. `FORGE_LOCAL_URL` env var -> any OpenAI-compatible server
    /// 7. Error with helpful message
    pub async fn resolve(config: &LlmConfig) -> Result<Self, GatewayError> {
        if let Some(forced) = config.provider.as_deref() {
            return Self::from_forced_provider(forced, config);
        }

        if let Some(key) = env_key("ANTHROPIC_API_KEY") {
            return Ok(Self::Anthropic {
                api_key: key,
                model: model_or(config, ANTHROPIC_DEFAULT_MODEL),
            });
        }

        if let Some(key) = env_key("OPENAI_API_KEY") {
            return Ok(Self::OpenAI {
                api_key: key,
                model: model_or(config, OPENAI_DEFAULT_MODEL),
            });
        }

        if let Some(key) = env_key("MOONSHOT_API_KEY") {
            return Ok(Self::OpenAICompatible {
                api_key: key,
                base_url: MOONSHOT_BASE_URL.to_string(),
                model: model_or(config, MOONSHOT_DEFAULT_MODEL),
            });
        }

        if let Some(installed) = detect_ollama(&config.local_url).await {
            if model_is_available(&installed, &config.local_model) {
                tracing::info!(model = %config.local_model, "Ollama detected");
                return Ok(Self::Ollama {
                    base_url: config.local_url.clone(),
                    model: config.local_model.clone(),
                });
            }
            return Err(GatewayError::Config(format!(
                "Ollama is running but model '{}' is not installed. Run: ollama pull {}",
                config.local_model, config.local_model
            )));
        }

        if let Some(url) = env_key("FORGE_LOCAL_URL") {
            tracing::info!(url = %url, model = %config.local_model, "using local LLM server");
            return Ok(Self::Local {
                base_url: url,
                model: config.local_model.clone(),
            });
        }

        Err(GatewayError::Config(
            "No LLM provider available. Options:\n\
             - Set ANTHROPIC_API_KEY for Anthropic\n\
             - Set OPENAI_API_KEY for OpenAI\n\
             - Set MOONSHOT_API_KEY for Moonshot (Kimi)\n\
             - Run Ollama (https://ollama.com) with the configured local_model\n\
             - Set FORGE_LOCAL_URL for any OpenAI-compatible server"
                .to_string(),
        ))
    }

    /// Resolve a forced provider name to a provider instance.
    fn from_forced_provider(provider: &str, config: &LlmConfig) -> Result<Self, GatewayError> {
        match provider {
            "anthropic" => Ok(Self::Anthropic {
                api_key: env_key("ANTHROPIC_API_KEY")
                    .ok_or_else(|| missing_key(provider, "ANTHROPIC_API_KEY"))?,
                model: model_or(config, ANTHROPIC_DEFAULT_MODEL),
            }),
            "openai" => Ok(Self::OpenAI {
                api_key: env_key("OPENAI_API_KEY")
                    .ok_or_else(|| missing_key(provider, "OPENAI_API_KEY"))?,
                model: model_or(config, OPENAI_DEFAULT_MODEL),
            }),
            "moonshot" => Ok(Self::OpenAICompatible {
                api_key: env_key("MOONSHOT_API_KEY")
                    .ok_or_else(|| missing_key(provider, "MOONSHOT_API_KEY"))?,
                base_url: MOONSHOT_BASE_URL.to_string(),
                model: model_or(config, MOONSHOT_DEFAULT_MODEL),
            }),
            "openai-compatible" => Ok(Self::OpenAICompatible {
                api_key: env_key("FORGE_API_KEY")
                    .ok_or_else(|| missing_key(provider, "FORGE_API_KEY"))?,
                base_url: env_key("FORGE_BASE_URL").unwrap_or_else(|| config.local_url.clone()),
                model: model_or(config, &config.local_model),
            }),
            "ollama" => Ok(Self::Ollama {
                base_url: config.local_url.clone(),
                model: config.local_model.clone(),
            }),
            "local" => Ok(Self::Local {
                base_url: env_key("FORGE_LOCAL_URL").unwrap_or_else(|| config.local_url.clone()),
                model: config.local_model.clone(),
            }),
            other => Err(GatewayError::Config(format!(
                "Unknown provider '{}'. Valid: anthropic, openai, moonshot, openai-compatible, ollama, local",
                other
            ))),
        }
    }

    /// Human-readable provider name.
    pub fn provider_name(&self) -> &str {
        match self {
            Self::Anthropic { .. } => "Anthropic",
            Self::OpenAI { .. } => "OpenAI",
            Self::OpenAICompatible { .. } => "OpenAI-Compatible",
            Self::Ollama { .. } => "Ollama (local)",
            Self::Local { .. } => "Local",
        }
    }

    /// Model name in use.
    pub fn model_name(&self) -> &str {
        match self {
            Self::Anthropic { model, .. }
            | Self::OpenAI { model, .. }
            | Self::OpenAICompatible { model, .. }
            | Self::Ollama { model, .. }
            | Self::Local { model, .. } => model,
        }
    }
}

fn model_or(config: &LlmConfig, default: &str) -> String {
    config
        .model
        .clone()
        .unwrap_or_else(|| default.to_string())
}

// ---------------------------------------------------------------------------
// API Request / Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub(crate) struct AnthropicRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub system: String,
}

#[derive(Serialize)]
pub(crate) struct OpenAIRequest {
    pub model: String,
    pub max_tokens: u32,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
}

#[derive(Serialize, Deserialize)]
pub(crate) struct ChatMessage {
    pub role: String,
    pub content: String,
}

#[derive(Deserialize)]
pub(crate) struct AnthropicResponse {
    pub content: Vec<AnthropicContent>,
}

#[derive(Deserialize)]
pub(crate) struct AnthropicContent {
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Deserialize)]
pub(crate) struct OpenAIResponse {
    pub choices: Vec<OpenAIChoice>,
}

#[derive(Deserialize)]
pub(crate) struct OpenAIChoice {
    pub message: OpenAIChoiceMessage,
}

#[derive(Deserialize)]
pub(crate) struct OpenAIChoiceMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_forced_ollama_needs_no_key() {
        let config = LlmConfig {
            provider: Some("ollama".to_string()),
            ..LlmConfig::default()
        };
        let provider = LlmProvider::resolve(&config).await.unwrap();
        assert_eq!(provider.provider_name(), "Ollama (local)");
        assert_eq!(provider.model_name(), config.local_model);
    }

    #[tokio::test]
    async fn test_unknown_forced_provider() {
        let config = LlmConfig {
            provider: Some("carrier-pigeon".to_string()),
            ..LlmConfig::default()
        };
        let err = LlmProvider::resolve(&config).await.unwrap_err();
        assert!(err.to_string().contains("Unknown provider"));
    }

    #[test]
    fn test_anthropic_request_omits_empty_system() {
        let req = AnthropicRequest {
            model: "m".into(),
            max_tokens: 10,
            messages: vec![ChatMessage {
                role: "user".into(),
                content: "hi".into(),
            }],
            system: String::new(),
        };
        let json = serde_json::to_value(&req).unwrap();
        assert!(json.get("system").is_none());
    }
}
