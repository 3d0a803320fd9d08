//! HTTP model gateway for Anthropic, OpenAI, OpenAI-compatible, Ollama and local APIs.

use crate::gateway::{GatewayError, ModelGateway};
use crate::providers::{
    AnthropicRequest, AnthropicResponse, ChatMessage, LlmProvider, OpenAIRequest, OpenAIResponse,
};
use async_trait::async_trait;
use forge_core::config::LlmConfig;
use forge_core::conversation::{ConversationMessage, Role};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// A [`ModelGateway`] backed by a provider's HTTP API.
pub struct HttpGateway {
    provider: LlmProvider,
    http: reqwest::Client,
    max_tokens: u32,
    retry_attempts: u32,
    retry_delays_ms: Vec<u64>,
}

impl HttpGateway {
    pub fn new(provider: LlmProvider, config: &LlmConfig) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| GatewayError::Config(e.to_string()))?;
        Ok(Self {
            provider,
            http,
            max_tokens: config.max_tokens,
            retry_attempts: config.retry_attempts.max(1),
            retry_delays_ms: config.retry_delays_ms.clone(),
        })
    }

    /// Resolve the provider from config + environment and build a gateway for it.
    pub async fn from_config(config: &LlmConfig) -> Result<Self, GatewayError> {
        let provider = LlmProvider::resolve(config).await?;
        Self::new(provider, config)
    }

    /// Human-readable provider name.
    pub fn provider_name(&self) -> &str {
        self.provider.provider_name()
    }

    fn delay_for(&self, attempt: usize) -> Duration {
        let idx = attempt.min(self.retry_delays_ms.len().saturating_sub(1));
        Duration::from_millis(self.retry_delays_ms.get(idx).copied().unwrap_or(4000))
    }

    async fn complete_once(&self, messages: &[ConversationMessage]) -> Result<String, GatewayError> {
        match &self.provider {
            LlmProvider::Anthropic { api_key, model } => {
                let system = messages
                    .iter()
                    .filter(|m| m.role == Role::System)
                    .map(|m| m.content.as_str())
                    .collect::<Vec<_>>()
                    .join("\n\n");
                let req = AnthropicRequest {
                    model: model.clone(),
                    max_tokens: self.max_tokens,
                    system,
                    messages: messages
                        .iter()
                        .filter(|m| m.role != Role::System)
                        .map(to_chat_message)
                        .collect(),
                };

                let resp = self
                    .http
                    .post("https://api.anthropic.com/v1/messages")
                    .header("x-api-key", api_key)
                    .header("anthropic-version", "2023-06-01")
                    .header("content-type", "application/json")
                    .json(&req)
                    .send()
                    .await
                    .map_err(|e| GatewayError::Http(format!("failed to call Anthropic API: {}", e)))?;

                let body: AnthropicResponse = read_json(resp, "Anthropic").await?;
                let text: String = body
                    .content
                    .into_iter()
                    .filter_map(|block| block.text)
                    .collect();
                non_empty(text)
            }
            LlmProvider::OpenAI { api_key, model } => {
                self.openai_style(
                    "https://api.openai.com/v1/chat/completions",
                    Some(api_key),
                    model,
                    messages,
                    None,
                    "OpenAI",
                )
                .await
            }
            LlmProvider::OpenAICompatible {
                api_key,
                base_url,
                model,
            } => {
                let url = format!("{}/chat/completions", base_url.trim_end_matches('/'));
                self.openai_style(&url, Some(api_key), model, messages, None, "OpenAI-compatible API")
                    .await
            }
            LlmProvider::Ollama { base_url, model } | LlmProvider::Local { base_url, model } => {
                let url = format!("{}/v1/chat/completions", base_url.trim_end_matches('/'));
                // Deterministic output for structured JSON extraction
                self.openai_style(
                    &url,
                    None,
                    model,
                    messages,
                    Some(0.0),
                    self.provider.provider_name(),
                )
                .await
            }
        }
    }

    async fn openai_style(
        &self,
        url: &str,
        api_key: Option<&String>,
        model: &str,
        messages: &[ConversationMessage],
        temperature: Option<f64>,
        label: &str,
    ) -> Result<String, GatewayError> {
        let req = OpenAIRequest {
            model: model.to_string(),
            max_tokens: self.max_tokens,
            messages: messages.iter().map(to_chat_message).collect(),
            temperature,
        };

        let mut builder = self
            .http
            .post(url)
            .header("content-type", "application/json")
            .json(&req);
        if let Some(key) = api_key {
            builder = builder.header("Authorization", format!("Bearer {}", key));
        }

        let resp = builder
            .send()
            .await
            .map_err(|e| GatewayError::Http(format!("failed to call {} at {}: {}", label, url, e)))?;

        let body: OpenAIResponse = read_json(resp, label).await?;
        let text = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .unwrap_or_default();
        non_empty(text)
    }
}

fn to_chat_message(message: &ConversationMessage) -> ChatMessage {
    ChatMessage {
        role: message.role.as_str().to_string(),
        content: message.content.clone(),
    }
}

fn non_empty(text: String) -> Result<String, GatewayError> {
    if text.trim().is_empty() {
        Err(GatewayError::EmptyResponse)
    } else {
        Ok(text)
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    resp: reqwest::Response,
    label: &str,
) -> Result<T, GatewayError> {
    let status = resp.status();
    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(GatewayError::Api {
            status: status.as_u16(),
            message,
        });
    }
    resp.json::<T>()
        .await
        .map_err(|e| GatewayError::Parse(format!("failed to parse {} response: {}", label, e)))
}

#[async_trait]
impl ModelGateway for HttpGateway {
    /// Send with transport-level retry (exponential backoff from config).
    ///
    /// Only transient failures are retried; cancellation wins over both the
    /// in-flight request and the backoff sleep.
    async fn send(
        &self,
        messages: &[ConversationMessage],
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        let max_attempts = self.retry_attempts as usize;
        let mut last_err = None;

        for attempt in 0..max_attempts {
            let result = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(GatewayError::Cancelled),
                r = self.complete_once(messages) => r,
            };

            match result {
                Ok(text) => return Ok(text),
                Err(e) if e.is_transient() && attempt + 1 < max_attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        provider = self.provider_name(),
                        attempt = attempt + 1,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "model request failed: {}",
                        e
                    );
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => return Err(GatewayError::Cancelled),
                        () = tokio::time::sleep(delay) => {}
                    }
                    last_err = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_err.unwrap_or(GatewayError::EmptyResponse))
    }

    fn model_name(&self) -> &str {
        self.provider.model_name()
    }
}
