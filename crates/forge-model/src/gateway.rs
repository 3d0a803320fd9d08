//! The model gateway seam: conversation in, assembled text out.

use async_trait::async_trait;
use forge_core::conversation::ConversationMessage;
use tokio_util::sync::CancellationToken;

/// Errors from model gateway calls.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("HTTP request failed: {0}")]
    Http(String),
    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },
    #[error("response parse error: {0}")]
    Parse(String),
    #[error("empty response from model")]
    EmptyResponse,
    #[error("request cancelled")]
    Cancelled,
    #[error("provider configuration error: {0}")]
    Config(String),
}

impl GatewayError {
    /// Whether a transport-level retry could plausibly succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            Self::Parse(_) | Self::EmptyResponse | Self::Cancelled | Self::Config(_) => false,
        }
    }
}

/// Sends a conversation to a generative-model backend.
///
/// Implementations may stream internally; callers only observe the fully
/// assembled response text. When `cancel` fires, an in-flight request should
/// be abandoned and [`GatewayError::Cancelled`] returned.
#[async_trait]
pub trait ModelGateway: Send + Sync {
    async fn send(
        &self,
        messages: &[ConversationMessage],
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError>;

    /// The model name (for display/logging).
    fn model_name(&self) -> &str;
}
