//! Validated model calls: send, extract JSON, validate, retry within a bound.

use crate::extract::{ExtractError, extract_json};
use crate::gateway::{GatewayError, ModelGateway};
use crate::schema::{FieldError, OutputSchema};
use forge_core::conversation::ConversationMessage;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Why a single attempt was rejected.
#[derive(Debug, Clone, thiserror::Error)]
pub enum AttemptError {
    #[error("extraction failed: {0}")]
    ExtractionFailed(#[from] ExtractError),
    #[error("schema mismatch: {}", .errors.join("; "))]
    SchemaMismatch { errors: Vec<String> },
}

impl AttemptError {
    fn from_fields(errors: Vec<FieldError>) -> Self {
        Self::SchemaMismatch {
            errors: errors.iter().map(ToString::to_string).collect(),
        }
    }
}

/// Terminal outcome of a validated call that did not succeed.
#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("validation exhausted after {attempts} attempts: {last}")]
    ValidationExhausted { attempts: usize, last: AttemptError },
    #[error("model gateway error after {attempts} attempts: {source}")]
    Gateway {
        attempts: usize,
        #[source]
        source: GatewayError,
    },
    #[error("model call cancelled")]
    Cancelled,
}

impl ProtocolError {
    /// Gateway calls made before the call gave up (0 when cancelled).
    pub fn attempts(&self) -> usize {
        match self {
            Self::ValidationExhausted { attempts, .. } | Self::Gateway { attempts, .. } => *attempts,
            Self::Cancelled => 0,
        }
    }
}

/// A successful validated call.
#[derive(Debug, Clone)]
pub struct Validated<T> {
    /// The full model response that produced `value`.
    pub raw: String,
    pub value: T,
    /// Number of gateway calls made, including the successful one.
    pub attempts: usize,
}

/// Runs model calls whose output must conform to a schema.
#[derive(Clone)]
pub struct ValidatedCall {
    gateway: Arc<dyn ModelGateway>,
    corrective: bool,
}

impl ValidatedCall {
    pub fn new(gateway: Arc<dyn ModelGateway>) -> Self {
        Self {
            gateway,
            corrective: false,
        }
    }

    /// Append the rejected response and a correction note before each retry.
    #[must_use]
    pub fn with_corrective_retries(mut self, enabled: bool) -> Self {
        self.corrective = enabled;
        self
    }

    pub fn model_name(&self) -> &str {
        self.gateway.model_name()
    }

    /// Call the model until its output validates against `schema` and
    /// deserializes into `T`, making at most `max_retries + 1` attempts.
    pub async fn call_validated<T: DeserializeOwned>(
        &self,
        messages: &[ConversationMessage],
        schema: &OutputSchema,
        max_retries: usize,
        cancel: &CancellationToken,
    ) -> Result<Validated<T>, ProtocolError> {
        self.call_validated_checked(messages, schema, max_retries, cancel, |_: &T| Vec::new())
            .await
    }

    /// Like [`call_validated`](Self::call_validated), with an extra typed
    /// conformance check. A non-empty list from `check` rejects the attempt.
    pub async fn call_validated_checked<T, F>(
        &self,
        messages: &[ConversationMessage],
        schema: &OutputSchema,
        max_retries: usize,
        cancel: &CancellationToken,
        check: F,
    ) -> Result<Validated<T>, ProtocolError>
    where
        T: DeserializeOwned,
        F: Fn(&T) -> Vec<String>,
    {
        let max_attempts = max_retries.saturating_add(1);
        let mut conversation = messages.to_vec();
        let mut attempts = 0;

        loop {
            attempts += 1;
            let raw = match self.gateway.send(&conversation, cancel).await {
                Ok(raw) => raw,
                Err(GatewayError::Cancelled) => return Err(ProtocolError::Cancelled),
                Err(source) => return Err(ProtocolError::Gateway { attempts, source }),
            };

            let err = match parse_attempt(&raw, schema, &check) {
                Ok(value) => {
                    tracing::debug!(schema = schema.name(), attempts, "validated model output");
                    return Ok(Validated {
                        raw,
                        value,
                        attempts,
                    });
                }
                Err(e) => e,
            };

            if attempts >= max_attempts {
                tracing::warn!(
                    schema = schema.name(),
                    attempts,
                    "giving up on model output: {}",
                    err
                );
                return Err(ProtocolError::ValidationExhausted {
                    attempts,
                    last: err,
                });
            }

            tracing::warn!(
                schema = schema.name(),
                attempt = attempts,
                max_attempts,
                "rejected model output, retrying: {}",
                err
            );

            if self.corrective {
                conversation.push(ConversationMessage::assistant(raw));
                conversation.push(ConversationMessage::user(correction_note(schema, &err)));
            }
        }
    }
}

fn parse_attempt<T, F>(raw: &str, schema: &OutputSchema, check: &F) -> Result<T, AttemptError>
where
    T: DeserializeOwned,
    F: Fn(&T) -> Vec<String>,
{
    let value = extract_json(raw)?;
    schema.validate(&value).map_err(AttemptError::from_fields)?;

    let typed: T = serde_json::from_value(value).map_err(|e| AttemptError::SchemaMismatch {
        errors: vec![format!("(root): {}", e)],
    })?;

    let errors = check(&typed);
    if errors.is_empty() {
        Ok(typed)
    } else {
        Err(AttemptError::SchemaMismatch { errors })
    }
}

fn correction_note(schema: &OutputSchema, err: &AttemptError) -> String {
    let detail = match err {
        AttemptError::ExtractionFailed(_) => {
            "No JSON object could be found in your reply.".to_string()
        }
        AttemptError::SchemaMismatch { errors } => {
            let mut s = String::from("The JSON did not match the required schema:\n");
            for e in errors {
                s.push_str("- ");
                s.push_str(e);
                s.push('\n');
            }
            s
        }
    };
    format!(
        "{}\nReply again with a single JSON object conforming to the '{}' schema and nothing else.",
        detail,
        schema.name()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attempt_counts() {
        let err = ProtocolError::Gateway {
            attempts: 2,
            source: GatewayError::EmptyResponse,
        };
        assert_eq!(err.attempts(), 2);
        assert_eq!(ProtocolError::Cancelled.attempts(), 0);
    }

    #[test]
    fn test_correction_note_lists_errors() {
        let schema = OutputSchema::new("thing", serde_json::json!({"type": "object"})).unwrap();
        let err = AttemptError::SchemaMismatch {
            errors: vec!["/a: bad".into(), "/b: worse".into()],
        };
        let note = correction_note(&schema, &err);
        assert!(note.contains("- /a: bad"));
        assert!(note.contains("- /b: worse"));
        assert!(note.contains("'thing'"));
    }
}
