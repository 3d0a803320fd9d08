//! Retry-bound and correction behaviour of the validated call protocol.

use async_trait::async_trait;
use forge_core::{AppPlan, ConversationMessage, Role};
use forge_model::{
    AttemptError, GatewayError, ModelGateway, OutputSchema, ProtocolError, ValidatedCall,
};
use serde_json::json;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;

/// Replays canned responses; repeats the last one when the script runs out.
struct Scripted {
    responses: Mutex<VecDeque<String>>,
    calls: Mutex<Vec<Vec<ConversationMessage>>>,
}

impl Scripted {
    fn new(responses: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            responses: Mutex::new(responses.iter().map(|s| (*s).to_string()).collect()),
            calls: Mutex::new(Vec::new()),
        })
    }

    fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

#[async_trait]
impl ModelGateway for Scripted {
    async fn send(
        &self,
        messages: &[ConversationMessage],
        _cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        self.calls.lock().unwrap().push(messages.to_vec());
        let mut responses = self.responses.lock().unwrap();
        if responses.len() > 1 {
            Ok(responses.pop_front().unwrap())
        } else {
            responses.front().cloned().ok_or(GatewayError::EmptyResponse)
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

struct AlwaysCancelled;

#[async_trait]
impl ModelGateway for AlwaysCancelled {
    async fn send(
        &self,
        _messages: &[ConversationMessage],
        _cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        Err(GatewayError::Cancelled)
    }

    fn model_name(&self) -> &str {
        "cancelled"
    }
}

fn object_schema() -> OutputSchema {
    OutputSchema::new(
        "object_a",
        json!({"type": "object", "required": ["a"], "properties": {"a": {"type": "integer"}}}),
    )
    .unwrap()
}

fn prompt() -> Vec<ConversationMessage> {
    vec![
        ConversationMessage::system("answer in JSON"),
        ConversationMessage::user("give me a"),
    ]
}

#[tokio::test]
async fn test_fenced_response_succeeds_first_attempt() {
    let gateway = Scripted::new(&["prefix ```json\n{\"a\":1}\n``` suffix"]);
    let call = ValidatedCall::new(gateway.clone());
    let result = call
        .call_validated::<serde_json::Value>(&prompt(), &object_schema(), 3, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.value, json!({"a": 1}));
    assert_eq!(result.attempts, 1);
    assert_eq!(gateway.call_count(), 1);
}

#[tokio::test]
async fn test_unbounded_retry_setting_does_not_overflow() {
    let gateway = Scripted::new(&["not json", "{\"a\": 2}"]);
    let call = ValidatedCall::new(gateway.clone());
    let result = call
        .call_validated::<serde_json::Value>(
            &prompt(),
            &object_schema(),
            usize::MAX,
            &CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(result.value, json!({"a": 2}));
    assert_eq!(result.attempts, 2);
}

#[tokio::test]
async fn test_always_malformed_makes_exactly_max_retries_plus_one_attempts() {
    for max_retries in [0, 1, 3] {
        let gateway = Scripted::new(&["sorry, no JSON today"]);
        let call = ValidatedCall::new(gateway.clone());
        let err = call
            .call_validated::<serde_json::Value>(
                &prompt(),
                &object_schema(),
                max_retries,
                &CancellationToken::new(),
            )
            .await
            .unwrap_err();
        match err {
            ProtocolError::ValidationExhausted { attempts, last } => {
                assert_eq!(attempts, max_retries + 1);
                assert!(matches!(last, AttemptError::ExtractionFailed(_)));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(gateway.call_count(), max_retries + 1);
    }
}

#[tokio::test]
async fn test_schema_mismatch_then_success() {
    let gateway = Scripted::new(&["{\"a\": \"one\"}", "{\"a\": 1}"]);
    let call = ValidatedCall::new(gateway.clone());
    let result = call
        .call_validated::<serde_json::Value>(&prompt(), &object_schema(), 2, &CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(result.attempts, 2);
    assert_eq!(result.raw, "{\"a\": 1}");

    // Plain retries resend the original conversation.
    let calls = gateway.calls.lock().unwrap();
    assert_eq!(calls[0].len(), 2);
    assert_eq!(calls[1].len(), 2);
}

#[tokio::test]
async fn test_corrective_retries_append_feedback() {
    let gateway = Scripted::new(&["{\"a\": \"one\"}", "{\"a\": 1}"]);
    let call = ValidatedCall::new(gateway.clone()).with_corrective_retries(true);
    call.call_validated::<serde_json::Value>(&prompt(), &object_schema(), 2, &CancellationToken::new())
        .await
        .unwrap();

    let calls = gateway.calls.lock().unwrap();
    let retried = &calls[1];
    assert_eq!(retried.len(), 4);
    assert_eq!(retried[2].role, Role::Assistant);
    assert_eq!(retried[2].content, "{\"a\": \"one\"}");
    assert_eq!(retried[3].role, Role::User);
    assert!(retried[3].content.contains("/a"));
}

#[tokio::test]
async fn test_conformance_check_rejects_duplicate_components() {
    let dup = json!({
        "app_name": "x", "summary": "s", "architecture": "a",
        "components": [
            {"name": "A", "kind": "screen", "purpose": "p", "target_path": "a.ts"},
            {"name": "A", "kind": "screen", "purpose": "p", "target_path": "b.ts"}
        ]
    })
    .to_string();
    let gateway = Scripted::new(&[dup.as_str()]);
    let schema = OutputSchema::for_type::<AppPlan>("app_plan").unwrap();
    let call = ValidatedCall::new(gateway.clone());
    let err = call
        .call_validated_checked::<AppPlan, _>(
            &prompt(),
            &schema,
            1,
            &CancellationToken::new(),
            AppPlan::conformance_errors,
        )
        .await
        .unwrap_err();
    match err {
        ProtocolError::ValidationExhausted { attempts, last } => {
            assert_eq!(attempts, 2);
            assert!(last.to_string().contains("duplicate component name 'A'"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_gateway_cancellation_is_not_retried() {
    let call = ValidatedCall::new(Arc::new(AlwaysCancelled));
    let err = call
        .call_validated::<serde_json::Value>(&prompt(), &object_schema(), 5, &CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ProtocolError::Cancelled));
}
