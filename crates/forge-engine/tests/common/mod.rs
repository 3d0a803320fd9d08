//! Shared test doubles: a scripted model gateway and a recording progress sink.

#![allow(dead_code)]

use async_trait::async_trait;
use forge_core::ConversationMessage;
use forge_engine::ProgressSink;
use forge_model::{GatewayError, ModelGateway};
use std::sync::Mutex;
use tokio_util::sync::CancellationToken;

type Responder = dyn Fn(&[ConversationMessage]) -> Result<String, GatewayError> + Send + Sync;

/// Gateway whose reply is computed from the conversation it receives.
pub struct FnGateway {
    respond: Box<Responder>,
    pub calls: Mutex<Vec<Vec<ConversationMessage>>>,
}

impl FnGateway {
    pub fn new(
        respond: impl Fn(&[ConversationMessage]) -> Result<String, GatewayError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            respond: Box::new(respond),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    /// Last user message of every recorded call.
    pub fn requests(&self) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| c.last().map(|m| m.content.clone()))
            .collect()
    }
}

#[async_trait]
impl ModelGateway for FnGateway {
    async fn send(
        &self,
        messages: &[ConversationMessage],
        cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        if cancel.is_cancelled() {
            return Err(GatewayError::Cancelled);
        }
        self.calls.lock().unwrap().push(messages.to_vec());
        (self.respond)(messages)
    }

    fn model_name(&self) -> &str {
        "fn-gateway"
    }
}

/// Records every notification.
#[derive(Default)]
pub struct RecordingSink {
    pub lines: Mutex<Vec<String>>,
    pub blocks: Mutex<Vec<String>>,
}

impl ProgressSink for RecordingSink {
    fn progress(&self, text: &str) {
        self.lines.lock().unwrap().push(text.to_string());
    }

    fn markdown(&self, text: &str) {
        self.blocks.lock().unwrap().push(text.to_string());
    }
}

/// Which component a code-generation request is for, if any.
pub fn requested_component(messages: &[ConversationMessage]) -> Option<String> {
    let last = messages.last()?;
    let rest = last.content.strip_prefix("## Component: ")?;
    Some(rest.lines().next()?.trim().to_string())
}

pub fn component_json(path: &str, content: &str) -> String {
    serde_json::json!({
        "file_path": path,
        "content": content,
        "libraries": ["react"]
    })
    .to_string()
}
