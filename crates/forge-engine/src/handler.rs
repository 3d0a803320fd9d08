//! The seam between the stage engine and app-specific builders.

use crate::generation::GenerationReport;
use crate::resolver::ResolveError;
use async_trait::async_trait;
use forge_core::{AppPlan, ConversationMessage, TargetStack};
use forge_model::ProtocolError;
use serde::Serialize;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Kind of application a builder produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AppKind {
    Web,
    Mobile,
}

impl std::fmt::Display for AppKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Web => write!(f, "web"),
            Self::Mobile => write!(f, "mobile"),
        }
    }
}

/// Receives user-facing notifications from stage handlers.
///
/// Fire-and-forget: implementations must not fail, and nothing they do
/// influences the build.
pub trait ProgressSink: Send + Sync {
    /// A short status line.
    fn progress(&self, text: &str);
    /// A rendered markdown block (plan summaries, generation reports).
    fn markdown(&self, text: &str);
}

/// Logs notifications through `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ProgressSink for TracingSink {
    fn progress(&self, text: &str) {
        tracing::info!("{}", text);
    }

    fn markdown(&self, text: &str) {
        tracing::info!("\n{}", text);
    }
}

/// Discards notifications.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl ProgressSink for NullSink {
    fn progress(&self, _text: &str) {}
    fn markdown(&self, _text: &str) {}
}

/// Outcome of a builder's pre-check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PreCheck {
    Passed,
    Failed { reason: String },
}

impl PreCheck {
    pub fn failed(reason: impl Into<String>) -> Self {
        Self::Failed {
            reason: reason.into(),
        }
    }
}

/// What a stage handed to the next one.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum StageOutput {
    Plan(AppPlan),
    Code(GenerationReport),
}

impl StageOutput {
    pub fn as_plan(&self) -> Option<&AppPlan> {
        match self {
            Self::Plan(plan) => Some(plan),
            Self::Code(_) => None,
        }
    }

    pub fn as_report(&self) -> Option<&GenerationReport> {
        match self {
            Self::Code(report) => Some(report),
            Self::Plan(_) => None,
        }
    }
}

/// Messages a stage added to the conversation, plus its typed output.
#[derive(Debug, Clone)]
pub struct StageResult {
    pub messages: Vec<ConversationMessage>,
    pub output: StageOutput,
}

/// Everything a handler can see when it runs.
#[derive(Clone)]
pub struct StageContext {
    pub cancel: CancellationToken,
    pub progress: Arc<dyn ProgressSink>,
}

/// Input for the code-generation stage.
#[derive(Debug, Clone)]
pub struct StageInput {
    /// Messages produced by the previous stage.
    pub messages: Vec<ConversationMessage>,
    pub plan: AppPlan,
}

/// Stage-level handler failures.
#[derive(Debug, thiserror::Error)]
pub enum StageError {
    #[error(transparent)]
    Protocol(ProtocolError),
    #[error(transparent)]
    Resolve(#[from] ResolveError),
    #[error("stage cancelled")]
    Cancelled,
}

impl From<ProtocolError> for StageError {
    fn from(e: ProtocolError) -> Self {
        match e {
            ProtocolError::Cancelled => Self::Cancelled,
            other => Self::Protocol(other),
        }
    }
}

/// An app-type builder: the fixed set of stages the engine can dispatch.
#[async_trait]
pub trait StageHandler: Send + Sync {
    fn app_kind(&self) -> AppKind;

    fn stack(&self) -> &TargetStack;

    /// Cheap checks that decide whether a build should start at all.
    async fn precheck(&self, request: &str) -> PreCheck;

    /// Turn the user request into an [`AppPlan`].
    async fn initialize(
        &self,
        ctx: &StageContext,
        request: &str,
    ) -> Result<StageResult, StageError>;

    /// Generate every planned component.
    async fn generate_code(
        &self,
        ctx: &StageContext,
        input: StageInput,
    ) -> Result<StageResult, StageError>;
}
