//! Per-request build state.

use crate::handler::StageOutput;
use chrono::{DateTime, Utc};
use forge_core::{AppPlan, ConversationMessage, Stage};

/// State of one build: where it is, what was said, what the last stage produced.
///
/// Sessions are single-use. Once cancelled, or once a stage handler has failed,
/// a session should be discarded and a new one created for the next attempt.
#[derive(Debug, Clone)]
pub struct BuildSession {
    stage: Stage,
    history: Vec<ConversationMessage>,
    latest_output: Option<StageOutput>,
    latest_messages: Vec<ConversationMessage>,
    plan: Option<AppPlan>,
    is_executing: bool,
    request: String,
    created_at: DateTime<Utc>,
    cancel_reason: Option<String>,
}

impl BuildSession {
    pub fn new(request: impl Into<String>) -> Self {
        Self {
            stage: Stage::None,
            history: Vec::new(),
            latest_output: None,
            latest_messages: Vec::new(),
            plan: None,
            is_executing: false,
            request: request.into(),
            created_at: Utc::now(),
            cancel_reason: None,
        }
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn history(&self) -> &[ConversationMessage] {
        &self.history
    }

    pub fn latest_output(&self) -> Option<&StageOutput> {
        self.latest_output.as_ref()
    }

    /// Messages added by the most recent stage.
    pub fn latest_messages(&self) -> &[ConversationMessage] {
        &self.latest_messages
    }

    /// The most recent plan produced by any stage, kept after later stages run.
    pub fn plan(&self) -> Option<&AppPlan> {
        self.plan.as_ref()
    }

    pub fn is_executing(&self) -> bool {
        self.is_executing
    }

    pub fn request(&self) -> &str {
        &self.request
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn cancel_reason(&self) -> Option<&str> {
        self.cancel_reason.as_deref()
    }

    pub(crate) fn set_executing(&mut self, executing: bool) {
        self.is_executing = executing;
    }

    /// Move to `next`, rejecting any move that does not go forward.
    pub(crate) fn advance(&mut self, next: Stage) -> Result<(), (Stage, Stage)> {
        if !self.stage.can_advance_to(next) {
            return Err((self.stage, next));
        }
        self.stage = next;
        Ok(())
    }

    pub(crate) fn cancel(&mut self, reason: impl Into<String>) {
        if self.stage != Stage::Cancelled {
            self.stage = Stage::Cancelled;
            self.cancel_reason = Some(reason.into());
        }
    }

    pub(crate) fn record(&mut self, messages: Vec<ConversationMessage>, output: StageOutput) {
        self.history.extend(messages.iter().cloned());
        self.latest_messages = messages;
        if let StageOutput::Plan(plan) = &output {
            self.plan = Some(plan.clone());
        }
        self.latest_output = Some(output);
    }
}
