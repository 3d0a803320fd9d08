//! The stage engine: runs a builder's stages in order over one build session.

use crate::handler::{
    PreCheck, ProgressSink, StageContext, StageError, StageHandler, StageInput, StageOutput,
    TracingSink,
};
use crate::session::BuildSession;
use forge_core::Stage;
use forge_core::stage::validate_path;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

/// Stages a [`StageHandler`] knows how to run.
const SUPPORTED_STAGES: [Stage; 3] = [Stage::PreCheck, Stage::Initialize, Stage::GenerateCode];

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("invalid active stage list: {0}")]
    InvalidPath(String),
    #[error("stage '{0}' is not supported by app builders")]
    UnsupportedStage(Stage),
    #[error("invalid stage transition from {from} to {to}")]
    InvalidTransition { from: Stage, to: Stage },
    #[error("stage {stage} requires an app plan from a previous stage")]
    MissingStageInput { stage: Stage },
    #[error("stage {stage} failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: StageError,
    },
}

/// Drives one [`BuildSession`] through an ordered list of stages.
///
/// Safe to share: `execute` takes `&self`, and the session lock is only held
/// between awaits, never across a handler call.
pub struct StageEngine {
    handler: Arc<dyn StageHandler>,
    stages: Vec<Stage>,
    session: Mutex<BuildSession>,
    progress: Arc<dyn ProgressSink>,
    cancel: CancellationToken,
}

impl StageEngine {
    /// Build an engine over `stages` for a fresh session.
    ///
    /// `stages` must be non-empty, start with precheck and be strictly
    /// ordered; only stages a handler can run are accepted.
    pub fn new(
        handler: Arc<dyn StageHandler>,
        request: impl Into<String>,
        stages: &[Stage],
    ) -> Result<Self, EngineError> {
        validate_path(stages).map_err(EngineError::InvalidPath)?;
        if let Some(stage) = stages.iter().find(|s| !SUPPORTED_STAGES.contains(s)) {
            return Err(EngineError::UnsupportedStage(*stage));
        }

        Ok(Self {
            handler,
            stages: stages.to_vec(),
            session: Mutex::new(BuildSession::new(request)),
            progress: Arc::new(TracingSink),
            cancel: CancellationToken::new(),
        })
    }

    /// Engine over the default precheck, initialize, generate-code path.
    pub fn with_default_stages(
        handler: Arc<dyn StageHandler>,
        request: impl Into<String>,
    ) -> Result<Self, EngineError> {
        Self::new(handler, request, &Stage::DEFAULT_PATH)
    }

    #[must_use]
    pub fn with_progress(mut self, progress: Arc<dyn ProgressSink>) -> Self {
        self.progress = progress;
        self
    }

    #[must_use]
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// Snapshot of the session.
    pub async fn session(&self) -> BuildSession {
        self.session.lock().await.clone()
    }

    pub async fn stage(&self) -> Stage {
        self.session.lock().await.stage()
    }

    fn last_stage(&self) -> Stage {
        self.stages.last().copied().unwrap_or(Stage::PreCheck)
    }

    /// Run every remaining active stage.
    ///
    /// Returns `Ok` without doing anything if the session is already running,
    /// finished or cancelled. A failed pre-check cancels the session and still
    /// returns `Ok`; the reason is available from [`BuildSession::cancel_reason`].
    pub async fn execute(&self) -> Result<(), EngineError> {
        let last = self.last_stage();
        let (request, starting) = {
            let mut session = self.session.lock().await;
            if session.is_executing() {
                tracing::warn!("build already executing, ignoring execute()");
                return Ok(());
            }
            if session.stage() == Stage::Cancelled {
                tracing::warn!(
                    reason = session.cancel_reason().unwrap_or_default(),
                    "build was cancelled, ignoring execute()"
                );
                return Ok(());
            }
            if session.stage() == last {
                tracing::warn!(stage = %last, "build already finished, ignoring execute()");
                return Ok(());
            }
            session.set_executing(true);
            (session.request().to_string(), session.stage())
        };

        tracing::info!(
            kind = %self.handler.app_kind(),
            stages = self.stages.len(),
            "starting build"
        );

        if starting == Stage::None {
            self.progress.progress("Running pre-check");
            let outcome = self.handler.precheck(&request).await;
            let mut session = self.session.lock().await;
            match outcome {
                PreCheck::Passed => {
                    if let Err((from, to)) = session.advance(Stage::PreCheck) {
                        session.cancel(format!("invalid transition from {from} to {to}"));
                        session.set_executing(false);
                        return Err(EngineError::InvalidTransition { from, to });
                    }
                }
                PreCheck::Failed { reason } => {
                    tracing::warn!(reason = %reason, "pre-check failed, cancelling build");
                    self.progress.progress(&format!("Pre-check failed: {reason}"));
                    session.cancel(reason);
                    session.set_executing(false);
                    return Ok(());
                }
            }
        }

        for &stage in &self.stages {
            let (current, messages, plan) = {
                let session = self.session.lock().await;
                (
                    session.stage(),
                    session.latest_messages().to_vec(),
                    session.latest_output().and_then(StageOutput::as_plan).cloned(),
                )
            };
            if !current.can_advance_to(stage) || stage == Stage::PreCheck {
                continue;
            }

            tracing::info!(stage = %stage, "running stage");
            self.progress.progress(&format!("Stage: {stage}"));
            let ctx = StageContext {
                cancel: self.cancel.clone(),
                progress: Arc::clone(&self.progress),
            };

            let result = match stage {
                Stage::Initialize => self.handler.initialize(&ctx, &request).await,
                Stage::GenerateCode => {
                    let Some(plan) = plan else {
                        let mut session = self.session.lock().await;
                        session.cancel(format!("{stage} ran without an app plan"));
                        session.set_executing(false);
                        return Err(EngineError::MissingStageInput { stage });
                    };
                    self.handler
                        .generate_code(&ctx, StageInput { messages, plan })
                        .await
                }
                other => {
                    let mut session = self.session.lock().await;
                    session.cancel(format!("unsupported stage {other}"));
                    session.set_executing(false);
                    return Err(EngineError::UnsupportedStage(other));
                }
            };

            let mut session = self.session.lock().await;
            match result {
                Ok(result) => {
                    session.record(result.messages, result.output);
                    if let Err((from, to)) = session.advance(stage) {
                        session.cancel(format!("invalid transition from {from} to {to}"));
                        session.set_executing(false);
                        return Err(EngineError::InvalidTransition { from, to });
                    }
                }
                Err(source) => {
                    // The session is single-use after this; the flag stays set.
                    tracing::error!(stage = %stage, "stage failed: {}", source);
                    session.cancel(source.to_string());
                    return Err(EngineError::Stage { stage, source });
                }
            }
        }

        self.session.lock().await.set_executing(false);
        tracing::info!("build finished");
        Ok(())
    }
}
