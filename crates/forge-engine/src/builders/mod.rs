//! App builders: [`WebAppBuilder`] and [`MobileAppBuilder`].
//!
//! Both wrap a shared `BuilderCore` that owns the validated-call client and the
//! compiled output schemas; the concrete builders differ in target stack,
//! prompt guidance and pre-checks.

mod mobile;
mod web;

pub use mobile::MobileAppBuilder;
pub use web::WebAppBuilder;

use crate::generation::{GenerationPipeline, GenerationSettings};
use crate::handler::{AppKind, PreCheck, StageContext, StageError, StageInput, StageOutput, StageResult};
use crate::prompts::{codegen_system_prompt, plan_request, plan_system_prompt};
use forge_core::config::PipelineConfig;
use forge_core::{AppPlan, ComponentOutput, ConversationMessage, TargetStack};
use forge_model::{ModelGateway, OutputSchema, SchemaError, ValidatedCall};
use std::sync::Arc;

/// Longest request accepted by the pre-check, in characters.
pub const MAX_REQUEST_CHARS: usize = 8000;

pub(crate) struct BuilderCore {
    kind: AppKind,
    stack: TargetStack,
    guidance: &'static str,
    call: ValidatedCall,
    plan_schema: OutputSchema,
    component_schema: OutputSchema,
    settings: GenerationSettings,
}

impl BuilderCore {
    pub(crate) fn new(
        kind: AppKind,
        stack: TargetStack,
        guidance: &'static str,
        gateway: Arc<dyn ModelGateway>,
        pipeline: &PipelineConfig,
    ) -> Result<Self, SchemaError> {
        Ok(Self {
            kind,
            stack,
            guidance,
            call: ValidatedCall::new(gateway).with_corrective_retries(pipeline.corrective_retries),
            plan_schema: OutputSchema::for_type::<AppPlan>("app_plan")?,
            component_schema: OutputSchema::for_type::<ComponentOutput>("component_output")?,
            settings: GenerationSettings {
                max_retries: pipeline.max_retries,
                context_window: pipeline.context_window,
            },
        })
    }

    pub(crate) fn kind(&self) -> AppKind {
        self.kind
    }

    pub(crate) fn stack(&self) -> &TargetStack {
        &self.stack
    }

    /// Checks shared by every builder.
    pub(crate) fn check_request(&self, request: &str) -> PreCheck {
        let trimmed = request.trim();
        if trimmed.is_empty() {
            return PreCheck::failed("the build request is empty");
        }
        let chars = trimmed.chars().count();
        if chars > MAX_REQUEST_CHARS {
            return PreCheck::failed(format!(
                "the build request is too long ({} characters, limit {})",
                chars, MAX_REQUEST_CHARS
            ));
        }
        if self.stack.framework.trim().is_empty() || self.stack.language.trim().is_empty() {
            return PreCheck::failed(format!(
                "the {} stack needs both a framework and a language",
                self.kind
            ));
        }
        PreCheck::Passed
    }

    pub(crate) async fn initialize(
        &self,
        ctx: &StageContext,
        request: &str,
    ) -> Result<StageResult, StageError> {
        let system =
            ConversationMessage::system(plan_system_prompt(self.kind, &self.stack, self.guidance));
        let user = ConversationMessage::user(plan_request(request));

        ctx.progress
            .progress(&format!("Planning {} app with {}", self.kind, self.call.model_name()));
        let validated = self
            .call
            .call_validated_checked::<AppPlan, _>(
                &[system.clone(), user.clone()],
                &self.plan_schema,
                self.settings.max_retries,
                &ctx.cancel,
                AppPlan::conformance_errors,
            )
            .await?;

        let plan: AppPlan = validated.value;
        tracing::info!(
            app = %plan.app_name,
            components = plan.components.len(),
            attempts = validated.attempts,
            "plan accepted"
        );
        ctx.progress.markdown(&plan_markdown(&plan));

        Ok(StageResult {
            messages: vec![system, user, ConversationMessage::assistant(validated.raw)],
            output: StageOutput::Plan(plan),
        })
    }

    pub(crate) async fn generate_code(
        &self,
        ctx: &StageContext,
        input: StageInput,
    ) -> Result<StageResult, StageError> {
        let pipeline = GenerationPipeline::new(
            &self.call,
            &self.component_schema,
            &self.stack,
            codegen_system_prompt(self.kind, &self.stack, self.guidance),
            self.settings,
        );
        let (report, messages) = pipeline.run(ctx, &input.plan, &input.messages).await?;
        Ok(StageResult {
            messages,
            output: StageOutput::Code(report),
        })
    }
}

/// Markdown overview of a plan.
pub fn plan_markdown(plan: &AppPlan) -> String {
    let mut out = format!("## {}\n\n{}\n\n", plan.app_name, plan.summary);
    out.push_str(&format!("**Architecture:** {}\n\n", plan.architecture));
    out.push_str(&format!("### Components ({})\n\n", plan.components.len()));
    for c in &plan.components {
        out.push_str(&format!("- **{}** ({}) `{}`", c.name, c.kind, c.target_path));
        if !c.depends_on.is_empty() {
            let deps: Vec<&str> = c.depends_on.iter().map(String::as_str).collect();
            out.push_str(&format!(" <- {}", deps.join(", ")));
        }
        out.push('\n');
    }
    out
}
