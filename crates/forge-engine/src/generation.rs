//! Per-component code generation in dependency order.

use crate::handler::{StageContext, StageError};
use crate::prompts::{ComponentContext, component_request};
use crate::resolver::{dependency_layers, resolve};
use forge_core::{
    AppPlan, ComponentOutput, ConversationMessage, GeneratedArtifact, Role, TargetStack,
};
use forge_model::{OutputSchema, ProtocolError, ValidatedCall};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// A component that could not be generated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentFailure {
    pub component: String,
    pub attempts: usize,
    pub reason: String,
}

/// Result of the code-generation stage.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenerationReport {
    /// Component names in the order they were attempted.
    pub order: Vec<String>,
    pub artifacts: Vec<GeneratedArtifact>,
    pub failures: Vec<ComponentFailure>,
}

impl GenerationReport {
    pub fn artifact(&self, component: &str) -> Option<&GeneratedArtifact> {
        self.artifacts.iter().find(|a| a.component_name == component)
    }

    pub fn is_complete(&self) -> bool {
        self.failures.is_empty()
    }

    /// Markdown summary for progress output.
    pub fn to_markdown(&self) -> String {
        let mut out = format!(
            "## Generation report\n\n{} of {} components generated.\n\n",
            self.artifacts.len(),
            self.order.len()
        );
        for artifact in &self.artifacts {
            out.push_str(&format!(
                "- `{}` -> `{}` ({} assets)\n",
                artifact.component_name,
                artifact.file_path,
                artifact.auxiliary_assets.len()
            ));
        }
        if !self.failures.is_empty() {
            out.push_str("\n### Failed\n\n");
            for failure in &self.failures {
                out.push_str(&format!(
                    "- `{}` after {} attempts: {}\n",
                    failure.component, failure.attempts, failure.reason
                ));
            }
        }
        out
    }
}

/// Knobs for one generation run.
#[derive(Debug, Clone, Copy)]
pub struct GenerationSettings {
    pub max_retries: usize,
    /// Keep only the last N prior history messages in each request.
    pub context_window: Option<usize>,
}

/// Generates every component of a plan, one validated call per component.
pub struct GenerationPipeline<'a> {
    call: &'a ValidatedCall,
    schema: &'a OutputSchema,
    stack: &'a TargetStack,
    system_prompt: String,
    settings: GenerationSettings,
}

impl<'a> GenerationPipeline<'a> {
    pub fn new(
        call: &'a ValidatedCall,
        schema: &'a OutputSchema,
        stack: &'a TargetStack,
        system_prompt: String,
        settings: GenerationSettings,
    ) -> Self {
        Self {
            call,
            schema,
            stack,
            system_prompt,
            settings,
        }
    }

    /// Generate `plan`'s components in resolved order.
    ///
    /// Component-level failures are recorded in the report and never returned
    /// as errors. Only resolver errors and cancellation fail the run. The second
    /// element holds the request/response pairs of every successful component.
    /// `prior` is the conversation handed over by the previous stage.
    pub async fn run(
        &self,
        ctx: &StageContext,
        plan: &AppPlan,
        prior: &[ConversationMessage],
    ) -> Result<(GenerationReport, Vec<ConversationMessage>), StageError> {
        let order = resolve(&plan.components)?;
        log_layers(plan);

        let names: HashSet<&str> = plan.components.iter().map(|c| c.name.as_str()).collect();
        let mut report = GenerationReport {
            order: order.iter().map(|c| c.name.clone()).collect(),
            ..GenerationReport::default()
        };
        let mut produced: HashMap<String, usize> = HashMap::new();
        let mut failed: HashSet<String> = HashSet::new();
        let mut running = Self::prior_history(prior);
        let mut new_messages = Vec::new();
        let total = order.len();

        for (idx, component) in order.into_iter().enumerate() {
            ctx.progress.progress(&format!(
                "[{}/{}] Generating {} ({})",
                idx + 1,
                total,
                component.name,
                component.target_path
            ));

            let request = {
                let mut neighbours = ComponentContext {
                    produced: Vec::new(),
                    unavailable: Vec::new(),
                    external: Vec::new(),
                };
                for dep in &component.depends_on {
                    if !names.contains(dep.as_str()) {
                        neighbours.external.push(dep.as_str());
                    } else if let Some(&i) = produced.get(dep) {
                        neighbours.produced.push(&report.artifacts[i]);
                    } else if failed.contains(dep) {
                        neighbours.unavailable.push(dep.as_str());
                    }
                }
                ConversationMessage::user(component_request(
                    component,
                    plan,
                    self.stack,
                    &neighbours,
                ))
            };
            let mut conversation = Vec::with_capacity(running.len() + 2);
            conversation.push(ConversationMessage::system(self.system_prompt.clone()));
            let start = self
                .settings
                .context_window
                .map_or(0, |window| running.len().saturating_sub(window));
            conversation.extend(running[start..].iter().cloned());
            conversation.push(request.clone());

            let result = self
                .call
                .call_validated_checked::<ComponentOutput, _>(
                    &conversation,
                    self.schema,
                    self.settings.max_retries,
                    &ctx.cancel,
                    ComponentOutput::conformance_errors,
                )
                .await;

            match result {
                Ok(validated) => {
                    tracing::info!(
                        component = %component.name,
                        attempts = validated.attempts,
                        "component generated"
                    );
                    let artifact = GeneratedArtifact::from_output(component, validated.value);
                    produced.insert(component.name.clone(), report.artifacts.len());
                    report.artifacts.push(artifact);

                    let response = ConversationMessage::assistant(validated.raw);
                    running.push(request.clone());
                    running.push(response.clone());
                    new_messages.push(request);
                    new_messages.push(response);
                }
                Err(ProtocolError::Cancelled) => return Err(StageError::Cancelled),
                Err(e) => {
                    tracing::warn!(component = %component.name, "component failed: {}", e);
                    failed.insert(component.name.clone());
                    report.failures.push(ComponentFailure {
                        component: component.name.clone(),
                        attempts: e.attempts(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        ctx.progress.markdown(&report.to_markdown());
        Ok((report, new_messages))
    }

    fn prior_history(history: &[ConversationMessage]) -> Vec<ConversationMessage> {
        history
            .iter()
            .filter(|m| m.role != Role::System)
            .cloned()
            .collect()
    }
}

fn log_layers(plan: &AppPlan) {
    if let Ok(layers) = dependency_layers(&plan.components) {
        for (depth, layer) in layers.iter().enumerate() {
            let names: Vec<&str> = layer.iter().map(|c| c.name.as_str()).collect();
            tracing::debug!(depth, components = %names.join(", "), "dependency layer");
        }
    }
}
