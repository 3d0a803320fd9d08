//! Prompt templates for planning and per-component code generation.

use crate::handler::AppKind;
use forge_core::{AppPlan, ComponentSpec, GeneratedArtifact, TargetStack};

pub const PLAN_SYSTEM_PROMPT: &str = include_str!("prompts/plan_system.md");
pub const CODEGEN_SYSTEM_PROMPT: &str = include_str!("prompts/codegen_system.md");

fn fill(template: &str, kind: AppKind, stack: &TargetStack, guidance: &str) -> String {
    template
        .replace("{kind}", &kind.to_string())
        .replace("{stack}", &stack.describe())
        .replace("{guidance}", guidance)
}

pub fn plan_system_prompt(kind: AppKind, stack: &TargetStack, guidance: &str) -> String {
    fill(PLAN_SYSTEM_PROMPT, kind, stack, guidance)
}

pub fn codegen_system_prompt(kind: AppKind, stack: &TargetStack, guidance: &str) -> String {
    fill(CODEGEN_SYSTEM_PROMPT, kind, stack, guidance)
}

pub fn plan_request(request: &str) -> String {
    format!("Plan the following application:\n\n{}", request.trim())
}

/// What one component request needs to know about its neighbours.
pub struct ComponentContext<'a> {
    /// Artifacts of internal dependencies that were generated.
    pub produced: Vec<&'a GeneratedArtifact>,
    /// Internal dependencies whose generation failed.
    pub unavailable: Vec<&'a str>,
    /// Dependencies that name nothing in the plan.
    pub external: Vec<&'a str>,
}

/// Build the user message asking for one component.
pub fn component_request(
    component: &ComponentSpec,
    plan: &AppPlan,
    stack: &TargetStack,
    neighbours: &ComponentContext<'_>,
) -> String {
    let mut out = String::new();

    out.push_str(&format!("## Component: {}\n\n", component.name));
    out.push_str(&format!("- Kind: {}\n", component.kind));
    out.push_str(&format!("- Purpose: {}\n", component.purpose));
    out.push_str(&format!("- Target path: {}\n\n", component.target_path));

    out.push_str("## Project context\n\n");
    out.push_str(&format!("- App: {} - {}\n", plan.app_name, plan.summary));
    out.push_str(&format!("- Architecture: {}\n", plan.architecture));
    if !plan.design_notes.trim().is_empty() {
        out.push_str(&format!("- Design notes: {}\n", plan.design_notes));
    }
    let stack_line = plan
        .target_stack
        .clone()
        .unwrap_or_else(|| stack.describe());
    out.push_str(&format!("- Stack: {}\n\n", stack_line));

    if !neighbours.produced.is_empty() {
        out.push_str("## Dependencies (already generated)\n\n");
        for artifact in &neighbours.produced {
            out.push_str(&format!(
                "### {} ({})\n```\n{}\n```\n\n",
                artifact.component_name,
                artifact.file_path,
                artifact.content.trim_end()
            ));
        }
    }

    if !neighbours.unavailable.is_empty() {
        out.push_str("## Unavailable dependencies\n\n");
        for name in &neighbours.unavailable {
            let target = plan
                .component(name)
                .map_or("unknown path", |c| c.target_path.as_str());
            out.push_str(&format!(
                "- {} ({}): generation failed; infer its interface from the plan\n",
                name, target
            ));
        }
        out.push('\n');
    }

    if !neighbours.external.is_empty() {
        out.push_str(&format!(
            "## External packages\n\nThis component uses: {}\n\n",
            neighbours.external.join(", ")
        ));
    }

    out.push_str(&format!(
        "Write the complete source for `{}` now.",
        component.target_path
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::ComponentOutput;

    fn plan() -> AppPlan {
        AppPlan {
            app_name: "notes".into(),
            summary: "take notes".into(),
            architecture: "spa with a store".into(),
            design_notes: String::new(),
            target_stack: None,
            components: vec![
                ComponentSpec::new("Store", "store", "src/store.ts"),
                ComponentSpec::new("Api", "service", "src/api.ts"),
                ComponentSpec::new("App", "page", "src/App.tsx")
                    .depending_on("Store")
                    .depending_on("Api")
                    .depending_on("react"),
            ],
        }
    }

    #[test]
    fn test_system_prompt_placeholders_filled() {
        let prompt = codegen_system_prompt(AppKind::Web, &TargetStack::web(), "Use hooks.");
        assert!(prompt.contains("expert web developer"));
        assert!(prompt.contains("React + Vite"));
        assert!(prompt.contains("Use hooks."));
        assert!(!prompt.contains("{stack}"));
        assert!(!plan_system_prompt(AppKind::Mobile, &TargetStack::mobile(), "").contains("{kind}"));
    }

    #[test]
    fn test_component_request_sections() {
        let plan = plan();
        let store = GeneratedArtifact::from_output(
            &plan.components[0],
            ComponentOutput {
                file_path: None,
                content: "export const store = {};".into(),
                assets: Vec::new(),
                libraries: Default::default(),
            },
        );
        let ctx = ComponentContext {
            produced: vec![&store],
            unavailable: vec!["Api"],
            external: vec!["react"],
        };
        let text = component_request(&plan.components[2], &plan, &TargetStack::web(), &ctx);
        assert!(text.contains("## Component: App"));
        assert!(text.contains("export const store = {};"));
        assert!(text.contains("- Api (src/api.ts): generation failed"));
        assert!(text.contains("This component uses: react"));
        assert!(text.contains("React + Vite"));
    }
}
