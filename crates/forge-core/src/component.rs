//! App plan, component and artifact types.
//!
//! [`AppPlan`] and [`ComponentOutput`] are the typed shapes the model is asked
//! to produce; their JSON Schemas are derived with `schemars` and enforced before
//! deserialization. [`GeneratedArtifact`] is what the generation stage hands back
//! to the caller.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeSet, HashSet};
use std::path::{Component, Path};

/// A named unit of the target application (a screen, a service module, ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ComponentSpec {
    /// Unique component name within the plan.
    pub name: String,
    /// Component category, e.g. "screen", "service", "model", "config".
    pub kind: String,
    /// One or two sentences describing what the component does.
    pub purpose: String,
    /// Relative path of the main source file for this component.
    pub target_path: String,
    /// Names of components (or external packages) this component depends on.
    #[serde(default)]
    pub depends_on: BTreeSet<String>,
}

impl ComponentSpec {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        kind: impl Into<String>,
        target_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            purpose: String::new(),
            target_path: target_path.into(),
            depends_on: BTreeSet::new(),
        }
    }

    /// Builder-style helper to add a dependency.
    #[must_use]
    pub fn depending_on(mut self, name: impl Into<String>) -> Self {
        self.depends_on.insert(name.into());
        self
    }

    #[must_use]
    pub fn with_purpose(mut self, purpose: impl Into<String>) -> Self {
        self.purpose = purpose.into();
        self
    }
}

/// The structured plan produced by the initialize stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AppPlan {
    /// Short application name.
    pub app_name: String,
    /// What the application does, in a paragraph.
    pub summary: String,
    /// Architecture description: layers, data flow, state management.
    pub architecture: String,
    /// Visual and interaction design notes.
    #[serde(default)]
    pub design_notes: String,
    /// Framework/language stack the plan assumes, if the model states one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_stack: Option<String>,
    /// Every component to generate.
    pub components: Vec<ComponentSpec>,
}

impl AppPlan {
    /// Typed checks that JSON Schema cannot express.
    ///
    /// Returns one message per problem: an empty component list, blank or
    /// duplicate names, and target paths that are absolute or leave the
    /// output directory.
    pub fn conformance_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.components.is_empty() {
            errors.push("components: plan must contain at least one component".to_string());
        }

        let mut seen: HashSet<&str> = HashSet::new();
        for (idx, component) in self.components.iter().enumerate() {
            if component.name.trim().is_empty() {
                errors.push(format!("components/{}/name: must not be blank", idx));
            } else if !seen.insert(component.name.as_str()) {
                errors.push(format!(
                    "components/{}/name: duplicate component name '{}'",
                    idx, component.name
                ));
            }
            if let Some(problem) = relative_path_problem(&component.target_path) {
                errors.push(format!("components/{}/target_path: {}", idx, problem));
            }
        }
        errors
    }

    /// Look up a component by name.
    pub fn component(&self, name: &str) -> Option<&ComponentSpec> {
        self.components.iter().find(|c| c.name == name)
    }
}

/// An extra file emitted alongside a component's main source (media, styles, fixtures).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AuxiliaryAsset {
    /// Relative path of the asset.
    pub path: String,
    /// Full text content of the asset.
    pub content: String,
}

/// The structured result the model returns for one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ComponentOutput {
    /// Relative path of the generated file; defaults to the component's target path.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    /// Complete source code of the file.
    pub content: String,
    /// Additional files this component needs.
    #[serde(default)]
    pub assets: Vec<AuxiliaryAsset>,
    /// Third-party libraries the code imports.
    #[serde(default)]
    pub libraries: BTreeSet<String>,
}

impl ComponentOutput {
    /// Paths the output root cannot hold: absolute or parent-traversing
    /// `file_path` and asset paths. A blank `file_path` is allowed and falls
    /// back to the component's target path.
    pub fn conformance_errors(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if let Some(path) = self.file_path.as_deref().filter(|p| !p.trim().is_empty())
            && let Some(problem) = relative_path_problem(path)
        {
            errors.push(format!("file_path: {}", problem));
        }
        for (idx, asset) in self.assets.iter().enumerate() {
            if let Some(problem) = relative_path_problem(&asset.path) {
                errors.push(format!("assets/{}/path: {}", idx, problem));
            }
        }
        errors
    }
}

/// Why `path` cannot be written beneath an output directory, if it cannot.
pub fn relative_path_problem(path: &str) -> Option<String> {
    let rel = Path::new(path.trim());
    if rel.as_os_str().is_empty() {
        return Some("path is empty".to_string());
    }
    for component in rel.components() {
        match component {
            Component::Normal(_) | Component::CurDir => {}
            Component::ParentDir => {
                return Some(format!("path '{}' escapes the output directory", path));
            }
            Component::RootDir | Component::Prefix(_) => {
                return Some(format!("path '{}' must be relative", path));
            }
        }
    }
    None
}

/// Generated code (plus assets) for one component.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedArtifact {
    pub component_name: String,
    pub file_path: String,
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub auxiliary_assets: Vec<AuxiliaryAsset>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub libraries_used: BTreeSet<String>,
    /// SHA-256 of `content` (not the content itself)
    pub content_digest: String,
    pub generated_at: DateTime<Utc>,
}

impl GeneratedArtifact {
    /// Build the artifact for `spec` from the model's validated output.
    #[must_use]
    pub fn from_output(spec: &ComponentSpec, output: ComponentOutput) -> Self {
        let file_path = output
            .file_path
            .filter(|p| !p.trim().is_empty())
            .unwrap_or_else(|| spec.target_path.clone());
        Self {
            component_name: spec.name.clone(),
            file_path,
            content_digest: content_digest(&output.content),
            content: output.content,
            auxiliary_assets: output.assets,
            libraries_used: output.libraries,
            generated_at: Utc::now(),
        }
    }
}

/// Hex-encoded SHA-256 of a piece of content.
pub fn content_digest(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    format!("{:x}", hasher.finalize())
}
