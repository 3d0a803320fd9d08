//! Read/write build hand-off files and materialize generated artifacts.

use crate::component::{AppPlan, GeneratedArtifact, relative_path_problem};
use anyhow::{Context, Result};
use serde::Serialize;
use std::fs;
use std::path::{Path, PathBuf};

const FORGE_DIR: &str = ".forge";
const PLAN_FILE: &str = "plan.json";
const REPORT_FILE: &str = "report.json";

/// Get the path to the AppForge directory for a given project root.
pub fn forge_dir(project_root: &Path) -> PathBuf {
    project_root.join(FORGE_DIR)
}

/// Get the path to the saved plan for a given project root.
pub fn plan_file(project_root: &Path) -> PathBuf {
    forge_dir(project_root).join(PLAN_FILE)
}

/// Get the path to the saved generation report for a given project root.
pub fn report_file(project_root: &Path) -> PathBuf {
    forge_dir(project_root).join(REPORT_FILE)
}

/// Save a plan to `.forge/plan.json`, creating the directory if needed.
pub fn save_plan(project_root: &Path, plan: &AppPlan) -> Result<PathBuf> {
    write_json(&plan_file(project_root), plan)
}

/// Save a generation report to `.forge/report.json`.
pub fn save_report<T: Serialize>(project_root: &Path, report: &T) -> Result<PathBuf> {
    write_json(&report_file(project_root), report)
}

/// Load a plan from an explicit file path.
pub fn load_plan(path: &Path) -> Result<AppPlan> {
    let json = fs::read_to_string(path)
        .with_context(|| format!("failed to read plan from {}", path.display()))?;
    serde_json::from_str(&json).with_context(|| format!("invalid plan JSON in {}", path.display()))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<PathBuf> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create directory {}", dir.display()))?;
    }
    let json = serde_json::to_string_pretty(value)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path.to_path_buf())
}

/// Resolve `relative` under `root`, refusing absolute paths and `..` components.
pub fn safe_join(root: &Path, relative: &str) -> Result<PathBuf> {
    if let Some(problem) = relative_path_problem(relative) {
        anyhow::bail!("artifact {}", problem);
    }
    Ok(root.join(relative.trim()))
}

/// Write every artifact and its auxiliary assets under `output_root`.
///
/// Every path is checked before anything is written, so an unsafe path leaves
/// the output directory untouched. Returns the written paths in order.
pub fn materialize(output_root: &Path, artifacts: &[GeneratedArtifact]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for artifact in artifacts {
        let entries = std::iter::once((artifact.file_path.as_str(), artifact.content.as_str()))
            .chain(
                artifact
                    .auxiliary_assets
                    .iter()
                    .map(|a| (a.path.as_str(), a.content.as_str())),
            );
        for (relative, content) in entries {
            let path = safe_join(output_root, relative).with_context(|| {
                format!("refusing to write artifact for '{}'", artifact.component_name)
            })?;
            files.push((path, content));
        }
    }

    let mut written = Vec::with_capacity(files.len());
    for (path, content) in files {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir)
                .with_context(|| format!("failed to create directory {}", dir.display()))?;
        }
        fs::write(&path, content)
            .with_context(|| format!("failed to write {}", path.display()))?;
        written.push(path);
    }
    Ok(written)
}
