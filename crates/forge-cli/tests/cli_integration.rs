//! Integration tests for forge-cli functionality.
//! Tests the underlying library functions that the CLI commands invoke.

use async_trait::async_trait;
use forge_core::config::ForgeConfig;
use forge_core::{ConversationMessage, Role, Stage, storage};
use forge_engine::{StageEngine, StageOutput, WebAppBuilder, dependency_layers, resolve};
use forge_model::{GatewayError, ModelGateway};
use serde_json::json;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Answers plan requests with a fixed two-component plan and component
/// requests with a small module.
struct CannedGateway;

#[async_trait]
impl ModelGateway for CannedGateway {
    async fn send(
        &self,
        messages: &[ConversationMessage],
        _cancel: &CancellationToken,
    ) -> Result<String, GatewayError> {
        let last = messages.last().ok_or(GatewayError::EmptyResponse)?;
        if messages[0].role == Role::System && messages[0].content.contains("application architect") {
            return Ok(json!({
                "app_name": "todo",
                "summary": "Track tasks",
                "architecture": "store and one page",
                "components": [
                    {"name": "Page", "kind": "page", "purpose": "list", "target_path": "src/Page.tsx", "depends_on": ["Store"]},
                    {"name": "Store", "kind": "store", "purpose": "state", "target_path": "src/store.ts"}
                ]
            })
            .to_string());
        }
        let name = if last.content.starts_with("## Component: Store") {
            "Store"
        } else {
            "Page"
        };
        Ok(format!(
            "```json\n{}\n```",
            json!({
                "content": format!("export const {name} = {{}};"),
                "assets": [{"path": format!("src/{name}.css"), "content": "body {}"}],
                "libraries": ["react"]
            })
        ))
    }

    fn model_name(&self) -> &str {
        "canned"
    }
}

#[test]
fn test_config_defaults_without_file() {
    let tmpdir = tempfile::tempdir().unwrap();
    let config = ForgeConfig::load(tmpdir.path()).unwrap();
    assert_eq!(config.pipeline.active_stages, Stage::DEFAULT_PATH);
    assert!(config.pipeline.max_retries > 0);
}

#[test]
fn test_config_from_file() {
    let tmpdir = tempfile::tempdir().unwrap();
    let dir = storage::forge_dir(tmpdir.path());
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("config.toml"),
        "[pipeline]\nactive_stages = [\"precheck\", \"initialize\"]\ncontext_window = 4\n\n[stack.web]\nframework = \"Svelte\"\n",
    )
    .unwrap();

    let config = ForgeConfig::load(tmpdir.path()).unwrap();
    assert_eq!(
        config.pipeline.active_stages,
        [Stage::PreCheck, Stage::Initialize]
    );
    assert_eq!(config.pipeline.context_window, Some(4));
    assert_eq!(config.stack.web.framework.as_deref(), Some("Svelte"));

    // Printed by `appforge config`.
    let rendered = toml::to_string_pretty(&config).unwrap();
    assert!(rendered.contains("Svelte"));
}

#[test]
fn test_config_rejects_bad_stage_list() {
    let tmpdir = tempfile::tempdir().unwrap();
    let dir = storage::forge_dir(tmpdir.path());
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(
        dir.join("config.toml"),
        "[pipeline]\nactive_stages = [\"initialize\", \"precheck\"]\n",
    )
    .unwrap();

    assert!(ForgeConfig::load(tmpdir.path()).is_err());
}

#[tokio::test]
async fn test_build_saves_plan_report_and_files() {
    let tmpdir = tempfile::tempdir().unwrap();
    let root = tmpdir.path();
    let config = ForgeConfig::load(root).unwrap();

    let builder = WebAppBuilder::from_config(Arc::new(CannedGateway), &config).unwrap();
    let engine = StageEngine::new(
        Arc::new(builder),
        "a todo app",
        &config.pipeline.active_stages,
    )
    .unwrap();
    engine.execute().await.unwrap();

    let session = engine.session().await;
    let plan = session.plan().unwrap();
    let report = session
        .latest_output()
        .and_then(StageOutput::as_report)
        .unwrap();
    assert!(report.is_complete());
    assert_eq!(report.order, ["Store", "Page"]);

    let plan_path = storage::save_plan(root, plan).unwrap();
    let report_path = storage::save_report(root, report).unwrap();
    assert!(report_path.exists());

    let out_dir = storage::safe_join(root, &plan.app_name).unwrap();
    let written = storage::materialize(&out_dir, &report.artifacts).unwrap();
    assert_eq!(written.len(), 4);
    assert_eq!(
        std::fs::read_to_string(out_dir.join("src/store.ts")).unwrap(),
        "export const Store = {};"
    );
    assert!(out_dir.join("src/Page.css").exists());

    // `appforge order` on the saved plan.
    let loaded = storage::load_plan(&plan_path).unwrap();
    let order: Vec<&str> = resolve(&loaded.components)
        .unwrap()
        .iter()
        .map(|c| c.name.as_str())
        .collect();
    assert_eq!(order, ["Store", "Page"]);
    assert_eq!(dependency_layers(&loaded.components).unwrap().len(), 2);
}

#[tokio::test]
async fn test_plan_only_path_has_no_report() {
    let tmpdir = tempfile::tempdir().unwrap();
    let config = ForgeConfig::load(tmpdir.path()).unwrap();

    let builder = WebAppBuilder::from_config(Arc::new(CannedGateway), &config).unwrap();
    let engine = StageEngine::new(
        Arc::new(builder),
        "a todo app",
        &[Stage::PreCheck, Stage::Initialize],
    )
    .unwrap();
    engine.execute().await.unwrap();

    let session = engine.session().await;
    assert_eq!(session.stage(), Stage::Initialize);
    assert_eq!(session.plan().unwrap().components.len(), 2);
    assert!(
        session
            .latest_output()
            .and_then(StageOutput::as_report)
            .is_none()
    );
}
