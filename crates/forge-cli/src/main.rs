//! CLI binary for AppForge: plan and generate applications with an LLM.

mod progress;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use forge_core::{ForgeConfig, Stage, storage};
use forge_engine::{
    BuildSession, GenerationReport, MobileAppBuilder, StageEngine, StageHandler, StageOutput,
    WebAppBuilder, dependency_layers, resolve,
};
use forge_model::{HttpGateway, ModelGateway};
use progress::BuildProgress;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "appforge", about = "Plan and generate applications with an LLM")]
struct Cli {
    /// Project root directory (defaults to current directory)
    #[arg(short, long, global = true)]
    project: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum AppKindArg {
    Web,
    Mobile,
}

#[derive(Subcommand)]
enum Commands {
    /// Plan and generate an application from a request
    Build {
        /// What to build, in plain language
        request: String,

        /// Kind of application
        #[arg(short, long, value_enum, default_value = "web")]
        kind: AppKindArg,

        /// Directory to write generated files into (defaults to <project>/<app_name>)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Produce and save an app plan without generating code
    Plan {
        /// What to build, in plain language
        request: String,

        /// Kind of application
        #[arg(short, long, value_enum, default_value = "web")]
        kind: AppKindArg,
    },

    /// Show the generation order of a saved plan
    Order {
        /// Path to a plan JSON file (defaults to .forge/plan.json)
        plan: Option<PathBuf>,
    },

    /// Print the effective configuration
    Config,
}

fn get_project_root(cli: &Cli) -> Result<PathBuf> {
    match &cli.project {
        Some(p) => Ok(p.clone()),
        None => std::env::current_dir().context("failed to get current directory"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let project_root = get_project_root(&cli)?;

    match cli.command {
        Commands::Build { request, kind, out } => {
            cmd_build(&project_root, &request, kind, out).await
        }
        Commands::Plan { request, kind } => cmd_plan(&project_root, &request, kind).await,
        Commands::Order { plan } => cmd_order(&project_root, plan),
        Commands::Config => cmd_config(&project_root),
    }
}

async fn make_handler(config: &ForgeConfig, kind: AppKindArg) -> Result<Arc<dyn StageHandler>> {
    let gateway = HttpGateway::from_config(&config.llm).await?;
    eprintln!(
        "Using {} ({})",
        gateway.provider_name(),
        gateway.model_name()
    );
    let gateway: Arc<dyn ModelGateway> = Arc::new(gateway);

    let handler: Arc<dyn StageHandler> = match kind {
        AppKindArg::Web => Arc::new(WebAppBuilder::from_config(gateway, config)?),
        AppKindArg::Mobile => Arc::new(MobileAppBuilder::from_config(gateway, config)?),
    };
    Ok(handler)
}

/// Run `stages` for `request`, cancelling on Ctrl-C.
async fn run_stages(
    config: &ForgeConfig,
    request: &str,
    kind: AppKindArg,
    stages: &[Stage],
) -> Result<BuildSession> {
    let handler = make_handler(config, kind).await?;
    let progress = Arc::new(BuildProgress::new());
    let engine = StageEngine::new(handler, request, stages)?.with_progress(progress.clone());

    let cancel = engine.cancellation_token();
    let watcher = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let result = engine.execute().await;
    watcher.abort();
    progress.finish();
    result?;

    let session = engine.session().await;
    if session.stage() == Stage::Cancelled {
        anyhow::bail!(
            "build cancelled: {}",
            session.cancel_reason().unwrap_or("no reason given")
        );
    }
    Ok(session)
}

async fn cmd_build(
    project_root: &Path,
    request: &str,
    kind: AppKindArg,
    out: Option<PathBuf>,
) -> Result<()> {
    let config = ForgeConfig::load(project_root)?;
    let session = run_stages(&config, request, kind, &config.pipeline.active_stages).await?;

    let Some(plan) = session.plan() else {
        eprintln!("No plan was produced; nothing to save.");
        return Ok(());
    };
    let plan_path = storage::save_plan(project_root, plan)?;
    eprintln!("Saved plan to {}", plan_path.display());

    let Some(report) = session.latest_output().and_then(StageOutput::as_report) else {
        eprintln!("Code generation is not part of the active stages.");
        return Ok(());
    };
    let report_path = storage::save_report(project_root, report)?;

    let out_dir = match out {
        Some(dir) => dir,
        None => storage::safe_join(project_root, &plan.app_name)?,
    };
    let written = storage::materialize(&out_dir, &report.artifacts)?;

    print_summary(report, &out_dir, written.len());
    eprintln!("Saved report to {}", report_path.display());
    if !report.is_complete() {
        anyhow::bail!(
            "{} of {} components failed to generate",
            report.failures.len(),
            report.order.len()
        );
    }
    Ok(())
}

async fn cmd_plan(project_root: &Path, request: &str, kind: AppKindArg) -> Result<()> {
    let config = ForgeConfig::load(project_root)?;
    let session = run_stages(&config, request, kind, &[Stage::PreCheck, Stage::Initialize]).await?;

    let plan = session
        .plan()
        .context("planning finished without producing a plan")?;
    let plan_path = storage::save_plan(project_root, plan)?;
    println!("{}", serde_json::to_string_pretty(plan)?);
    eprintln!("Saved plan to {}", plan_path.display());
    Ok(())
}

fn cmd_order(project_root: &Path, plan: Option<PathBuf>) -> Result<()> {
    let path = plan.unwrap_or_else(|| storage::plan_file(project_root));
    let plan = storage::load_plan(&path)?;

    let order = resolve(&plan.components)?;
    println!("Generation order for {} ({} components):", plan.app_name, order.len());
    for (idx, component) in order.iter().enumerate() {
        println!("  {:>3}. {} ({})", idx + 1, component.name, component.target_path);
    }

    let layers = dependency_layers(&plan.components)?;
    println!("\nDependency layers:");
    for (depth, layer) in layers.iter().enumerate() {
        let names: Vec<&str> = layer.iter().map(|c| c.name.as_str()).collect();
        println!("  {}: {}", depth, names.join(", "));
    }
    Ok(())
}

fn cmd_config(project_root: &Path) -> Result<()> {
    let config = ForgeConfig::load(project_root)?;
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

fn print_summary(report: &GenerationReport, out_dir: &Path, files_written: usize) {
    println!(
        "Generated {}/{} components ({} files) into {}",
        report.artifacts.len(),
        report.order.len(),
        files_written,
        out_dir.display()
    );
    for failure in &report.failures {
        println!(
            "  FAILED {} after {} attempts: {}",
            failure.component, failure.attempts, failure.reason
        );
    }
}
