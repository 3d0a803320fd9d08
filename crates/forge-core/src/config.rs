//! Configuration for model access, the build pipeline and target stacks.
//!
//! Load order: `.forge/config.toml` → environment variables → defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::stage::{self, Stage};

/// Default bound on validated-call retries (attempts = bound + 1).
pub const MAX_RETRY_COUNT: usize = 3;

/// Top-level AppForge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ForgeConfig {
    pub llm: LlmConfig,
    pub pipeline: PipelineConfig,
    pub stack: StackConfig,
}

/// Model provider and transport settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Force a provider: anthropic, openai, moonshot, openai-compatible, ollama, local.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,
    /// Model override for cloud providers.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    pub max_tokens: u32,
    /// Base URL probed for Ollama / used by local servers.
    pub local_url: String,
    pub local_model: String,
    pub request_timeout_secs: u64,
    /// Transport-level attempts per request (network errors, 5xx).
    pub retry_attempts: u32,
    /// Backoff schedule between transport attempts; the last entry repeats.
    pub retry_delays_ms: Vec<u64>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: None,
            model: None,
            max_tokens: 4096,
            local_url: "http://localhost:11434".to_string(),
            local_model: "qwen2.5-coder:7b".to_string(),
            request_timeout_secs: 120,
            retry_attempts: 3,
            retry_delays_ms: vec![1000, 2000, 4000],
        }
    }
}

/// Stage engine and generation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Ordered stages run by a build.
    pub active_stages: Vec<Stage>,
    /// Retries after the first attempt of a validated model call.
    pub max_retries: usize,
    /// Append the failed response plus an error note before retrying.
    /// When false the identical conversation is resent.
    pub corrective_retries: bool,
    /// Only pass the most recent N history messages to each component request.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_window: Option<usize>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            active_stages: Stage::DEFAULT_PATH.to_vec(),
            max_retries: MAX_RETRY_COUNT,
            corrective_retries: false,
            context_window: None,
        }
    }
}

/// Per-app-kind stack overrides.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StackConfig {
    pub web: StackOverride,
    pub mobile: StackOverride,
}

/// Optional replacements for fields of a builder's default [`TargetStack`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StackOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub framework: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub libraries: Option<Vec<String>>,
}

/// The technology stack an app builder targets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TargetStack {
    pub framework: String,
    pub language: String,
    pub platform: String,
    pub libraries: Vec<String>,
}

impl TargetStack {
    /// Single-page web app defaults.
    #[must_use]
    pub fn web() -> Self {
        Self {
            framework: "React + Vite".to_string(),
            language: "TypeScript".to_string(),
            platform: "web browser".to_string(),
            libraries: vec!["react".to_string(), "react-dom".to_string()],
        }
    }

    /// Cross-platform mobile app defaults.
    #[must_use]
    pub fn mobile() -> Self {
        Self {
            framework: "React Native (Expo)".to_string(),
            language: "TypeScript".to_string(),
            platform: "iOS and Android".to_string(),
            libraries: vec!["expo".to_string(), "react-native".to_string()],
        }
    }

    /// Apply any fields set in `overrides`.
    #[must_use]
    pub fn with_overrides(mut self, overrides: &StackOverride) -> Self {
        if let Some(framework) = &overrides.framework {
            self.framework.clone_from(framework);
        }
        if let Some(language) = &overrides.language {
            self.language.clone_from(language);
        }
        if let Some(platform) = &overrides.platform {
            self.platform.clone_from(platform);
        }
        if let Some(libraries) = &overrides.libraries {
            self.libraries.clone_from(libraries);
        }
        self
    }

    /// One-line description used in prompts.
    #[must_use]
    pub fn describe(&self) -> String {
        let mut line = format!("{} ({}) targeting {}", self.framework, self.language, self.platform);
        if !self.libraries.is_empty() {
            line.push_str(&format!("; core libraries: {}", self.libraries.join(", ")));
        }
        line
    }
}

/// Helper to parse an env var and apply it to a config field.
fn env_override<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(v) = std::env::var(var)
        && let Ok(n) = v.parse()
    {
        *target = n;
    }
}

fn env_override_opt(var: &str, target: &mut Option<String>) {
    if let Ok(v) = std::env::var(var)
        && !v.trim().is_empty()
    {
        *target = Some(v);
    }
}

impl ForgeConfig {
    /// Load config from `.forge/config.toml` in the project root, with env var overrides.
    /// Falls back to defaults if no config file exists.
    pub fn load(project_root: &Path) -> Result<Self> {
        let config_path = crate::storage::forge_dir(project_root).join("config.toml");

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read {}", config_path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("invalid config in {}", config_path.display()))?
        } else {
            Self::default()
        };

        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        env_override_opt("FORGE_PROVIDER", &mut self.llm.provider);
        env_override_opt("FORGE_MODEL", &mut self.llm.model);
        env_override("FORGE_MAX_TOKENS", &mut self.llm.max_tokens);
        env_override("FORGE_LOCAL_URL", &mut self.llm.local_url);
        env_override("FORGE_MAX_RETRIES", &mut self.pipeline.max_retries);
    }

    /// Reject configurations the engine cannot run.
    pub fn validate(&self) -> Result<()> {
        if let Err(reason) = stage::validate_path(&self.pipeline.active_stages) {
            anyhow::bail!("invalid pipeline.active_stages: {}", reason);
        }
        if self.llm.max_tokens == 0 {
            anyhow::bail!("llm.max_tokens must be greater than zero");
        }
        if self.pipeline.context_window == Some(0) {
            anyhow::bail!("pipeline.context_window must be at least 1 when set");
        }
        Ok(())
    }
}
