//! Single-page web application builder.

use super::BuilderCore;
use crate::handler::{
    AppKind, PreCheck, StageContext, StageError, StageHandler, StageInput, StageResult,
};
use async_trait::async_trait;
use forge_core::config::{PipelineConfig, StackOverride};
use forge_core::{ForgeConfig, TargetStack};
use forge_model::{ModelGateway, SchemaError};
use std::sync::Arc;

const WEB_GUIDANCE: &str = "\
## Web conventions

- Use function components and hooks; keep state local unless several pages share it.
- Put the entry point at `index.html` plus `src/main.tsx`, and list `package.json`
  and the bundler config as `config` components.
- Style with plain CSS modules unless the stack names a CSS library.
- Every page must be reachable from the root component.";

/// Builds browser apps (React + Vite by default).
pub struct WebAppBuilder {
    core: BuilderCore,
}

impl WebAppBuilder {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        pipeline: &PipelineConfig,
        overrides: &StackOverride,
    ) -> Result<Self, SchemaError> {
        let stack = TargetStack::web().with_overrides(overrides);
        Ok(Self {
            core: BuilderCore::new(AppKind::Web, stack, WEB_GUIDANCE, gateway, pipeline)?,
        })
    }

    pub fn from_config(
        gateway: Arc<dyn ModelGateway>,
        config: &ForgeConfig,
    ) -> Result<Self, SchemaError> {
        Self::new(gateway, &config.pipeline, &config.stack.web)
    }
}

#[async_trait]
impl StageHandler for WebAppBuilder {
    fn app_kind(&self) -> AppKind {
        self.core.kind()
    }

    fn stack(&self) -> &TargetStack {
        self.core.stack()
    }

    async fn precheck(&self, request: &str) -> PreCheck {
        self.core.check_request(request)
    }

    async fn initialize(
        &self,
        ctx: &StageContext,
        request: &str,
    ) -> Result<StageResult, StageError> {
        self.core.initialize(ctx, request).await
    }

    async fn generate_code(
        &self,
        ctx: &StageContext,
        input: StageInput,
    ) -> Result<StageResult, StageError> {
        self.core.generate_code(ctx, input).await
    }
}
