//! Cross-platform mobile application builder.

use super::BuilderCore;
use crate::handler::{
    AppKind, PreCheck, StageContext, StageError, StageHandler, StageInput, StageResult,
};
use async_trait::async_trait;
use forge_core::config::{PipelineConfig, StackOverride};
use forge_core::{ForgeConfig, TargetStack};
use forge_model::{ModelGateway, SchemaError};
use std::sync::Arc;

const MOBILE_GUIDANCE: &str = "\
## Mobile conventions

- Organise the app as screens plus a navigator; every screen must be registered
  in the navigator component.
- Use platform components (View, Text, Pressable, FlatList), never HTML elements.
- Keep touch targets at least 44 points and respect safe-area insets.
- List `app.json` and `package.json` as `config` components.";

/// Request phrases that ask for something a phone app cannot be.
const DESKTOP_ONLY: [&str; 3] = ["desktop only", "browser extension", "command-line tool"];

/// Builds phone apps (React Native with Expo by default).
pub struct MobileAppBuilder {
    core: BuilderCore,
}

impl MobileAppBuilder {
    pub fn new(
        gateway: Arc<dyn ModelGateway>,
        pipeline: &PipelineConfig,
        overrides: &StackOverride,
    ) -> Result<Self, SchemaError> {
        let stack = TargetStack::mobile().with_overrides(overrides);
        Ok(Self {
            core: BuilderCore::new(AppKind::Mobile, stack, MOBILE_GUIDANCE, gateway, pipeline)?,
        })
    }

    pub fn from_config(
        gateway: Arc<dyn ModelGateway>,
        config: &ForgeConfig,
    ) -> Result<Self, SchemaError> {
        Self::new(gateway, &config.pipeline, &config.stack.mobile)
    }
}

#[async_trait]
impl StageHandler for MobileAppBuilder {
    fn app_kind(&self) -> AppKind {
        self.core.kind()
    }

    fn stack(&self) -> &TargetStack {
        self.core.stack()
    }

    async fn precheck(&self, request: &str) -> PreCheck {
        let outcome = self.core.check_request(request);
        if outcome != PreCheck::Passed {
            return outcome;
        }
        if self.core.stack().platform.trim().is_empty() {
            return PreCheck::failed("the mobile stack has no target platform");
        }
        let lower = request.to_lowercase();
        if let Some(phrase) = DESKTOP_ONLY.iter().find(|p| lower.contains(*p)) {
            return PreCheck::failed(format!(
                "request mentions '{phrase}', which the mobile builder cannot produce"
            ));
        }
        PreCheck::Passed
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
