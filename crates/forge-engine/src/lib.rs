//! Staged build orchestration for AppForge.
//!
//! A [`StageEngine`] drives one [`BuildSession`] through the active stages of a
//! [`StageHandler`] (one of the [`builders`]). Code generation resolves the plan's
//! component dependencies ([`resolver`]) and generates one component at a time
//! through a schema-validated model call ([`generation`]).

pub mod builders;
pub mod engine;
pub mod generation;
pub mod handler;
pub mod prompts;
pub mod resolver;
pub mod session;

pub use builders::{MobileAppBuilder, WebAppBuilder};
pub use engine::{EngineError, StageEngine};
pub use generation::{ComponentFailure, GenerationPipeline, GenerationReport, GenerationSettings};
pub use handler::{
    AppKind, NullSink, PreCheck, ProgressSink, StageContext, StageError, StageHandler, StageInput,
    StageOutput, StageResult, TracingSink,
};
pub use resolver::{ResolveError, dependency_layers, resolve};
pub use session::BuildSession;
