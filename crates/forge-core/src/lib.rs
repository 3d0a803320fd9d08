//! Core types for AppForge build sessions.
//!
//! Provides the stage ordering ([`stage::Stage`]), conversation messages, the app
//! plan / component / artifact model, layered configuration, and the storage
//! helpers callers use to persist plans and materialize generated files.

pub mod component;
pub mod config;
pub mod conversation;
pub mod stage;
pub mod storage;

pub use component::{AppPlan, AuxiliaryAsset, ComponentOutput, ComponentSpec, GeneratedArtifact};
pub use config::{ForgeConfig, TargetStack};
pub use conversation::{ConversationMessage, Role};
pub use stage::Stage;
