//! Model access for AppForge.
//!
//! [`ModelGateway`] is the seam to a generative-model backend; [`HttpGateway`]
//! implements it over the Anthropic, OpenAI-style and Ollama HTTP APIs.
//! [`ValidatedCall`] layers JSON extraction, schema validation and a bounded
//! retry loop on top of any gateway.

pub mod client;
pub mod extract;
pub mod gateway;
mod ollama;
pub mod protocol;
pub mod providers;
pub mod schema;

pub use client::HttpGateway;
pub use extract::{ExtractError, extract_json};
pub use gateway::{GatewayError, ModelGateway};
pub use protocol::{AttemptError, ProtocolError, Validated, ValidatedCall};
pub use providers::LlmProvider;
pub use schema::{FieldError, OutputSchema, SchemaError};
