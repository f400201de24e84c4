// src/llm/mod.rs
// Model gateway and backend providers

pub mod gateway;
pub mod provider;

pub use gateway::{BackendId, GatewayError, ModelGateway, TaskKind};
pub use provider::{Completion, CompletionBackend, ImageInput};
