// src/llm/provider/mod.rs
// Completion backend trait - vendor APIs stay black boxes behind this seam

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub mod gemini;
pub mod openai;

pub use gemini::GeminiBackend;
pub use openai::OpenAiBackend;

/// One completed call: text plus metadata for logging and persistence.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Completion {
    pub text: String,
    pub model: String,
    pub latency_ms: i64,
}

/// Attached image for the image-capable path.
#[derive(Debug, Clone)]
pub struct ImageInput {
    pub bytes: Vec<u8>,
    /// e.g. "image/png"
    pub mime_type: String,
}

/// Uniform text-completion interface over all model backends.
///
/// Implementations are cheap to clone behind an Arc and are constructed
/// once at startup, then injected wherever completions are needed.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Backend name for logging
    fn name(&self) -> &'static str;

    /// Model identifier reported in responses
    fn model(&self) -> &str;

    /// Whether the backend has credentials configured
    fn is_available(&self) -> bool;

    /// Single-prompt text completion
    async fn complete(&self, prompt: &str, temperature: f32) -> Result<Completion>;

    /// Prompt plus one attached image. Backends without vision support
    /// return an error and the caller degrades.
    async fn complete_with_image(
        &self,
        _prompt: &str,
        _image: &ImageInput,
        _temperature: f32,
    ) -> Result<Completion> {
        Err(anyhow::anyhow!("{} does not support image input", self.name()))
    }
}
