// src/llm/provider/gemini.rs

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::debug;

use super::{Completion, CompletionBackend, ImageInput};

/// Gemini generateContent backend. One instance per model tier
/// (pro / flash / flash-lite) sharing the same API key.
#[derive(Clone)]
pub struct GeminiBackend {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
    name: &'static str,
}

impl GeminiBackend {
    pub fn new(api_key: String, model: String, base_url: String, name: &'static str) -> Self {
        GeminiBackend {
            client: Client::new(),
            api_key,
            base_url,
            model,
            name,
        }
    }

    async fn send(&self, parts: Value, temperature: f32) -> Result<Completion> {
        if self.api_key.is_empty() {
            return Err(anyhow!("Gemini API key is not configured"));
        }

        let url = format!(
            "{}/models/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = json!({
            "contents": [{"parts": parts}],
            "generationConfig": {"temperature": temperature},
        });

        let start = Instant::now();
        let response = self.client.post(&url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("Gemini API error ({}): {}", status, error_text));
        }

        let data: Value = response.json().await?;
        let text = data["candidates"][0]["content"]["parts"][0]["text"]
            .as_str()
            .ok_or_else(|| anyhow!("Gemini response missing text part"))?
            .to_string();

        let latency_ms = start.elapsed().as_millis() as i64;
        debug!(model = %self.model, latency_ms, "gemini completion ok");

        Ok(Completion {
            text,
            model: self.model.clone(),
            latency_ms,
        })
    }
}

#[async_trait]
impl CompletionBackend for GeminiBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<Completion> {
        self.send(json!([{"text": prompt}]), temperature).await
    }

    async fn complete_with_image(
        &self,
        prompt: &str,
        image: &ImageInput,
        temperature: f32,
    ) -> Result<Completion> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&image.bytes);
        let parts = json!([
            {"text": prompt},
            {"inline_data": {"mime_type": image.mime_type, "data": encoded}},
        ]);
        self.send(parts, temperature).await
    }
}
