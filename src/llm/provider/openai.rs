// src/llm/provider/openai.rs

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::debug;

use super::{Completion, CompletionBackend, ImageInput};

/// OpenAI chat-completions backend.
#[derive(Clone)]
pub struct OpenAiBackend {
    client: Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiBackend {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        OpenAiBackend {
            client: Client::new(),
            api_key,
            base_url,
            model,
        }
    }

    async fn send(&self, body: Value) -> Result<Completion> {
        if self.api_key.is_empty() {
            return Err(anyhow!("OpenAI API key is not configured"));
        }

        let start = Instant::now();
        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(anyhow!("OpenAI API error ({}): {}", status, error_text));
        }

        let data: Value = response.json().await?;
        let text = data["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| anyhow!("OpenAI response missing message content"))?
            .to_string();

        let latency_ms = start.elapsed().as_millis() as i64;
        debug!(model = %self.model, latency_ms, "openai completion ok");

        Ok(Completion {
            text,
            model: self.model.clone(),
            latency_ms,
        })
    }
}

#[async_trait]
impl CompletionBackend for OpenAiBackend {
    fn name(&self) -> &'static str {
        "openai"
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn is_available(&self) -> bool {
        !self.api_key.is_empty()
    }

    async fn complete(&self, prompt: &str, temperature: f32) -> Result<Completion> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "temperature": temperature,
        });
        self.send(body).await
    }

    async fn complete_with_image(
        &self,
        prompt: &str,
        image: &ImageInput,
        temperature: f32,
    ) -> Result<Completion> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(&image.bytes);
        let body = json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    {"type": "text", "text": prompt},
                    {"type": "image_url", "image_url": {
                        "url": format!("data:{};base64,{}", image.mime_type, encoded)
                    }},
                ],
            }],
            "temperature": temperature,
        });
        self.send(body).await
    }
}
