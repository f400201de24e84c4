// src/config/llm.rs
// Model backend configuration: API keys, model names, per-tier timeouts

use serde::{Deserialize, Serialize};

/// OpenAI backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl OpenAiConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: super::helpers::env_or("OPENAI_API_KEY", ""),
            model: super::helpers::env_or("OPENAI_MODEL", "gpt-4o-mini"),
            base_url: super::helpers::env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            timeout_secs: super::helpers::env_u64("AI_REQUEST_TIMEOUT", 60),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_key.is_empty() {
            anyhow::bail!("OPENAI_API_KEY is not set");
        }
        Ok(())
    }
}

/// Gemini backend configuration.
///
/// Three tiers share one key: the flagship (pro) model, the flash model,
/// and the lite model used for cheap short calls. Flash tiers get a
/// shorter timeout than the flagship.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeminiConfig {
    pub api_key: String,
    pub pro_model: String,
    pub flash_model: String,
    pub flash_lite_model: String,
    pub base_url: String,
    pub pro_timeout_secs: u64,
    pub flash_timeout_secs: u64,
}

impl GeminiConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: super::helpers::env_or("GEMINI_API_KEY", ""),
            pro_model: super::helpers::env_or("GEMINI_PRO_MODEL", "gemini-2.5-pro"),
            flash_model: super::helpers::env_or("GEMINI_FLASH_MODEL", "gemini-2.5-flash"),
            flash_lite_model: super::helpers::env_or("GEMINI_FLASH_LITE_MODEL", "gemini-2.0-flash"),
            base_url: super::helpers::env_or(
                "GEMINI_BASE_URL",
                "https://generativelanguage.googleapis.com/v1beta",
            ),
            pro_timeout_secs: super::helpers::env_u64("AI_REQUEST_TIMEOUT", 60),
            flash_timeout_secs: super::helpers::env_u64("AI_FLASH_TIMEOUT", 30),
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.api_key.is_empty() {
            anyhow::bail!("GEMINI_API_KEY is not set");
        }
        Ok(())
    }
}
