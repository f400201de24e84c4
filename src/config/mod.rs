// src/config/mod.rs
// Central configuration for the assistant backend

pub mod helpers;
pub mod llm;
pub mod server;

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

lazy_static! {
    pub static ref CONFIG: ExcellyConfig = ExcellyConfig::from_env();
}

/// Main configuration structure - composes all domain configs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcellyConfig {
    pub openai: llm::OpenAiConfig,
    pub gemini: llm::GeminiConfig,
    pub server: server::ServerConfig,
    pub database: server::DatabaseConfig,
    pub session: server::SessionConfig,
    pub upload: server::UploadConfig,
}

impl ExcellyConfig {
    pub fn from_env() -> Self {
        // Don't panic if .env doesn't exist (for production)
        dotenvy::dotenv().ok();

        Self {
            openai: llm::OpenAiConfig::from_env(),
            gemini: llm::GeminiConfig::from_env(),
            server: server::ServerConfig::from_env(),
            database: server::DatabaseConfig::from_env(),
            session: server::SessionConfig::from_env(),
            upload: server::UploadConfig::from_env(),
        }
    }

    /// Validate config on startup. At least one backend key must be set;
    /// the gateway degrades across whatever tiers are configured.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.openai.validate().is_err() && self.gemini.validate().is_err() {
            anyhow::bail!("no model backend configured: set OPENAI_API_KEY or GEMINI_API_KEY");
        }
        Ok(())
    }

    pub fn bind_address(&self) -> String {
        self.server.bind_address()
    }
}

impl Default for ExcellyConfig {
    fn default() -> Self {
        Self::from_env()
    }
}
