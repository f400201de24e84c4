// src/config/server.rs
// Server, database, session, and upload configuration

use serde::{Deserialize, Serialize};

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            host: super::helpers::env_or("EXCELLY_HOST", "0.0.0.0"),
            port: super::helpers::env_parsed("EXCELLY_PORT", 8000),
        }
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn from_env() -> Self {
        Self {
            url: super::helpers::env_or("DATABASE_URL", "sqlite://excelly.db"),
            max_connections: super::helpers::env_parsed("SQLITE_MAX_CONNECTIONS", 5),
        }
    }
}

/// Session lifecycle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Idle seconds after which a session is swept
    pub timeout_secs: u64,
    /// How often the background sweeper runs
    pub sweep_interval_secs: u64,
    /// Upper bound on clarification rounds per conversation
    pub max_clarifications: usize,
}

impl SessionConfig {
    pub fn from_env() -> Self {
        // Clamped to 2..=5: below 2 the flow can't gather anything useful,
        // above 5 users abandon the conversation.
        let max_clarifications = super::helpers::env_usize("MAX_CLARIFICATIONS", 2).clamp(2, 5);
        Self {
            timeout_secs: super::helpers::env_u64("SESSION_TIMEOUT", 3600),
            sweep_interval_secs: super::helpers::env_u64("SESSION_SWEEP_INTERVAL", 300),
            max_clarifications,
        }
    }
}

/// Upload validation configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Max upload size in bytes
    pub max_file_size: usize,
    pub allowed_extensions: Vec<String>,
}

impl UploadConfig {
    pub fn from_env() -> Self {
        Self {
            max_file_size: super::helpers::env_usize("MAX_FILE_SIZE", 10 * 1024 * 1024),
            allowed_extensions: vec![".xlsx".into(), ".xls".into(), ".csv".into()],
        }
    }

    pub fn extension_allowed(&self, filename: &str) -> bool {
        let lower = filename.to_lowercase();
        self.allowed_extensions.iter().any(|ext| lower.ends_with(ext.as_str()))
    }
}
