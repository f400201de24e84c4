// src/error.rs
// Error types for the assistant backend

use thiserror::Error;

/// Domain error for the assistant backend.
///
/// User-facing text stays short and in the end-user's language; the
/// variant name doubles as the internal error class. Stack traces and
/// provider payloads never leave the process.
#[derive(Error, Debug)]
pub enum ExcellyError {
    /// Bad, oversized, or unsupported upload. Surfaced verbatim.
    #[error("{0}")]
    Validation(String),

    /// Session not found or could not be created.
    #[error("{0}")]
    Session(String),

    /// Every backend tier for a task failed. One aggregated message.
    #[error("{0}")]
    ModelService(String),

    /// Spreadsheet unreadable. Carries the underlying library message.
    #[error("{0}")]
    Parsing(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ExcellyError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn session(msg: impl Into<String>) -> Self {
        Self::Session(msg.into())
    }

    pub fn model_service(msg: impl Into<String>) -> Self {
        Self::ModelService(msg.into())
    }

    pub fn parsing(msg: impl Into<String>) -> Self {
        Self::Parsing(msg.into())
    }

    /// HTTP status equivalent for the thin API layer.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::Validation(_) => 400,
            Self::Session(_) => 404,
            Self::ModelService(_) => 503,
            Self::Parsing(_) => 422,
            Self::Database(_) | Self::Io(_) => 500,
        }
    }

    /// Internal error class name, logged and returned alongside the message.
    pub fn class(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation_error",
            Self::Session(_) => "session_error",
            Self::ModelService(_) => "model_service_error",
            Self::Parsing(_) => "parsing_error",
            Self::Database(_) => "database_error",
            Self::Io(_) => "io_error",
        }
    }

    /// Message shown to the end user. Infrastructure errors are collapsed
    /// to a generic notice; domain errors pass through.
    pub fn user_message(&self) -> String {
        match self {
            Self::Validation(m) | Self::Session(m) | Self::ModelService(m) | Self::Parsing(m) => {
                m.clone()
            }
            Self::Database(_) | Self::Io(_) => {
                "서버 내부 오류가 발생했습니다. 잠시 후 다시 시도해주세요.".to_string()
            }
        }
    }
}

/// Result alias used throughout the crate.
pub type ExcellyResult<T> = Result<T, ExcellyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(ExcellyError::validation("x").status_code(), 400);
        assert_eq!(ExcellyError::session("x").status_code(), 404);
        assert_eq!(ExcellyError::model_service("x").status_code(), 503);
        assert_eq!(ExcellyError::parsing("x").status_code(), 422);
    }

    #[test]
    fn test_infra_errors_are_masked() {
        let err = ExcellyError::Io(std::io::Error::other("disk on fire"));
        assert!(!err.user_message().contains("disk"));
        assert_eq!(err.class(), "io_error");
    }
}
