// src/session/types.rs

use serde::{Deserialize, Serialize};

/// One session row, without the file blob (fetched separately).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub filename: Option<String>,
    pub selected_sheet: Option<String>,
    pub has_file: bool,
    pub metadata: serde_json::Value,
    pub created_at: i64,
    pub updated_at: i64,
}

/// One persisted message. Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: i64,
    pub role: String,
    pub content: String,
    pub message_type: String,
    pub model_used: Option<String>,
    pub processing_ms: Option<i64>,
    pub created_at: i64,
}

/// Optional metadata recorded with an appended message.
#[derive(Debug, Clone, Default)]
pub struct MessageMeta {
    pub message_type: Option<String>,
    pub model_used: Option<String>,
    pub processing_ms: Option<i64>,
}

/// Listing entry for the sessions endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub id: String,
    pub filename: Option<String>,
    pub message_count: i64,
    pub created_at: i64,
    pub updated_at: i64,
}
