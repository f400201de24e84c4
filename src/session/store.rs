// src/session/store.rs
// Session persistence over SQLite

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::{debug, info};

use super::types::{MessageMeta, Session, SessionSummary, StoredMessage};
use crate::chat::types::ConversationContext;
use crate::error::{ExcellyError, ExcellyResult};

/// Metadata key holding the serialized conversation context.
const CONTEXT_KEY: &str = "conversation_context";

fn now_timestamp() -> i64 {
    Utc::now().timestamp()
}

/// The only writer of session rows. The conversation core reads a
/// session once at turn start and writes once at turn end; concurrent
/// turns on the same session id are an accepted client-side race.
pub struct SessionStore {
    pool: SqlitePool,
}

impl SessionStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a session, generating an id unless one is supplied.
    pub async fn create_session(&self, id: Option<String>) -> ExcellyResult<String> {
        let id = id.unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let now = now_timestamp();

        sqlx::query(
            "INSERT INTO chat_sessions (id, metadata_json, created_at, updated_at) VALUES (?, '{}', ?, ?)",
        )
        .bind(&id)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        info!(session_id = %id, "created session");
        Ok(id)
    }

    /// Create-if-missing variant used at turn start. A supplied id that
    /// lost a creation race falls back to the existing row.
    pub async fn get_or_create_session(&self, id: Option<String>) -> ExcellyResult<Session> {
        if let Some(ref sid) = id {
            if let Some(session) = self.get_session(sid).await? {
                return Ok(session);
            }
        }
        let new_id = self.create_session(id).await?;
        self.get_session(&new_id)
            .await?
            .ok_or_else(|| ExcellyError::session("세션 생성에 실패했습니다."))
    }

    pub async fn get_session(&self, id: &str) -> ExcellyResult<Option<Session>> {
        let row: Option<(String, Option<String>, Option<String>, bool, Option<String>, i64, i64)> =
            sqlx::query_as(
                r#"
                SELECT id, filename, selected_sheet,
                       file_content IS NOT NULL, metadata_json,
                       created_at, updated_at
                FROM chat_sessions WHERE id = ?
                "#,
            )
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(
            |(id, filename, selected_sheet, has_file, metadata_json, created_at, updated_at)| {
                let metadata = metadata_json
                    .as_deref()
                    .and_then(|m| serde_json::from_str(m).ok())
                    .unwrap_or_else(|| serde_json::json!({}));
                Session {
                    id,
                    filename,
                    selected_sheet,
                    has_file,
                    metadata,
                    created_at,
                    updated_at,
                }
            },
        ))
    }

    pub async fn set_selected_sheet(&self, id: &str, sheet: &str) -> ExcellyResult<()> {
        let result = sqlx::query(
            "UPDATE chat_sessions SET selected_sheet = ?, updated_at = ? WHERE id = ?",
        )
        .bind(sheet)
        .bind(now_timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ExcellyError::session("세션을 찾을 수 없습니다."));
        }
        Ok(())
    }

    /// Store uploaded file bytes against the session. Selecting a new
    /// file resets the previously selected sheet.
    pub async fn set_file(&self, id: &str, filename: &str, bytes: &[u8]) -> ExcellyResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE chat_sessions
            SET filename = ?, file_content = ?, selected_sheet = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(filename)
        .bind(bytes)
        .bind(now_timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ExcellyError::session("세션을 찾을 수 없습니다."));
        }
        debug!(session_id = %id, filename, size = bytes.len(), "stored file on session");
        Ok(())
    }

    pub async fn get_file(&self, id: &str) -> ExcellyResult<Option<(String, Vec<u8>)>> {
        let row: Option<(Option<String>, Option<Vec<u8>>)> =
            sqlx::query_as("SELECT filename, file_content FROM chat_sessions WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;

        Ok(match row {
            Some((Some(filename), Some(bytes))) => Some((filename, bytes)),
            _ => None,
        })
    }

    pub async fn clear_file(&self, id: &str) -> ExcellyResult<()> {
        sqlx::query(
            r#"
            UPDATE chat_sessions
            SET filename = NULL, file_content = NULL, selected_sheet = NULL, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(now_timestamp())
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Append one message in arrival order and bump the session clock.
    pub async fn append_message(
        &self,
        id: &str,
        role: &str,
        content: &str,
        meta: MessageMeta,
    ) -> ExcellyResult<()> {
        let now = now_timestamp();

        sqlx::query(
            r#"
            INSERT INTO chat_messages
                (session_id, role, content, message_type, model_used, processing_ms, created_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(role)
        .bind(content)
        .bind(meta.message_type.as_deref().unwrap_or("normal"))
        .bind(meta.model_used)
        .bind(meta.processing_ms)
        .bind(now)
        .execute(&self.pool)
        .await?;

        sqlx::query("UPDATE chat_sessions SET updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    pub async fn get_messages(&self, id: &str) -> ExcellyResult<Vec<StoredMessage>> {
        let rows: Vec<(i64, String, String, String, Option<String>, Option<i64>, i64)> =
            sqlx::query_as(
                r#"
                SELECT id, role, content, message_type, model_used, processing_ms, created_at
                FROM chat_messages WHERE session_id = ?
                ORDER BY created_at ASC, id ASC
                "#,
            )
            .bind(id)
            .fetch_all(&self.pool)
            .await?;

        Ok(rows
            .into_iter()
            .map(
                |(id, role, content, message_type, model_used, processing_ms, created_at)| {
                    StoredMessage {
                        id,
                        role,
                        content,
                        message_type,
                        model_used,
                        processing_ms,
                        created_at,
                    }
                },
            )
            .collect())
    }

    /// Last `limit` messages joined into a short prompt context, oldest
    /// first.
    pub async fn recent_context(&self, id: &str, limit: usize) -> ExcellyResult<String> {
        let rows: Vec<(String, String)> = sqlx::query_as(
            r#"
            SELECT role, content FROM chat_messages
            WHERE session_id = ?
            ORDER BY created_at DESC, id DESC
            LIMIT ?
            "#,
        )
        .bind(id)
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await?;

        let mut lines: Vec<String> = rows
            .into_iter()
            .map(|(role, content)| format!("{}: {}", role, content))
            .collect();
        lines.reverse();
        Ok(lines.join("\n"))
    }

    /// Fail-closed context read: a missing, corrupt, or legacy blob all
    /// come back as None.
    pub async fn get_conversation_context(
        &self,
        id: &str,
    ) -> ExcellyResult<Option<ConversationContext>> {
        let session = match self.get_session(id).await? {
            Some(s) => s,
            None => return Ok(None),
        };
        Ok(session
            .metadata
            .get(CONTEXT_KEY)
            .and_then(|v| v.as_str())
            .and_then(ConversationContext::from_json))
    }

    /// Write (or with None, clear) the conversation context, preserving
    /// any other metadata keys.
    pub async fn set_conversation_context(
        &self,
        id: &str,
        ctx: Option<&ConversationContext>,
    ) -> ExcellyResult<()> {
        let session = self
            .get_session(id)
            .await?
            .ok_or_else(|| ExcellyError::session("세션을 찾을 수 없습니다."))?;

        let mut metadata = session.metadata;
        match ctx {
            Some(ctx) => {
                let raw = ctx
                    .to_json()
                    .map_err(|e| ExcellyError::session(format!("컨텍스트 저장 실패: {e}")))?;
                metadata[CONTEXT_KEY] = serde_json::Value::String(raw);
            }
            None => {
                if let Some(map) = metadata.as_object_mut() {
                    map.remove(CONTEXT_KEY);
                }
            }
        }

        sqlx::query("UPDATE chat_sessions SET metadata_json = ?, updated_at = ? WHERE id = ?")
            .bind(metadata.to_string())
            .bind(now_timestamp())
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    pub async fn list_sessions(&self) -> ExcellyResult<Vec<SessionSummary>> {
        let rows: Vec<(String, Option<String>, i64, i64, i64)> = sqlx::query_as(
            r#"
            SELECT s.id, s.filename,
                   (SELECT COUNT(*) FROM chat_messages m WHERE m.session_id = s.id),
                   s.created_at, s.updated_at
            FROM chat_sessions s
            ORDER BY s.updated_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, filename, message_count, created_at, updated_at)| SessionSummary {
                id,
                filename,
                message_count,
                created_at,
                updated_at,
            })
            .collect())
    }

    pub async fn delete_session(&self, id: &str) -> ExcellyResult<bool> {
        let result = sqlx::query("DELETE FROM chat_sessions WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn delete_all_sessions(&self) -> ExcellyResult<u64> {
        let result = sqlx::query("DELETE FROM chat_sessions").execute(&self.pool).await?;
        Ok(result.rows_affected())
    }

    pub async fn clear_messages(&self, id: &str) -> ExcellyResult<u64> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE session_id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete sessions idle longer than `timeout_secs`. Messages go with
    /// them via the FK cascade.
    pub async fn sweep_idle(&self, timeout_secs: u64) -> ExcellyResult<u64> {
        let cutoff = now_timestamp() - timeout_secs as i64;
        let result = sqlx::query("DELETE FROM chat_sessions WHERE updated_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;

        let swept = result.rows_affected();
        if swept > 0 {
            info!(swept, "swept idle sessions");
        }
        Ok(swept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::types::{ConversationState, QuestionType};

    async fn test_pool() -> SqlitePool {
        let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_session_lifecycle() {
        let store = SessionStore::new(test_pool().await);

        let id = store.create_session(None).await.unwrap();
        let session = store.get_session(&id).await.unwrap().unwrap();
        assert!(!session.has_file);
        assert!(session.selected_sheet.is_none());

        store.set_file(&id, "report.xlsx", b"bytes").await.unwrap();
        store.set_selected_sheet(&id, "Sheet1").await.unwrap();
        let session = store.get_session(&id).await.unwrap().unwrap();
        assert!(session.has_file);
        assert_eq!(session.selected_sheet.as_deref(), Some("Sheet1"));

        let (filename, bytes) = store.get_file(&id).await.unwrap().unwrap();
        assert_eq!(filename, "report.xlsx");
        assert_eq!(bytes, b"bytes");

        // A new upload resets the sheet selection.
        store.set_file(&id, "other.csv", b"a,b").await.unwrap();
        let session = store.get_session(&id).await.unwrap().unwrap();
        assert!(session.selected_sheet.is_none());

        assert!(store.delete_session(&id).await.unwrap());
        assert!(store.get_session(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_messages_preserve_arrival_order() {
        let store = SessionStore::new(test_pool().await);
        let id = store.create_session(None).await.unwrap();

        for i in 0..5 {
            store
                .append_message(&id, "user", &format!("m{i}"), MessageMeta::default())
                .await
                .unwrap();
        }

        let messages = store.get_messages(&id).await.unwrap();
        let contents: Vec<&str> = messages.iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["m0", "m1", "m2", "m3", "m4"]);
    }

    #[tokio::test]
    async fn test_conversation_context_roundtrip_and_clear() {
        let store = SessionStore::new(test_pool().await);
        let id = store.create_session(None).await.unwrap();

        assert!(store.get_conversation_context(&id).await.unwrap().is_none());

        let mut ctx = ConversationContext::new("정리해줘".to_string(), 2);
        ctx.state = ConversationState::Clarifying;
        ctx.gathered_info.push((QuestionType::Goal, "중복 제거".to_string()));
        store.set_conversation_context(&id, Some(&ctx)).await.unwrap();

        let loaded = store.get_conversation_context(&id).await.unwrap().unwrap();
        assert_eq!(loaded.state, ConversationState::Clarifying);
        assert_eq!(loaded.original_question, "정리해줘");

        store.set_conversation_context(&id, None).await.unwrap();
        assert!(store.get_conversation_context(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_corrupt_context_reads_as_none() {
        let store = SessionStore::new(test_pool().await);
        let id = store.create_session(None).await.unwrap();

        sqlx::query("UPDATE chat_sessions SET metadata_json = ? WHERE id = ?")
            .bind(r#"{"conversation_context": "{\"half\": tru"}"#)
            .bind(&id)
            .execute(&store.pool)
            .await
            .unwrap();

        assert!(store.get_conversation_context(&id).await.unwrap().is_none());
    }

    #[test]
    fn test_now_timestamp_is_unix_seconds() {
        let now = now_timestamp();
        // 2024-01-01 .. 2100-01-01 as epoch seconds.
        assert!(now > 1_704_067_200);
        assert!(now < 4_102_444_800);
    }

    #[tokio::test]
    async fn test_sweep_removes_only_idle_sessions() {
        let store = SessionStore::new(test_pool().await);
        let old = store.create_session(None).await.unwrap();
        let fresh = store.create_session(None).await.unwrap();

        sqlx::query("UPDATE chat_sessions SET updated_at = ? WHERE id = ?")
            .bind(now_timestamp() - 7200)
            .bind(&old)
            .execute(&store.pool)
            .await
            .unwrap();

        let swept = store.sweep_idle(3600).await.unwrap();
        assert_eq!(swept, 1);
        assert!(store.get_session(&old).await.unwrap().is_none());
        assert!(store.get_session(&fresh).await.unwrap().is_some());
    }
}
