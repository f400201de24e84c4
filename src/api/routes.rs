// src/api/routes.rs
// Chat endpoints. Request parsing and error mapping only; all behavior
// lives in the orchestrator and its collaborators.

use std::sync::Arc;

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::{delete, get, post},
    Json, Router,
};
use serde_json::json;
use tracing::error;

use crate::chat::{AnswerStyle, TurnRequest};
use crate::config::CONFIG;
use crate::error::ExcellyError;
use crate::llm::ImageInput;
use crate::state::AppState;

/// Slack on top of the configured file size for the other multipart
/// fields and framing, so a file right at the limit still reaches
/// `validate_upload` and gets the oversize message from there.
const BODY_OVERHEAD: usize = 1024 * 1024;

fn body_limit(max_file_size: usize) -> usize {
    max_file_size + BODY_OVERHEAD
}

impl IntoResponse for ExcellyError {
    fn into_response(self) -> Response {
        if self.status_code() >= 500 {
            error!(class = self.class(), error = %self, "internal error");
        }
        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let body = json!({
            "error": self.class(),
            "message": self.user_message(),
        });
        (status, Json(body)).into_response()
    }
}

pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/chat/ask", post(ask))
        .route("/api/chat/analyze-sheets", post(analyze_sheets))
        .route("/api/chat/generate-file", post(generate_file))
        .route("/api/chat/download/{file_id}", get(download))
        .route("/api/chat/history/{session_id}", get(history))
        .route("/api/chat/sessions", get(list_sessions).delete(delete_all_sessions))
        .route("/api/chat/sessions/{session_id}", delete(delete_session))
        .route("/api/chat/sessions/{session_id}/messages", delete(clear_messages))
        .route("/api/chat/status", get(status))
        // axum's default 2MB body cap would reject uploads the config
        // allows; raise it past MAX_FILE_SIZE.
        .layer(DefaultBodyLimit::max(body_limit(CONFIG.upload.max_file_size)))
        .with_state(state)
}

/// Main turn endpoint. Multipart so a file or screenshot can ride along
/// with the question.
async fn ask(
    State(state): State<Arc<AppState>>,
    multipart: Multipart,
) -> Result<Json<serde_json::Value>, ExcellyError> {
    let parsed = parse_ask(multipart).await?;

    // A file in the same request is attached first, exactly as if it
    // had been uploaded on a previous turn.
    let session_id = match parsed.file {
        Some((filename, bytes)) => {
            let attached = state
                .orchestrator
                .attach_file(parsed.session_id.clone(), &filename, &bytes)
                .await?;
            if parsed.question.trim().is_empty() && parsed.selected_sheet.is_none() {
                return Ok(Json(json!({
                    "session_id": attached.session_id,
                    "response": attached.response,
                })));
            }
            Some(attached.session_id)
        }
        None => parsed.session_id,
    };

    let result = state
        .orchestrator
        .handle_turn(TurnRequest {
            session_id,
            question: parsed.question,
            selected_sheet: parsed.selected_sheet,
            image: parsed.image,
            answer_style: parsed.answer_style,
        })
        .await?;

    Ok(Json(json!({
        "session_id": result.session_id,
        "response": result.response,
    })))
}

struct AskRequest {
    session_id: Option<String>,
    question: String,
    selected_sheet: Option<String>,
    file: Option<(String, Vec<u8>)>,
    image: Option<ImageInput>,
    answer_style: AnswerStyle,
}

async fn parse_ask(mut multipart: Multipart) -> Result<AskRequest, ExcellyError> {
    let mut request = AskRequest {
        session_id: None,
        question: String::new(),
        selected_sheet: None,
        file: None,
        image: None,
        answer_style: AnswerStyle::Normal,
    };

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ExcellyError::validation(format!("요청을 읽을 수 없습니다: {e}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "session_id" => request.session_id = Some(read_text(field).await?),
            "question" => request.question = read_text(field).await?,
            "selected_sheet" => {
                let sheet = read_text(field).await?;
                if !sheet.is_empty() {
                    request.selected_sheet = Some(sheet);
                }
            }
            "answer_style" => {
                request.answer_style = AnswerStyle::from_str(&read_text(field).await?)
            }
            "file" => {
                let filename = field.file_name().unwrap_or("upload.xlsx").to_string();
                let bytes = read_bytes(field).await?;
                request.file = Some((filename, bytes));
            }
            "image" => {
                let mime_type = field
                    .content_type()
                    .unwrap_or("image/png")
                    .to_string();
                let bytes = read_bytes(field).await?;
                request.image = Some(ImageInput { bytes, mime_type });
            }
            _ => {}
        }
    }

    Ok(request)
}

async fn read_text(field: axum::extract::multipart::Field<'_>) -> Result<String, ExcellyError> {
    field
        .text()
        .await
        .map_err(|e| ExcellyError::validation(format!("필드를 읽을 수 없습니다: {e}")))
}

async fn read_bytes(field: axum::extract::multipart::Field<'_>) -> Result<Vec<u8>, ExcellyError> {
    Ok(field
        .bytes()
        .await
        .map_err(|e| ExcellyError::validation(format!("파일을 읽을 수 없습니다: {e}")))?
        .to_vec())
}

/// Upload a file and get its sheet structure back.
async fn analyze_sheets(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> Result<Json<serde_json::Value>, ExcellyError> {
    let mut session_id = None;
    let mut file = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ExcellyError::validation(format!("요청을 읽을 수 없습니다: {e}")))?
    {
        match field.name().unwrap_or_default() {
            "session_id" => session_id = Some(read_text(field).await?),
            "file" => {
                let filename = field.file_name().unwrap_or("upload.xlsx").to_string();
                file = Some((filename, read_bytes(field).await?));
            }
            _ => {}
        }
    }

    let (filename, bytes) =
        file.ok_or_else(|| ExcellyError::validation("파일이 없습니다."))?;
    let analysis = crate::files::analyze(&bytes, &filename)?;
    let attached = state.orchestrator.attach_file(session_id, &filename, &bytes).await?;

    Ok(Json(json!({
        "session_id": attached.session_id,
        "sheets": analysis,
        "response": attached.response,
    })))
}

#[derive(serde::Deserialize)]
struct GenerateFileRequest {
    session_id: String,
}

async fn generate_file(
    State(state): State<Arc<AppState>>,
    Json(request): Json<GenerateFileRequest>,
) -> Result<Json<serde_json::Value>, ExcellyError> {
    let generated = state
        .orchestrator
        .generate_file(&request.session_id, &state.file_generator)
        .await?;
    Ok(Json(json!({
        "file_id": generated.file_id,
        "download_path": generated.download_path,
    })))
}

async fn download(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<Response, ExcellyError> {
    let path = state
        .file_generator
        .resolve(&file_id)
        .ok_or_else(|| ExcellyError::validation("파일을 찾을 수 없습니다."))?;
    let bytes = tokio::fs::read(&path).await?;

    Ok((
        [
            (
                header::CONTENT_TYPE,
                "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
            ),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"excelly_result.xlsx\"",
            ),
        ],
        bytes,
    )
        .into_response())
}

async fn history(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, ExcellyError> {
    let session = state
        .store
        .get_session(&session_id)
        .await?
        .ok_or_else(|| ExcellyError::session("세션을 찾을 수 없습니다."))?;
    let messages = state.store.get_messages(&session_id).await?;
    let context = state.store.get_conversation_context(&session_id).await?;

    Ok(Json(json!({
        "session": session,
        "messages": messages,
        "conversation_context": context,
    })))
}

async fn list_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ExcellyError> {
    let sessions = state.store.list_sessions().await?;
    Ok(Json(json!({ "sessions": sessions })))
}

async fn delete_all_sessions(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ExcellyError> {
    let deleted = state.store.delete_all_sessions().await?;
    Ok(Json(json!({ "deleted": deleted })))
}

async fn delete_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, ExcellyError> {
    if !state.store.delete_session(&session_id).await? {
        return Err(ExcellyError::session("세션을 찾을 수 없습니다."));
    }
    Ok(Json(json!({ "deleted": true })))
}

async fn clear_messages(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<serde_json::Value>, ExcellyError> {
    let cleared = state.store.clear_messages(&session_id).await?;
    Ok(Json(json!({ "cleared": cleared })))
}

async fn status(State(state): State<Arc<AppState>>) -> Json<serde_json::Value> {
    let backends: Vec<serde_json::Value> = state
        .gateway
        .availability()
        .into_iter()
        .map(|(id, available)| json!({ "backend": id.as_str(), "available": available }))
        .collect();

    Json(json!({
        "status": "ok",
        "any_backend_available": state.gateway.any_available(),
        "backends": backends,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_limit_clears_configured_file_size() {
        let max = 10 * 1024 * 1024;
        assert_eq!(body_limit(max), max + BODY_OVERHEAD);
        // A file exactly at the limit plus its form fields still fits.
        assert!(body_limit(max) > max + 64 * 1024);
    }
}
