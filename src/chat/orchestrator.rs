// src/chat/orchestrator.rs
// Per-turn entry point: state machine driving classifier, clarification,
// and response generation

use std::sync::Arc;
use std::time::Instant;

use tracing::{info, warn};

use super::classifier;
use super::clarify::ClarificationEngine;
use super::generator::{AnswerStyle, ResponseGenerator};
use super::types::{
    AiResponse, ConversationContext, ConversationState, QuestionCategory, QuestionClassification,
    QuestionType, ResponseType,
};
use crate::config::CONFIG;
use crate::error::{ExcellyError, ExcellyResult};
use crate::files;
use crate::llm::{ImageInput, ModelGateway};
use crate::prompt;
use crate::session::{MessageMeta, Session, SessionStore};

/// Messages of prior conversation folded into classification context.
const CONTEXT_MESSAGES: usize = 6;

/// One incoming user turn.
#[derive(Debug, Default)]
pub struct TurnRequest {
    pub session_id: Option<String>,
    pub question: String,
    pub selected_sheet: Option<String>,
    pub image: Option<ImageInput>,
    pub answer_style: AnswerStyle,
}

/// The turn's outcome: resolved session id plus the assistant response.
#[derive(Debug, Clone)]
pub struct TurnResult {
    pub session_id: String,
    pub response: AiResponse,
}

/// Drives one turn end to end. Constructed once at startup with its
/// collaborators injected; holds no global state.
pub struct Orchestrator {
    store: Arc<SessionStore>,
    clarifier: ClarificationEngine,
    generator: ResponseGenerator,
    max_clarifications: usize,
}

impl Orchestrator {
    pub fn new(store: Arc<SessionStore>, gateway: Arc<ModelGateway>) -> Self {
        Self {
            store,
            clarifier: ClarificationEngine::new(gateway.clone()),
            generator: ResponseGenerator::new(gateway),
            max_clarifications: CONFIG.session.max_clarifications,
        }
    }

    /// Test constructor with an explicit clarification bound.
    pub fn with_max_clarifications(
        store: Arc<SessionStore>,
        gateway: Arc<ModelGateway>,
        max_clarifications: usize,
    ) -> Self {
        Self {
            store,
            clarifier: ClarificationEngine::new(gateway.clone()),
            generator: ResponseGenerator::new(gateway),
            max_clarifications,
        }
    }

    /// Store an uploaded file on the session and answer with the sheet
    /// overview. Does not create a conversation context.
    pub async fn attach_file(
        &self,
        session_id: Option<String>,
        filename: &str,
        bytes: &[u8],
    ) -> ExcellyResult<TurnResult> {
        files::validate_upload(&CONFIG.upload, filename, bytes.len())?;
        // Parse before persisting so an unreadable file never sticks to
        // the session.
        let analysis = files::analyze(bytes, filename)?;

        let session = self.store.get_or_create_session(session_id).await?;
        self.store.set_file(&session.id, filename, bytes).await?;

        let answer = prompt::sheet_prompt_message(filename, &files::sheet_overview(&analysis));
        self.store
            .append_message(
                &session.id,
                "user",
                &format!("[파일 업로드] {filename}"),
                MessageMeta::default(),
            )
            .await?;
        self.store
            .append_message(
                &session.id,
                "assistant",
                &answer,
                MessageMeta {
                    message_type: Some("file_upload".to_string()),
                    ..Default::default()
                },
            )
            .await?;

        info!(session_id = %session.id, filename, "file attached");
        Ok(TurnResult {
            session_id: session.id,
            response: AiResponse {
                answer,
                model_used: None,
                processing_ms: 0,
                response_type: ResponseType::Normal,
                next_action: Some("select_sheet".to_string()),
                conversation_state: None,
            },
        })
    }

    /// Handle one user turn.
    pub async fn handle_turn(&self, request: TurnRequest) -> ExcellyResult<TurnResult> {
        let start = Instant::now();
        let session = self.store.get_or_create_session(request.session_id.clone()).await?;
        let question = request.question.trim().to_string();

        // Sheet selection is persisted before anything else so later
        // turns (and this one) see it.
        if let Some(ref sheet) = request.selected_sheet {
            self.store.set_selected_sheet(&session.id, sheet).await?;
        }

        // Sheet-only turn: acknowledge with the sheet summary and the
        // task menu. No model call, no state machine.
        if question.is_empty() {
            if let Some(ref sheet) = request.selected_sheet {
                return self.sheet_selected_turn(&session, sheet, start).await;
            }
            if session.has_file && session.selected_sheet.is_none() {
                return self.sheet_prompt_turn(&session, start).await;
            }
            return Err(ExcellyError::validation("질문을 입력해주세요."));
        }

        // Context snapshot is taken before this turn's message lands so
        // the heuristics compare the question against prior turns only.
        let recent = self.store.recent_context(&session.id, CONTEXT_MESSAGES).await?;
        let context = self.store.get_conversation_context(&session.id).await?;

        self.store
            .append_message(&session.id, "user", &question, MessageMeta::default())
            .await?;

        let response = match context {
            Some(ctx) if ctx.state == ConversationState::Clarifying => {
                self.clarifying_turn(&session, ctx, &question, &request, start).await?
            }
            prior => {
                // No context, or a finished episode: classify fresh.
                self.fresh_turn(&session, prior, &question, &recent, &request, start)
                    .await?
            }
        };

        self.store
            .append_message(
                &session.id,
                "assistant",
                &response.answer,
                MessageMeta {
                    message_type: Some(response.response_type.as_str().to_string()),
                    model_used: response.model_used.clone(),
                    processing_ms: Some(response.processing_ms),
                },
            )
            .await?;

        Ok(TurnResult {
            session_id: session.id.clone(),
            response,
        })
    }

    /// Generate an output workbook from the last solution answer.
    pub async fn generate_file(
        &self,
        session_id: &str,
        generator: &crate::files::generate::FileGenerator,
    ) -> ExcellyResult<crate::files::generate::GeneratedFile> {
        let session = self
            .store
            .get_session(session_id)
            .await?
            .ok_or_else(|| ExcellyError::session("세션을 찾을 수 없습니다."))?;
        let (filename, bytes) = self
            .store
            .get_file(session_id)
            .await?
            .ok_or_else(|| ExcellyError::validation("업로드된 파일이 없습니다."))?;

        let messages = self.store.get_messages(session_id).await?;
        let answer = messages
            .iter()
            .rev()
            .find(|m| m.role == "assistant" && m.message_type != "clarification")
            .map(|m| m.content.clone())
            .ok_or_else(|| ExcellyError::validation("생성할 답변이 없습니다."))?;

        generator.generate(&bytes, &filename, &answer, session.selected_sheet.as_deref())
    }

    async fn sheet_selected_turn(
        &self,
        session: &Session,
        sheet: &str,
        start: Instant,
    ) -> ExcellyResult<TurnResult> {
        let (filename, bytes) = self
            .store
            .get_file(&session.id)
            .await?
            .ok_or_else(|| ExcellyError::validation("업로드된 파일이 없습니다."))?;

        let summary = files::summarize(&bytes, &filename, Some(sheet))?;
        let answer = prompt::sheet_selection_message(sheet, &summary);

        self.store
            .append_message(
                &session.id,
                "user",
                &format!("[시트 선택] {sheet}"),
                MessageMeta::default(),
            )
            .await?;
        self.store
            .append_message(
                &session.id,
                "assistant",
                &answer,
                MessageMeta {
                    message_type: Some("sheet_selection".to_string()),
                    processing_ms: Some(start.elapsed().as_millis() as i64),
                    ..Default::default()
                },
            )
            .await?;

        Ok(TurnResult {
            session_id: session.id.clone(),
            response: AiResponse {
                answer,
                model_used: None,
                processing_ms: start.elapsed().as_millis() as i64,
                response_type: ResponseType::Normal,
                next_action: Some("ask_question".to_string()),
                conversation_state: None,
            },
        })
    }

    /// Empty question, uploaded file, no sheet selected: answer with the
    /// structure overview. The state machine is not engaged.
    async fn sheet_prompt_turn(&self, session: &Session, start: Instant) -> ExcellyResult<TurnResult> {
        let (filename, bytes) = self
            .store
            .get_file(&session.id)
            .await?
            .ok_or_else(|| ExcellyError::validation("업로드된 파일이 없습니다."))?;

        let analysis = files::analyze(&bytes, &filename)?;
        let answer = prompt::sheet_prompt_message(&filename, &files::sheet_overview(&analysis));

        self.store
            .append_message(&session.id, "assistant", &answer, MessageMeta::default())
            .await?;

        Ok(TurnResult {
            session_id: session.id.clone(),
            response: AiResponse {
                answer,
                model_used: None,
                processing_ms: start.elapsed().as_millis() as i64,
                response_type: ResponseType::Normal,
                next_action: Some("select_sheet".to_string()),
                conversation_state: None,
            },
        })
    }

    /// The user is answering a pending clarification question.
    async fn clarifying_turn(
        &self,
        session: &Session,
        ctx: ConversationContext,
        answer: &str,
        request: &TurnRequest,
        start: Instant,
    ) -> ExcellyResult<AiResponse> {
        let updated = self.clarifier.process_answer(ctx, answer).await;

        if updated.state == ConversationState::Clarifying {
            // Still gathering: emit the next queued question.
            let next = updated
                .pending_questions
                .first()
                .map(|q| q.question.clone())
                .unwrap_or_else(|| {
                    super::clarify::canned_question(QuestionType::Goal).question
                });
            self.store.set_conversation_context(&session.id, Some(&updated)).await?;

            return Ok(AiResponse {
                answer: format!("감사합니다! 다음 질문입니다:\n{next}"),
                model_used: None,
                processing_ms: start.elapsed().as_millis() as i64,
                response_type: ResponseType::Clarification,
                next_action: Some("answer_clarification".to_string()),
                conversation_state: Some(ConversationState::Clarifying),
            });
        }

        // Understanding finalized: solve with it. The original question
        // drives category selection.
        let classification = classifier::classify(&updated.original_question, "");
        let category = match classification.category {
            QuestionCategory::Continuation => QuestionCategory::Planning,
            other => other,
        };

        let file_summary = self.file_summary(session).await;
        let generated = self
            .generator
            .generate(
                category,
                &updated.current_understanding,
                "",
                &file_summary,
                request.answer_style,
            )
            .await;

        match generated {
            Ok(generated) => {
                let mut finalized = updated;
                finalized.state = ConversationState::Completed;
                self.store.set_conversation_context(&session.id, Some(&finalized)).await?;

                Ok(AiResponse {
                    answer: format!("{}\n\n{}", prompt::UNDERSTANDING_ACK, generated.text),
                    model_used: Some(generated.model),
                    processing_ms: start.elapsed().as_millis() as i64,
                    response_type: ResponseType::Solution,
                    next_action: None,
                    conversation_state: Some(ConversationState::Completed),
                })
            }
            Err(err) => {
                // No dangling half-finished plan: drop the episode.
                warn!(session_id = %session.id, error = %err, "solution generation failed, clearing context");
                self.store.set_conversation_context(&session.id, None).await?;
                Err(ExcellyError::model_service(
                    "AI 서비스를 일시적으로 사용할 수 없습니다. 잠시 후 다시 시도해주세요.",
                ))
            }
        }
    }

    /// No active clarification: classify and either start one or answer
    /// directly.
    async fn fresh_turn(
        &self,
        session: &Session,
        prior: Option<ConversationContext>,
        question: &str,
        recent: &str,
        request: &TurnRequest,
        start: Instant,
    ) -> ExcellyResult<AiResponse> {
        let classification = classifier::classify(question, recent);
        info!(
            session_id = %session.id,
            category = classification.category.as_str(),
            confidence = classification.confidence,
            needs_clarification = classification.needs_clarification,
            "classified turn"
        );

        // A continuation cue with prior conversation continues it rather
        // than triggering clarification. Prior transcript counts even
        // when the last episode never opened a context.
        let has_prior_exchange = prior.is_some() || recent.lines().count() > 1;
        let continues_prior = classification.category == QuestionCategory::Continuation
            && has_prior_exchange
            && !classifier::is_new_question(question, recent);

        if classification.needs_clarification && !continues_prior {
            return self
                .start_clarification(session, question, recent, &classification, start)
                .await;
        }

        let category = self.effective_category(session, &classification, continues_prior);
        let file_summary = self.file_summary(session).await;
        let context = if continues_prior { recent } else { "" };

        let generated = if category == QuestionCategory::Debugging {
            self.generator
                .generate_debugging(
                    question,
                    context,
                    &file_summary,
                    request.image.as_ref(),
                    request.answer_style,
                )
                .await
        } else {
            self.generator
                .generate(category, question, context, &file_summary, request.answer_style)
                .await
        };

        match generated {
            Ok(generated) => Ok(AiResponse {
                answer: generated.text,
                model_used: Some(generated.model),
                processing_ms: start.elapsed().as_millis() as i64,
                response_type: ResponseType::Solution,
                next_action: None,
                // Stateless direct answer: the state machine was never
                // engaged for this turn.
                conversation_state: None,
            }),
            Err(err) => {
                warn!(session_id = %session.id, error = %err, "direct generation failed");
                if prior.is_some() {
                    self.store.set_conversation_context(&session.id, None).await?;
                }
                Err(ExcellyError::model_service(
                    "AI 서비스를 일시적으로 사용할 수 없습니다. 잠시 후 다시 시도해주세요.",
                ))
            }
        }
    }

    async fn start_clarification(
        &self,
        session: &Session,
        question: &str,
        recent: &str,
        classification: &QuestionClassification,
        start: Instant,
    ) -> ExcellyResult<AiResponse> {
        let mut ctx = ConversationContext::new(question.to_string(), self.max_clarifications);

        let question_type = classification
            .clarification_reasons
            .first()
            .copied()
            .unwrap_or(QuestionType::Goal);
        let questions = self
            .clarifier
            .generate_questions(question, question_type, recent, &ctx.gathered_info)
            .await;
        ctx.pending_questions = questions;
        ctx.state = ConversationState::Clarifying;

        let first = ctx
            .pending_questions
            .first()
            .map(|q| q.question.clone())
            .unwrap_or_else(|| super::clarify::canned_question(question_type).question);

        self.store.set_conversation_context(&session.id, Some(&ctx)).await?;

        Ok(AiResponse {
            answer: format!("{}\n{first}", prompt::CLARIFICATION_INTRO),
            model_used: None,
            processing_ms: start.elapsed().as_millis() as i64,
            response_type: ResponseType::Clarification,
            next_action: Some("answer_clarification".to_string()),
            conversation_state: Some(ConversationState::Clarifying),
        })
    }

    /// Final category after session-level adjustments: hybrid needs file
    /// grounding, continuation keeps its persona.
    fn effective_category(
        &self,
        session: &Session,
        classification: &QuestionClassification,
        continues_prior: bool,
    ) -> QuestionCategory {
        if continues_prior {
            return QuestionCategory::Continuation;
        }
        if classification.category == QuestionCategory::Hybrid && !session.has_file {
            return QuestionCategory::Planning;
        }
        classification.category
    }

    /// Text summary of the uploaded file for prompting. Unreadable files
    /// degrade to no summary rather than failing the turn.
    async fn file_summary(&self, session: &Session) -> String {
        if !session.has_file {
            return String::new();
        }
        match self.store.get_file(&session.id).await {
            Ok(Some((filename, bytes))) => {
                match files::summarize(&bytes, &filename, session.selected_sheet.as_deref()) {
                    Ok(summary) => summary,
                    Err(err) => {
                        warn!(session_id = %session.id, error = %err, "file summary failed");
                        String::new()
                    }
                }
            }
            _ => String::new(),
        }
    }
}
