// src/chat/clarify.rs
// Clarification engine: bounded question generation and answer folding

use std::sync::Arc;

use tracing::warn;

use super::types::{
    ClarificationQuestion, ConversationContext, ConversationState, QuestionType,
};
use crate::llm::{ModelGateway, TaskKind};
use crate::prompt;

const QUESTION_TEMPERATURE: f32 = 0.7;
const UNDERSTANDING_TEMPERATURE: f32 = 0.5;

/// Generates clarifying questions and folds answers into the context.
///
/// Nothing here propagates an error: question generation falls back to a
/// canned question of the right type, understanding synthesis falls back
/// to a deterministic concatenation. A flaky model call must never stall
/// a conversation that is mid-clarification.
pub struct ClarificationEngine {
    gateway: Arc<ModelGateway>,
}

impl ClarificationEngine {
    pub fn new(gateway: Arc<ModelGateway>) -> Self {
        Self { gateway }
    }

    /// Whether a request is under-specified. Delegates to the lexical
    /// classifier; kept here so callers of the engine need no second
    /// collaborator for the check.
    pub fn needs_clarification(&self, question: &str, context: &str) -> bool {
        super::classifier::classify(question, context).needs_clarification
    }

    /// Generate the next clarifying question of the given type. Returns
    /// one question per call; the interface allows more.
    pub async fn generate_questions(
        &self,
        question: &str,
        question_type: QuestionType,
        context: &str,
        gathered: &[(QuestionType, String)],
    ) -> Vec<ClarificationQuestion> {
        let gathered_lines: Vec<String> = gathered
            .iter()
            .map(|(t, a)| format!("{}: {}", t.as_str(), a))
            .collect();
        let gathered_refs: Vec<&str> = gathered_lines.iter().map(String::as_str).collect();

        let prompt =
            prompt::build_clarification_prompt(question, question_type, context, &gathered_refs);

        match self
            .gateway
            .complete(TaskKind::Clarification, &prompt, QUESTION_TEMPERATURE)
            .await
        {
            Ok(completion) => match parse_question(&completion.text, question_type) {
                Some(q) => vec![q],
                None => vec![canned_question(question_type)],
            },
            Err(err) => {
                warn!(question_type = question_type.as_str(), error = %err, "clarification generation failed, using canned question");
                vec![canned_question(question_type)]
            }
        }
    }

    /// Fold the user's answer into the context.
    ///
    /// Pops exactly one pending question, records the answer under its
    /// question type, increments the count. When the queue empties or
    /// the count reaches `max_clarifications`, synthesizes the final
    /// understanding and moves to PLANNING; otherwise stays CLARIFYING.
    pub async fn process_answer(
        &self,
        mut ctx: ConversationContext,
        answer: &str,
    ) -> ConversationContext {
        if !ctx.pending_questions.is_empty() {
            let current = ctx.pending_questions.remove(0);
            ctx.gathered_info
                .push((current.question_type, answer.to_string()));
            ctx.clarification_count += 1;
        }

        if ctx.pending_questions.is_empty()
            || ctx.clarification_count >= ctx.max_clarifications
        {
            ctx.current_understanding = self
                .synthesize_understanding(&ctx.original_question, &ctx.gathered_info)
                .await;
            ctx.state = ConversationState::Planning;
        } else {
            ctx.state = ConversationState::Clarifying;
        }

        ctx
    }

    /// One gateway call; deterministic fallback on failure.
    async fn synthesize_understanding(
        &self,
        original_question: &str,
        gathered: &[(QuestionType, String)],
    ) -> String {
        let prompt = prompt::build_understanding_prompt(original_question, gathered);
        match self
            .gateway
            .complete(TaskKind::Understanding, &prompt, UNDERSTANDING_TEMPERATURE)
            .await
        {
            Ok(completion) => completion.text,
            Err(err) => {
                warn!(error = %err, "understanding synthesis failed, using fallback");
                prompt::fallback_understanding(original_question, gathered)
            }
        }
    }
}

/// Canned question per type, used whenever generation fails or parses
/// to nothing.
pub fn canned_question(question_type: QuestionType) -> ClarificationQuestion {
    let (question, context) = match question_type {
        QuestionType::FileStructure => (
            "어떤 시트에서 작업하시나요?",
            "파일 구조를 정확히 파악하기 위해 필요합니다.",
        ),
        QuestionType::DataFormat => (
            "데이터가 숫자인가요, 텍스트인가요?",
            "데이터 형식을 정확히 파악하기 위해 필요합니다.",
        ),
        QuestionType::Goal => (
            "어떤 조건으로 작업하시나요?",
            "작업 목표를 정확히 파악하기 위해 필요합니다.",
        ),
        QuestionType::Constraints => (
            "사용 중인 Excel 버전이 어떻게 되시나요?",
            "환경 제약사항을 정확히 파악하기 위해 필요합니다.",
        ),
    };
    ClarificationQuestion {
        question: question.to_string(),
        context: context.to_string(),
        options: Vec::new(),
        required: true,
        question_type,
    }
}

/// Extract the first question from model output: first non-empty line,
/// stripped of numbering and bullets. Rejects output with no question
/// mark and nothing resembling a question.
fn parse_question(text: &str, question_type: QuestionType) -> Option<ClarificationQuestion> {
    let mut question_line: Option<String> = None;
    let mut context_line: Option<String> = None;

    for line in text.lines() {
        let cleaned = line
            .trim()
            .trim_start_matches(['1', '2', '3', '4', '5', '6', '7', '8', '9', '0'])
            .trim_start_matches(['.', '-', '•', ')', ' '])
            .trim()
            .trim_matches('"')
            .to_string();
        if cleaned.is_empty() {
            continue;
        }
        if question_line.is_none() {
            question_line = Some(cleaned);
        } else if context_line.is_none() {
            context_line = Some(cleaned);
            break;
        }
    }

    let question = question_line?;
    if question.chars().count() < 5 {
        return None;
    }

    Some(ClarificationQuestion {
        question,
        context: context_line.unwrap_or_else(|| {
            format!("{} 관련 정보를 확인하기 위해 필요합니다.", question_type.as_str())
        }),
        options: Vec::new(),
        required: true,
        question_type,
    })
}
