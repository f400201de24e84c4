// src/chat/types.rs
// Conversation data model: state machine, context, classification

use serde::{Deserialize, Serialize};

/// Context schema version. Bump when the serialized shape changes;
/// unknown versions are treated as "no context".
pub const CONTEXT_SCHEMA_VERSION: u32 = 1;

/// Per-episode conversation state. Transitions only move forward;
/// CLARIFYING may loop on itself while questions remain queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    Initial,
    Clarifying,
    Planning,
    Executing,
    Completed,
}

impl ConversationState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConversationState::Initial => "initial",
            ConversationState::Clarifying => "clarifying",
            ConversationState::Planning => "planning",
            ConversationState::Executing => "executing",
            ConversationState::Completed => "completed",
        }
    }

    fn rank(&self) -> u8 {
        match self {
            ConversationState::Initial => 0,
            ConversationState::Clarifying => 1,
            ConversationState::Planning => 2,
            ConversationState::Executing => 3,
            ConversationState::Completed => 4,
        }
    }

    /// Forward-only transition check. The one legal self-loop is
    /// CLARIFYING → CLARIFYING.
    pub fn can_transition(&self, to: ConversationState) -> bool {
        if *self == ConversationState::Clarifying && to == ConversationState::Clarifying {
            return true;
        }
        to.rank() > self.rank()
    }

    pub fn is_terminal(&self) -> bool {
        *self == ConversationState::Completed
    }
}

/// What an under-specified request is missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
    FileStructure,
    DataFormat,
    Goal,
    Constraints,
}

impl QuestionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionType::FileStructure => "file_structure",
            QuestionType::DataFormat => "data_format",
            QuestionType::Goal => "goal",
            QuestionType::Constraints => "constraints",
        }
    }
}

/// One clarifying question, consumed front-of-queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClarificationQuestion {
    pub question: String,
    pub context: String,
    #[serde(default)]
    pub options: Vec<String>,
    pub required: bool,
    pub question_type: QuestionType,
}

/// Per-episode conversation context, serialized into the session's
/// metadata. Decoded fail-closed: anything unreadable means "no context".
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationContext {
    pub schema_version: u32,
    pub state: ConversationState,
    pub clarification_count: usize,
    pub max_clarifications: usize,
    pub pending_questions: Vec<ClarificationQuestion>,
    pub gathered_info: Vec<(QuestionType, String)>,
    /// Immutable once set.
    pub original_question: String,
    pub current_understanding: String,
}

impl ConversationContext {
    pub fn new(original_question: String, max_clarifications: usize) -> Self {
        Self {
            schema_version: CONTEXT_SCHEMA_VERSION,
            state: ConversationState::Initial,
            clarification_count: 0,
            max_clarifications,
            pending_questions: Vec::new(),
            gathered_info: Vec::new(),
            original_question,
            current_understanding: String::new(),
        }
    }

    /// Fail-closed decode. Partially-written, legacy, or future-versioned
    /// blobs all come back as None.
    pub fn from_json(raw: &str) -> Option<Self> {
        let ctx: ConversationContext = serde_json::from_str(raw).ok()?;
        if ctx.schema_version != CONTEXT_SCHEMA_VERSION {
            return None;
        }
        Some(ctx)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    pub fn gathered(&self, question_type: QuestionType) -> Option<&str> {
        self.gathered_info
            .iter()
            .find(|(t, _)| *t == question_type)
            .map(|(_, answer)| answer.as_str())
    }
}

/// Closed category set for routing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionCategory {
    Simple,
    Coding,
    Analysis,
    Planning,
    Debugging,
    BeginnerHelp,
    Advanced,
    Continuation,
    Hybrid,
}

impl QuestionCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            QuestionCategory::Simple => "simple",
            QuestionCategory::Coding => "coding",
            QuestionCategory::Analysis => "analysis",
            QuestionCategory::Planning => "planning",
            QuestionCategory::Debugging => "debugging",
            QuestionCategory::BeginnerHelp => "beginner_help",
            QuestionCategory::Advanced => "advanced",
            QuestionCategory::Continuation => "continuation",
            QuestionCategory::Hybrid => "hybrid",
        }
    }
}

/// Result of lexical classification. Computed fresh per turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionClassification {
    pub category: QuestionCategory,
    pub confidence: f32,
    pub reasoning: String,
    pub recommended_backend: String,
    pub needs_clarification: bool,
    pub clarification_reasons: Vec<QuestionType>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseType {
    Normal,
    Clarification,
    Solution,
    FileGeneration,
}

impl ResponseType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResponseType::Normal => "normal",
            ResponseType::Clarification => "clarification",
            ResponseType::Solution => "solution",
            ResponseType::FileGeneration => "file_generation",
        }
    }
}

/// One turn's assistant output, returned to the orchestrator then
/// persisted as a message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiResponse {
    pub answer: String,
    pub model_used: Option<String>,
    pub processing_ms: i64,
    pub response_type: ResponseType,
    pub next_action: Option<String>,
    pub conversation_state: Option<ConversationState>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transitions_are_forward_only() {
        use ConversationState::*;
        assert!(Initial.can_transition(Clarifying));
        assert!(Clarifying.can_transition(Clarifying));
        assert!(Clarifying.can_transition(Planning));
        assert!(Planning.can_transition(Executing));
        assert!(Executing.can_transition(Completed));
        assert!(Initial.can_transition(Completed));

        assert!(!Planning.can_transition(Clarifying));
        assert!(!Completed.can_transition(Planning));
        assert!(!Executing.can_transition(Executing));
    }

    #[test]
    fn test_context_roundtrip() {
        let mut ctx = ConversationContext::new("정리해줘".to_string(), 2);
        ctx.state = ConversationState::Clarifying;
        ctx.gathered_info.push((QuestionType::Goal, "중복 제거".to_string()));

        let json = ctx.to_json().unwrap();
        let back = ConversationContext::from_json(&json).unwrap();
        assert_eq!(back.state, ConversationState::Clarifying);
        assert_eq!(back.gathered(QuestionType::Goal), Some("중복 제거"));
        assert_eq!(back.original_question, "정리해줘");
    }

    #[test]
    fn test_decode_fails_closed() {
        assert!(ConversationContext::from_json("not json").is_none());
        assert!(ConversationContext::from_json("{\"state\":\"clarifying\"}").is_none());

        // Future schema version is rejected, not guessed at.
        let mut ctx = ConversationContext::new("q".to_string(), 2);
        ctx.schema_version = CONTEXT_SCHEMA_VERSION + 1;
        let json = ctx.to_json().unwrap();
        assert!(ConversationContext::from_json(&json).is_none());
    }
}
