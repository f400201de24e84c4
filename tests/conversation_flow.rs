// tests/conversation_flow.rs
// End-to-end conversation scenarios over fake model backends

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use sqlx::SqlitePool;

use excelly::chat::types::{ConversationState, ResponseType};
use excelly::chat::{AnswerStyle, ClarificationEngine, Orchestrator, TurnRequest};
use excelly::llm::{BackendId, Completion, CompletionBackend, GatewayError, ModelGateway, TaskKind};
use excelly::session::SessionStore;

/// Scripted backend: replies with fixed text, fails, or stalls. Records
/// every prompt it is asked to complete.
struct FakeBackend {
    name: &'static str,
    reply: Option<String>,
    delay: Option<Duration>,
    calls: Arc<AtomicUsize>,
    prompts: Arc<Mutex<Vec<String>>>,
}

impl FakeBackend {
    fn replying(name: &'static str, reply: &str) -> Self {
        Self {
            name,
            reply: Some(reply.to_string()),
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn failing(name: &'static str) -> Self {
        Self {
            name,
            reply: None,
            delay: None,
            calls: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }

    fn stalling(name: &'static str, delay: Duration) -> Self {
        Self {
            name,
            reply: Some("late".to_string()),
            delay: Some(delay),
            calls: Arc::new(AtomicUsize::new(0)),
            prompts: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl CompletionBackend for FakeBackend {
    fn name(&self) -> &'static str {
        self.name
    }

    fn model(&self) -> &str {
        self.name
    }

    fn is_available(&self) -> bool {
        true
    }

    async fn complete(&self, prompt: &str, _temperature: f32) -> Result<Completion> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(prompt.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        match &self.reply {
            Some(text) => Ok(Completion {
                text: text.clone(),
                model: self.name.to_string(),
                latency_ms: 1,
            }),
            None => Err(anyhow!("scripted failure")),
        }
    }
}

async fn test_store() -> Arc<SessionStore> {
    let pool = SqlitePool::connect("sqlite::memory:").await.unwrap();
    sqlx::migrate!("./migrations").run(&pool).await.unwrap();
    Arc::new(SessionStore::new(pool))
}

/// Flagship tier answers; every cheap tier fails. Clarification and
/// understanding calls therefore exercise their canned fallbacks while
/// solution generation still succeeds.
fn degraded_gateway(solution: &str) -> Arc<ModelGateway> {
    Arc::new(ModelGateway::with_backends(vec![
        (
            BackendId::GeminiPro,
            Arc::new(FakeBackend::replying("gemini_pro", solution)) as Arc<dyn CompletionBackend>,
            Duration::from_secs(1),
        ),
        (
            BackendId::GeminiFlash,
            Arc::new(FakeBackend::failing("gemini_flash")),
            Duration::from_secs(1),
        ),
        (
            BackendId::GeminiFlashLite,
            Arc::new(FakeBackend::failing("gemini_flash_lite")),
            Duration::from_secs(1),
        ),
        (
            BackendId::OpenAi,
            Arc::new(FakeBackend::failing("openai")),
            Duration::from_secs(1),
        ),
    ]))
}

fn healthy_gateway(reply: &str) -> Arc<ModelGateway> {
    Arc::new(ModelGateway::with_backends(vec![
        (
            BackendId::GeminiPro,
            Arc::new(FakeBackend::replying("gemini_pro", reply)) as Arc<dyn CompletionBackend>,
            Duration::from_secs(1),
        ),
        (
            BackendId::GeminiFlash,
            Arc::new(FakeBackend::replying("gemini_flash", reply)),
            Duration::from_secs(1),
        ),
        (
            BackendId::GeminiFlashLite,
            Arc::new(FakeBackend::replying("gemini_flash_lite", reply)),
            Duration::from_secs(1),
        ),
        (
            BackendId::OpenAi,
            Arc::new(FakeBackend::replying("openai", reply)),
            Duration::from_secs(1),
        ),
    ]))
}

fn turn(session_id: Option<String>, question: &str) -> TurnRequest {
    TurnRequest {
        session_id,
        question: question.to_string(),
        selected_sheet: None,
        image: None,
        answer_style: AnswerStyle::Normal,
    }
}

const SAMPLE_CSV: &[u8] = b"name,amount\nkim,100\nlee,200\n";

// Scenario A: empty question with a fresh file and no sheet selected
// answers with the structure overview and never enters CLARIFYING.
#[tokio::test]
async fn empty_question_with_file_prompts_sheet_selection() {
    let store = test_store().await;
    let orchestrator =
        Orchestrator::with_max_clarifications(store.clone(), healthy_gateway("x"), 2);

    let attached = orchestrator
        .attach_file(None, "sales.csv", SAMPLE_CSV)
        .await
        .unwrap();
    let session_id = attached.session_id;

    let result = orchestrator
        .handle_turn(turn(Some(session_id.clone()), ""))
        .await
        .unwrap();

    assert_eq!(result.response.response_type, ResponseType::Normal);
    assert_eq!(result.response.next_action.as_deref(), Some("select_sheet"));
    assert!(result.response.answer.contains("시트"));
    assert!(store
        .get_conversation_context(&session_id)
        .await
        .unwrap()
        .is_none());
}

// Scenario B: a concrete error report goes straight to generation.
#[tokio::test]
async fn concrete_error_question_is_answered_directly() {
    let store = test_store().await;
    let orchestrator =
        Orchestrator::with_max_clarifications(store.clone(), healthy_gateway("해결 방법입니다."), 2);

    let result = orchestrator
        .handle_turn(turn(None, "VLOOKUP 안 돼요"))
        .await
        .unwrap();

    assert_eq!(result.response.response_type, ResponseType::Solution);
    assert!(result.response.answer.contains("해결 방법입니다."));
    assert!(result.response.model_used.is_some());
    assert!(store
        .get_conversation_context(&result.session_id)
        .await
        .unwrap()
        .is_none());

    // Strict append order: user turn, then assistant reply.
    let messages = store.get_messages(&result.session_id).await.unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0].role, "user");
    assert_eq!(messages[1].role, "assistant");
}

// Scenario C: a bare "clean it up" asks one clarifying question and
// moves to CLARIFYING, even with every cheap model tier down.
#[tokio::test]
async fn vague_question_starts_clarification() {
    let store = test_store().await;
    let orchestrator =
        Orchestrator::with_max_clarifications(store.clone(), degraded_gateway("솔루션"), 2);

    let result = orchestrator.handle_turn(turn(None, "정리해줘")).await.unwrap();

    assert_eq!(result.response.response_type, ResponseType::Clarification);
    assert_eq!(
        result.response.conversation_state,
        Some(ConversationState::Clarifying)
    );

    let ctx = store
        .get_conversation_context(&result.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ctx.state, ConversationState::Clarifying);
    assert_eq!(ctx.original_question, "정리해줘");
    assert_eq!(ctx.clarification_count, 0);
    assert_eq!(ctx.pending_questions.len(), 1);
    // Clarification tiers are down: the canned goal question is used.
    assert!(result.response.answer.contains("어떤 조건으로 작업하시나요?"));
}

// Scenario D: answering the only pending question finalizes the
// understanding and produces a solution without a second question.
#[tokio::test]
async fn answered_clarification_leads_to_solution() {
    let store = test_store().await;
    let orchestrator =
        Orchestrator::with_max_clarifications(store.clone(), degraded_gateway("중복 제거 방법입니다."), 2);

    let first = orchestrator.handle_turn(turn(None, "정리해줘")).await.unwrap();
    let session_id = first.session_id;

    let second = orchestrator
        .handle_turn(turn(Some(session_id.clone()), "B열 기준으로 중복만 지워주세요"))
        .await
        .unwrap();

    assert_eq!(second.response.response_type, ResponseType::Solution);
    assert!(second.response.answer.contains("중복 제거 방법입니다."));
    assert_eq!(
        second.response.conversation_state,
        Some(ConversationState::Completed)
    );

    let ctx = store
        .get_conversation_context(&session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(ctx.state, ConversationState::Completed);
    assert_eq!(ctx.clarification_count, 1);
    assert!(ctx.pending_questions.is_empty());
    // Understanding synthesis fell back deterministically and still
    // carries both the question and the answer.
    assert!(ctx.current_understanding.contains("정리해줘"));
    assert!(ctx.current_understanding.contains("중복만 지워주세요"));
}

// Scenario E: with two questions pending and max_clarifications == 2,
// the emptied queue short-circuits into PLANNING after the second
// answer.
#[tokio::test]
async fn empty_queue_short_circuits_to_planning() {
    use excelly::chat::types::{ClarificationQuestion, ConversationContext, QuestionType};

    let engine = ClarificationEngine::new(degraded_gateway("x"));

    let mut ctx = ConversationContext::new("자동화해줘".to_string(), 2);
    ctx.state = ConversationState::Clarifying;
    for question_type in [QuestionType::Goal, QuestionType::Constraints] {
        ctx.pending_questions.push(ClarificationQuestion {
            question: "q".to_string(),
            context: "c".to_string(),
            options: vec![],
            required: true,
            question_type,
        });
    }

    let ctx = engine.process_answer(ctx, "매일 아침 실행").await;
    assert_eq!(ctx.state, ConversationState::Clarifying);
    assert_eq!(ctx.clarification_count, 1);
    assert_eq!(ctx.pending_questions.len(), 1);
    assert_eq!(ctx.gathered_info.len(), 1);

    let ctx = engine.process_answer(ctx, "Excel 2019, VBA 가능").await;
    assert_eq!(ctx.state, ConversationState::Planning);
    assert_eq!(ctx.clarification_count, 2);
    assert!(ctx.pending_questions.is_empty());
    assert_eq!(ctx.gathered_info.len(), 2);
}

// Bound invariant: the clarification count never exceeds the limit, and
// once it is reached the state is PLANNING or later.
#[tokio::test]
async fn clarification_count_never_exceeds_max() {
    use excelly::chat::types::{ClarificationQuestion, ConversationContext, QuestionType};

    let engine = ClarificationEngine::new(degraded_gateway("x"));

    let mut ctx = ConversationContext::new("도와줘".to_string(), 2);
    ctx.state = ConversationState::Clarifying;
    // More questions queued than the budget allows.
    for _ in 0..5 {
        ctx.pending_questions.push(ClarificationQuestion {
            question: "q".to_string(),
            context: "c".to_string(),
            options: vec![],
            required: true,
            question_type: QuestionType::Goal,
        });
    }

    for i in 0..5 {
        ctx = engine.process_answer(ctx, &format!("답변 {i}")).await;
        assert!(ctx.clarification_count <= ctx.max_clarifications);
        if ctx.state != ConversationState::Clarifying {
            break;
        }
    }
    assert_eq!(ctx.clarification_count, 2);
    assert_eq!(ctx.state, ConversationState::Planning);
}

// Fallback completeness: all tiers timing out yields one aggregated
// error after a bounded wait, not N errors and not a hang.
#[tokio::test]
async fn exhausted_chain_returns_single_aggregated_error() {
    let gateway = ModelGateway::with_backends(vec![
        (
            BackendId::GeminiPro,
            Arc::new(FakeBackend::stalling("gemini_pro", Duration::from_secs(5)))
                as Arc<dyn CompletionBackend>,
            Duration::from_millis(50),
        ),
        (
            BackendId::GeminiFlash,
            Arc::new(FakeBackend::stalling("gemini_flash", Duration::from_secs(5))),
            Duration::from_millis(50),
        ),
        (
            BackendId::GeminiFlashLite,
            Arc::new(FakeBackend::failing("gemini_flash_lite")),
            Duration::from_millis(50),
        ),
        (
            BackendId::OpenAi,
            Arc::new(FakeBackend::failing("openai")),
            Duration::from_millis(50),
        ),
    ]);

    let started = std::time::Instant::now();
    let err = gateway
        .complete(TaskKind::Planning, "prompt", 0.3)
        .await
        .unwrap_err();

    match err {
        GatewayError::Exhausted { task, detail } => {
            assert_eq!(task, TaskKind::Planning);
            // Every tier's failure is folded into the one error.
            assert!(detail.contains("timed out"));
            assert!(detail.contains("scripted failure"));
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
    // Bounded by the sum of per-tier timeouts, with slack.
    assert!(started.elapsed() < Duration::from_secs(2));
}

// Gateway falls through a timed-out tier to the next one.
#[tokio::test]
async fn timeout_triggers_fallback_to_next_tier() {
    let pro_calls = Arc::new(AtomicUsize::new(0));
    let pro = FakeBackend {
        name: "gemini_pro",
        reply: Some("late".to_string()),
        delay: Some(Duration::from_secs(5)),
        calls: pro_calls.clone(),
        prompts: Arc::new(Mutex::new(Vec::new())),
    };

    let gateway = ModelGateway::with_backends(vec![
        (
            BackendId::GeminiPro,
            Arc::new(pro) as Arc<dyn CompletionBackend>,
            Duration::from_millis(50),
        ),
        (
            BackendId::GeminiFlash,
            Arc::new(FakeBackend::replying("gemini_flash", "대체 답변")),
            Duration::from_secs(1),
        ),
        (
            BackendId::GeminiFlashLite,
            Arc::new(FakeBackend::failing("gemini_flash_lite")),
            Duration::from_secs(1),
        ),
        (
            BackendId::OpenAi,
            Arc::new(FakeBackend::failing("openai")),
            Duration::from_secs(1),
        ),
    ]);

    let completion = gateway.complete(TaskKind::Coding, "prompt", 0.3).await.unwrap();
    assert_eq!(completion.text, "대체 답변");
    assert_eq!(completion.model, "gemini_flash");
    // The timed-out tier was tried exactly once.
    assert_eq!(pro_calls.load(Ordering::SeqCst), 1);
}

// When generation fails outright, the orchestrator surfaces a degraded
// message and clears the in-flight episode.
#[tokio::test]
async fn generation_failure_clears_context() {
    let store = test_store().await;

    // Healthy gateway for the clarification turn.
    let orchestrator =
        Orchestrator::with_max_clarifications(store.clone(), degraded_gateway("x"), 2);
    let first = orchestrator.handle_turn(turn(None, "정리해줘")).await.unwrap();
    let session_id = first.session_id;

    // Swap in an all-failing gateway for the solution turn.
    let failing = Arc::new(ModelGateway::with_backends(vec![
        (
            BackendId::GeminiPro,
            Arc::new(FakeBackend::failing("gemini_pro")) as Arc<dyn CompletionBackend>,
            Duration::from_secs(1),
        ),
        (
            BackendId::GeminiFlash,
            Arc::new(FakeBackend::failing("gemini_flash")),
            Duration::from_secs(1),
        ),
        (
            BackendId::GeminiFlashLite,
            Arc::new(FakeBackend::failing("gemini_flash_lite")),
            Duration::from_secs(1),
        ),
        (
            BackendId::OpenAi,
            Arc::new(FakeBackend::failing("openai")),
            Duration::from_secs(1),
        ),
    ]));
    let broken = Orchestrator::with_max_clarifications(store.clone(), failing, 2);

    let err = broken
        .handle_turn(turn(Some(session_id.clone()), "B열 기준으로요"))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 503);
    assert!(err.user_message().contains("일시적으로 사용할 수 없습니다"));

    // The half-finished episode is gone, not dangling.
    assert!(store
        .get_conversation_context(&session_id)
        .await
        .unwrap()
        .is_none());
}

// Sheet selection turn returns the task menu without any model call.
#[tokio::test]
async fn sheet_selection_returns_task_menu() {
    let store = test_store().await;
    let gateway = healthy_gateway("unused");
    let orchestrator = Orchestrator::with_max_clarifications(store.clone(), gateway, 2);

    let attached = orchestrator
        .attach_file(None, "sales.csv", SAMPLE_CSV)
        .await
        .unwrap();

    let result = orchestrator
        .handle_turn(TurnRequest {
            session_id: Some(attached.session_id.clone()),
            question: String::new(),
            selected_sheet: Some("Sheet1".to_string()),
            image: None,
            answer_style: AnswerStyle::Normal,
        })
        .await
        .unwrap();

    assert!(result.response.answer.contains("1️⃣"));
    assert!(result.response.model_used.is_none());

    let session = store.get_session(&attached.session_id).await.unwrap().unwrap();
    assert_eq!(session.selected_sheet.as_deref(), Some("Sheet1"));
}

// A continuation cue with prior conversation continues it instead of
// asking for clarification.
#[tokio::test]
async fn continuation_cue_continues_prior_answer() {
    let store = test_store().await;
    let orchestrator =
        Orchestrator::with_max_clarifications(store.clone(), healthy_gateway("이어지는 설명"), 2);

    let first = orchestrator
        .handle_turn(turn(None, "VLOOKUP 사용법 알려줘"))
        .await
        .unwrap();

    let second = orchestrator
        .handle_turn(turn(Some(first.session_id.clone()), "계속해줘"))
        .await
        .unwrap();

    assert_eq!(second.response.response_type, ResponseType::Solution);
    assert!(second.response.answer.contains("이어지는 설명"));
}

// A hybrid request runs a draft pass and a refine pass, feeds the draft
// into the refine prompt, and labels the combined answer.
#[tokio::test]
async fn hybrid_answer_combines_draft_and_refine() {
    use excelly::chat::types::QuestionCategory;
    use excelly::chat::ResponseGenerator;

    let prompts = Arc::new(Mutex::new(Vec::new()));
    let pro = FakeBackend {
        name: "gemini_pro",
        reply: Some("매크로 전체 코드입니다.".to_string()),
        delay: None,
        calls: Arc::new(AtomicUsize::new(0)),
        prompts: prompts.clone(),
    };
    let gateway = Arc::new(ModelGateway::with_backends(vec![(
        BackendId::GeminiPro,
        Arc::new(pro) as Arc<dyn CompletionBackend>,
        Duration::from_secs(1),
    )]));
    let generator = ResponseGenerator::new(gateway);

    let answer = generator
        .generate(
            QuestionCategory::Hybrid,
            "모든 매출자료를 vba로 한 시트에 통합해서 저장",
            "",
            "파일: sales.csv",
            AnswerStyle::Normal,
        )
        .await
        .unwrap();

    assert!(answer.text.contains("매크로 전체 코드입니다."));
    assert!(answer.text.contains("두 모델의 분석과 정밀함"));
    assert_eq!(answer.model, "gemini_pro+gemini_pro");

    // Exactly two passes, with the draft folded into the refine prompt.
    let recorded = prompts.lock().unwrap();
    assert_eq!(recorded.len(), 2);
    assert!(recorded[1].contains("분석 메모"));
    assert!(recorded[1].contains("매크로 전체 코드입니다."));
}

// A failing image analysis degrades to a bracketed notice in the
// debugging prompt instead of failing the turn.
#[tokio::test]
async fn failed_image_analysis_degrades_to_text_notice() {
    use excelly::chat::ResponseGenerator;
    use excelly::llm::ImageInput;

    let prompts = Arc::new(Mutex::new(Vec::new()));
    // Replies to text completion; no image support.
    let openai = FakeBackend {
        name: "openai",
        reply: Some("오류 해결 단계입니다.".to_string()),
        delay: None,
        calls: Arc::new(AtomicUsize::new(0)),
        prompts: prompts.clone(),
    };
    let gateway = Arc::new(ModelGateway::with_backends(vec![(
        BackendId::OpenAi,
        Arc::new(openai) as Arc<dyn CompletionBackend>,
        Duration::from_secs(1),
    )]));
    let generator = ResponseGenerator::new(gateway);

    let image = ImageInput {
        bytes: vec![0xFF, 0xD8],
        mime_type: "image/png".to_string(),
    };
    let answer = generator
        .generate_debugging("매크로 실행 중 오류가 나요", "", "", Some(&image), AnswerStyle::Normal)
        .await
        .unwrap();

    assert!(answer.text.contains("오류 해결 단계입니다."));

    // One text completion; the image exhausted every tier and the
    // prompt carries the degraded notice.
    let recorded = prompts.lock().unwrap();
    assert_eq!(recorded.len(), 1);
    assert!(recorded[0].contains("[첨부 이미지를 분석하지 못했습니다"));
}

// Oversized and wrong-type uploads are rejected before anything is
// stored.
#[tokio::test]
async fn invalid_uploads_are_rejected() {
    let store = test_store().await;
    let orchestrator =
        Orchestrator::with_max_clarifications(store.clone(), healthy_gateway("x"), 2);

    let err = orchestrator
        .attach_file(None, "notes.txt", b"hello")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);

    let err = orchestrator
        .attach_file(None, "broken.xlsx", b"not a real workbook")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 422);
}
