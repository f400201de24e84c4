// src/chat/classifier.rs
// Lexical question classification - no model call, deterministic

use super::generator;
use super::keywords as kw;
use super::types::{QuestionCategory, QuestionClassification, QuestionType};

/// Classify a user utterance against short conversation context.
///
/// Pure function of its inputs: identical (question, context) always
/// yields an identical classification, and it cannot fail - the
/// no-signal outcome is a degraded default, not an error.
pub fn classify(question: &str, context: &str) -> QuestionClassification {
    let q = question.trim().to_lowercase();

    if q.is_empty() {
        return with_backend(QuestionClassification {
            category: QuestionCategory::BeginnerHelp,
            confidence: 0.5,
            reasoning: "빈 질문".to_string(),
            recommended_backend: String::new(),
            needs_clarification: true,
            clarification_reasons: vec![QuestionType::Goal],
        });
    }

    // 1) Explicit spreadsheet request: named function, column/row
    // reference, or concrete error vocabulary. Answer immediately.
    let has_immediate = kw::contains_any(&q, kw::FUNCTION_TERMS)
        || kw::contains_any(&q, kw::IMMEDIATE_TERMS)
        || kw::has_column_reference(&q);
    if has_immediate {
        let category = immediate_category(&q);
        return with_backend(QuestionClassification {
            category,
            confidence: 0.9,
            reasoning: "구체 키워드를 포함한 Excel 요청".to_string(),
            recommended_backend: String::new(),
            needs_clarification: false,
            clarification_reasons: vec![],
        });
    }

    // 2) "Keep going" cue or an utterance too short to carry intent. A
    // cue that targets columns or functions absent from the prior
    // exchange is a new question wearing continuation words.
    let mut is_continuation = kw::contains_any(&q, kw::CONTINUATION_TERMS);
    if is_continuation && !context.trim().is_empty() && is_new_question(question, context) {
        is_continuation = false;
    }
    let too_short =
        q.chars().count() <= kw::MIN_QUESTION_CHARS || q.split_whitespace().count() <= 2;
    if is_continuation || too_short {
        let category = if is_continuation {
            QuestionCategory::Continuation
        } else {
            QuestionCategory::Planning
        };
        return with_backend(QuestionClassification {
            category,
            confidence: 0.7,
            reasoning: "이어달라는 요청 또는 너무 짧아 의도 불명확".to_string(),
            recommended_backend: String::new(),
            needs_clarification: true,
            clarification_reasons: vec![QuestionType::Goal],
        });
    }

    // 3) Weighted vote. Precedence on tie:
    // continuation > complex > advanced > beginner > default.
    let complex_hits = kw::count_matches(&q, kw::COMPLEX_TERMS);
    let explicit_complex = complex_hits >= kw::COMPLEX_MATCH_THRESHOLD
        || kw::contains_any(&q, kw::COMPLEX_PATTERNS);
    let has_vba = kw::contains_any(&q, kw::VBA_TERMS);
    let advanced_hits = kw::count_matches(&q, kw::ADVANCED_TERMS);
    let beginner_hits = kw::count_matches(&q, kw::BEGINNER_TERMS);

    let needs_clarification = !is_specific_enough(&q) || has_multiple_interpretations(&q);
    let reasons = if needs_clarification {
        vec![QuestionType::Goal]
    } else {
        vec![]
    };

    let (category, confidence, reasoning) = if has_vba && explicit_complex {
        (
            QuestionCategory::Hybrid,
            0.75,
            "VBA와 다단계 작업이 결합된 요청".to_string(),
        )
    } else if explicit_complex || has_vba {
        (
            QuestionCategory::Planning,
            0.7,
            "여러 단계가 필요한 복합 작업".to_string(),
        )
    } else if advanced_hits > 0 && advanced_hits >= beginner_hits {
        (
            QuestionCategory::Advanced,
            0.7,
            "고급 기능 관련 요청".to_string(),
        )
    } else if beginner_hits > 0 {
        (
            QuestionCategory::BeginnerHelp,
            0.7,
            "기초 사용법 질문".to_string(),
        )
    } else if kw::contains_any(&q, &["분석", "통계", "패턴", "요약"]) {
        (
            QuestionCategory::Analysis,
            0.65,
            "데이터 분석 요청".to_string(),
        )
    } else if needs_clarification {
        (
            QuestionCategory::Planning,
            0.6,
            "모호한 요청으로 추가 정보 필요".to_string(),
        )
    } else if is_specific_enough(&q) {
        (
            QuestionCategory::Simple,
            0.6,
            "구체적인 작업 요청".to_string(),
        )
    } else {
        // No signal at all: degrade to the safest persona.
        (
            QuestionCategory::BeginnerHelp,
            0.5,
            "분류 신호 없음, 기본 분류 사용".to_string(),
        )
    };

    with_backend(QuestionClassification {
        category,
        confidence,
        reasoning,
        recommended_backend: String::new(),
        needs_clarification,
        clarification_reasons: reasons,
    })
}

fn immediate_category(q: &str) -> QuestionCategory {
    if kw::contains_any(q, kw::ERROR_TERMS) {
        QuestionCategory::Debugging
    } else if kw::contains_any(q, kw::VBA_TERMS) {
        QuestionCategory::Coding
    } else if kw::contains_any(q, &["분석", "통계", "패턴"]) {
        QuestionCategory::Analysis
    } else {
        QuestionCategory::Simple
    }
}

fn with_backend(mut c: QuestionClassification) -> QuestionClassification {
    c.recommended_backend = generator::dispatch(c.category).task.fallback_chain()[0]
        .as_str()
        .to_string();
    c
}

/// Concrete enough to act on without asking anything.
pub fn is_specific_enough(question: &str) -> bool {
    let q = question.to_lowercase();
    kw::contains_any(&q, kw::FUNCTION_TERMS)
        || kw::contains_any(&q, kw::OPERATION_TERMS)
        || kw::contains_any(&q, kw::VBA_TERMS)
        || kw::contains_any(&q, kw::COMPLEX_PATTERNS)
        || kw::has_column_reference(&q)
}

/// Generic verbs ("clean it up", "help me") with nothing concrete
/// attached admit several readings.
pub fn has_multiple_interpretations(question: &str) -> bool {
    let q = question.to_lowercase();
    kw::contains_any(&q, kw::AMBIGUOUS_TERMS) && !is_specific_enough(&q)
}

/// Whether an utterance starts a new question rather than continuing the
/// previous solution.
///
/// Bounded keyword/column/function heuristics, no model call. Known
/// precision limit: a new question phrased entirely in the previous
/// question's vocabulary will be read as a continuation.
pub fn is_new_question(question: &str, context: &str) -> bool {
    let q = question.to_lowercase();
    let ctx = context.to_lowercase();

    if kw::contains_any(&q, kw::NEW_QUESTION_TERMS) {
        return true;
    }

    // Columns mentioned now but absent from the prior exchange.
    let q_cols = kw::column_references(&q);
    let ctx_cols = kw::column_references(&ctx);
    if !q_cols.is_empty() && !ctx_cols.is_empty() && !q_cols.iter().any(|c| ctx_cols.contains(c)) {
        return true;
    }

    // Entirely different function set than the prior exchange.
    let q_funcs = kw::function_mentions(&q);
    let ctx_funcs = kw::function_mentions(&ctx);
    if !q_funcs.is_empty() && !ctx_funcs.is_empty() && !q_funcs.iter().any(|f| ctx_funcs.contains(f))
    {
        return true;
    }

    false
}
