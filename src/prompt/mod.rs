// src/prompt/mod.rs
// Prompt assembly for generation, clarification, and understanding calls

use crate::chat::types::QuestionType;

/// Injected into every generation prompt. The file summary is the only
/// grounding the backend model has, so fabricated example data is worse
/// than no answer.
pub const GROUNDING_INSTRUCTION: &str = "**중요**: 답변에는 아래 파일 요약에 \
실제로 존재하는 데이터만 사용하세요. 예시 데이터를 지어내지 마세요. \
파일 요약에 없는 정보가 필요하면 그렇다고 밝히세요.";

/// Appended when the client asked for a short answer.
pub const CONCISE_INSTRUCTION: &str = "답변은 핵심만 간결하게, 불필요한 배경 설명 없이 작성하세요.";

/// Solution prompt for a fresh question (or a finalized understanding).
pub fn build_solution_prompt(
    persona: &str,
    question: &str,
    context: &str,
    file_summary: &str,
    concise: bool,
) -> String {
    let mut prompt = String::new();
    prompt.push_str(persona);
    prompt.push_str("\n\n");

    if !context.is_empty() {
        prompt.push_str("이전 대화:\n");
        prompt.push_str(context);
        prompt.push_str("\n\n");
    }

    if !file_summary.is_empty() {
        prompt.push_str(GROUNDING_INSTRUCTION);
        prompt.push_str("\n\n파일 요약:\n");
        prompt.push_str(file_summary);
        prompt.push_str("\n\n");
    }

    prompt.push_str("사용자 요청:\n");
    prompt.push_str(question);

    if concise {
        prompt.push_str("\n\n");
        prompt.push_str(CONCISE_INSTRUCTION);
    }

    prompt
}

/// Solution prompt when the turn continues the previous answer.
pub fn build_continuation_prompt(
    persona: &str,
    question: &str,
    context: &str,
    file_summary: &str,
    concise: bool,
) -> String {
    let mut prompt = String::new();
    prompt.push_str(persona);
    prompt.push_str("\n\n이전 답변 내용:\n");
    prompt.push_str(context);
    prompt.push_str("\n\n");

    if !file_summary.is_empty() {
        prompt.push_str(GROUNDING_INSTRUCTION);
        prompt.push_str("\n\n파일 요약:\n");
        prompt.push_str(file_summary);
        prompt.push_str("\n\n");
    }

    prompt.push_str("사용자 요청(이어서): ");
    prompt.push_str(question);
    prompt.push_str("\n이전 답변에서 중단된 지점부터 이어서 작성하세요.");

    if concise {
        prompt.push_str("\n\n");
        prompt.push_str(CONCISE_INSTRUCTION);
    }

    prompt
}

/// One clarification-question generation prompt per question type.
///
/// Each template forbids re-asking gathered information and forbids
/// asking about desired output format - output-format questions are what
/// turn clarification into an interrogation loop.
pub fn build_clarification_prompt(
    question: &str,
    question_type: QuestionType,
    context: &str,
    already_gathered: &[&str],
) -> String {
    let (focus, examples) = match question_type {
        QuestionType::FileStructure => (
            "파일 구조 정보만 확인하세요: 작업할 시트 이름, 데이터 범위.",
            "\"어떤 시트에서 작업하시나요?\"\n\"전체 데이터 범위를 사용하시나요, 특정 범위만 사용하시나요?\"",
        ),
        QuestionType::DataFormat => (
            "데이터 형식 정보만 확인하세요: 데이터 타입(숫자/텍스트/날짜), 특별한 형식 규칙.",
            "\"데이터가 숫자인가요, 텍스트인가요?\"\n\"코드에 특수문자나 공백이 포함되어 있나요?\"",
        ),
        QuestionType::Goal => (
            "작업 조건만 확인하세요: 구체적인 작업 조건, 특별한 요구사항.",
            "\"어떤 조건으로 데이터를 필터링하시나요?\"\n\"자동화가 필요한 작업인가요, 일회성 작업인가요?\"",
        ),
        QuestionType::Constraints => (
            "환경 제약사항만 확인하세요: Excel 버전, VBA 사용 가능 여부.",
            "\"사용 중인 Excel 버전이 어떻게 되시나요?\"\n\"VBA 매크로 사용이 가능한 환경인가요?\"",
        ),
    };

    let mut prompt = String::new();
    prompt.push_str(&format!("사용자의 질문: \"{}\"\n", question));
    if !context.is_empty() {
        prompt.push_str(&format!("이전 대화: \"{}\"\n", context));
    }
    prompt.push_str("\n핵심 정보만 확인하는 질문을 생성하세요.\n\n**중요**:\n");
    prompt.push_str("- 중복 질문 금지\n- 결과 형태나 목표 출력 형식 질문 금지\n- ");
    prompt.push_str(focus);
    prompt.push('\n');

    if !already_gathered.is_empty() {
        prompt.push_str("\n이미 확인된 정보(다시 묻지 마세요):\n");
        for item in already_gathered {
            prompt.push_str("- ");
            prompt.push_str(item);
            prompt.push('\n');
        }
    }

    prompt.push_str("\n**예시 질문:**\n");
    prompt.push_str(examples);
    prompt.push_str("\n\n간단한 질문 1개만 생성하세요.");
    prompt
}

/// Understanding-synthesis prompt, run once when clarification ends.
pub fn build_understanding_prompt(original_question: &str, gathered: &[(QuestionType, String)]) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!("원래 질문: \"{}\"\n수집된 정보:\n", original_question));
    for (question_type, answer) in gathered {
        prompt.push_str(&format!("{}: {}\n", question_type.as_str(), answer));
    }
    prompt.push_str(
        "\n위 정보를 바탕으로 사용자의 요구사항을 명확하게 정리해주세요.\n\
         다음 형식으로 답하세요:\n\n\
         [문제 정의]\n- 사용자가 해결하고자 하는 문제\n\n\
         [요구사항]\n- 구체적인 요구사항들\n\n\
         [제약사항]\n- 확인된 제약사항들\n\n\
         [예상 결과]\n- 사용자가 원하는 최종 결과",
    );
    prompt
}

/// Deterministic fallback when the understanding call fails: the
/// original question plus a flat dump of what was gathered.
pub fn fallback_understanding(original_question: &str, gathered: &[(QuestionType, String)]) -> String {
    let mut out = format!("원래 질문: {}", original_question);
    if !gathered.is_empty() {
        out.push_str("\n수집된 정보:");
        for (question_type, answer) in gathered {
            out.push_str(&format!("\n- {}: {}", question_type.as_str(), answer));
        }
    }
    out
}

/// Prompt for describing an attached screenshot during debugging.
pub fn build_image_description_prompt(question: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str(
        "첨부된 Excel 화면 캡처를 설명하세요. 보이는 수식, 셀 값, 오류 표시를 \
         그대로 옮기고, 화면에 없는 내용은 추측하지 마세요.",
    );
    if !question.is_empty() {
        prompt.push_str("\n사용자의 질문: ");
        prompt.push_str(question);
    }
    prompt
}

/// Sheet-selection acknowledgment with the task menu. Canned text, no
/// model call.
pub fn sheet_selection_message(sheet_name: &str, sheet_summary: &str) -> String {
    format!(
        "'{sheet_name}' 시트를 선택하셨습니다.\n\n{sheet_summary}\n\n\
         어떤 작업을 도와드릴까요?\n\
         1️⃣ 수식/함수 만들기\n\
         2️⃣ 데이터 정리\n\
         3️⃣ 요약/분석\n\
         4️⃣ 시각화\n\
         5️⃣ 자동화\n\n\
         번호를 고르시거나 원하는 작업을 직접 말씀해 주세요."
    )
}

/// Upload acknowledgment when no sheet is selected yet.
pub fn sheet_prompt_message(filename: &str, sheet_overview: &str) -> String {
    format!(
        "'{filename}' 파일을 확인했습니다.\n\n{sheet_overview}\n\n\
         어떤 시트에서 작업할지 선택해 주세요."
    )
}

/// Intro line shown before the first clarifying question.
pub const CLARIFICATION_INTRO: &str = "좋아요! 정확히 도와드리려면 한 가지만 알려주세요.";

/// Transition line when clarification ends and a solution follows.
pub const UNDERSTANDING_ACK: &str = "감사합니다! 정리된 내용을 바탕으로 해결 방법을 안내드릴게요.";
