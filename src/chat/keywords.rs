// src/chat/keywords.rs
// Consolidated keyword tables for lexical classification.
//
// Every heuristic in the conversation core reads from these tables; no
// other module carries its own keyword lists, so the classifier and the
// "specific enough" gating can never drift apart.

/// Spreadsheet function names the assistant answers directly.
pub const FUNCTION_TERMS: &[&str] = &[
    "vlookup", "xlookup", "hlookup", "index", "match", "sumif", "countif",
    "averageif", "concatenate", "left", "right", "mid", "len", "trim",
    "substitute", "replace", "find", "search", "date", "today", "now",
    "year", "month", "day", "weekday", "eomonth", "datedif", "isnumber",
    "istext", "isna", "isblank", "iserror",
];

/// Cell/row/column and other explicit spreadsheet references. Combined
/// with the column pattern below, these mark an utterance as directly
/// answerable.
pub const IMMEDIATE_TERMS: &[&str] = &[
    "1행", "2행", "3행", "4행", "5행", "6행", "7행", "8행", "9행", "10행",
    "서식", "불일치", "공백", "오류", "해결", "방법", "어떻게", "왜", "안되",
    "안 돼", "코드", "값", "찾기", "반환", "일치", "정확", "문제", "수정", "개선",
];

/// Error/diagnosis vocabulary. An immediate utterance containing one of
/// these is a debugging request, not a simple lookup.
pub const ERROR_TERMS: &[&str] = &[
    "오류", "에러", "문제", "안되", "안 돼", "실패", "#n/a", "#ref", "#value",
    "#div", "#name",
];

/// Non-content "keep going" cues.
pub const CONTINUATION_TERMS: &[&str] = &[
    "계속", "계속해", "계속해줘", "계속해죠", "이어서", "이어", "진행", "진행해",
    "continue",
];

/// Cues that a genuinely new question is starting inside an existing
/// session.
pub const NEW_QUESTION_TERMS: &[&str] = &[
    "추가", "또", "그리고", "또한", "다음", "이번에는", "이제", "새로", "다른",
    "별도", "추가로", "부가로", "그 다음", "그리고 나서", "새 열", "다른 열",
    "다른 시트", "새 시트",
];

/// Utterances too generic to act on without clarification.
pub const AMBIGUOUS_TERMS: &[&str] = &[
    "정리해줘", "분석해줘", "요약해줘", "만들어줘", "해줘", "도와줘",
];

/// Operations that make an otherwise vague sentence concrete.
pub const OPERATION_TERMS: &[&str] = &[
    "찾아서", "가져와", "연결", "합계", "평균", "개수", "정렬", "필터",
    "중복 제거", "정리", "분석", "요약", "그래프", "차트", "매크로", "자동화",
    "조건부", "서식", "수식", "함수", "코드", "스크립트", "vba", "확인하고",
    "알고 싶어", "원해", "필요해",
];

/// Generic spreadsheet vocabulary.
pub const EXCEL_TERMS: &[&str] = &[
    "열", "행", "셀", "시트", "워크북", "범위", "피벗", "테이블", "데이터",
    "값", "참조", "링크", "복사", "붙여넣기", "삽입", "삭제", "이동",
];

/// VBA / scripting vocabulary. Any single hit marks the request advanced.
pub const VBA_TERMS: &[&str] = &[
    "vba", "매크로", "스크립트", "자동화", "프로그램", "서브루틴", "dim", "sub",
    "end if", "loop",
];

/// Multi-sheet / aggregation vocabulary. Needs several hits before a
/// request counts as complex, single words here are everyday language.
pub const COMPLEX_TERMS: &[&str] = &[
    "통합", "합치기", "병합", "모든", "전체", "년도", "월별", "매출", "자료",
    "집계", "통계", "년도별", "여러 시트", "여러 파일", "각 시트",
];

/// Phrases that by themselves signal a complex multi-step job.
pub const COMPLEX_PATTERNS: &[&str] = &[
    "시트에 저장", "파일로 관리", "한 시트에 통합", "모든 매출자료", "년도별로",
    "vba로", "매크로로",
];

/// Learner vocabulary: asking what something is or how to start.
pub const BEGINNER_TERMS: &[&str] = &[
    "처음", "초보", "몰라", "모르겠", "어떻게 하는", "뭐예요", "뭔가요",
    "무엇인가요", "배우고", "기초", "쉽게",
];

/// Power-user vocabulary beyond plain formulas.
pub const ADVANCED_TERMS: &[&str] = &[
    "배열 수식", "동적 배열", "lambda", "let", "파워쿼리", "power query",
    "파워피벗", "정규식", "최적화", "성능",
];

/// How many COMPLEX_TERMS hits before a request counts as complex.
pub const COMPLEX_MATCH_THRESHOLD: usize = 3;

/// Utterances at or under this many chars are treated as too short to
/// carry intent.
pub const MIN_QUESTION_CHARS: usize = 4;

/// True if the text contains a Hangul column reference like "b열".
/// ASCII letter immediately followed by the column marker.
pub fn has_column_reference(text: &str) -> bool {
    let chars: Vec<char> = text.chars().collect();
    chars.windows(2).any(|w| w[0].is_ascii_alphabetic() && w[1] == '열')
}

/// All column references in the text, lowercased (e.g. "b열").
pub fn column_references(text: &str) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .windows(2)
        .filter(|w| w[0].is_ascii_alphabetic() && w[1] == '열')
        .map(|w| format!("{}열", w[0].to_ascii_lowercase()))
        .collect()
}

pub fn contains_any(text: &str, terms: &[&str]) -> bool {
    terms.iter().any(|t| text.contains(t))
}

pub fn count_matches(text: &str, terms: &[&str]) -> usize {
    terms.iter().filter(|t| text.contains(*t)).count()
}

/// Function names mentioned in the text, for continuation detection.
pub fn function_mentions(text: &str) -> Vec<&'static str> {
    FUNCTION_TERMS
        .iter()
        .filter(|f| text.contains(*f))
        .copied()
        .collect()
}
