// src/chat/generator.rs
// Response generation: category dispatch table + gateway calls

use std::sync::Arc;

use tracing::warn;

use super::types::QuestionCategory;
use crate::llm::{GatewayError, ImageInput, ModelGateway, TaskKind};
use crate::persona;
use crate::prompt;

/// Temperature for solution generation. Low: answers should be
/// reproducible, not creative.
const SOLUTION_TEMPERATURE: f32 = 0.3;

/// Requested answer length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnswerStyle {
    #[default]
    Normal,
    Concise,
}

impl AnswerStyle {
    pub fn from_str(s: &str) -> Self {
        if s.eq_ignore_ascii_case("concise") {
            AnswerStyle::Concise
        } else {
            AnswerStyle::Normal
        }
    }

    fn is_concise(&self) -> bool {
        *self == AnswerStyle::Concise
    }
}

/// One row of the category dispatch table.
#[derive(Debug, Clone, Copy)]
pub struct Dispatch {
    pub persona: &'static str,
    pub task: TaskKind,
}

/// Category → (persona template, preferred gateway task). The single
/// routing table; there is no per-category branching anywhere else.
pub fn dispatch(category: QuestionCategory) -> Dispatch {
    match category {
        QuestionCategory::Simple => Dispatch {
            persona: persona::SIMPLE_PERSONA,
            task: TaskKind::Simple,
        },
        QuestionCategory::Coding => Dispatch {
            persona: persona::CODING_PERSONA,
            task: TaskKind::Coding,
        },
        QuestionCategory::Analysis => Dispatch {
            persona: persona::ANALYTICAL_PERSONA,
            task: TaskKind::Analysis,
        },
        QuestionCategory::Planning => Dispatch {
            persona: persona::PLANNING_PERSONA,
            task: TaskKind::Planning,
        },
        QuestionCategory::Debugging => Dispatch {
            persona: persona::DEBUGGING_PERSONA,
            task: TaskKind::Debugging,
        },
        QuestionCategory::BeginnerHelp => Dispatch {
            persona: persona::BEGINNER_PERSONA,
            task: TaskKind::Simple,
        },
        QuestionCategory::Advanced => Dispatch {
            persona: persona::ADVANCED_PERSONA,
            task: TaskKind::Coding,
        },
        QuestionCategory::Continuation => Dispatch {
            persona: persona::CONTINUATION_PERSONA,
            task: TaskKind::Simple,
        },
        QuestionCategory::Hybrid => Dispatch {
            persona: persona::HYBRID_REFINE_PERSONA,
            task: TaskKind::Coding,
        },
    }
}

/// A generated answer plus the model that produced it.
#[derive(Debug, Clone)]
pub struct GeneratedAnswer {
    pub text: String,
    pub model: String,
}

/// Turns a finalized question/understanding into answer text.
///
/// Failures propagate: unlike classification and clarification there is
/// no safe default answer to fabricate.
pub struct ResponseGenerator {
    gateway: Arc<ModelGateway>,
}

impl ResponseGenerator {
    pub fn new(gateway: Arc<ModelGateway>) -> Self {
        Self { gateway }
    }

    pub async fn generate(
        &self,
        category: QuestionCategory,
        question: &str,
        context: &str,
        file_summary: &str,
        style: AnswerStyle,
    ) -> Result<GeneratedAnswer, GatewayError> {
        if category == QuestionCategory::Hybrid {
            return self.generate_hybrid(question, context, file_summary, style).await;
        }

        let row = dispatch(category);
        let prompt = if category == QuestionCategory::Continuation {
            prompt::build_continuation_prompt(
                row.persona,
                question,
                context,
                file_summary,
                style.is_concise(),
            )
        } else {
            prompt::build_solution_prompt(
                row.persona,
                question,
                context,
                file_summary,
                style.is_concise(),
            )
        };

        let completion = self
            .gateway
            .complete(row.task, &prompt, SOLUTION_TEMPERATURE)
            .await?;
        Ok(GeneratedAnswer {
            text: completion.text,
            model: completion.model,
        })
    }

    /// Two sequential calls: a context-extraction draft on the analysis
    /// chain, then a refinement on the coding chain. Different tiers on
    /// purpose: one model drafts broad context, another writes precise
    /// output from it.
    async fn generate_hybrid(
        &self,
        question: &str,
        context: &str,
        file_summary: &str,
        style: AnswerStyle,
    ) -> Result<GeneratedAnswer, GatewayError> {
        let draft_prompt = prompt::build_solution_prompt(
            persona::HYBRID_DRAFT_PERSONA,
            question,
            context,
            file_summary,
            false,
        );
        let draft = self
            .gateway
            .complete(TaskKind::Analysis, &draft_prompt, SOLUTION_TEMPERATURE)
            .await?;

        let refine_prompt = prompt::build_solution_prompt(
            persona::HYBRID_REFINE_PERSONA,
            question,
            &format!("분석 메모:\n{}", draft.text),
            file_summary,
            style.is_concise(),
        );
        let refined = self
            .gateway
            .complete(TaskKind::Coding, &refine_prompt, SOLUTION_TEMPERATURE)
            .await?;

        Ok(GeneratedAnswer {
            text: format!(
                "{}\n\n💡 두 모델의 분석과 정밀함을 결합해 답변을 만들었어요!",
                refined.text
            ),
            model: format!("{}+{}", draft.model, refined.model),
        })
    }

    /// Debugging answer with an optional attached screenshot. Image
    /// analysis failure degrades to a bracketed notice; it never fails
    /// the turn.
    pub async fn generate_debugging(
        &self,
        question: &str,
        context: &str,
        file_summary: &str,
        image: Option<&ImageInput>,
        style: AnswerStyle,
    ) -> Result<GeneratedAnswer, GatewayError> {
        let image_notes = match image {
            Some(img) => {
                let describe = prompt::build_image_description_prompt(question);
                match self
                    .gateway
                    .complete_with_image(TaskKind::ImageDescription, &describe, img, 0.2)
                    .await
                {
                    Ok(c) => format!("\n\n첨부 화면 분석:\n{}", c.text),
                    Err(err) => {
                        warn!(error = %err, "image analysis failed, continuing without it");
                        "\n\n[첨부 이미지를 분석하지 못했습니다. 텍스트 설명만으로 안내드립니다.]"
                            .to_string()
                    }
                }
            }
            None => String::new(),
        };

        let question_with_image = format!("{}{}", question, image_notes);
        self.generate(
            QuestionCategory::Debugging,
            &question_with_image,
            context,
            file_summary,
            style,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dispatch_covers_every_category() {
        for category in [
            QuestionCategory::Simple,
            QuestionCategory::Coding,
            QuestionCategory::Analysis,
            QuestionCategory::Planning,
            QuestionCategory::Debugging,
            QuestionCategory::BeginnerHelp,
            QuestionCategory::Advanced,
            QuestionCategory::Continuation,
            QuestionCategory::Hybrid,
        ] {
            let row = dispatch(category);
            assert!(!row.persona.is_empty());
            assert!(!row.task.fallback_chain().is_empty());
        }
    }

    #[test]
    fn test_answer_style_parsing() {
        assert_eq!(AnswerStyle::from_str("concise"), AnswerStyle::Concise);
        assert_eq!(AnswerStyle::from_str("CONCISE"), AnswerStyle::Concise);
        assert_eq!(AnswerStyle::from_str("normal"), AnswerStyle::Normal);
        assert_eq!(AnswerStyle::from_str(""), AnswerStyle::Normal);
    }
}
