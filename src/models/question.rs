// src/models/question.rs

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::models::{level::LevelState, section::SectionKind};

/// One bank question, leveled within a section.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: i64,

    pub section: SectionKind,

    /// Difficulty coordinate this question targets.
    pub level: LevelState,

    /// The text content of the question.
    pub content: String,

    /// List of options (e.g., ["Option A", "Option B"]).
    pub options: Vec<String>,

    /// The correct answer key or content.
    pub answer: String,

    /// Reading only: questions sharing a passage carry the same id.
    pub passage_id: Option<i64>,
}

impl Question {
    /// Client-facing view, answer key stripped.
    pub fn to_public(&self) -> PublicQuestion {
        PublicQuestion {
            id: self.id,
            section: self.section,
            level: self.level,
            content: self.content.clone(),
            options: self.options.clone(),
            passage_id: self.passage_id,
        }
    }
}

/// DTO for sending a question to the client (excludes the answer).
#[derive(Debug, Serialize)]
pub struct PublicQuestion {
    pub id: i64,
    pub section: SectionKind,
    pub level: LevelState,
    pub content: String,
    pub options: Vec<String>,
    pub passage_id: Option<i64>,
}

/// DTO for creating a new bank question.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateQuestionRequest {
    pub section: String,
    pub level: String,
    #[validate(length(min = 1, max = 1000))]
    pub content: String,
    #[validate(custom(function = validate_options))]
    pub options: Vec<String>,
    #[validate(length(min = 1, max = 500))]
    pub answer: String,
    pub passage_id: Option<i64>,
}

fn validate_options(options: &[String]) -> Result<(), validator::ValidationError> {
    if options.is_empty() {
        return Err(validator::ValidationError::new("options_cannot_be_empty"));
    }
    for opt in options {
        if opt.len() > 500 {
            return Err(validator::ValidationError::new("option_too_long"));
        }
    }
    Ok(())
}

/// Next-question lookup result. `question` is absent when the bank has
/// nothing unserved at the section's level; `exhausted` means the section
/// reached its question cap.
#[derive(Debug, Serialize)]
pub struct NextQuestionResponse {
    pub exhausted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub question: Option<PublicQuestion>,
}

/// DTO for submitting an answer to a served question.
#[derive(Debug, Deserialize)]
pub struct SubmitAnswerRequest {
    pub question_id: i64,
    pub answer: String,
}

/// Result of one answer submission: correctness plus the section state
/// after the adjuster has run.
#[derive(Debug, Serialize)]
pub struct SubmitAnswerResponse {
    pub correct: bool,
    pub level: LevelState,
    pub questions_served: i32,
    pub exhausted: bool,
}
