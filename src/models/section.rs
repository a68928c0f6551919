// src/models/section.rs

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::models::level::LevelState;

/// One of the four skill areas tested, each leveled independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SectionKind {
    Reading,
    Grammar,
    Listening,
    Dialog,
}

/// Error for a section key outside the four known skill areas.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownSection(pub String);

impl fmt::Display for UnknownSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown section: {}", self.0)
    }
}

impl std::error::Error for UnknownSection {}

impl SectionKind {
    pub const ALL: [SectionKind; 4] = [
        SectionKind::Reading,
        SectionKind::Grammar,
        SectionKind::Listening,
        SectionKind::Dialog,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            SectionKind::Reading => "reading",
            SectionKind::Grammar => "grammar",
            SectionKind::Listening => "listening",
            SectionKind::Dialog => "dialog",
        }
    }
}

impl fmt::Display for SectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SectionKind {
    type Err = UnknownSection;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "reading" => Ok(SectionKind::Reading),
            "grammar" => Ok(SectionKind::Grammar),
            "listening" => Ok(SectionKind::Listening),
            "dialog" => Ok(SectionKind::Dialog),
            other => Err(UnknownSection(other.to_string())),
        }
    }
}

/// One section instance of one test attempt.
///
/// Mutates during play (level, counters, streaks); becomes immutable after
/// finalize, which stamps `completed`, `final_level` and `score`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SectionRow {
    pub test_id: i64,
    pub kind: SectionKind,
    pub level: LevelState,
    pub questions_served: i32,
    pub correct_count: i32,
    /// Consecutive-correct streak; reset on a wrong answer or a level move.
    pub consecutive_correct: i32,
    /// Consecutive-incorrect streak; reset on a correct answer or a level move.
    pub consecutive_incorrect: i32,
    /// Ids of questions already answered, excluded from bank lookups.
    pub served_question_ids: Vec<i64>,
    /// Reading only: passage shared by the questions currently served.
    pub current_passage_id: Option<i64>,
    pub completed: bool,
    pub final_level: Option<LevelState>,
    /// Percentage 0-100, one decimal; set by the finalizer.
    pub score: Option<f64>,
}

impl SectionRow {
    /// Fresh section at its seed level, created on the first start call.
    pub fn seeded(test_id: i64, kind: SectionKind, level: LevelState) -> Self {
        Self {
            test_id,
            kind,
            level,
            questions_served: 0,
            correct_count: 0,
            consecutive_correct: 0,
            consecutive_incorrect: 0,
            served_question_ids: Vec::new(),
            current_passage_id: None,
            completed: false,
            final_level: None,
            score: None,
        }
    }

    /// Propagation may only overwrite a section's level before play starts.
    pub fn has_started(&self) -> bool {
        self.questions_served > 0
    }
}
