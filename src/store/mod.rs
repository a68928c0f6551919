// src/store/mod.rs
//
// Narrow seams to the collaborators the adaptive core does not own:
// row-oriented persistence for tests and sections, the question bank,
// the feedback sink and the clock. Handlers and the engine only ever see
// these traits; `pg` backs them with Postgres, `memory` backs them with
// in-process maps for tests and local development.

pub mod memory;
pub mod pg;

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{
    feedback::FeedbackRecord,
    level::LevelState,
    question::Question,
    section::{SectionKind, SectionRow},
    test::{TestRow, TestType},
};

/// Fields of a test assignment before the store allocates an id and stamps
/// `assigned_at`.
#[derive(Debug, Clone)]
pub struct NewTest {
    pub student_id: i64,
    pub test_type: TestType,
    pub seed_start: HashMap<SectionKind, String>,
    pub time_limit_seconds: i64,
}

/// Fields of a bank question before the store allocates an id.
#[derive(Debug, Clone)]
pub struct NewQuestion {
    pub section: SectionKind,
    pub level: LevelState,
    pub content: String,
    pub options: Vec<String>,
    pub answer: String,
    pub passage_id: Option<i64>,
}

/// Row-oriented get/update for test and section entities. Every mutation
/// is a targeted single-row write; no multi-row transactions are assumed.
#[async_trait]
pub trait TestStore: Send + Sync {
    async fn insert_test(&self, test: NewTest) -> Result<TestRow, AppError>;
    async fn get_test(&self, id: i64) -> Result<Option<TestRow>, AppError>;
    async fn put_test(&self, test: &TestRow) -> Result<(), AppError>;

    async fn get_sections(&self, test_id: i64) -> Result<Vec<SectionRow>, AppError>;
    async fn get_section(
        &self,
        test_id: i64,
        kind: SectionKind,
    ) -> Result<Option<SectionRow>, AppError>;
    async fn insert_section(&self, row: &SectionRow) -> Result<(), AppError>;
    async fn put_section(&self, row: &SectionRow) -> Result<(), AppError>;
}

/// Lookup into the question bank. Storage format is the bank's own
/// concern; the core only asks for an unserved question at a level.
#[async_trait]
pub trait QuestionBank: Send + Sync {
    /// An unserved question for `section` at `level`. Reading lookups
    /// prefer questions sharing `passage_id` so a passage is worked
    /// through before moving on.
    async fn next_question(
        &self,
        section: SectionKind,
        level: LevelState,
        exclude: &[i64],
        passage_id: Option<i64>,
    ) -> Result<Option<Question>, AppError>;

    async fn get_question(&self, id: i64) -> Result<Option<Question>, AppError>;

    async fn insert_question(&self, question: NewQuestion) -> Result<i64, AppError>;
}

/// Upsert keyed by test id; re-finalizing replaces the record.
#[async_trait]
pub trait FeedbackSink: Send + Sync {
    async fn upsert_feedback(&self, record: &FeedbackRecord) -> Result<(), AppError>;
}

/// Time source for elapsed-time computation and lifecycle stamps.
pub trait Clock: Send + Sync {
    fn now(&self) -> chrono::DateTime<chrono::Utc>;
}

/// Production clock.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> chrono::DateTime<chrono::Utc> {
        chrono::Utc::now()
    }
}
