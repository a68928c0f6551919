// src/store/memory.rs

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;

use crate::error::AppError;
use crate::models::{
    feedback::FeedbackRecord,
    level::LevelState,
    question::Question,
    section::{SectionKind, SectionRow},
    test::{TestRow, TestStatus},
};
use crate::store::{FeedbackSink, NewQuestion, NewTest, QuestionBank, TestStore};

/// In-process implementation of the store traits, used by the test suite
/// and for running the service without a database.
#[derive(Default)]
pub struct MemoryStore {
    tests: Mutex<HashMap<i64, TestRow>>,
    sections: Mutex<BTreeMap<(i64, SectionKind), SectionRow>>,
    questions: Mutex<BTreeMap<i64, Question>>,
    feedback: Mutex<HashMap<i64, FeedbackRecord>>,
    next_test_id: AtomicI64,
    next_question_id: AtomicI64,
    /// Test hook: section writes for this kind fail with a store error.
    pub fail_put_section: Mutex<Option<SectionKind>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Direct read for assertions; feedback has no query surface.
    pub fn feedback_for(&self, test_id: i64) -> Option<FeedbackRecord> {
        self.feedback.lock().unwrap().get(&test_id).cloned()
    }
}

#[async_trait]
impl TestStore for MemoryStore {
    async fn insert_test(&self, test: NewTest) -> Result<TestRow, AppError> {
        let id = self.next_test_id.fetch_add(1, Ordering::SeqCst) + 1;
        let row = TestRow {
            id,
            student_id: test.student_id,
            test_type: test.test_type,
            status: TestStatus::Assigned,
            seed_start: test.seed_start,
            time_limit_seconds: test.time_limit_seconds,
            elapsed_ms: 0,
            assigned_at: chrono::Utc::now(),
            started_at: None,
            last_seen_at: None,
            completed_at: None,
            total_score: None,
            weighted_level: None,
        };
        self.tests.lock().unwrap().insert(id, row.clone());
        Ok(row)
    }

    async fn get_test(&self, id: i64) -> Result<Option<TestRow>, AppError> {
        Ok(self.tests.lock().unwrap().get(&id).cloned())
    }

    async fn put_test(&self, test: &TestRow) -> Result<(), AppError> {
        let mut tests = self.tests.lock().unwrap();
        if !tests.contains_key(&test.id) {
            return Err(AppError::InternalServerError(format!(
                "update of missing test row {}",
                test.id
            )));
        }
        tests.insert(test.id, test.clone());
        Ok(())
    }

    async fn get_sections(&self, test_id: i64) -> Result<Vec<SectionRow>, AppError> {
        Ok(self
            .sections
            .lock()
            .unwrap()
            .range((test_id, SectionKind::Reading)..=(test_id, SectionKind::Dialog))
            .map(|(_, row)| row.clone())
            .collect())
    }

    async fn get_section(
        &self,
        test_id: i64,
        kind: SectionKind,
    ) -> Result<Option<SectionRow>, AppError> {
        Ok(self
            .sections
            .lock()
            .unwrap()
            .get(&(test_id, kind))
            .cloned())
    }

    async fn insert_section(&self, row: &SectionRow) -> Result<(), AppError> {
        self.sections
            .lock()
            .unwrap()
            .insert((row.test_id, row.kind), row.clone());
        Ok(())
    }

    async fn put_section(&self, row: &SectionRow) -> Result<(), AppError> {
        if *self.fail_put_section.lock().unwrap() == Some(row.kind) {
            return Err(AppError::InternalServerError(format!(
                "injected write failure for section {}",
                row.kind
            )));
        }
        let mut sections = self.sections.lock().unwrap();
        if !sections.contains_key(&(row.test_id, row.kind)) {
            return Err(AppError::InternalServerError(format!(
                "update of missing section row {}/{}",
                row.test_id, row.kind
            )));
        }
        sections.insert((row.test_id, row.kind), row.clone());
        Ok(())
    }
}

#[async_trait]
impl QuestionBank for MemoryStore {
    async fn next_question(
        &self,
        section: SectionKind,
        level: LevelState,
        exclude: &[i64],
        passage_id: Option<i64>,
    ) -> Result<Option<Question>, AppError> {
        let questions = self.questions.lock().unwrap();
        let candidates = || {
            questions
                .values()
                .filter(|q| q.section == section && q.level == level)
                .filter(|q| !exclude.contains(&q.id))
        };
        // Prefer the passage already in play, then any question at level.
        if passage_id.is_some() {
            if let Some(q) = candidates().find(|q| q.passage_id == passage_id) {
                return Ok(Some(q.clone()));
            }
        }
        Ok(candidates().next().cloned())
    }

    async fn get_question(&self, id: i64) -> Result<Option<Question>, AppError> {
        Ok(self.questions.lock().unwrap().get(&id).cloned())
    }

    async fn insert_question(&self, question: NewQuestion) -> Result<i64, AppError> {
        let id = self.next_question_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.questions.lock().unwrap().insert(
            id,
            Question {
                id,
                section: question.section,
                level: question.level,
                content: question.content,
                options: question.options,
                answer: question.answer,
                passage_id: question.passage_id,
            },
        );
        Ok(id)
    }
}

#[async_trait]
impl FeedbackSink for MemoryStore {
    async fn upsert_feedback(&self, record: &FeedbackRecord) -> Result<(), AppError> {
        self.feedback
            .lock()
            .unwrap()
            .insert(record.test_id, record.clone());
        Ok(())
    }
}
