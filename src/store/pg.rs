// src/store/pg.rs

use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json};

use crate::error::AppError;
use crate::models::{
    feedback::FeedbackRecord,
    level::LevelState,
    question::Question,
    section::{SectionKind, SectionRow},
    test::{TestRow, TestStatus, TestType},
};
use crate::store::{FeedbackSink, NewQuestion, NewTest, QuestionBank, TestStore};

/// Postgres-backed implementation of the store traits.
///
/// Level states and lifecycle enums live in the database as text and are
/// parsed back at the row boundary, so a corrupt row surfaces as a 500
/// rather than a silent coercion.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(sqlx::FromRow)]
struct TestRecord {
    id: i64,
    student_id: i64,
    test_type: String,
    status: String,
    seed_start: Json<HashMap<String, String>>,
    time_limit_seconds: i64,
    elapsed_ms: i64,
    assigned_at: chrono::DateTime<chrono::Utc>,
    started_at: Option<chrono::DateTime<chrono::Utc>>,
    last_seen_at: Option<chrono::DateTime<chrono::Utc>>,
    completed_at: Option<chrono::DateTime<chrono::Utc>>,
    total_score: Option<f64>,
    weighted_level: Option<f64>,
}

impl TryFrom<TestRecord> for TestRow {
    type Error = AppError;

    fn try_from(rec: TestRecord) -> Result<Self, Self::Error> {
        let corrupt = |what: &str| AppError::InternalServerError(format!("corrupt test row: {}", what));
        let mut seed_start = HashMap::new();
        for (key, value) in rec.seed_start.0 {
            let kind = key.parse().map_err(|_| corrupt("seed section key"))?;
            seed_start.insert(kind, value);
        }
        Ok(TestRow {
            id: rec.id,
            student_id: rec.student_id,
            test_type: rec.test_type.parse::<TestType>().map_err(|_| corrupt("test_type"))?,
            status: rec.status.parse::<TestStatus>().map_err(|_| corrupt("status"))?,
            seed_start,
            time_limit_seconds: rec.time_limit_seconds,
            elapsed_ms: rec.elapsed_ms,
            assigned_at: rec.assigned_at,
            started_at: rec.started_at,
            last_seen_at: rec.last_seen_at,
            completed_at: rec.completed_at,
            total_score: rec.total_score,
            weighted_level: rec.weighted_level,
        })
    }
}

const TEST_COLUMNS: &str = "id, student_id, test_type, status, seed_start, time_limit_seconds, \
     elapsed_ms, assigned_at, started_at, last_seen_at, completed_at, total_score, weighted_level";

#[derive(sqlx::FromRow)]
struct SectionRecord {
    test_id: i64,
    section: String,
    level: String,
    questions_served: i32,
    correct_count: i32,
    consecutive_correct: i32,
    consecutive_incorrect: i32,
    served_question_ids: Json<Vec<i64>>,
    current_passage_id: Option<i64>,
    completed: bool,
    final_level: Option<String>,
    score: Option<f64>,
}

impl TryFrom<SectionRecord> for SectionRow {
    type Error = AppError;

    fn try_from(rec: SectionRecord) -> Result<Self, Self::Error> {
        let corrupt = |what: &str| AppError::InternalServerError(format!("corrupt section row: {}", what));
        Ok(SectionRow {
            test_id: rec.test_id,
            kind: rec.section.parse::<SectionKind>().map_err(|_| corrupt("section"))?,
            level: rec.level.parse::<LevelState>().map_err(|_| corrupt("level"))?,
            questions_served: rec.questions_served,
            correct_count: rec.correct_count,
            consecutive_correct: rec.consecutive_correct,
            consecutive_incorrect: rec.consecutive_incorrect,
            served_question_ids: rec.served_question_ids.0,
            current_passage_id: rec.current_passage_id,
            completed: rec.completed,
            final_level: rec
                .final_level
                .map(|s| s.parse::<LevelState>().map_err(|_| corrupt("final_level")))
                .transpose()?,
            score: rec.score,
        })
    }
}

const SECTION_COLUMNS: &str = "test_id, section, level, questions_served, correct_count, \
     consecutive_correct, consecutive_incorrect, served_question_ids, current_passage_id, \
     completed, final_level, score";

#[derive(sqlx::FromRow)]
struct QuestionRecord {
    id: i64,
    section: String,
    level: String,
    content: String,
    options: Json<Vec<String>>,
    answer: String,
    passage_id: Option<i64>,
}

impl TryFrom<QuestionRecord> for Question {
    type Error = AppError;

    fn try_from(rec: QuestionRecord) -> Result<Self, Self::Error> {
        let corrupt = |what: &str| AppError::InternalServerError(format!("corrupt question row: {}", what));
        Ok(Question {
            id: rec.id,
            section: rec.section.parse().map_err(|_| corrupt("section"))?,
            level: rec.level.parse().map_err(|_| corrupt("level"))?,
            content: rec.content,
            options: rec.options.0,
            answer: rec.answer,
            passage_id: rec.passage_id,
        })
    }
}

#[async_trait]
impl TestStore for PgStore {
    async fn insert_test(&self, test: NewTest) -> Result<TestRow, AppError> {
        let seed: HashMap<String, String> = test
            .seed_start
            .iter()
            .map(|(kind, level)| (kind.to_string(), level.clone()))
            .collect();

        let rec = sqlx::query_as::<_, TestRecord>(&format!(
            r#"
            INSERT INTO tests (student_id, test_type, status, seed_start, time_limit_seconds)
            VALUES ($1, $2, 'assigned', $3, $4)
            RETURNING {TEST_COLUMNS}
            "#
        ))
        .bind(test.student_id)
        .bind(test.test_type.as_str())
        .bind(Json(seed))
        .bind(test.time_limit_seconds)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert test: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

        rec.try_into()
    }

    async fn get_test(&self, id: i64) -> Result<Option<TestRow>, AppError> {
        let rec = sqlx::query_as::<_, TestRecord>(&format!(
            "SELECT {TEST_COLUMNS} FROM tests WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        rec.map(TryInto::try_into).transpose()
    }

    async fn put_test(&self, test: &TestRow) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE tests SET
                status = $2,
                elapsed_ms = $3,
                started_at = $4,
                last_seen_at = $5,
                completed_at = $6,
                total_score = $7,
                weighted_level = $8
            WHERE id = $1
            "#,
        )
        .bind(test.id)
        .bind(test.status.as_str())
        .bind(test.elapsed_ms)
        .bind(test.started_at)
        .bind(test.last_seen_at)
        .bind(test.completed_at)
        .bind(test.total_score)
        .bind(test.weighted_level)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update test {}: {:?}", test.id, e);
            AppError::InternalServerError(e.to_string())
        })?;

        Ok(())
    }

    async fn get_sections(&self, test_id: i64) -> Result<Vec<SectionRow>, AppError> {
        let recs = sqlx::query_as::<_, SectionRecord>(&format!(
            "SELECT {SECTION_COLUMNS} FROM test_sections WHERE test_id = $1 ORDER BY id"
        ))
        .bind(test_id)
        .fetch_all(&self.pool)
        .await?;

        recs.into_iter().map(TryInto::try_into).collect()
    }

    async fn get_section(
        &self,
        test_id: i64,
        kind: SectionKind,
    ) -> Result<Option<SectionRow>, AppError> {
        let rec = sqlx::query_as::<_, SectionRecord>(&format!(
            "SELECT {SECTION_COLUMNS} FROM test_sections WHERE test_id = $1 AND section = $2"
        ))
        .bind(test_id)
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;

        rec.map(TryInto::try_into).transpose()
    }

    async fn insert_section(&self, row: &SectionRow) -> Result<(), AppError> {
        sqlx::query(
            r#"
            INSERT INTO test_sections
                (test_id, section, level, questions_served, correct_count,
                 consecutive_correct, consecutive_incorrect, served_question_ids,
                 current_passage_id, completed, final_level, score)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(row.test_id)
        .bind(row.kind.as_str())
        .bind(row.level.to_string())
        .bind(row.questions_served)
        .bind(row.correct_count)
        .bind(row.consecutive_correct)
        .bind(row.consecutive_incorrect)
        .bind(Json(row.served_question_ids.clone()))
        .bind(row.current_passage_id)
        .bind(row.completed)
        .bind(row.final_level.map(|l| l.to_string()))
        .bind(row.score)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert section {}/{}: {:?}", row.test_id, row.kind, e);
            AppError::InternalServerError(e.to_string())
        })?;

        Ok(())
    }

    async fn put_section(&self, row: &SectionRow) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE test_sections SET
                level = $3,
                questions_served = $4,
                correct_count = $5,
                consecutive_correct = $6,
                consecutive_incorrect = $7,
                served_question_ids = $8,
                current_passage_id = $9,
                completed = $10,
                final_level = $11,
                score = $12
            WHERE test_id = $1 AND section = $2
            "#,
        )
        .bind(row.test_id)
        .bind(row.kind.as_str())
        .bind(row.level.to_string())
        .bind(row.questions_served)
        .bind(row.correct_count)
        .bind(row.consecutive_correct)
        .bind(row.consecutive_incorrect)
        .bind(Json(row.served_question_ids.clone()))
        .bind(row.current_passage_id)
        .bind(row.completed)
        .bind(row.final_level.map(|l| l.to_string()))
        .bind(row.score)
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to update section {}/{}: {:?}", row.test_id, row.kind, e);
            AppError::InternalServerError(e.to_string())
        })?;

        Ok(())
    }
}

impl PgStore {
    /// One random unserved question, optionally pinned to a passage.
    /// Uses a QueryBuilder for the dynamic exclusion clause.
    async fn fetch_question(
        &self,
        section: SectionKind,
        level: LevelState,
        exclude: &[i64],
        passage_id: Option<i64>,
    ) -> Result<Option<Question>, AppError> {
        let mut qb = QueryBuilder::<Postgres>::new(
            "SELECT id, section, level, content, options, answer, passage_id \
             FROM questions WHERE section = ",
        );
        qb.push_bind(section.as_str());
        qb.push(" AND level = ");
        qb.push_bind(level.to_string());
        if let Some(passage_id) = passage_id {
            qb.push(" AND passage_id = ");
            qb.push_bind(passage_id);
        }
        if !exclude.is_empty() {
            qb.push(" AND id NOT IN (");
            let mut separated = qb.separated(",");
            for id in exclude {
                separated.push_bind(*id);
            }
            separated.push_unseparated(")");
        }
        qb.push(" ORDER BY RANDOM() LIMIT 1");

        let rec: Option<QuestionRecord> = qb
            .build_query_as()
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| {
                tracing::error!("Failed to fetch question: {:?}", e);
                AppError::InternalServerError(e.to_string())
            })?;

        rec.map(TryInto::try_into).transpose()
    }
}

#[async_trait]
impl QuestionBank for PgStore {
    async fn next_question(
        &self,
        section: SectionKind,
        level: LevelState,
        exclude: &[i64],
        passage_id: Option<i64>,
    ) -> Result<Option<Question>, AppError> {
        // Work through the passage already in play before switching.
        if passage_id.is_some() {
            if let Some(q) = self.fetch_question(section, level, exclude, passage_id).await? {
                return Ok(Some(q));
            }
        }
        self.fetch_question(section, level, exclude, None).await
    }

    async fn get_question(&self, id: i64) -> Result<Option<Question>, AppError> {
        let rec = sqlx::query_as::<_, QuestionRecord>(
            "SELECT id, section, level, content, options, answer, passage_id \
             FROM questions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        rec.map(TryInto::try_into).transpose()
    }

    async fn insert_question(&self, question: NewQuestion) -> Result<i64, AppError> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO questions (section, level, content, options, answer, passage_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id
            "#,
        )
        .bind(question.section.as_str())
        .bind(question.level.to_string())
        .bind(question.content)
        .bind(Json(question.options))
        .bind(question.answer)
        .bind(question.passage_id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to insert question: {:?}", e);
            AppError::InternalServerError(e.to_string())
        })?;

        Ok(id)
    }
}

#[async_trait]
impl FeedbackSink for PgStore {
    async fn upsert_feedback(&self, record: &FeedbackRecord) -> Result<(), AppError> {
        let strengths: Vec<&str> = record.strengths.iter().map(|k| k.as_str()).collect();
        let focus_areas: Vec<&str> = record.focus_areas.iter().map(|k| k.as_str()).collect();

        sqlx::query(
            r#"
            INSERT INTO test_feedback (test_id, level_band, summary, strengths, focus_areas, updated_at)
            VALUES ($1, $2, $3, $4, $5, CURRENT_TIMESTAMP)
            ON CONFLICT (test_id) DO UPDATE SET
                level_band = EXCLUDED.level_band,
                summary = EXCLUDED.summary,
                strengths = EXCLUDED.strengths,
                focus_areas = EXCLUDED.focus_areas,
                updated_at = CURRENT_TIMESTAMP
            "#,
        )
        .bind(record.test_id)
        .bind(&record.level_band)
        .bind(&record.summary)
        .bind(Json(strengths))
        .bind(Json(focus_areas))
        .execute(&self.pool)
        .await
        .map_err(|e| {
            tracing::error!("Failed to upsert feedback for test {}: {:?}", record.test_id, e);
            AppError::InternalServerError(e.to_string())
        })?;

        Ok(())
    }
}
