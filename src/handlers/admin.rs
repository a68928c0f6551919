// src/handlers/admin.rs

use std::collections::HashMap;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    error::AppError,
    models::{
        question::CreateQuestionRequest,
        section::SectionKind,
        test::{TestStatus, TestType},
    },
    state::AppState,
    store::{NewQuestion, NewTest},
};

/// DTO for assigning a test to a student.
#[derive(Debug, Deserialize, Validate)]
pub struct AssignTestRequest {
    pub student_id: i64,
    /// 'entrance' or 'progress'.
    pub test_type: String,
    /// Optional per-section seed levels as dotted strings. Unknown section
    /// keys are rejected; malformed level values are kept and fall back to
    /// the default when sections are created.
    pub seed_start: Option<HashMap<String, String>>,
    #[validate(range(min = 60, max = 14400, message = "time limit must be between 1 minute and 4 hours"))]
    pub time_limit_seconds: i64,
}

/// Assigns a new test.
/// Admin only.
pub async fn assign_test(
    State(state): State<AppState>,
    Json(payload): Json<AssignTestRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let test_type: TestType = payload
        .test_type
        .parse()
        .map_err(AppError::BadRequest)?;

    let mut seed_start = HashMap::new();
    for (key, level) in payload.seed_start.unwrap_or_default() {
        let kind: SectionKind = key.parse()?;
        seed_start.insert(kind, level);
    }

    let test = state
        .store
        .insert_test(NewTest {
            student_id: payload.student_id,
            test_type,
            seed_start,
            time_limit_seconds: payload.time_limit_seconds,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": test.id }))))
}

/// Cancels a test that has not completed.
/// Admin only.
pub async fn cancel_test(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    set_status(&state, id, TestStatus::Cancelled).await
}

/// Marks a completed test as reviewed.
/// Admin only.
pub async fn review_test(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    set_status(&state, id, TestStatus::Reviewed).await
}

async fn set_status(
    state: &AppState,
    id: i64,
    next: TestStatus,
) -> Result<Json<serde_json::Value>, AppError> {
    let mut test = state
        .store
        .get_test(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Test not found".to_string()))?;

    if !test.status.can_transition(next) {
        return Err(AppError::Conflict(format!(
            "Cannot move test from {} to {}",
            test.status, next
        )));
    }

    test.status = next;
    state.store.put_test(&test).await?;

    Ok(Json(serde_json::json!({ "id": id, "status": next.as_str() })))
}

/// Creates a new bank question.
/// Admin only.
pub async fn create_question(
    State(state): State<AppState>,
    Json(payload): Json<CreateQuestionRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = payload.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let section: SectionKind = payload.section.parse()?;
    let level = payload.level.parse()?;

    let id = state
        .bank
        .insert_question(NewQuestion {
            section,
            level,
            content: payload.content,
            options: payload.options,
            answer: payload.answer,
            passage_id: payload.passage_id,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(serde_json::json!({ "id": id }))))
}
