// src/handlers/answer.rs

use axum::{Extension, Json, extract::Path, extract::State, response::IntoResponse};

use crate::{
    engine::{adjuster, propagator},
    error::AppError,
    handlers::owned_test,
    models::{
        question::{NextQuestionResponse, SubmitAnswerRequest, SubmitAnswerResponse},
        section::{SectionKind, SectionRow},
        test::TestStatus,
    },
    state::AppState,
    utils::jwt::Claims,
};

async fn section_in_play(
    state: &AppState,
    claims: &Claims,
    test_id: i64,
    section: &str,
) -> Result<(SectionKind, SectionRow), AppError> {
    let kind: SectionKind = section.parse()?;
    let test = owned_test(state, claims, test_id).await?;
    if test.status != TestStatus::InProgress {
        return Err(AppError::Conflict("Test is not in progress".to_string()));
    }
    let row = state
        .store
        .get_section(test_id, kind)
        .await?
        .ok_or_else(|| AppError::NotFound("Section not found; start the test first".to_string()))?;
    Ok((kind, row))
}

/// Serves the next unserved question for a section at its current level.
///
/// Reading questions are drawn from the passage already in play when one
/// exists; the passage follows the served question. A section at its cap
/// reports `exhausted` and serves nothing further.
pub async fn next_question(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((id, section)): Path<(i64, String)>,
) -> Result<impl IntoResponse, AppError> {
    let (kind, mut row) = section_in_play(&state, &claims, id, &section).await?;

    if adjuster::is_exhausted(&row, &state.adaptive) {
        return Ok(Json(NextQuestionResponse {
            exhausted: true,
            question: None,
        }));
    }

    let question = state
        .bank
        .next_question(kind, row.level, &row.served_question_ids, row.current_passage_id)
        .await?;

    let Some(question) = question else {
        // The bank has nothing unserved at this level.
        return Ok(Json(NextQuestionResponse {
            exhausted: false,
            question: None,
        }));
    };

    if kind == SectionKind::Reading
        && question.passage_id.is_some()
        && row.current_passage_id != question.passage_id
    {
        row.current_passage_id = question.passage_id;
        state.store.put_section(&row).await?;
    }

    Ok(Json(NextQuestionResponse {
        exhausted: false,
        question: Some(question.to_public()),
    }))
}

/// Submits an answer to a served question.
///
/// Grades by strict string match against the bank's answer key, runs the
/// streak adjuster, persists the section, and on a level change hands the
/// new level to the propagator. Propagation is best-effort and never fails
/// the submission.
pub async fn submit_answer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path((id, section)): Path<(i64, String)>,
    Json(req): Json<SubmitAnswerRequest>,
) -> Result<impl IntoResponse, AppError> {
    let (kind, mut row) = section_in_play(&state, &claims, id, &section).await?;

    if adjuster::is_exhausted(&row, &state.adaptive) {
        return Err(AppError::Conflict(
            "Section has no questions remaining".to_string(),
        ));
    }

    // Each question counts once; replays must not feed the streaks.
    if row.served_question_ids.contains(&req.question_id) {
        return Err(AppError::Conflict(
            "Question has already been answered".to_string(),
        ));
    }

    let question = state
        .bank
        .get_question(req.question_id)
        .await?
        .ok_or_else(|| AppError::NotFound("Question not found".to_string()))?;
    if question.section != kind {
        return Err(AppError::BadRequest(
            "Question does not belong to this section".to_string(),
        ));
    }

    // Simple strict string matching
    let correct = question.answer == req.answer;

    row.served_question_ids.push(question.id);
    if kind == SectionKind::Reading && question.passage_id.is_some() {
        row.current_passage_id = question.passage_id;
    }

    let level_move = adjuster::record_answer(&mut row, correct, &state.adaptive);
    state.store.put_section(&row).await?;

    if let Some(mv) = level_move {
        propagator::propagate(state.store.as_ref(), id, kind, mv.to, &state.adaptive).await;
    }

    Ok(Json(SubmitAnswerResponse {
        correct,
        level: row.level,
        questions_served: row.questions_served,
        exhausted: adjuster::is_exhausted(&row, &state.adaptive),
    }))
}
