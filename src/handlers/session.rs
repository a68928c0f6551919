// src/handlers/session.rs

use axum::{Extension, Json, extract::Path, extract::State, response::IntoResponse};
use validator::Validate;

use crate::{
    engine::finalizer,
    error::AppError,
    handlers::owned_test,
    models::{
        section::SectionRow,
        test::{HeartbeatRequest, HeartbeatResponse, SectionSeed, StartResponse, TestStatus},
    },
    state::AppState,
    utils::jwt::Claims,
};

/// Starts (or resumes) a test session. Idempotent.
///
/// Creates any section rows that do not exist yet, seeded from the
/// assignment's per-section seeds with a fallback to the default level
/// for missing or malformed entries. Per-kind creation means a start that
/// failed partway through is repaired by the retry. Moves an assigned
/// test to in_progress and always stamps `last_seen_at`.
pub async fn start(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let mut test = owned_test(&state, &claims, id).await?;

    match test.status {
        TestStatus::Cancelled => {
            return Err(AppError::Conflict("Test is cancelled".to_string()));
        }
        TestStatus::Completed | TestStatus::Reviewed => {
            return Err(AppError::Conflict("Test is already completed".to_string()));
        }
        TestStatus::Assigned | TestStatus::InProgress => {}
    }

    let existing = state.store.get_sections(id).await?;
    let mut sections = Vec::with_capacity(state.adaptive.section_order.len());
    for kind in &state.adaptive.section_order {
        if let Some(row) = existing.iter().find(|s| s.kind == *kind) {
            sections.push(row.clone());
            continue;
        }
        let seed = test
            .seed_start
            .get(kind)
            .and_then(|s| s.parse().ok())
            .unwrap_or(state.adaptive.default_seed);
        let row = SectionRow::seeded(id, *kind, seed);
        state.store.insert_section(&row).await?;
        sections.push(row);
    }

    let now = state.clock.now();
    if test.status == TestStatus::Assigned {
        test.status = TestStatus::InProgress;
        test.started_at = Some(now);
    }
    test.last_seen_at = Some(now);
    state.store.put_test(&test).await?;

    Ok(Json(StartResponse {
        status: test.status,
        time_remaining_seconds: test.time_remaining_seconds(),
        sections: sections
            .iter()
            .map(|s| SectionSeed {
                section: s.kind,
                level: s.level.to_string(),
            })
            .collect(),
    }))
}

/// Records an elapsed-time delta for a running test.
///
/// The stored elapsed time is clamped to the time limit, which makes
/// duplicate or late deliveries harmless at the ceiling. Reaching the
/// limit finalizes the test and reports expiry; heartbeats after
/// completion keep reporting expiry.
pub async fn heartbeat(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
    Json(req): Json<HeartbeatRequest>,
) -> Result<impl IntoResponse, AppError> {
    if let Err(validation_errors) = req.validate() {
        return Err(AppError::BadRequest(validation_errors.to_string()));
    }

    let mut test = owned_test(&state, &claims, id).await?;

    match test.status {
        TestStatus::Assigned => {
            return Err(AppError::Conflict("Test has not been started".to_string()));
        }
        TestStatus::Cancelled => {
            return Err(AppError::Conflict("Test is cancelled".to_string()));
        }
        TestStatus::Completed | TestStatus::Reviewed => {
            return Ok(Json(HeartbeatResponse {
                expired: true,
                time_remaining_seconds: 0,
            }));
        }
        TestStatus::InProgress => {}
    }

    let limit_ms = test.time_limit_ms();
    // Saturate before clamping so an absurd delta cannot wrap negative.
    test.elapsed_ms = test
        .elapsed_ms
        .saturating_add(req.elapsed_ms_delta)
        .min(limit_ms);
    test.last_seen_at = Some(state.clock.now());
    state.store.put_test(&test).await?;

    if test.elapsed_ms >= limit_ms {
        finalizer::finalize_test(
            state.store.as_ref(),
            state.feedback.as_ref(),
            state.clock.as_ref(),
            &test,
            &state.adaptive,
        )
        .await?;
        return Ok(Json(HeartbeatResponse {
            expired: true,
            time_remaining_seconds: 0,
        }));
    }

    Ok(Json(HeartbeatResponse {
        expired: false,
        time_remaining_seconds: test.time_remaining_seconds(),
    }))
}

/// Finalizes a test on explicit request.
///
/// Recomputes from the section rows as currently stored; calling it again
/// on a completed test recomputes rather than erroring.
pub async fn finalize(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, AppError> {
    let test = owned_test(&state, &claims, id).await?;

    match test.status {
        TestStatus::Assigned => {
            return Err(AppError::Conflict("Test has not been started".to_string()));
        }
        TestStatus::Cancelled => {
            return Err(AppError::Conflict("Test is cancelled".to_string()));
        }
        TestStatus::Reviewed => {
            return Err(AppError::Conflict("Test is already reviewed".to_string()));
        }
        TestStatus::InProgress | TestStatus::Completed => {}
    }

    let response = finalizer::finalize_test(
        state.store.as_ref(),
        state.feedback.as_ref(),
        state.clock.as_ref(),
        &test,
        &state.adaptive,
    )
    .await?;

    Ok(Json(response))
}
