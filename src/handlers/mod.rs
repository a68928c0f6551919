// src/handlers/mod.rs

pub mod admin;
pub mod answer;
pub mod session;

use crate::{error::AppError, models::test::TestRow, state::AppState, utils::jwt::Claims};

/// Loads a test and enforces ownership. A test owned by someone else
/// answers as not-found, uniformly with a missing id, so callers cannot
/// probe which test ids exist. Admin tokens may act on any test.
pub(crate) async fn owned_test(
    state: &AppState,
    claims: &Claims,
    id: i64,
) -> Result<TestRow, AppError> {
    let test = state
        .store
        .get_test(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Test not found".to_string()))?;

    if claims.role != "admin" && claims.student_id() != Some(test.student_id) {
        return Err(AppError::NotFound("Test not found".to_string()));
    }
    Ok(test)
}
