pub mod analytics_service;
pub mod answer_service;
pub mod attempt_service;
pub mod interpretation;
pub mod interpreter_client;
pub mod note_service;
pub mod scoring_service;
pub mod section_service;
pub mod timer;

use crate::error::{Error, Result};
use crate::models::test_attempt::{AttemptStatus, TestAttempt};
use uuid::Uuid;

/// Fetch an attempt scoped to its owning student. Cross-student ids surface as
/// NotFound rather than leaking another student's attempt.
pub(crate) async fn fetch_attempt_for_student(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    attempt_id: Uuid,
    student_id: Uuid,
) -> Result<TestAttempt> {
    sqlx::query_as::<_, TestAttempt>(
        r#"SELECT * FROM test_attempts WHERE id = $1 AND student_id = $2"#,
    )
    .bind(attempt_id)
    .bind(student_id)
    .fetch_optional(&mut **tx)
    .await?
    .ok_or_else(|| Error::NotFound("Test attempt not found".to_string()))
}

/// Same as [`fetch_attempt_for_student`] but additionally rejects attempts
/// that are no longer mutable.
pub(crate) async fn ensure_attempt_open(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    attempt_id: Uuid,
    student_id: Uuid,
) -> Result<TestAttempt> {
    let attempt = fetch_attempt_for_student(tx, attempt_id, student_id).await?;
    match attempt.status {
        AttemptStatus::InProgress => Ok(attempt),
        AttemptStatus::Completed => Err(Error::Finalized(
            "Test attempt is already completed".to_string(),
        )),
        AttemptStatus::Abandoned => Err(Error::InvalidState(
            "Test attempt has been abandoned".to_string(),
        )),
    }
}
