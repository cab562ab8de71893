use crate::dto::test_dto::AnswerSubmit;
use crate::error::{Error, Result};
use crate::models::question::Question;
use crate::models::section::{QUESTIONS_PER_SECTION, TOTAL_SECTIONS};
use crate::models::section_progress::{SectionProgress, SectionStatus};
use sqlx::PgPool;
use std::collections::HashSet;
use uuid::Uuid;

/// Batch validation for the write-once ledger: exact expected count, every
/// answer inside the target scope, no repeats within the batch.
pub fn validate_batch(
    answers: &[AnswerSubmit],
    allowed_questions: &HashSet<Uuid>,
    expected_count: usize,
) -> Result<()> {
    if answers.len() != expected_count {
        return Err(Error::IncompleteSubmission(format!(
            "Must answer all questions. Expected {}, got {}",
            expected_count,
            answers.len()
        )));
    }
    let mut seen: HashSet<Uuid> = HashSet::with_capacity(answers.len());
    for answer in answers {
        if !allowed_questions.contains(&answer.question_id) {
            return Err(Error::InvalidQuestion(format!(
                "Question {} does not belong to this submission",
                answer.question_id
            )));
        }
        if !seen.insert(answer.question_id) {
            return Err(Error::DuplicateSubmission(format!(
                "Question {} answered more than once",
                answer.question_id
            )));
        }
    }
    Ok(())
}

#[derive(Clone)]
pub struct AnswerService {
    pool: PgPool,
}

impl AnswerService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Record a full section's answers and finalize its timer, atomically.
    /// Returns whether a next section exists to move on to.
    pub async fn submit_section(
        &self,
        student_id: Uuid,
        attempt_id: Uuid,
        section_index: i32,
        answers: &[AnswerSubmit],
    ) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        super::ensure_attempt_open(&mut tx, attempt_id, student_id).await?;
        let section = super::section_service::fetch_section(&mut tx, section_index).await?;
        super::section_service::ensure_unlocked(&mut tx, attempt_id, section_index).await?;

        let questions = sqlx::query_as::<_, Question>(
            r#"
            SELECT * FROM questions
            WHERE section_id = $1 AND is_active = TRUE
            ORDER BY order_index
            "#,
        )
        .bind(section.id)
        .fetch_all(&mut *tx)
        .await?;

        if questions.len() as i64 != QUESTIONS_PER_SECTION {
            return Err(Error::Internal(format!(
                "Section must have exactly {} questions. Found {} questions.",
                QUESTIONS_PER_SECTION,
                questions.len()
            )));
        }

        let allowed: HashSet<Uuid> = questions.iter().map(|q| q.id).collect();
        validate_batch(answers, &allowed, QUESTIONS_PER_SECTION as usize)?;

        let progress = sqlx::query_as::<_, SectionProgress>(
            r#"
            SELECT * FROM section_progresses
            WHERE test_attempt_id = $1 AND section_id = $2
            FOR UPDATE
            "#,
        )
        .bind(attempt_id)
        .bind(section.id)
        .fetch_optional(&mut *tx)
        .await?;

        if let Some(p) = &progress {
            if p.status == SectionStatus::Completed {
                return Err(Error::Finalized("Section already submitted".to_string()));
            }
        }

        let existing: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM answers a
            JOIN questions q ON q.id = a.question_id
            WHERE a.test_attempt_id = $1 AND q.section_id = $2
            "#,
        )
        .bind(attempt_id)
        .bind(section.id)
        .fetch_one(&mut *tx)
        .await?;
        if existing > 0 {
            return Err(Error::DuplicateSubmission(
                "Answers already submitted for this section".to_string(),
            ));
        }

        insert_answers(&mut tx, attempt_id, answers).await?;

        // Finalize the section timer the same way pause does, capped at the
        // section limit, and mark the progress COMPLETED.
        let now = crate::utils::time::now();
        match progress {
            Some(mut p) => {
                super::timer::finalize(&mut p, now);
                super::timer::update_progress(&mut tx, &p).await?;
            }
            None => {
                // Submitted without ever starting the timer.
                sqlx::query(
                    r#"
                    INSERT INTO section_progresses
                        (test_attempt_id, section_id, status, total_time_spent)
                    VALUES ($1, $2, 'COMPLETED', 0)
                    "#,
                )
                .bind(attempt_id)
                .bind(section.id)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        tracing::info!(
            attempt_id = %attempt_id,
            section = section_index,
            "section submitted and completed"
        );
        Ok(section_index < TOTAL_SECTIONS)
    }
}

/// Insert one row per answer. The unique index on (test_attempt_id,
/// question_id) backs the ledger's write-once guarantee; a constraint hit is
/// reported as a duplicate submission.
pub(crate) async fn insert_answers(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    attempt_id: Uuid,
    answers: &[AnswerSubmit],
) -> Result<()> {
    for answer in answers {
        sqlx::query(
            r#"
            INSERT INTO answers (test_attempt_id, question_id, answer_text)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(attempt_id)
        .bind(answer.question_id)
        .bind(&answer.selected_option)
        .execute(&mut **tx)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db) = &e {
                if db.is_unique_violation() {
                    return Error::DuplicateSubmission(format!(
                        "Answer already recorded for question {}",
                        answer.question_id
                    ));
                }
            }
            Error::from(e)
        })?;
    }
    Ok(())
}
