use crate::dto::test_dto::{
    CompleteTestResponse, InterpretationResponse, SubmitAnswersRequest, TestResultResponse,
    TestStartResponse, TestStatusResponse,
};
use crate::error::{Error, Result};
use crate::models::interpreted_result::InterpretedResult;
use crate::models::score::{Score, OVERALL_DIMENSION};
use crate::models::section::{TOTAL_QUESTIONS, TOTAL_SECTIONS};
use crate::models::test_attempt::{AttemptStatus, TestAttempt};
use crate::models::user::UserRole;
use crate::services::interpretation::{self, InterpretationBundle};
use crate::services::interpreter_client::{AiInterpretation, InterpretationContext, InterpreterClient};
use crate::services::{answer_service, scoring_service, section_service};
use sqlx::PgPool;
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;

#[derive(Clone)]
pub struct AttemptService {
    pool: PgPool,
    interpreter: InterpreterClient,
}

impl AttemptService {
    pub fn new(pool: PgPool, interpreter: InterpreterClient) -> Self {
        Self { pool, interpreter }
    }

    /// Start a new attempt or return the existing in-progress one. A student
    /// gets exactly one completed attempt in their lifetime.
    pub async fn start_attempt(&self, student_id: Uuid) -> Result<TestStartResponse> {
        let mut tx = self.pool.begin().await?;

        let has_profile: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM students WHERE user_id = $1"#,
        )
        .bind(student_id)
        .fetch_one(&mut *tx)
        .await?;
        if has_profile == 0 {
            return Err(Error::BadRequest(
                "Student profile not found. Please complete your registration.".to_string(),
            ));
        }

        let completed: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM test_attempts WHERE student_id = $1 AND status = 'COMPLETED'"#,
        )
        .bind(student_id)
        .fetch_one(&mut *tx)
        .await?;
        if completed > 0 {
            return Err(Error::Finalized(
                "You have already completed the test. Each student can attempt the test only once."
                    .to_string(),
            ));
        }

        let existing = sqlx::query_as::<_, TestAttempt>(
            r#"SELECT * FROM test_attempts WHERE student_id = $1 AND status = 'IN_PROGRESS'"#,
        )
        .bind(student_id)
        .fetch_optional(&mut *tx)
        .await?;

        let attempt = match existing {
            Some(attempt) => attempt,
            None => {
                sqlx::query_as::<_, TestAttempt>(
                    r#"
                    INSERT INTO test_attempts (student_id, status)
                    VALUES ($1, 'IN_PROGRESS')
                    RETURNING *
                    "#,
                )
                .bind(student_id)
                .fetch_one(&mut *tx)
                .await?
            }
        };

        let total_questions: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM questions WHERE is_active = TRUE"#,
        )
        .fetch_one(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(TestStartResponse {
            test_attempt_id: attempt.id,
            status: attempt.status,
            started_at: attempt.started_at,
            total_questions,
        })
    }

    pub async fn get_status(&self, student_id: Uuid, attempt_id: Uuid) -> Result<TestStatusResponse> {
        let mut tx = self.pool.begin().await?;
        let attempt = super::fetch_attempt_for_student(&mut tx, attempt_id, student_id).await?;

        let total_questions: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM questions WHERE is_active = TRUE"#,
        )
        .fetch_one(&mut *tx)
        .await?;
        let answered_questions: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM answers WHERE test_attempt_id = $1"#,
        )
        .bind(attempt_id)
        .fetch_one(&mut *tx)
        .await?;
        let completed = section_service::completed_indexes(&mut tx, attempt_id).await?;
        tx.commit().await?;

        let completed_sections: Vec<i32> = completed.iter().copied().collect();
        let current_section =
            (1..=TOTAL_SECTIONS).find(|idx| !completed.contains(idx));

        Ok(TestStatusResponse {
            test_attempt_id: attempt.id,
            status: attempt.status,
            started_at: attempt.started_at,
            completed_at: attempt.completed_at,
            total_questions,
            answered_questions,
            completed_sections,
            current_section,
            total_sections: TOTAL_SECTIONS,
        })
    }

    /// Complete the attempt once all sections are done and all expected
    /// answers are in. Idempotent: a second call on a completed attempt
    /// returns success without side effects. Scoring runs inside the
    /// completion transaction, so a scoring failure leaves the attempt
    /// IN_PROGRESS and the call safe to retry.
    pub async fn complete_test(
        &self,
        student_id: Uuid,
        attempt_id: Uuid,
        auto_submit: bool,
    ) -> Result<CompleteTestResponse> {
        let mut tx = self.pool.begin().await?;
        let attempt = sqlx::query_as::<_, TestAttempt>(
            r#"SELECT * FROM test_attempts WHERE id = $1 AND student_id = $2 FOR UPDATE"#,
        )
        .bind(attempt_id)
        .bind(student_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound("Test attempt not found".to_string()))?;

        tracing::info!(
            attempt_id = %attempt_id,
            status = attempt.status.as_str(),
            auto_submit,
            "complete test requested"
        );

        if attempt.status == AttemptStatus::Completed {
            tx.commit().await?;
            return Ok(CompleteTestResponse {
                message: "Test already completed".to_string(),
                test_attempt_id: attempt_id,
                status: AttemptStatus::Completed,
            });
        }
        if attempt.status != AttemptStatus::InProgress {
            return Err(Error::InvalidState(format!(
                "Test attempt is not in progress (current status: {})",
                attempt.status.as_str()
            )));
        }

        // Every active section must be completed (skipped only if there are
        // zero active sections).
        let active_sections = sqlx::query_as::<_, (i32, String)>(
            r#"SELECT order_index, name FROM sections WHERE is_active = TRUE ORDER BY order_index"#,
        )
        .fetch_all(&mut *tx)
        .await?;
        if !active_sections.is_empty() {
            let completed = section_service::completed_indexes(&mut tx, attempt_id).await?;
            let missing: Vec<String> = active_sections
                .iter()
                .filter(|(idx, _)| !completed.contains(idx))
                .map(|(idx, name)| format!("Section {} ({})", idx, name))
                .collect();
            if !missing.is_empty() {
                return Err(Error::InvalidState(format!(
                    "Please complete all sections. {}/{} sections completed. Missing: {}",
                    active_sections.len() - missing.len(),
                    active_sections.len(),
                    missing.join(", ")
                )));
            }
        }

        // The fixed expected total (5 x 7), deliberately not the database
        // question count; auto_submit signals intent but bypasses nothing.
        let answered: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM answers WHERE test_attempt_id = $1"#,
        )
        .bind(attempt_id)
        .fetch_one(&mut *tx)
        .await?;
        if answered < TOTAL_QUESTIONS {
            return Err(Error::IncompleteSubmission(format!(
                "Please answer all questions. {}/{} answered",
                answered, TOTAL_QUESTIONS
            )));
        }

        scoring_service::store_scores(&mut tx, attempt_id)
            .await
            .map_err(|e| {
                tracing::error!(attempt_id = %attempt_id, error = ?e, "scoring failed during completion");
                Error::DependencyFailure("Failed to calculate scores".to_string())
            })?;

        sqlx::query(
            r#"
            UPDATE test_attempts
            SET status = 'COMPLETED', completed_at = $1, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(crate::utils::time::now())
        .bind(attempt_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        tracing::info!(attempt_id = %attempt_id, "test attempt completed");

        // Best effort: interpretation failure never rolls back completion; it
        // is retried on the next interpretation read.
        if let Err(e) = self.prepare_interpretation(attempt_id).await {
            tracing::warn!(attempt_id = %attempt_id, error = ?e, "interpretation generation failed after completion");
        }

        Ok(CompleteTestResponse {
            message: "Test completed successfully".to_string(),
            test_attempt_id: attempt_id,
            status: AttemptStatus::Completed,
        })
    }

    /// Legacy single-shot path: all active questions answered at once, graded
    /// against stored correct answers. Subordinate to the section-wise flow,
    /// which is the canonical scoring pipeline.
    pub async fn submit_whole_test(
        &self,
        student_id: Uuid,
        req: &SubmitAnswersRequest,
    ) -> Result<TestResultResponse> {
        tracing::warn!(
            attempt_id = %req.attempt_id,
            "deprecated whole-test submission path used; section-wise flow is canonical"
        );

        let mut tx = self.pool.begin().await?;
        let attempt = sqlx::query_as::<_, TestAttempt>(
            r#"SELECT * FROM test_attempts WHERE id = $1 AND student_id = $2 FOR UPDATE"#,
        )
        .bind(req.attempt_id)
        .bind(student_id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::NotFound("Test attempt not found".to_string()))?;

        if attempt.status != AttemptStatus::InProgress {
            return Err(Error::InvalidState(
                "Test attempt is not in progress".to_string(),
            ));
        }

        let questions = sqlx::query_as::<_, (Uuid, Option<String>)>(
            r#"SELECT id, correct_answer FROM questions WHERE is_active = TRUE"#,
        )
        .fetch_all(&mut *tx)
        .await?;
        let total_questions = questions.len() as i64;

        let allowed: HashSet<Uuid> = questions.iter().map(|(id, _)| *id).collect();
        answer_service::validate_batch(&req.answers, &allowed, questions.len())?;

        let existing: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM answers WHERE test_attempt_id = $1"#,
        )
        .bind(req.attempt_id)
        .fetch_one(&mut *tx)
        .await?;
        if existing > 0 {
            return Err(Error::DuplicateSubmission(
                "Answers already submitted for this attempt".to_string(),
            ));
        }

        answer_service::insert_answers(&mut tx, req.attempt_id, &req.answers).await?;

        let correct_by_id: BTreeMap<Uuid, String> = questions
            .into_iter()
            .filter_map(|(id, correct)| correct.map(|c| (id, c)))
            .collect();
        let correct_answers = req
            .answers
            .iter()
            .filter(|a| {
                correct_by_id
                    .get(&a.question_id)
                    .map(|c| c.eq_ignore_ascii_case(a.selected_option.trim()))
                    .unwrap_or(false)
            })
            .count() as i64;

        let percentage = if total_questions > 0 {
            correct_answers as f64 / total_questions as f64 * 100.0
        } else {
            0.0
        };

        sqlx::query(r#"DELETE FROM scores WHERE test_attempt_id = $1"#)
            .bind(req.attempt_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query(
            r#"INSERT INTO scores (test_attempt_id, dimension, score_value) VALUES ($1, $2, $3)"#,
        )
        .bind(req.attempt_id)
        .bind(OVERALL_DIMENSION)
        .bind(percentage)
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r#"
            UPDATE test_attempts
            SET status = 'COMPLETED', completed_at = $1, updated_at = NOW()
            WHERE id = $2
            "#,
        )
        .bind(crate::utils::time::now())
        .bind(req.attempt_id)
        .execute(&mut *tx)
        .await?;
        tx.commit().await?;

        Ok(TestResultResponse {
            total_questions,
            correct_answers,
            percentage: round2(percentage),
            status: AttemptStatus::Completed,
        })
    }

    /// Interpretation bundle for a completed attempt. Students see only their
    /// own attempt; counsellors may read any. The stored narrative is reused
    /// and structured fields are backfilled deterministically from the stored
    /// percentage; the AI is called at most once per attempt.
    pub async fn get_interpretation(
        &self,
        requester_id: Uuid,
        requester_role: UserRole,
        attempt_id: Uuid,
    ) -> Result<InterpretationResponse> {
        let attempt = sqlx::query_as::<_, TestAttempt>(
            r#"SELECT * FROM test_attempts WHERE id = $1"#,
        )
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| Error::NotFound("Test attempt not found".to_string()))?;

        if requester_role == UserRole::Student && attempt.student_id != requester_id {
            return Err(Error::Forbidden("Access denied".to_string()));
        }
        if attempt.status != AttemptStatus::Completed {
            return Err(Error::InvalidState(
                "Test must be completed before interpretation".to_string(),
            ));
        }

        let answered: i64 = sqlx::query_scalar(
            r#"SELECT COUNT(*) FROM answers WHERE test_attempt_id = $1"#,
        )
        .bind(attempt_id)
        .fetch_one(&self.pool)
        .await?;
        if answered < TOTAL_QUESTIONS {
            return Err(Error::IncompleteSubmission(format!(
                "Cannot generate interpretation: {}/{} questions answered",
                answered, TOTAL_QUESTIONS
            )));
        }

        let inputs = self.interpretation_inputs(attempt_id).await?;
        let (record, bundle) = self.ensure_interpretation(attempt_id, &inputs).await?;

        Ok(InterpretationResponse {
            summary: bundle.summary,
            strengths: bundle.strengths,
            weaknesses: bundle.weaknesses,
            career_clusters: bundle.career_clusters,
            risk_level: bundle.risk_level,
            readiness_status: bundle.readiness_status,
            action_plan: bundle.action_plan,
            overall_percentage: round2(inputs.percentage),
            total_questions: TOTAL_QUESTIONS,
            correct_answers: inputs.correct_answers,
            is_ai_generated: record.is_ai_generated,
            readiness_explanation: bundle.readiness_explanation,
            risk_explanation: bundle.risk_explanation,
            career_direction: bundle.career_direction,
            career_direction_reason: bundle.career_direction_reason,
            roadmap: bundle.roadmap,
        })
    }

    /// Fire-and-forget interpretation generation right after completion.
    async fn prepare_interpretation(&self, attempt_id: Uuid) -> Result<()> {
        let inputs = self.interpretation_inputs(attempt_id).await?;
        self.ensure_interpretation(attempt_id, &inputs).await?;
        Ok(())
    }

    /// The stored overall score is the single source of truth for the
    /// percentage; it is clamped if somehow out of range but never
    /// recalculated here.
    async fn interpretation_inputs(&self, attempt_id: Uuid) -> Result<InterpretationInputs> {
        let mut overall = self.fetch_overall_score(attempt_id).await?;
        if overall.is_none() {
            tracing::warn!(attempt_id = %attempt_id, "overall score missing, recomputing");
            scoring_service::ScoringService::new(self.pool.clone())
                .compute_and_store(attempt_id)
                .await?;
            overall = self.fetch_overall_score(attempt_id).await?;
        }
        let overall = overall.ok_or_else(|| {
            Error::InterpretationUnavailable(
                "Scores are not available for this attempt".to_string(),
            )
        })?;

        let mut percentage = overall.score_value;
        if !(0.0..=100.0).contains(&percentage) {
            tracing::warn!(
                attempt_id = %attempt_id,
                percentage,
                "stored percentage out of range, clamping"
            );
            percentage = percentage.clamp(0.0, 100.0);
        }

        let scores = sqlx::query_as::<_, Score>(
            r#"SELECT * FROM scores WHERE test_attempt_id = $1"#,
        )
        .bind(attempt_id)
        .fetch_all(&self.pool)
        .await?;

        let mut section_scores: BTreeMap<i32, f64> = BTreeMap::new();
        let mut category_scores: BTreeMap<String, f64> = BTreeMap::new();
        for score in &scores {
            category_scores.insert(score.dimension.clone(), score.score_value);
            if let Some(index) = score
                .dimension
                .strip_prefix("section_")
                .and_then(|s| s.parse::<i32>().ok())
            {
                section_scores.insert(index, score.score_value);
            }
        }

        // Display-only derivation; never stored.
        let correct_answers = ((percentage / 100.0) * TOTAL_QUESTIONS as f64) as i64;

        Ok(InterpretationInputs {
            percentage,
            correct_answers,
            section_scores,
            category_scores,
        })
    }

    async fn fetch_overall_score(&self, attempt_id: Uuid) -> Result<Option<Score>> {
        let score = sqlx::query_as::<_, Score>(
            r#"SELECT * FROM scores WHERE test_attempt_id = $1 AND dimension = $2"#,
        )
        .bind(attempt_id)
        .bind(OVERALL_DIMENSION)
        .fetch_optional(&self.pool)
        .await?;
        Ok(score)
    }

    /// Load or create the interpreted result. Creation tries the AI exactly
    /// once and substitutes the rule-based bundle on any failure, with no
    /// retry; both paths produce the same response shape.
    async fn ensure_interpretation(
        &self,
        attempt_id: Uuid,
        inputs: &InterpretationInputs,
    ) -> Result<(InterpretedResult, InterpretationBundle)> {
        let existing = sqlx::query_as::<_, InterpretedResult>(
            r#"SELECT * FROM interpreted_results WHERE test_attempt_id = $1"#,
        )
        .bind(attempt_id)
        .fetch_optional(&self.pool)
        .await?;

        if let Some(record) = existing {
            let mut bundle =
                interpretation::fallback_bundle(inputs.percentage, &inputs.section_scores);
            if !record.interpretation_text.trim().is_empty() {
                bundle.summary = record.interpretation_text.clone();
            }
            bundle.strengths = parse_string_list(record.strengths.as_deref());
            bundle.weaknesses = parse_string_list(record.areas_for_improvement.as_deref());
            return Ok((record, bundle));
        }

        let (band, _) = interpretation::readiness(inputs.percentage);
        let (bundle, is_ai_generated) = if self.interpreter.is_configured() {
            let context = InterpretationContext {
                total_questions: TOTAL_QUESTIONS,
                correct_answers: inputs.correct_answers,
                percentage: inputs.percentage,
                readiness_band: band.as_str().to_string(),
                category_scores: Some(inputs.category_scores.clone()),
            };
            match self.interpreter.generate(&context).await {
                Ok(ai) => (
                    bundle_from_ai(ai, inputs.percentage, &inputs.section_scores),
                    true,
                ),
                Err(e) => {
                    tracing::warn!(attempt_id = %attempt_id, error = ?e, "AI interpretation failed, using rule-based fallback");
                    (
                        interpretation::fallback_bundle(
                            inputs.percentage,
                            &inputs.section_scores,
                        ),
                        false,
                    )
                }
            }
        } else {
            tracing::info!(attempt_id = %attempt_id, "AI interpreter not configured, using rule-based interpretation");
            (
                interpretation::fallback_bundle(inputs.percentage, &inputs.section_scores),
                false,
            )
        };

        let record = sqlx::query_as::<_, InterpretedResult>(
            r#"
            INSERT INTO interpreted_results
                (test_attempt_id, interpretation_text, strengths, areas_for_improvement, is_ai_generated)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (test_attempt_id) DO UPDATE
            SET interpretation_text = EXCLUDED.interpretation_text,
                strengths = EXCLUDED.strengths,
                areas_for_improvement = EXCLUDED.areas_for_improvement,
                is_ai_generated = EXCLUDED.is_ai_generated,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(attempt_id)
        .bind(&bundle.summary)
        .bind(serde_json::to_string(&bundle.strengths)?)
        .bind(serde_json::to_string(&bundle.weaknesses)?)
        .bind(is_ai_generated)
        .fetch_one(&self.pool)
        .await?;

        Ok((record, bundle))
    }
}

struct InterpretationInputs {
    percentage: f64,
    correct_answers: i64,
    section_scores: BTreeMap<i32, f64>,
    category_scores: BTreeMap<String, f64>,
}

/// AI output supplies the seven contract fields; the explanatory fields and
/// roadmap are always derived deterministically from the stored percentage.
fn bundle_from_ai(
    ai: AiInterpretation,
    percentage: f64,
    section_scores: &BTreeMap<i32, f64>,
) -> InterpretationBundle {
    let (band, readiness_explanation) = interpretation::readiness(percentage);
    let (_, risk_explanation) = interpretation::risk(band);
    let (career_direction, career_direction_reason) =
        interpretation::career_direction(section_scores, percentage);
    let roadmap = interpretation::action_roadmap(band, percentage);

    InterpretationBundle {
        summary: ai.summary,
        strengths: ai.strengths,
        weaknesses: ai.weaknesses,
        career_clusters: ai.career_clusters,
        risk_level: ai.risk_level,
        readiness_status: ai.readiness_status,
        action_plan: ai.action_plan,
        readiness_explanation: readiness_explanation.to_string(),
        risk_explanation: risk_explanation.to_string(),
        career_direction,
        career_direction_reason,
        roadmap,
    }
}

fn parse_string_list(raw: Option<&str>) -> Vec<String> {
    raw.and_then(|s| serde_json::from_str(s).ok())
        .unwrap_or_default()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ai_bundle_keeps_ai_fields_and_derives_the_rest() {
        let ai = AiInterpretation {
            summary: "AI summary".to_string(),
            strengths: vec!["s1".to_string()],
            weaknesses: vec!["w1".to_string()],
            career_clusters: vec!["Technology".to_string()],
            risk_level: "LOW".to_string(),
            readiness_status: "READY".to_string(),
            action_plan: vec!["step".to_string()],
        };
        let scores: BTreeMap<i32, f64> = [(1, 4.5), (2, 4.0)].into_iter().collect();
        let bundle = bundle_from_ai(ai, 72.0, &scores);

        assert_eq!(bundle.summary, "AI summary");
        assert_eq!(bundle.risk_level, "LOW");
        // deterministic fields come from the rules, not the AI
        assert_eq!(bundle.career_direction, "Technology / Engineering");
        assert!(!bundle.readiness_explanation.is_empty());
        assert_eq!(bundle.roadmap.phase1.duration, "0-3 Months");
    }

    #[test]
    fn string_lists_round_trip_through_storage_encoding() {
        let stored = serde_json::to_string(&vec!["a", "b"]).unwrap();
        assert_eq!(parse_string_list(Some(&stored)), vec!["a", "b"]);
        assert!(parse_string_list(None).is_empty());
        assert!(parse_string_list(Some("not json")).is_empty());
    }

    #[test]
    fn rounding_for_display() {
        assert_eq!(round2(54.28571), 54.29);
        assert_eq!(round2(50.0), 50.0);
    }
}
