use crate::error::{Error, Result};
use crate::models::question::QuestionType;
use crate::models::score::OVERALL_DIMENSION;
use sqlx::PgPool;
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// What the scoring pass needs to know about a question.
#[derive(Debug, Clone)]
pub struct QuestionScoringInfo {
    pub question_type: QuestionType,
    pub category: Option<String>,
    pub section_index: Option<i32>,
}

#[derive(Debug, Clone, PartialEq, serde::Serialize)]
pub struct DimensionScore {
    pub dimension: String,
    pub score_value: f64,
    pub count: usize,
}

/// Numeric value of one answer. Likert and multiple-choice letters A-E map to
/// 1-5; an unparseable Likert answer defaults to the neutral 3, an
/// unparseable multiple-choice answer to 0, and TEXT questions contribute 0.
pub fn answer_value(question_type: QuestionType, answer_text: &str) -> f64 {
    let letter_value = likert_value(answer_text);
    match question_type {
        QuestionType::LikertScale => letter_value.unwrap_or(3.0),
        QuestionType::MultipleChoice => letter_value
            .or_else(|| answer_text.trim().parse::<f64>().ok())
            .unwrap_or(0.0),
        QuestionType::Text => 0.0,
    }
}

fn likert_value(answer_text: &str) -> Option<f64> {
    match answer_text.trim().to_ascii_uppercase().as_str() {
        "A" => Some(1.0),
        "B" => Some(2.0),
        "C" => Some(3.0),
        "D" => Some(4.0),
        "E" => Some(5.0),
        _ => None,
    }
}

/// Scoring bucket for a question: its section dimension when it belongs to a
/// section, otherwise its free-form category, otherwise "general".
pub fn dimension_of(info: &QuestionScoringInfo) -> String {
    if let Some(index) = info.section_index {
        return format!("section_{}", index);
    }
    info.category
        .as_deref()
        .filter(|c| !c.trim().is_empty())
        .map(|c| c.to_string())
        .unwrap_or_else(|| "general".to_string())
}

/// Deterministic, pure scoring pass: per-dimension means of the mapped 1-5
/// values, plus the canonical `overall` row rescaling the grand mean to a
/// 0-100 percentage. Answers referencing unknown questions are skipped.
pub fn compute_scores(
    answers: &[(Uuid, String)],
    questions: &HashMap<Uuid, QuestionScoringInfo>,
) -> Vec<DimensionScore> {
    let mut buckets: BTreeMap<String, Vec<f64>> = BTreeMap::new();
    let mut all_values: Vec<f64> = Vec::new();

    for (question_id, answer_text) in answers {
        let Some(info) = questions.get(question_id) else {
            tracing::warn!(question_id = %question_id, "answer references unknown question, skipping");
            continue;
        };
        let value = answer_value(info.question_type, answer_text);
        buckets.entry(dimension_of(info)).or_default().push(value);
        all_values.push(value);
    }

    let mut scores: Vec<DimensionScore> = buckets
        .into_iter()
        .map(|(dimension, values)| DimensionScore {
            score_value: values.iter().sum::<f64>() / values.len() as f64,
            count: values.len(),
            dimension,
        })
        .collect();

    if !all_values.is_empty() {
        let grand_mean = all_values.iter().sum::<f64>() / all_values.len() as f64;
        // The single formula for "percentage" used everywhere downstream:
        // the 1-5 mean rescaled onto 0-100 and clamped.
        let overall = (((grand_mean - 1.0) / 4.0) * 100.0).clamp(0.0, 100.0);
        scores.push(DimensionScore {
            dimension: OVERALL_DIMENSION.to_string(),
            score_value: overall,
            count: all_values.len(),
        });
    }

    scores
}

#[derive(Clone)]
pub struct ScoringService {
    pool: PgPool,
}

impl ScoringService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Recompute and persist scores for an attempt in one transaction.
    pub async fn compute_and_store(&self, attempt_id: Uuid) -> Result<Vec<DimensionScore>> {
        let mut tx = self.pool.begin().await?;
        let scores = store_scores(&mut tx, attempt_id).await?;
        tx.commit().await?;
        Ok(scores)
    }
}

/// Delete-then-insert score recompute, usable inside a caller's transaction
/// (completion runs it inside the completion transaction so a scoring failure
/// aborts completion entirely). No answers means no-op: nothing deleted,
/// nothing inserted.
pub(crate) async fn store_scores(
    tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
    attempt_id: Uuid,
) -> Result<Vec<DimensionScore>> {
    let exists = sqlx::query_scalar::<_, i64>(
        r#"SELECT COUNT(*) FROM test_attempts WHERE id = $1"#,
    )
    .bind(attempt_id)
    .fetch_one(&mut **tx)
    .await?;
    if exists == 0 {
        return Err(Error::NotFound("Test attempt not found".to_string()));
    }

    let answers = sqlx::query_as::<_, (Uuid, String)>(
        r#"SELECT question_id, answer_text FROM answers WHERE test_attempt_id = $1"#,
    )
    .bind(attempt_id)
    .fetch_all(&mut **tx)
    .await?;

    if answers.is_empty() {
        return Ok(Vec::new());
    }

    let question_rows = sqlx::query_as::<_, (Uuid, QuestionType, Option<String>, Option<i32>)>(
        r#"
        SELECT q.id, q.question_type, q.category, s.order_index
        FROM questions q
        LEFT JOIN sections s ON s.id = q.section_id
        "#,
    )
    .fetch_all(&mut **tx)
    .await?;

    let questions: HashMap<Uuid, QuestionScoringInfo> = question_rows
        .into_iter()
        .map(|(id, question_type, category, section_index)| {
            (
                id,
                QuestionScoringInfo {
                    question_type,
                    category,
                    section_index,
                },
            )
        })
        .collect();

    let scores = compute_scores(&answers, &questions);

    // Never update in place: stale dimensions must not survive a recompute.
    sqlx::query(r#"DELETE FROM scores WHERE test_attempt_id = $1"#)
        .bind(attempt_id)
        .execute(&mut **tx)
        .await?;

    for score in &scores {
        sqlx::query(
            r#"
            INSERT INTO scores (test_attempt_id, dimension, score_value)
            VALUES ($1, $2, $3)
            "#,
        )
        .bind(attempt_id)
        .bind(&score.dimension)
        .bind(score.score_value)
        .execute(&mut **tx)
        .await?;
    }

    Ok(scores)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn likert_info(section_index: i32) -> QuestionScoringInfo {
        QuestionScoringInfo {
            question_type: QuestionType::LikertScale,
            category: None,
            section_index: Some(section_index),
        }
    }

    fn answers_for(keys: &[&str], section_index: i32) -> (Vec<(Uuid, String)>, HashMap<Uuid, QuestionScoringInfo>) {
        let mut answers = Vec::new();
        let mut questions = HashMap::new();
        for key in keys {
            let id = Uuid::new_v4();
            questions.insert(id, likert_info(section_index));
            answers.push((id, key.to_string()));
        }
        (answers, questions)
    }

    #[test]
    fn section_dimension_mean_of_mapped_values() {
        // A,C,E,B,D,C,A -> 1,3,5,2,4,3,1 -> 19/7
        let (answers, questions) = answers_for(&["A", "C", "E", "B", "D", "C", "A"], 1);
        let scores = compute_scores(&answers, &questions);

        let section = scores.iter().find(|s| s.dimension == "section_1").unwrap();
        assert!((section.score_value - 19.0 / 7.0).abs() < 1e-9);
        assert_eq!(section.count, 7);
    }

    #[test]
    fn overall_rescales_one_to_five_mean_onto_percentage() {
        // all C -> mean 3.0 -> ((3-1)/4)*100 = 50.0
        let (answers, questions) = answers_for(&["C"; 35], 1);
        let scores = compute_scores(&answers, &questions);
        let overall = scores.iter().find(|s| s.dimension == "overall").unwrap();
        assert_eq!(overall.score_value, 50.0);
        assert_eq!(overall.count, 35);
    }

    #[test]
    fn overall_is_clamped() {
        let (answers, questions) = answers_for(&["E"; 5], 1);
        let scores = compute_scores(&answers, &questions);
        let overall = scores.iter().find(|s| s.dimension == "overall").unwrap();
        assert_eq!(overall.score_value, 100.0);

        let (answers, questions) = answers_for(&["A"; 5], 1);
        let scores = compute_scores(&answers, &questions);
        let overall = scores.iter().find(|s| s.dimension == "overall").unwrap();
        assert_eq!(overall.score_value, 0.0);
    }

    #[test]
    fn invalid_likert_defaults_to_neutral() {
        assert_eq!(answer_value(QuestionType::LikertScale, "Z"), 3.0);
        assert_eq!(answer_value(QuestionType::LikertScale, ""), 3.0);
        assert_eq!(answer_value(QuestionType::LikertScale, " e "), 5.0);
    }

    #[test]
    fn invalid_multiple_choice_defaults_to_zero() {
        assert_eq!(answer_value(QuestionType::MultipleChoice, "Z"), 0.0);
        assert_eq!(answer_value(QuestionType::MultipleChoice, "4"), 4.0);
        assert_eq!(answer_value(QuestionType::MultipleChoice, "b"), 2.0);
    }

    #[test]
    fn text_questions_contribute_zero() {
        assert_eq!(answer_value(QuestionType::Text, "an essay"), 0.0);
    }

    #[test]
    fn no_answers_yield_no_scores() {
        assert!(compute_scores(&[], &HashMap::new()).is_empty());
    }

    #[test]
    fn category_and_general_dimensions() {
        let with_category = Uuid::new_v4();
        let without = Uuid::new_v4();
        let mut questions = HashMap::new();
        questions.insert(
            with_category,
            QuestionScoringInfo {
                question_type: QuestionType::LikertScale,
                category: Some("persistence".to_string()),
                section_index: None,
            },
        );
        questions.insert(
            without,
            QuestionScoringInfo {
                question_type: QuestionType::LikertScale,
                category: None,
                section_index: None,
            },
        );
        let answers = vec![
            (with_category, "D".to_string()),
            (without, "B".to_string()),
        ];
        let scores = compute_scores(&answers, &questions);
        assert!(scores.iter().any(|s| s.dimension == "persistence"));
        assert!(scores.iter().any(|s| s.dimension == "general"));
    }

    #[test]
    fn unknown_question_answers_are_skipped() {
        let known = Uuid::new_v4();
        let mut questions = HashMap::new();
        questions.insert(known, likert_info(2));
        let answers = vec![
            (known, "C".to_string()),
            (Uuid::new_v4(), "E".to_string()),
        ];
        let scores = compute_scores(&answers, &questions);
        let overall = scores.iter().find(|s| s.dimension == "overall").unwrap();
        assert_eq!(overall.count, 1);
        assert_eq!(overall.score_value, 50.0);
    }
}
