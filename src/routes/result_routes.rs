use axum::{
    extract::{Path, State},
    response::Json,
    Extension,
};
use uuid::Uuid;

use crate::dto::test_dto::StudentResultResponse;
use crate::error::{Error, Result};
use crate::middleware::auth::Claims;
use crate::models::interpreted_result::InterpretedResult;
use crate::models::test_attempt::TestAttempt;
use crate::AppState;

const DISCLAIMER_TEXT: &str = "This assessment is designed to provide general career guidance and insights. Results are based on your responses and are intended for informational purposes only. They should not be considered as definitive career decisions or professional diagnoses. We recommend consulting with a qualified career counsellor to discuss your results in detail and explore your options further. Individual results may vary, and career success depends on many factors beyond assessment scores.";

fn to_result_response(result: InterpretedResult) -> StudentResultResponse {
    let parse = |raw: Option<&str>| -> Vec<String> {
        raw.and_then(|s| serde_json::from_str(s).ok())
            .unwrap_or_default()
    };
    StudentResultResponse {
        test_attempt_id: result.test_attempt_id,
        strengths: parse(result.strengths.as_deref()),
        areas_for_improvement: parse(result.areas_for_improvement.as_deref()),
        interpretation_text: result.interpretation_text,
        created_at: result.created_at,
        disclaimer: DISCLAIMER_TEXT,
    }
}

/// Interpreted result for one of the student's attempts; raw scores are never
/// exposed here.
#[axum::debug_handler]
pub async fn get_result(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
) -> Result<Json<StudentResultResponse>> {
    let student_id = claims.user_id()?;

    let attempt = sqlx::query_as::<_, TestAttempt>(
        r#"SELECT * FROM test_attempts WHERE id = $1 AND student_id = $2"#,
    )
    .bind(attempt_id)
    .bind(student_id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| Error::NotFound("Test attempt not found".to_string()))?;

    let result = sqlx::query_as::<_, InterpretedResult>(
        r#"SELECT * FROM interpreted_results WHERE test_attempt_id = $1"#,
    )
    .bind(attempt.id)
    .fetch_optional(&state.pool)
    .await?
    .ok_or_else(|| {
        Error::NotFound("Results are not yet available. Please check back later.".to_string())
    })?;

    Ok(Json(to_result_response(result)))
}

/// All available results for the current student.
#[axum::debug_handler]
pub async fn list_results(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<Vec<StudentResultResponse>>> {
    let student_id = claims.user_id()?;

    let results = sqlx::query_as::<_, InterpretedResult>(
        r#"
        SELECT ir.*
        FROM interpreted_results ir
        JOIN test_attempts ta ON ta.id = ir.test_attempt_id
        WHERE ta.student_id = $1 AND ta.status = 'COMPLETED'
        ORDER BY ir.created_at DESC
        "#,
    )
    .bind(student_id)
    .fetch_all(&state.pool)
    .await?;

    Ok(Json(results.into_iter().map(to_result_response).collect()))
}
