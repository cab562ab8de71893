use axum::{
    extract::{Path, Query, State},
    response::Json,
    Extension,
};
use uuid::Uuid;
use validator::Validate;

use crate::dto::test_dto::{
    AttemptQuery, CompleteTestQuery, CompleteTestResponse, InterpretationResponse,
    QuestionResponse, SectionsOverview, SectionsQuery, SubmitAnswersRequest,
    SubmitSectionRequest, SubmitSectionResponse, TestResultResponse, TestStartResponse,
    TestStatusResponse,
};
use crate::error::{Error, Result};
use crate::middleware::auth::Claims;
use crate::models::question::Question;
use crate::services::timer::TimerReading;
use crate::AppState;

fn to_question_response(question: Question) -> QuestionResponse {
    let options = question.parsed_options();
    QuestionResponse {
        question_id: question.id,
        question_text: question.question_text,
        options,
    }
}

/// All active questions, without correct answers (student only).
#[axum::debug_handler]
pub async fn get_questions(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<Json<Vec<QuestionResponse>>> {
    let questions = state.section_service.all_active_questions().await?;
    Ok(Json(
        questions.into_iter().map(to_question_response).collect(),
    ))
}

/// Start a new test attempt or return the existing in-progress one.
#[axum::debug_handler]
pub async fn start_test(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
) -> Result<Json<TestStartResponse>> {
    let student_id = claims.user_id()?;
    let response = state.attempt_service.start_attempt(student_id).await?;
    Ok(Json(response))
}

/// Legacy single-shot submission of the whole test.
#[axum::debug_handler]
pub async fn submit_answers(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Json(req): Json<SubmitAnswersRequest>,
) -> Result<Json<TestResultResponse>> {
    req.validate()?;
    let student_id = claims.user_id()?;
    let response = state.attempt_service.submit_whole_test(student_id, &req).await?;
    Ok(Json(response))
}

/// Complete the attempt once every section is done (idempotent).
#[axum::debug_handler]
pub async fn complete_test(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
    Query(query): Query<CompleteTestQuery>,
) -> Result<Json<CompleteTestResponse>> {
    let student_id = claims.user_id()?;
    let response = state
        .attempt_service
        .complete_test(student_id, attempt_id, query.auto_submit)
        .await?;
    Ok(Json(response))
}

#[axum::debug_handler]
pub async fn get_test_status(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
) -> Result<Json<TestStatusResponse>> {
    let student_id = claims.user_id()?;
    let response = state.attempt_service.get_status(student_id, attempt_id).await?;
    Ok(Json(response))
}

/// Interpretation bundle (student: own attempt only; counsellor: any).
#[axum::debug_handler]
pub async fn get_interpretation(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(attempt_id): Path<Uuid>,
) -> Result<Json<InterpretationResponse>> {
    let requester_id = claims.user_id()?;
    let response = state
        .attempt_service
        .get_interpretation(requester_id, claims.user_role(), attempt_id)
        .await?;
    Ok(Json(response))
}

#[axum::debug_handler]
pub async fn get_sections(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Query(query): Query<SectionsQuery>,
) -> Result<Json<SectionsOverview>> {
    let student_id = claims.user_id()?;
    let overview = state
        .section_service
        .sections_overview(student_id, query.attempt_id)
        .await?;
    Ok(Json(overview))
}

#[axum::debug_handler]
pub async fn get_section_questions(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(section_index): Path<i32>,
    Query(query): Query<AttemptQuery>,
) -> Result<Json<Vec<QuestionResponse>>> {
    let student_id = claims.user_id()?;
    let questions = state
        .section_service
        .section_questions(student_id, query.attempt_id, section_index)
        .await?;
    Ok(Json(
        questions.into_iter().map(to_question_response).collect(),
    ))
}

#[axum::debug_handler]
pub async fn start_section(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(section_index): Path<i32>,
    Query(query): Query<AttemptQuery>,
) -> Result<Json<TimerReading>> {
    let student_id = claims.user_id()?;
    let reading = state
        .timer_service
        .start_section(student_id, query.attempt_id, section_index)
        .await?;
    Ok(Json(reading))
}

#[axum::debug_handler]
pub async fn pause_section(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(section_index): Path<i32>,
    Query(query): Query<AttemptQuery>,
) -> Result<Json<TimerReading>> {
    let student_id = claims.user_id()?;
    let reading = state
        .timer_service
        .pause_section(student_id, query.attempt_id, section_index)
        .await?;
    Ok(Json(reading))
}

#[axum::debug_handler]
pub async fn resume_section(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(section_index): Path<i32>,
    Query(query): Query<AttemptQuery>,
) -> Result<Json<TimerReading>> {
    let student_id = claims.user_id()?;
    let reading = state
        .timer_service
        .resume_section(student_id, query.attempt_id, section_index)
        .await?;
    Ok(Json(reading))
}

/// Server-authoritative timer read; applies the expiry transition when due.
#[axum::debug_handler]
pub async fn get_section_timer(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(section_index): Path<i32>,
    Query(query): Query<AttemptQuery>,
) -> Result<Json<TimerReading>> {
    let student_id = claims.user_id()?;
    let reading = state
        .timer_service
        .read_timer(student_id, query.attempt_id, section_index)
        .await?;
    Ok(Json(reading))
}

#[axum::debug_handler]
pub async fn submit_section(
    State(state): State<AppState>,
    Extension(claims): Extension<Claims>,
    Path(section_index): Path<i32>,
    Json(req): Json<SubmitSectionRequest>,
) -> Result<Json<SubmitSectionResponse>> {
    req.validate()?;
    if !(1..=crate::models::section::TOTAL_SECTIONS).contains(&section_index) {
        return Err(Error::NotFound(format!(
            "Section {} not found",
            section_index
        )));
    }
    let student_id = claims.user_id()?;
    let next_section_available = state
        .answer_service
        .submit_section(student_id, req.attempt_id, section_index, &req.answers)
        .await?;
    Ok(Json(SubmitSectionResponse {
        message: "Section submitted successfully".to_string(),
        section_index,
        next_section_available,
    }))
}
