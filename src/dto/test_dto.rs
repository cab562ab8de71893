use crate::models::question::OptionItem;
use crate::models::test_attempt::AttemptStatus;
use crate::services::interpretation::Roadmap;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Serialize)]
pub struct TestStartResponse {
    pub test_attempt_id: Uuid,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub total_questions: i64,
}

#[derive(Debug, Serialize)]
pub struct QuestionResponse {
    pub question_id: Uuid,
    pub question_text: String,
    pub options: Vec<OptionItem>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AnswerSubmit {
    pub question_id: Uuid,
    #[validate(length(min = 1, max = 100))]
    pub selected_option: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitAnswersRequest {
    pub attempt_id: Uuid,
    #[validate(nested)]
    pub answers: Vec<AnswerSubmit>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct SubmitSectionRequest {
    pub attempt_id: Uuid,
    #[validate(nested)]
    pub answers: Vec<AnswerSubmit>,
}

#[derive(Debug, Serialize)]
pub struct SubmitSectionResponse {
    pub message: String,
    pub section_index: i32,
    pub next_section_available: bool,
}

#[derive(Debug, Serialize)]
pub struct TestResultResponse {
    pub total_questions: i64,
    pub correct_answers: i64,
    pub percentage: f64,
    pub status: AttemptStatus,
}

#[derive(Debug, Serialize)]
pub struct CompleteTestResponse {
    pub message: String,
    pub test_attempt_id: Uuid,
    pub status: AttemptStatus,
}

#[derive(Debug, Deserialize)]
pub struct CompleteTestQuery {
    /// Signals a timer-expiry auto-submission; logged but never bypasses the
    /// answered-question count check.
    #[serde(default)]
    pub auto_submit: bool,
}

#[derive(Debug, Deserialize)]
pub struct AttemptQuery {
    pub attempt_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct SectionsQuery {
    pub attempt_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct TestStatusResponse {
    pub test_attempt_id: Uuid,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub total_questions: i64,
    pub answered_questions: i64,
    pub completed_sections: Vec<i32>,
    pub current_section: Option<i32>,
    pub total_sections: i32,
}

#[derive(Debug, Serialize)]
pub struct SectionMetadata {
    pub order_index: i32,
    pub name: String,
    pub description: Option<String>,
    /// "locked", "available" or "completed".
    pub status: String,
    pub question_count: i64,
    pub time_limit_seconds: i32,
}

#[derive(Debug, Serialize)]
pub struct SectionsOverview {
    pub current_section: i32,
    pub sections: Vec<SectionMetadata>,
    pub can_attempt_test: bool,
    pub completed_test_attempt_id: Option<Uuid>,
}

#[derive(Debug, Serialize)]
pub struct InterpretationResponse {
    pub summary: String,
    pub strengths: Vec<String>,
    pub weaknesses: Vec<String>,
    pub career_clusters: Vec<String>,
    pub risk_level: String,
    pub readiness_status: String,
    pub action_plan: Vec<String>,
    pub overall_percentage: f64,
    pub total_questions: i64,
    pub correct_answers: i64,
    pub is_ai_generated: bool,
    pub readiness_explanation: String,
    pub risk_explanation: String,
    pub career_direction: String,
    pub career_direction_reason: String,
    pub roadmap: Roadmap,
}

#[derive(Debug, Serialize)]
pub struct StudentResultResponse {
    pub test_attempt_id: Uuid,
    pub interpretation_text: String,
    pub strengths: Vec<String>,
    pub areas_for_improvement: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub disclaimer: &'static str,
}
