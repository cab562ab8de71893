use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate)]
pub struct NoteCreateRequest {
    pub test_attempt_id: Uuid,
    #[validate(length(min = 1, max = 10000))]
    pub notes: String,
}

#[derive(Debug, Serialize)]
pub struct NoteResponse {
    pub id: Uuid,
    pub counsellor_id: Uuid,
    pub counsellor_name: String,
    pub student_id: Uuid,
    pub test_attempt_id: Uuid,
    pub notes: String,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}
