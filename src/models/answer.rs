use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Write-once answer row; uniqueness on (test_attempt_id, question_id) is
/// enforced both by the ledger checks and a database constraint.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Answer {
    pub id: Uuid,
    pub test_attempt_id: Uuid,
    pub question_id: Uuid,
    pub answer_text: String,
    pub created_at: Option<DateTime<Utc>>,
}
