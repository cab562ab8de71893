use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// At most one per attempt. The narrative fields are written once; structured
/// fields (readiness, risk, roadmap) are recomputed deterministically from the
/// stored overall score on every read rather than stored here.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct InterpretedResult {
    pub id: Uuid,
    pub test_attempt_id: Uuid,
    pub interpretation_text: String,
    /// JSON-encoded list of strength statements.
    pub strengths: Option<String>,
    /// JSON-encoded list of improvement areas.
    pub areas_for_improvement: Option<String>,
    pub is_ai_generated: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}
