use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Number of sections in the assessment.
pub const TOTAL_SECTIONS: i32 = 5;
/// Fixed question count per section.
pub const QUESTIONS_PER_SECTION: i64 = 7;
/// Expected answer count for a full attempt (5 sections x 7 questions).
pub const TOTAL_QUESTIONS: i64 = TOTAL_SECTIONS as i64 * QUESTIONS_PER_SECTION;
/// Hard per-section time cap in seconds (7 minutes).
pub const SECTION_TIME_LIMIT_SECONDS: i32 = 420;

/// Static reference data: one of the five ordered test segments. Seeded once
/// at startup; never mutated by test-taking. The `order_index` (1..5) is the
/// only section identifier exposed in the public contract.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Section {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub order_index: i32,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}
