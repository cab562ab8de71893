use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SectionStatus {
    NotStarted,
    InProgress,
    Completed,
}

/// Per-(attempt, section) timer and completion state. Invariant:
/// `section_start_time` and `paused_at` are never both set; `total_time_spent`
/// only grows and is capped at the section time limit on finalization.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct SectionProgress {
    pub id: Uuid,
    pub test_attempt_id: Uuid,
    pub section_id: Uuid,
    pub status: SectionStatus,
    /// Accumulated running time in whole seconds.
    pub total_time_spent: i32,
    /// Wall-clock start of the current running interval; null when not running.
    pub section_start_time: Option<DateTime<Utc>>,
    /// Set while paused; null when running or not started.
    pub paused_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl SectionProgress {
    pub fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    pub fn is_running(&self) -> bool {
        self.status == SectionStatus::InProgress && self.section_start_time.is_some()
    }
}
