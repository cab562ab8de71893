use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AttemptStatus {
    InProgress,
    Completed,
    /// Terminal, reserved for administrative action; never produced by the
    /// test-taking flows.
    Abandoned,
}

impl AttemptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::InProgress => "IN_PROGRESS",
            AttemptStatus::Completed => "COMPLETED",
            AttemptStatus::Abandoned => "ABANDONED",
        }
    }
}

/// One student's single lifetime pass through the test. At most one COMPLETED
/// attempt per student ever; at most one IN_PROGRESS at a time. Immutable once
/// COMPLETED.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TestAttempt {
    pub id: Uuid,
    pub student_id: Uuid,
    pub status: AttemptStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
}
