use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// Dimension under which the overall 0-100 percentage is stored. Every
/// downstream consumer reads this row; none recompute it.
pub const OVERALL_DIMENSION: &str = "overall";

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Score {
    pub id: Uuid,
    pub test_attempt_id: Uuid,
    /// "overall", "section_1".."section_5", or a free-form category.
    pub dimension: String,
    pub score_value: f64,
    pub percentile: Option<f64>,
    pub created_at: Option<DateTime<Utc>>,
}
