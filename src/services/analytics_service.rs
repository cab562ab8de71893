use crate::error::Result;
use crate::models::score::OVERALL_DIMENSION;
use crate::services::interpretation;
use sqlx::PgPool;
use std::collections::HashMap;

#[derive(Debug, serde::Serialize)]
pub struct AnalyticsOverview {
    pub attempts_by_status: HashMap<String, i64>,
    pub readiness_distribution: HashMap<String, i64>,
    pub average_overall_percentage: Option<f64>,
}

#[derive(Clone)]
pub struct AnalyticsService {
    pool: PgPool,
}

impl AnalyticsService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn overview(&self) -> Result<AnalyticsOverview> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"SELECT status, COUNT(*) FROM test_attempts GROUP BY status"#,
        )
        .fetch_all(&self.pool)
        .await?;
        let attempts_by_status: HashMap<String, i64> = rows.into_iter().collect();

        let percentages = sqlx::query_scalar::<_, f64>(
            r#"SELECT score_value FROM scores WHERE dimension = $1"#,
        )
        .bind(OVERALL_DIMENSION)
        .fetch_all(&self.pool)
        .await?;

        let mut readiness_distribution: HashMap<String, i64> = HashMap::new();
        for percentage in &percentages {
            let (band, _) = interpretation::readiness(*percentage);
            *readiness_distribution
                .entry(band.as_str().to_string())
                .or_insert(0) += 1;
        }

        let average_overall_percentage = if percentages.is_empty() {
            None
        } else {
            Some(percentages.iter().sum::<f64>() / percentages.len() as f64)
        };

        Ok(AnalyticsOverview {
            attempts_by_status,
            readiness_distribution,
            average_overall_percentage,
        })
    }
}
