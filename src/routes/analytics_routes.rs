use axum::{extract::State, response::Json, Extension};

use crate::error::Result;
use crate::middleware::auth::Claims;
use crate::services::analytics_service::AnalyticsOverview;
use crate::AppState;

#[axum::debug_handler]
pub async fn get_overview(
    State(state): State<AppState>,
    Extension(_claims): Extension<Claims>,
) -> Result<Json<AnalyticsOverview>> {
    let overview = state.analytics_service.overview().await?;
    Ok(Json(overview))
}
