use axum::{Json, extract::State};

use crate::{error::ApiResult, models::stats::Stats, state::AppState};

/// Club-wide counters for the dashboard
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<Json<Stats>> {
    Ok(Json(state.stats_repository.collect().await?))
}
