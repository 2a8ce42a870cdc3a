use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;

use crate::api::state::AppState;
use crate::models::AggregationResult;

/// Maximum window size a caller may request.
const MAX_LIMIT: usize = 100;

#[derive(Debug, Deserialize)]
pub struct StandingsParams {
    /// Entity whose standing is always included, even off-window
    pub target: Option<String>,

    /// Window size (default 10, clamped to 1..=100)
    pub limit: Option<usize>,
}

pub async fn event_standings(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    Query(params): Query<StandingsParams>,
) -> Json<AggregationResult> {
    let limit = params.limit.unwrap_or(10).clamp(1, MAX_LIMIT);

    let result = state
        .aggregator
        .aggregate(&event_id, params.target.as_deref(), limit)
        .await;

    Json(result)
}
