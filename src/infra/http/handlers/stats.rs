use axum::Json;
use axum::extract::State;
use axum::response::IntoResponse;

use crate::infra::http::AppState;
use crate::infra::http::error::ApiError;

/// `GET /api/stats`
pub async fn site_stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.stats.stats().await?))
}

/// `GET /api/tags/cloud/`
pub async fn tag_cloud(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok(Json(state.stats.tag_cloud().await?))
}
