use axum::Json;
use axum::extract::State;
use axum::extract::rejection::JsonRejection;
use axum::response::IntoResponse;

use crate::infra::http::AppState;
use crate::infra::http::error::ApiError;
use crate::infra::http::models::SentimentRequest;

/// `POST /api/sentiment`
pub async fn analyze_sentiment(
    State(state): State<AppState>,
    payload: Result<Json<SentimentRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    Ok(Json(state.sentiment.analyze(&payload.text).await?))
}
