use axum::Json;
use axum::response::IntoResponse;

use crate::infra::http::models::MessageResponse;

/// `GET /hp`: liveness only, never touches the database.
pub async fn liveness() -> impl IntoResponse {
    Json(MessageResponse { message: "ok" })
}
