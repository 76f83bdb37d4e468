use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::comments::NewComment;
use crate::application::pagination::PageQuery;
use crate::infra::http::AppState;
use crate::infra::http::auth::CurrentUser;
use crate::infra::http::error::ApiError;
use crate::infra::http::models::{CommentCreateRequest, CommentView, page_request};

/// `GET /api/posts/{slug}/comments`
pub async fn list_comments(
    State(state): State<AppState>,
    Path(slug): Path<String>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let page = page_request(query.page, query.page_size)?;

    let comments = state.comments.list(&slug, page).await?;
    Ok(Json(
        comments.into_iter().map(CommentView::from).collect::<Vec<_>>(),
    ))
}

/// `POST /api/posts/{slug}/comments`
pub async fn create_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(slug): Path<String>,
    payload: Result<Json<CommentCreateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let input = NewComment {
        text: payload.text,
        parent_id: payload.parent_id,
    };

    let comment = state.comments.create(user.actor(), &slug, input).await?;
    Ok((StatusCode::CREATED, Json(CommentView::from(comment))))
}

/// `DELETE /api/comments/{id}`
pub async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.comments.delete(user.actor(), id).await?;
    Ok(StatusCode::NO_CONTENT)
}
