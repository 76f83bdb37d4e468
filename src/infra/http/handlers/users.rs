use axum::Json;
use axum::extract::rejection::QueryRejection;
use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;

use crate::application::pagination::PageQuery;
use crate::infra::http::AppState;
use crate::infra::http::error::ApiError;
use crate::infra::http::models::{PostShortView, UserView, page_request};

/// `GET /api/users/`
pub async fn list_users(
    State(state): State<AppState>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let page = page_request(query.page, query.page_size)?;

    let users = state.accounts.list_users(page).await?;
    Ok(Json(users.into_iter().map(UserView::from).collect::<Vec<_>>()))
}

/// `GET /api/users/{username}`
pub async fn get_user(
    State(state): State<AppState>,
    Path(username): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user = state.accounts.find_user(&username).await?;
    Ok(Json(UserView::from(user)))
}

/// `GET /api/users/{username}/posts`
pub async fn list_user_posts(
    State(state): State<AppState>,
    Path(username): Path<String>,
    query: Result<Query<PageQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let page = page_request(query.page, query.page_size)?;

    let posts = state.posts.list_by_author(&username, page).await?;
    Ok(Json(
        posts.into_iter().map(PostShortView::from).collect::<Vec<_>>(),
    ))
}
