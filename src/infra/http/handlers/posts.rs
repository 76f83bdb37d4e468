//! Posts handlers

use axum::Json;
use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;

use crate::application::posts::{NewPost, PostPatch};
use crate::application::repos::PostListFilter;
use crate::infra::http::AppState;
use crate::infra::http::auth::{CurrentUser, MaybeUser};
use crate::infra::http::error::ApiError;
use crate::infra::http::models::{
    PostCreateRequest, PostListQuery, PostShortView, PostUpdateRequest, PostView, SearchQuery,
    page_request,
};

/// `GET /api/posts/`
pub async fn list_posts(
    State(state): State<AppState>,
    query: Result<Query<PostListQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let page = page_request(query.page, query.page_size)?;
    let filter = PostListFilter {
        author: query.author,
        tag: query.tag,
    };

    let posts = state.posts.list(&filter, page).await?;
    Ok(Json(
        posts.into_iter().map(PostShortView::from).collect::<Vec<_>>(),
    ))
}

/// `GET /api/posts/{slug}`
pub async fn get_post(
    State(state): State<AppState>,
    user: MaybeUser,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let post = state.posts.read(user.actor(), &slug).await?;
    Ok(Json(PostView::from(post)))
}

/// `POST /api/posts/`
pub async fn create_post(
    State(state): State<AppState>,
    user: CurrentUser,
    payload: Result<Json<PostCreateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let input = NewPost {
        title: payload.title,
        content: payload.content,
        status: payload.status,
        tags: payload.tags,
    };

    let post = state.posts.create(user.actor(), input).await?;
    Ok((StatusCode::CREATED, Json(PostView::from(post))))
}

/// `PUT /api/posts/{slug}`
pub async fn update_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(slug): Path<String>,
    payload: Result<Json<PostUpdateRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    let patch = PostPatch {
        title: payload.title,
        content: payload.content,
        status: payload.status,
        tags: payload.tags,
    };

    let post = state.posts.update(user.actor(), &slug, patch).await?;
    Ok(Json(PostView::from(post)))
}

/// `DELETE /api/posts/{slug}`
pub async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    state.posts.delete(user.actor(), &slug).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `GET /api/search`
pub async fn search_posts(
    State(state): State<AppState>,
    query: Result<Query<SearchQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(query) = query?;
    let page = page_request(query.page, query.page_size)?;

    let posts = state.posts.search(query.q.as_deref(), page).await?;
    Ok(Json(
        posts.into_iter().map(PostShortView::from).collect::<Vec<_>>(),
    ))
}
