//! JSON API surface: router, extractors, error mapping and request logging.

pub mod auth;
pub mod error;
mod handlers;
pub mod middleware;
pub mod models;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use axum::middleware::{from_fn, from_fn_with_state};
use axum::routing::{delete, get, post};

use crate::application::accounts::AccountService;
use crate::application::comments::CommentService;
use crate::application::posts::PostService;
use crate::application::sentiment::SentimentService;
use crate::application::stats::StatsService;
use crate::cache::{CacheGate, post_list_cache};
use crate::infra::uploads::UploadStorage;

use self::middleware::{log_responses, set_request_context};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub accounts: AccountService,
    pub posts: PostService,
    pub comments: CommentService,
    pub stats: StatsService,
    pub sentiment: SentimentService,
    pub uploads: Arc<UploadStorage>,
    pub cache: CacheGate,
    /// Upper bound for any request body, multipart avatars included.
    pub max_request_bytes: usize,
}

pub fn build_router(state: AppState) -> Router {
    // Only anonymous GETs are served from cache; writes pass straight through.
    let cached_routes = Router::new()
        .route(
            "/api/posts/",
            get(handlers::list_posts).post(handlers::create_post),
        )
        .layer(from_fn_with_state(state.cache.clone(), post_list_cache));

    let media_route = format!("{}/{{*path}}", state.uploads.public_prefix());

    Router::new()
        .route("/api/register", post(handlers::register))
        .route("/api/login", post(handlers::login))
        .route(
            "/api/posts/{slug}",
            get(handlers::get_post)
                .put(handlers::update_post)
                .delete(handlers::delete_post),
        )
        .route(
            "/api/posts/{slug}/comments",
            get(handlers::list_comments).post(handlers::create_comment),
        )
        .route("/api/comments/{id}", delete(handlers::delete_comment))
        .route("/api/users/", get(handlers::list_users))
        .route("/api/users/{username}", get(handlers::get_user))
        .route("/api/users/{username}/posts", get(handlers::list_user_posts))
        .route("/api/search", get(handlers::search_posts))
        .route("/api/stats", get(handlers::site_stats))
        .route("/api/tags/cloud/", get(handlers::tag_cloud))
        .route("/api/sentiment", post(handlers::analyze_sentiment))
        .route(&media_route, get(handlers::serve_upload))
        .route("/hp", get(handlers::liveness))
        .merge(cached_routes)
        .layer(DefaultBodyLimit::max(state.max_request_bytes))
        .with_state(state)
        .layer(from_fn(log_responses))
        .layer(from_fn(set_request_context))
}
