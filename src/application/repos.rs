//! Repository traits describing persistence adapters.
//!
//! Multi-step writes (`create_post`, `update_post`) are single trait calls so an
//! adapter can run slug allocation, tag resolution and association inside one
//! transaction.

use async_trait::async_trait;
use thiserror::Error;

use crate::application::pagination::{PageRequest, PaginationError};
use crate::domain::entities::{
    CommentDetail, CommentRecord, PostDetail, TagWithCount, UserRecord,
};
use crate::domain::tags::TagDraft;
use crate::domain::types::PostStatus;

pub const POSTS_SLUG_CONSTRAINT: &str = "posts_slug_key";
pub const TAGS_NAME_CONSTRAINT: &str = "tags_name_key";
pub const TAGS_SLUG_CONSTRAINT: &str = "tags_slug_key";
pub const COMMENTS_PARENT_CONSTRAINT: &str = "comments_parent_id_fkey";
pub const USERS_USERNAME_CONSTRAINT: &str = "users_username_key";
pub const USERS_EMAIL_CONSTRAINT: &str = "users_email_key";

#[derive(Debug, Error)]
pub enum RepoError {
    #[error("persistence error: {0}")]
    Persistence(String),
    #[error("duplicate record violates unique constraint `{constraint}`")]
    Duplicate { constraint: String },
    #[error("resource not found")]
    NotFound,
    #[error("invalid input: {message}")]
    InvalidInput { message: String },
    #[error("integrity error on `{constraint}`: {message}")]
    Integrity { constraint: String, message: String },
    #[error("database timeout")]
    Timeout,
    #[error(transparent)]
    Pagination(#[from] PaginationError),
}

impl RepoError {
    pub fn from_persistence(err: impl std::fmt::Display) -> Self {
        Self::Persistence(err.to_string())
    }

    /// The reply parent vanished between the parent check and the insert.
    pub fn is_missing_parent(&self) -> bool {
        matches!(
            self,
            RepoError::Integrity { constraint, .. } if constraint == COMMENTS_PARENT_CONSTRAINT
        )
    }

    /// Unique violations on slug columns are lost allocation races and worth retrying.
    pub fn is_slug_race(&self) -> bool {
        matches!(
            self,
            RepoError::Duplicate { constraint }
                if constraint == POSTS_SLUG_CONSTRAINT
                    || constraint == TAGS_SLUG_CONSTRAINT
                    || constraint == TAGS_NAME_CONSTRAINT
        )
    }
}

#[derive(Debug, Clone)]
pub struct CreateUserParams {
    pub username: String,
    pub email: String,
    pub hashed_password: String,
    pub avatar_url: Option<String>,
}

#[async_trait]
pub trait UsersRepo: Send + Sync {
    async fn find_active_by_username(&self, username: &str)
    -> Result<Option<UserRecord>, RepoError>;

    async fn username_taken(&self, username: &str) -> Result<bool, RepoError>;

    async fn email_taken(&self, email: &str) -> Result<bool, RepoError>;

    async fn list_active(&self, page: PageRequest) -> Result<Vec<UserRecord>, RepoError>;
}

#[async_trait]
pub trait UsersWriteRepo: Send + Sync {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError>;
}

/// Filters for the public post list. A filter that matches nothing yields an empty page.
#[derive(Debug, Clone, Default)]
pub struct PostListFilter {
    pub author: Option<String>,
    pub tag: Option<String>,
}

#[derive(Debug, Clone)]
pub struct CreatePostParams {
    pub author_id: i64,
    pub title: String,
    pub content: String,
    pub status: PostStatus,
    pub tags: Vec<TagDraft>,
}

/// Partial update; `None` leaves the field untouched. The slug is never changed.
#[derive(Debug, Clone)]
pub struct UpdatePostParams {
    pub id: i64,
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<PostStatus>,
    pub tags: Option<Vec<TagDraft>>,
}

#[async_trait]
pub trait PostsRepo: Send + Sync {
    /// Published posts in primary key order.
    async fn list_published(
        &self,
        filter: &PostListFilter,
        page: PageRequest,
    ) -> Result<Vec<PostDetail>, RepoError>;

    /// Published posts whose title or content contains `query`, case-insensitively.
    async fn search_published(
        &self,
        query: Option<&str>,
        page: PageRequest,
    ) -> Result<Vec<PostDetail>, RepoError>;

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostDetail>, RepoError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<PostDetail>, RepoError>;

    /// Atomically increments the view counter and returns the new value.
    async fn record_view(&self, post_id: i64) -> Result<i64, RepoError>;
}

#[async_trait]
pub trait PostsWriteRepo: Send + Sync {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostDetail, RepoError>;

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostDetail, RepoError>;

    async fn delete_post(&self, id: i64) -> Result<(), RepoError>;
}

#[derive(Debug, Clone)]
pub struct CreateCommentParams {
    pub post_id: i64,
    pub author_id: i64,
    pub text: String,
    pub parent_id: Option<i64>,
}

#[async_trait]
pub trait CommentsRepo: Send + Sync {
    async fn list_for_post(
        &self,
        post_id: i64,
        page: PageRequest,
    ) -> Result<Vec<CommentDetail>, RepoError>;

    async fn find_by_id(&self, id: i64) -> Result<Option<CommentRecord>, RepoError>;
}

#[async_trait]
pub trait CommentsWriteRepo: Send + Sync {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentDetail, RepoError>;

    /// Deletes one comment; its replies keep existing with `parent_id` cleared.
    async fn delete_comment(&self, id: i64) -> Result<(), RepoError>;
}

#[async_trait]
pub trait StatsRepo: Send + Sync {
    async fn count_published_posts(&self) -> Result<i64, RepoError>;

    async fn count_comments(&self) -> Result<i64, RepoError>;

    /// Tags ranked by published post count; tags without published posts are excluded.
    async fn popular_tags(&self, limit: i64) -> Result<Vec<TagWithCount>, RepoError>;

    /// Every tag with its published post count, count descending then name.
    async fn tag_cloud(&self) -> Result<Vec<TagWithCount>, RepoError>;
}
