//! Post reads, writes and search.

use std::future::Future;
use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::{info, warn};
use validator::Validate;

use crate::application::pagination::PageRequest;
use crate::application::repos::{
    CreatePostParams, PostListFilter, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
    UsersRepo,
};
use crate::application::validation;
use crate::cache::{CacheGate, Namespace};
use crate::domain::entities::PostDetail;
use crate::domain::policy::{self, Actor, PolicyError};
use crate::domain::tags::{TagDraft, normalize_tag_names};
use crate::domain::types::PostStatus;

/// Attempts made when a concurrent writer claims the same slug first.
pub const MAX_WRITE_ATTEMPTS: u32 = 3;

#[derive(Debug, Clone, Validate)]
pub struct NewPost {
    #[validate(length(min = 3, max = 100, message = "must be between 3 and 100 characters"))]
    pub title: String,
    #[validate(length(min = 50, message = "must be at least 50 characters"))]
    pub content: String,
    pub status: PostStatus,
    pub tags: Vec<Option<String>>,
}

#[derive(Debug, Clone, Default, Validate)]
pub struct PostPatch {
    #[validate(length(min = 3, max = 100, message = "must be between 3 and 100 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 50, message = "must be at least 50 characters"))]
    pub content: Option<String>,
    pub status: Option<PostStatus>,
    pub tags: Option<Vec<Option<String>>>,
}

#[derive(Debug, Error)]
pub enum PostError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("authentication required")]
    Unauthenticated,
    #[error("not allowed to {0}")]
    Forbidden(&'static str),
    #[error("post not found")]
    NotFound,
    #[error("user not found")]
    AuthorNotFound,
    #[error("slug allocation kept colliding after {attempts} attempts; retry the request")]
    Conflict { attempts: u32 },
    #[error(transparent)]
    Repo(RepoError),
}

impl From<PolicyError> for PostError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::Unauthenticated => PostError::Unauthenticated,
            PolicyError::Forbidden { action } => PostError::Forbidden(action),
            PolicyError::Hidden => PostError::NotFound,
        }
    }
}

impl From<RepoError> for PostError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => PostError::NotFound,
            RepoError::InvalidInput { message } => PostError::Validation(message),
            other => PostError::Repo(other),
        }
    }
}

#[derive(Clone)]
pub struct PostService {
    reader: Arc<dyn PostsRepo>,
    writer: Arc<dyn PostsWriteRepo>,
    users: Arc<dyn UsersRepo>,
    cache: CacheGate,
}

impl PostService {
    pub fn new(
        reader: Arc<dyn PostsRepo>,
        writer: Arc<dyn PostsWriteRepo>,
        users: Arc<dyn UsersRepo>,
        cache: CacheGate,
    ) -> Self {
        Self {
            reader,
            writer,
            users,
            cache,
        }
    }

    pub async fn list(
        &self,
        filter: &PostListFilter,
        page: PageRequest,
    ) -> Result<Vec<PostDetail>, PostError> {
        Ok(self.reader.list_published(filter, page).await?)
    }

    pub async fn search(
        &self,
        query: Option<&str>,
        page: PageRequest,
    ) -> Result<Vec<PostDetail>, PostError> {
        let query = query.map(str::trim).filter(|query| !query.is_empty());
        Ok(self.reader.search_published(query, page).await?)
    }

    /// Published posts of an active user; unknown or inactive users are a 404.
    pub async fn list_by_author(
        &self,
        username: &str,
        page: PageRequest,
    ) -> Result<Vec<PostDetail>, PostError> {
        if self.users.find_active_by_username(username).await?.is_none() {
            return Err(PostError::AuthorNotFound);
        }
        let filter = PostListFilter {
            author: Some(username.to_string()),
            tag: None,
        };
        self.list(&filter, page).await
    }

    /// Fetch a post for display and count the view when the post is published.
    pub async fn read(&self, actor: Actor, slug: &str) -> Result<PostDetail, PostError> {
        let mut detail = self
            .reader
            .find_by_slug(slug)
            .await?
            .ok_or(PostError::NotFound)?;
        policy::can_read_post(actor, &detail.post)?;

        if policy::counts_as_view(&detail.post) {
            detail.post.view_count = self.reader.record_view(detail.post.id).await?;
            counter!("scrivo_post_views_total").increment(1);
        }
        Ok(detail)
    }

    pub async fn create(&self, actor: Actor, input: NewPost) -> Result<PostDetail, PostError> {
        let author_id = policy::can_create_post(actor)?;
        validation::check(&input).map_err(PostError::Validation)?;
        let tags = normalize_tags(input.tags)?;

        let params = CreatePostParams {
            author_id,
            title: input.title,
            content: input.content,
            status: input.status,
            tags,
        };
        let writer = &self.writer;
        let created = retry_slug_races("create", move || writer.create_post(params.clone())).await?;

        self.cache.invalidate(Namespace::Posts).await;
        info!(
            target = "scrivo::application::posts",
            post_id = created.post.id,
            slug = %created.post.slug,
            author_id,
            "post created"
        );
        Ok(created)
    }

    pub async fn update(
        &self,
        actor: Actor,
        slug: &str,
        patch: PostPatch,
    ) -> Result<PostDetail, PostError> {
        let existing = self
            .reader
            .find_by_slug(slug)
            .await?
            .ok_or(PostError::NotFound)?;
        policy::can_modify_post(actor, &existing.post)?;
        validation::check(&patch).map_err(PostError::Validation)?;

        let params = UpdatePostParams {
            id: existing.post.id,
            title: patch.title,
            content: patch.content,
            status: patch.status,
            tags: patch.tags.map(normalize_tags).transpose()?,
        };
        let writer = &self.writer;
        let updated = retry_slug_races("update", move || writer.update_post(params.clone())).await?;

        self.cache.invalidate(Namespace::Posts).await;
        info!(
            target = "scrivo::application::posts",
            post_id = updated.post.id,
            slug = %updated.post.slug,
            "post updated"
        );
        Ok(updated)
    }

    pub async fn delete(&self, actor: Actor, slug: &str) -> Result<(), PostError> {
        let existing = self
            .reader
            .find_by_slug(slug)
            .await?
            .ok_or(PostError::NotFound)?;
        policy::can_modify_post(actor, &existing.post)?;

        self.writer.delete_post(existing.post.id).await?;

        self.cache.invalidate(Namespace::Posts).await;
        info!(
            target = "scrivo::application::posts",
            post_id = existing.post.id,
            slug = %existing.post.slug,
            "post deleted"
        );
        Ok(())
    }
}

fn normalize_tags(names: Vec<Option<String>>) -> Result<Vec<TagDraft>, PostError> {
    normalize_tag_names(names).map_err(|err| PostError::Validation(err.to_string()))
}

/// Re-run a write whose slug allocation lost a race against a concurrent transaction.
async fn retry_slug_races<T, F, Fut>(op: &'static str, mut write: F) -> Result<T, PostError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, RepoError>>,
{
    let mut attempt = 1;
    loop {
        match write().await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_slug_race() && attempt < MAX_WRITE_ATTEMPTS => {
                warn!(
                    target = "scrivo::application::posts",
                    op,
                    attempt,
                    error = %err,
                    "slug collision, retrying"
                );
                attempt += 1;
            }
            Err(err) if err.is_slug_race() => {
                warn!(
                    target = "scrivo::application::posts",
                    op,
                    attempt,
                    error = %err,
                    "slug collision persisted, giving up"
                );
                return Err(PostError::Conflict { attempts: attempt });
            }
            Err(err) => return Err(err.into()),
        }
    }
}
