//! Threaded comments on published posts.

use std::sync::Arc;

use thiserror::Error;
use tracing::info;
use validator::Validate;

use crate::application::pagination::PageRequest;
use crate::application::repos::{
    CommentsRepo, CommentsWriteRepo, CreateCommentParams, PostsRepo, RepoError,
};
use crate::application::validation;
use crate::domain::entities::{CommentDetail, PostRecord};
use crate::domain::policy::{self, Actor, PolicyError};

#[derive(Debug, Clone, Validate)]
pub struct NewComment {
    #[validate(length(min = 1, max = 2000, message = "must be between 1 and 2000 characters"))]
    pub text: String,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Error)]
pub enum CommentError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("authentication required")]
    Unauthenticated,
    #[error("not allowed to {0}")]
    Forbidden(&'static str),
    #[error("post not found")]
    PostNotFound,
    #[error("comment not found")]
    NotFound,
    #[error("parent comment {0} does not exist on this post")]
    InvalidParent(i64),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

impl From<PolicyError> for CommentError {
    fn from(err: PolicyError) -> Self {
        match err {
            PolicyError::Unauthenticated => CommentError::Unauthenticated,
            PolicyError::Forbidden { action } => CommentError::Forbidden(action),
            PolicyError::Hidden => CommentError::PostNotFound,
        }
    }
}

#[derive(Clone)]
pub struct CommentService {
    posts: Arc<dyn PostsRepo>,
    reader: Arc<dyn CommentsRepo>,
    writer: Arc<dyn CommentsWriteRepo>,
}

impl CommentService {
    pub fn new(
        posts: Arc<dyn PostsRepo>,
        reader: Arc<dyn CommentsRepo>,
        writer: Arc<dyn CommentsWriteRepo>,
    ) -> Self {
        Self {
            posts,
            reader,
            writer,
        }
    }

    async fn published_post(&self, slug: &str) -> Result<PostRecord, CommentError> {
        self.posts
            .find_by_slug(slug)
            .await?
            .map(|detail| detail.post)
            .filter(|post| post.status.is_published())
            .ok_or(CommentError::PostNotFound)
    }

    pub async fn list(
        &self,
        slug: &str,
        page: PageRequest,
    ) -> Result<Vec<CommentDetail>, CommentError> {
        let post = self.published_post(slug).await?;
        Ok(self.reader.list_for_post(post.id, page).await?)
    }

    pub async fn create(
        &self,
        actor: Actor,
        slug: &str,
        input: NewComment,
    ) -> Result<CommentDetail, CommentError> {
        if actor.user_id().is_none() {
            return Err(CommentError::Unauthenticated);
        }
        let post = self
            .posts
            .find_by_slug(slug)
            .await?
            .map(|detail| detail.post)
            .ok_or(CommentError::PostNotFound)?;
        let author_id = policy::can_comment(actor, &post)?;
        validation::check(&input).map_err(CommentError::Validation)?;

        if let Some(parent_id) = input.parent_id {
            let parent = self.reader.find_by_id(parent_id).await?;
            if parent.is_none_or(|parent| parent.post_id != post.id) {
                return Err(CommentError::InvalidParent(parent_id));
            }
        }

        let comment = self
            .writer
            .create_comment(CreateCommentParams {
                post_id: post.id,
                author_id,
                text: escape_html(&input.text),
                parent_id: input.parent_id,
            })
            .await
            .map_err(|err| match input.parent_id {
                Some(parent_id) if err.is_missing_parent() => {
                    CommentError::InvalidParent(parent_id)
                }
                _ => CommentError::Repo(err),
            })?;

        info!(
            target = "scrivo::application::comments",
            comment_id = comment.comment.id,
            post_id = post.id,
            "comment created"
        );
        Ok(comment)
    }

    /// Delete a comment. Replies survive as top-level comments.
    pub async fn delete(&self, actor: Actor, id: i64) -> Result<(), CommentError> {
        if actor.user_id().is_none() {
            return Err(CommentError::Unauthenticated);
        }
        let comment = self
            .reader
            .find_by_id(id)
            .await?
            .ok_or(CommentError::NotFound)?;
        let post = self
            .posts
            .find_by_id(comment.post_id)
            .await?
            .ok_or(CommentError::PostNotFound)?;
        policy::can_delete_comment(actor, &comment, &post.post)?;

        self.writer.delete_comment(id).await.map_err(|err| match err {
            RepoError::NotFound => CommentError::NotFound,
            other => CommentError::Repo(other),
        })?;

        info!(
            target = "scrivo::application::comments",
            comment_id = id,
            post_id = post.post.id,
            "comment deleted"
        );
        Ok(())
    }
}

/// Escape markup-significant characters so stored text renders literally.
fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#x27;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}
