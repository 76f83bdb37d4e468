//! Authorization decisions over posts and comments.
//!
//! Every function is pure: it inspects the acting principal and the already
//! loaded resource and either allows the operation or says why not. Loading and
//! authentication happen elsewhere.

use thiserror::Error;

use crate::domain::entities::{CommentRecord, PostRecord};

/// The principal behind a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Anonymous,
    User(i64),
}

impl Actor {
    pub fn user_id(self) -> Option<i64> {
        match self {
            Actor::Anonymous => None,
            Actor::User(id) => Some(id),
        }
    }

    fn is(self, user_id: i64) -> bool {
        self.user_id() == Some(user_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum PolicyError {
    #[error("authentication required")]
    Unauthenticated,
    #[error("not allowed to {action}")]
    Forbidden { action: &'static str },
    /// The resource exists but must look absent to this actor.
    #[error("resource is not visible")]
    Hidden,
}

fn require_user(actor: Actor) -> Result<i64, PolicyError> {
    actor.user_id().ok_or(PolicyError::Unauthenticated)
}

/// Published posts are public; drafts are visible to their author only.
pub fn can_read_post(actor: Actor, post: &PostRecord) -> Result<(), PolicyError> {
    if post.status.is_published() || actor.is(post.author_id) {
        Ok(())
    } else {
        Err(PolicyError::Hidden)
    }
}

/// Whether a successful detail read should bump the view counter.
pub fn counts_as_view(post: &PostRecord) -> bool {
    post.status.is_published()
}

/// Returns the id that becomes the new post's author.
pub fn can_create_post(actor: Actor) -> Result<i64, PolicyError> {
    require_user(actor)
}

pub fn can_modify_post(actor: Actor, post: &PostRecord) -> Result<(), PolicyError> {
    let user_id = require_user(actor)?;
    if user_id == post.author_id {
        Ok(())
    } else {
        Err(PolicyError::Forbidden {
            action: "modify this post",
        })
    }
}

/// Comments may only be attached to published posts.
pub fn can_comment(actor: Actor, post: &PostRecord) -> Result<i64, PolicyError> {
    let user_id = require_user(actor)?;
    if !post.status.is_published() {
        return Err(PolicyError::Hidden);
    }
    Ok(user_id)
}

/// The comment's author and the owning post's author may delete a comment.
pub fn can_delete_comment(
    actor: Actor,
    comment: &CommentRecord,
    post: &PostRecord,
) -> Result<(), PolicyError> {
    let user_id = require_user(actor)?;
    if user_id == comment.author_id || user_id == post.author_id {
        Ok(())
    } else {
        Err(PolicyError::Forbidden {
            action: "delete this comment",
        })
    }
}
