//! Domain entities mirrored from persistent storage.

use serde::Serialize;
use time::OffsetDateTime;

use crate::domain::types::PostStatus;

/// A registered account. The password digest never leaves the application layer.
#[derive(Debug, Clone, PartialEq)]
pub struct UserRecord {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub hashed_password: String,
    pub is_active: bool,
    pub date_joined: OffsetDateTime,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PostRecord {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub status: PostStatus,
    pub view_count: i64,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
    pub author_id: i64,
}

/// A post together with its author and associated tags.
#[derive(Debug, Clone, PartialEq)]
pub struct PostDetail {
    pub post: PostRecord,
    pub author: UserRecord,
    pub tags: Vec<TagRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagRecord {
    pub id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TagWithCount {
    pub name: String,
    pub slug: String,
    pub count: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentRecord {
    pub id: i64,
    pub post_id: i64,
    pub author_id: i64,
    pub text: String,
    pub created_at: OffsetDateTime,
    pub parent_id: Option<i64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CommentDetail {
    pub comment: CommentRecord,
    pub author: UserRecord,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SiteStats {
    pub total_posts: i64,
    pub total_comments: i64,
    pub popular_tags: Vec<TagWithCount>,
}
