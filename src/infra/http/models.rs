//! Request and response bodies of the JSON API.

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::application::accounts::AccessToken;
use crate::application::pagination::{PageQuery, PageRequest, PaginationError};
use crate::domain::entities::{CommentDetail, PostDetail, TagRecord, UserRecord};
use crate::domain::types::PostStatus;

/// Characters of content shown in list views.
pub const PREVIEW_CHARS: usize = 200;

#[derive(Debug, Serialize)]
pub struct UserView {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(with = "time::serde::rfc3339")]
    pub date_joined: OffsetDateTime,
    pub is_active: bool,
    pub avatar_url: Option<String>,
}

impl From<UserRecord> for UserView {
    fn from(user: UserRecord) -> Self {
        Self {
            id: user.id,
            username: user.username,
            email: user.email,
            date_joined: user.date_joined,
            is_active: user.is_active,
            avatar_url: user.avatar_url,
        }
    }
}

/// Compact author reference embedded in list views.
#[derive(Debug, Serialize)]
pub struct AuthorRef {
    pub id: i64,
    pub username: String,
}

#[derive(Debug, Serialize)]
pub struct PostView {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub status: PostStatus,
    pub view_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub updated_at: OffsetDateTime,
    pub author: UserView,
    pub tags: Vec<TagRecord>,
}

impl From<PostDetail> for PostView {
    fn from(detail: PostDetail) -> Self {
        let PostDetail { post, author, tags } = detail;
        Self {
            id: post.id,
            title: post.title,
            slug: post.slug,
            content: post.content,
            status: post.status,
            view_count: post.view_count,
            created_at: post.created_at,
            updated_at: post.updated_at,
            author: author.into(),
            tags,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PostShortView {
    pub id: i64,
    pub title: String,
    pub slug: String,
    pub preview: String,
    pub view_count: i64,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub author: AuthorRef,
    pub tags: Vec<TagRecord>,
}

impl From<PostDetail> for PostShortView {
    fn from(detail: PostDetail) -> Self {
        let PostDetail { post, author, tags } = detail;
        Self {
            id: post.id,
            title: post.title,
            slug: post.slug,
            preview: preview(&post.content),
            view_count: post.view_count,
            created_at: post.created_at,
            author: AuthorRef {
                id: author.id,
                username: author.username,
            },
            tags,
        }
    }
}

fn preview(content: &str) -> String {
    content.chars().take(PREVIEW_CHARS).collect()
}

#[derive(Debug, Serialize)]
pub struct CommentView {
    pub id: i64,
    pub post_id: i64,
    pub text: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    pub parent_id: Option<i64>,
    pub author: UserView,
}

impl From<CommentDetail> for CommentView {
    fn from(detail: CommentDetail) -> Self {
        let CommentDetail { comment, author } = detail;
        Self {
            id: comment.id,
            post_id: comment.post_id,
            text: comment.text,
            created_at: comment.created_at,
            parent_id: comment.parent_id,
            author: author.into(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
}

impl From<AccessToken> for TokenResponse {
    fn from(token: AccessToken) -> Self {
        Self {
            access_token: token.access_token,
            token_type: token.token_type,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: &'static str,
}

#[derive(Debug, Deserialize)]
pub struct RegisterForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct PostCreateRequest {
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub status: PostStatus,
    #[serde(default)]
    pub tags: Vec<Option<String>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct PostUpdateRequest {
    pub title: Option<String>,
    pub content: Option<String>,
    pub status: Option<PostStatus>,
    pub tags: Option<Vec<Option<String>>>,
}

#[derive(Debug, Deserialize)]
pub struct CommentCreateRequest {
    pub text: String,
    #[serde(default)]
    pub parent_id: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct SentimentRequest {
    pub text: String,
}

#[derive(Debug, Default, Deserialize)]
pub struct PostListQuery {
    pub page: Option<i64>,
    pub page_size: Option<i64>,
    pub tag: Option<String>,
    pub author: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
    pub page: Option<i64>,
    pub page_size: Option<i64>,
}

/// Resolve optional `page` / `page_size` parameters into a validated window.
pub fn page_request(page: Option<i64>, page_size: Option<i64>) -> Result<PageRequest, PaginationError> {
    PageRequest::try_from(PageQuery { page, page_size })
}

#[cfg(test)]
mod tests {
    use time::macros::datetime;

    use super::*;
    use crate::domain::entities::PostRecord;

    fn detail(content: String) -> PostDetail {
        let at = datetime!(2026-01-02 03:04:05 UTC);
        PostDetail {
            post: PostRecord {
                id: 1,
                title: "Hi There".into(),
                slug: "hi-there".into(),
                content,
                status: PostStatus::Published,
                view_count: 0,
                created_at: at,
                updated_at: at,
                author_id: 9,
            },
            author: UserRecord {
                id: 9,
                username: "alice".into(),
                email: "a@x.com".into(),
                hashed_password: "$argon2id$secret".into(),
                is_active: true,
                date_joined: at,
                avatar_url: None,
            },
            tags: Vec::new(),
        }
    }

    #[test]
    fn short_view_truncates_by_characters() {
        let view = PostShortView::from(detail("é".repeat(250)));
        assert_eq!(view.preview.chars().count(), PREVIEW_CHARS);
    }

    #[test]
    fn password_digest_is_never_serialized() {
        let json = serde_json::to_string(&PostView::from(detail("x".repeat(60)))).expect("json");
        assert!(!json.contains("argon2"));
        assert!(json.contains("\"created_at\":\"2026-01-02T03:04:05Z\""));
    }

    #[test]
    fn update_request_fields_are_optional() {
        let request: PostUpdateRequest = serde_json::from_str("{}").expect("empty patch");
        assert!(request.title.is_none() && request.tags.is_none());
    }
}
