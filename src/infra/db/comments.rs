use async_trait::async_trait;
use time::OffsetDateTime;

use crate::application::pagination::PageRequest;
use crate::application::repos::{
    CommentsRepo, CommentsWriteRepo, CreateCommentParams, RepoError,
};
use crate::domain::entities::{CommentDetail, CommentRecord, UserRecord};

use super::{PostgresRepositories, map_sqlx_error};

const COMMENT_DETAIL_SELECT: &str = "SELECT c.id, c.post_id, c.author_id, c.text, \
        c.created_at, c.parent_id, \
        u.username AS author_username, u.email AS author_email, \
        u.hashed_password AS author_hashed_password, u.is_active AS author_is_active, \
        u.date_joined AS author_date_joined, u.avatar_url AS author_avatar_url \
    FROM comments c \
    INNER JOIN users u ON u.id = c.author_id";

#[derive(sqlx::FromRow)]
struct CommentRow {
    id: i64,
    post_id: i64,
    author_id: i64,
    text: String,
    created_at: OffsetDateTime,
    parent_id: Option<i64>,
}

impl From<CommentRow> for CommentRecord {
    fn from(row: CommentRow) -> Self {
        Self {
            id: row.id,
            post_id: row.post_id,
            author_id: row.author_id,
            text: row.text,
            created_at: row.created_at,
            parent_id: row.parent_id,
        }
    }
}

#[derive(sqlx::FromRow)]
struct CommentDetailRow {
    #[sqlx(flatten)]
    comment: CommentRow,
    author_username: String,
    author_email: String,
    author_hashed_password: String,
    author_is_active: bool,
    author_date_joined: OffsetDateTime,
    author_avatar_url: Option<String>,
}

impl From<CommentDetailRow> for CommentDetail {
    fn from(row: CommentDetailRow) -> Self {
        let author = UserRecord {
            id: row.comment.author_id,
            username: row.author_username,
            email: row.author_email,
            hashed_password: row.author_hashed_password,
            is_active: row.author_is_active,
            date_joined: row.author_date_joined,
            avatar_url: row.author_avatar_url,
        };
        Self {
            comment: CommentRecord::from(row.comment),
            author,
        }
    }
}

#[async_trait]
impl CommentsRepo for PostgresRepositories {
    async fn list_for_post(
        &self,
        post_id: i64,
        page: PageRequest,
    ) -> Result<Vec<CommentDetail>, RepoError> {
        let rows = sqlx::query_as::<_, CommentDetailRow>(&format!(
            "{COMMENT_DETAIL_SELECT} WHERE c.post_id = $1 ORDER BY c.id ASC LIMIT $2 OFFSET $3"
        ))
        .bind(post_id)
        .bind(page.limit())
        .bind(page.offset())
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(CommentDetail::from).collect())
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<CommentRecord>, RepoError> {
        let row = sqlx::query_as::<_, CommentRow>(
            "SELECT id, post_id, author_id, text, created_at, parent_id \
             FROM comments WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(row.map(CommentRecord::from))
    }
}

#[async_trait]
impl CommentsWriteRepo for PostgresRepositories {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentDetail, RepoError> {
        let CreateCommentParams {
            post_id,
            author_id,
            text,
            parent_id,
        } = params;

        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO comments (post_id, author_id, text, parent_id) \
             VALUES ($1, $2, $3, $4) \
             RETURNING id",
        )
        .bind(post_id)
        .bind(author_id)
        .bind(text)
        .bind(parent_id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        let row = sqlx::query_as::<_, CommentDetailRow>(&format!(
            "{COMMENT_DETAIL_SELECT} WHERE c.id = $1"
        ))
        .bind(id)
        .fetch_one(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(CommentDetail::from(row))
    }

    async fn delete_comment(&self, id: i64) -> Result<(), RepoError> {
        // Replies survive: `comments.parent_id` is `ON DELETE SET NULL`.
        let result = sqlx::query("DELETE FROM comments WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await
            .map_err(map_sqlx_error)?;

        if result.rows_affected() == 0 {
            return Err(RepoError::NotFound);
        }
        Ok(())
    }
}
