use async_trait::async_trait;

use crate::application::repos::{RepoError, StatsRepo};
use crate::domain::entities::TagWithCount;
use crate::domain::types::PostStatus;

use super::{PostgresRepositories, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct TagCountRow {
    name: String,
    slug: String,
    count: i64,
}

impl From<TagCountRow> for TagWithCount {
    fn from(row: TagCountRow) -> Self {
        Self {
            name: row.name,
            slug: row.slug,
            count: row.count,
        }
    }
}

#[async_trait]
impl StatsRepo for PostgresRepositories {
    async fn count_published_posts(&self) -> Result<i64, RepoError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM posts WHERE status = $1")
            .bind(PostStatus::Published)
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn count_comments(&self) -> Result<i64, RepoError> {
        sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM comments")
            .fetch_one(self.pool())
            .await
            .map_err(map_sqlx_error)
    }

    async fn popular_tags(&self, limit: i64) -> Result<Vec<TagWithCount>, RepoError> {
        let rows = sqlx::query_as::<_, TagCountRow>(
            "SELECT t.name, t.slug, COUNT(p.id) AS count \
             FROM tags t \
             INNER JOIN post_tags pt ON pt.tag_id = t.id \
             INNER JOIN posts p ON p.id = pt.post_id AND p.status = $1 \
             GROUP BY t.id, t.name, t.slug \
             ORDER BY count DESC, t.name ASC \
             LIMIT $2",
        )
        .bind(PostStatus::Published)
        .bind(limit)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(TagWithCount::from).collect())
    }

    async fn tag_cloud(&self) -> Result<Vec<TagWithCount>, RepoError> {
        let rows = sqlx::query_as::<_, TagCountRow>(
            "SELECT t.name, t.slug, COUNT(p.id) AS count \
             FROM tags t \
             LEFT JOIN post_tags pt ON pt.tag_id = t.id \
             LEFT JOIN posts p ON p.id = pt.post_id AND p.status = $1 \
             GROUP BY t.id, t.name, t.slug \
             ORDER BY count DESC, t.name ASC",
        )
        .bind(PostStatus::Published)
        .fetch_all(self.pool())
        .await
        .map_err(map_sqlx_error)?;

        Ok(rows.into_iter().map(TagWithCount::from).collect())
    }
}
