use std::collections::HashSet;

use async_trait::async_trait;
use sqlx::{PgConnection, Postgres, QueryBuilder};
use time::OffsetDateTime;

use crate::application::pagination::PageRequest;
use crate::application::repos::{
    CreatePostParams, PostListFilter, PostsRepo, PostsWriteRepo, RepoError, UpdatePostParams,
};
use crate::domain::entities::{PostDetail, PostRecord, UserRecord};
use crate::domain::slug::{derive_slug, generate_unique_slug_from_base};
use crate::domain::types::PostStatus;

use super::tags::{link_tags, resolve_tags, tags_for_posts};
use super::{PostgresRepositories, escape_like, map_sqlx_error};

const POST_DETAIL_SELECT: &str = "SELECT p.id, p.title, p.slug, p.content, p.status, \
        p.view_count, p.created_at, p.updated_at, p.author_id, \
        u.username AS author_username, u.email AS author_email, \
        u.hashed_password AS author_hashed_password, u.is_active AS author_is_active, \
        u.date_joined AS author_date_joined, u.avatar_url AS author_avatar_url \
    FROM posts p \
    INNER JOIN users u ON u.id = p.author_id";

#[derive(sqlx::FromRow)]
struct PostDetailRow {
    id: i64,
    title: String,
    slug: String,
    content: String,
    status: PostStatus,
    view_count: i64,
    created_at: OffsetDateTime,
    updated_at: OffsetDateTime,
    author_id: i64,
    author_username: String,
    author_email: String,
    author_hashed_password: String,
    author_is_active: bool,
    author_date_joined: OffsetDateTime,
    author_avatar_url: Option<String>,
}

impl From<PostDetailRow> for PostDetail {
    fn from(row: PostDetailRow) -> Self {
        Self {
            post: PostRecord {
                id: row.id,
                title: row.title,
                slug: row.slug,
                content: row.content,
                status: row.status,
                view_count: row.view_count,
                created_at: row.created_at,
                updated_at: row.updated_at,
                author_id: row.author_id,
            },
            author: UserRecord {
                id: row.author_id,
                username: row.author_username,
                email: row.author_email,
                hashed_password: row.author_hashed_password,
                is_active: row.author_is_active,
                date_joined: row.author_date_joined,
                avatar_url: row.author_avatar_url,
            },
            tags: Vec::new(),
        }
    }
}

impl PostgresRepositories {
    async fn fetch_details(
        &self,
        mut qb: QueryBuilder<'_, Postgres>,
    ) -> Result<Vec<PostDetail>, RepoError> {
        let mut conn = self.pool().acquire().await.map_err(map_sqlx_error)?;

        let rows = qb
            .build_query_as::<PostDetailRow>()
            .fetch_all(&mut *conn)
            .await
            .map_err(map_sqlx_error)?;

        let ids: Vec<i64> = rows.iter().map(|row| row.id).collect();
        let mut tags = tags_for_posts(&mut conn, &ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let mut detail = PostDetail::from(row);
                detail.tags = tags.remove(&detail.post.id).unwrap_or_default();
                detail
            })
            .collect())
    }

    async fn fetch_one_detail(
        &self,
        column: &'static str,
        value: impl sqlx::Encode<'static, Postgres> + sqlx::Type<Postgres> + Send + 'static,
    ) -> Result<Option<PostDetail>, RepoError> {
        let mut qb = QueryBuilder::new(POST_DETAIL_SELECT);
        qb.push(" WHERE p.");
        qb.push(column);
        qb.push(" = ");
        qb.push_bind(value);
        Ok(self.fetch_details(qb).await?.into_iter().next())
    }
}

fn push_published_page(qb: &mut QueryBuilder<'_, Postgres>, page: PageRequest) {
    qb.push(" ORDER BY p.id ASC LIMIT ");
    qb.push_bind(page.limit());
    qb.push(" OFFSET ");
    qb.push_bind(page.offset());
}

fn published_query() -> QueryBuilder<'static, Postgres> {
    let mut qb = QueryBuilder::new(POST_DETAIL_SELECT);
    qb.push(" WHERE p.status = ");
    qb.push_bind(PostStatus::Published);
    qb
}

#[async_trait]
impl PostsRepo for PostgresRepositories {
    async fn list_published(
        &self,
        filter: &PostListFilter,
        page: PageRequest,
    ) -> Result<Vec<PostDetail>, RepoError> {
        let mut qb = published_query();

        if let Some(author) = filter.author.clone() {
            qb.push(" AND u.username = ");
            qb.push_bind(author);
        }

        if let Some(tag) = filter.tag.clone() {
            qb.push(
                " AND EXISTS (SELECT 1 FROM post_tags pt INNER JOIN tags t ON t.id = pt.tag_id \
                 WHERE pt.post_id = p.id AND t.slug = ",
            );
            qb.push_bind(tag);
            qb.push(")");
        }

        push_published_page(&mut qb, page);
        self.fetch_details(qb).await
    }

    async fn search_published(
        &self,
        query: Option<&str>,
        page: PageRequest,
    ) -> Result<Vec<PostDetail>, RepoError> {
        let mut qb = published_query();

        if let Some(query) = query {
            let pattern = format!("%{}%", escape_like(query));
            qb.push(" AND (p.title ILIKE ");
            qb.push_bind(pattern.clone());
            qb.push(" ESCAPE '\\' OR p.content ILIKE ");
            qb.push_bind(pattern);
            qb.push(" ESCAPE '\\')");
        }

        push_published_page(&mut qb, page);
        self.fetch_details(qb).await
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostDetail>, RepoError> {
        self.fetch_one_detail("slug", slug.to_string()).await
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<PostDetail>, RepoError> {
        self.fetch_one_detail("id", id).await
    }

    async fn record_view(&self, post_id: i64) -> Result<i64, RepoError> {
        sqlx::query_scalar::<_, i64>(
            "UPDATE posts SET view_count = view_count + 1 WHERE id = $1 RETURNING view_count",
        )
        .bind(post_id)
        .fetch_optional(self.pool())
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)
    }
}

#[async_trait]
impl PostsWriteRepo for PostgresRepositories {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostDetail, RepoError> {
        let CreatePostParams {
            author_id,
            title,
            content,
            status,
            tags,
        } = params;

        let base = derive_slug(&title).map_err(|err| RepoError::InvalidInput {
            message: format!("title: {err}"),
        })?;

        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        let slug = allocate_post_slug(&mut tx, &base).await?;
        let id = sqlx::query_scalar::<_, i64>(
            "INSERT INTO posts (title, slug, content, status, author_id) \
             VALUES ($1, $2, $3, $4, $5) \
             RETURNING id",
        )
        .bind(&title)
        .bind(&slug)
        .bind(&content)
        .bind(status)
        .bind(author_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_sqlx_error)?;

        let tag_ids = resolve_tags(&mut tx, &tags).await?;
        link_tags(&mut tx, id, &tag_ids).await?;

        tx.commit().await.map_err(map_sqlx_error)?;

        self.find_by_id(id).await?.ok_or(RepoError::NotFound)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostDetail, RepoError> {
        let UpdatePostParams {
            id,
            title,
            content,
            status,
            tags,
        } = params;

        let mut tx = self.begin().await.map_err(map_sqlx_error)?;

        sqlx::query_scalar::<_, i64>(
            "UPDATE posts \
             SET title = COALESCE($2, title), \
                 content = COALESCE($3, content), \
                 status = COALESCE($4, status), \
                 updated_at = now() \
             WHERE id = $1 \
             RETURNING id",
        )
        .bind(id)
        .bind(title)
        .bind(content)
        .bind(status)
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_sqlx_error)?
        .ok_or(RepoError::NotFound)?;

        if let Some(tags) = tags {
            let tag_ids = resolve_tags(&mut tx, &tags).await?;
            link_tags(&mut tx, id, &tag_ids).await?;
        }

        tx.commit().await.map_err(map_sqlx_error)?;

        self.find_by_id(id).await?.ok_or(RepoError::NotFound)
    }

    async fn delete_post(&self, id: i64) -> Result<(), RepoError> {
        let result = sqlx::query("DELETE FROM posts WHERE id = $1")
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

/// Pick the first free slug among `base`, `base-1`, `base-2`, … as seen by this transaction.
async fn allocate_post_slug(conn: &mut PgConnection, base: &str) -> Result<String, RepoError> {
    let taken: HashSet<String> = sqlx::query_scalar::<_, String>(
        "SELECT slug FROM posts WHERE slug = $1 OR slug LIKE $2 ESCAPE '\\'",
    )
    .bind(base)
    .bind(format!("{}-%", escape_like(base)))
    .fetch_all(&mut *conn)
    .await
    .map_err(map_sqlx_error)?
    .into_iter()
    .collect();

    generate_unique_slug_from_base(base, |candidate| !taken.contains(candidate)).map_err(|err| {
        RepoError::InvalidInput {
            message: format!("title: {err}"),
        }
    })
}
