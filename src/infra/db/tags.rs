//! Storage half of tag resolution: find-or-create inside the caller's transaction.

use std::collections::{HashMap, HashSet};

use sqlx::PgConnection;

use crate::application::repos::RepoError;
use crate::domain::entities::TagRecord;
use crate::domain::tags::TagDraft;

use super::{escape_like, map_sqlx_error};

#[derive(sqlx::FromRow)]
struct PostTagRow {
    post_id: i64,
    id: i64,
    name: String,
    slug: String,
}

/// Resolve each draft to an existing tag or insert a new one with a fresh slug.
///
/// A concurrent insert of the same name is absorbed by `ON CONFLICT (name)`; a
/// concurrent claim of the chosen slug surfaces as a duplicate on `tags_slug_key`
/// and aborts the transaction so the caller can retry.
pub(super) async fn resolve_tags(
    conn: &mut PgConnection,
    drafts: &[TagDraft],
) -> Result<Vec<i64>, RepoError> {
    let mut ids = Vec::with_capacity(drafts.len());

    for draft in drafts {
        if let Some(id) = find_tag_id(conn, &draft.name).await? {
            ids.push(id);
            continue;
        }

        let taken: HashSet<String> = sqlx::query_scalar::<_, String>(
            "SELECT slug FROM tags WHERE slug = $1 OR slug LIKE $2 ESCAPE '\\'",
        )
        .bind(&draft.base_slug)
        .bind(format!("{}-%", escape_like(&draft.base_slug)))
        .fetch_all(&mut *conn)
        .await
        .map_err(map_sqlx_error)?
        .into_iter()
        .collect();

        let slug = draft
            .allocate_slug(|candidate| !taken.contains(candidate))
            .map_err(|err| RepoError::InvalidInput {
                message: format!("tag `{}`: {err}", draft.name),
            })?;

        let inserted = sqlx::query_scalar::<_, i64>(
            "INSERT INTO tags (name, slug) VALUES ($1, $2) \
             ON CONFLICT (name) DO NOTHING \
             RETURNING id",
        )
        .bind(&draft.name)
        .bind(&slug)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;

        let id = match inserted {
            Some(id) => id,
            None => find_tag_id(conn, &draft.name)
                .await?
                .ok_or(RepoError::NotFound)?,
        };
        ids.push(id);
    }

    Ok(ids)
}

/// Replace the tag set of a post.
pub(super) async fn link_tags(
    conn: &mut PgConnection,
    post_id: i64,
    tag_ids: &[i64],
) -> Result<(), RepoError> {
    sqlx::query("DELETE FROM post_tags WHERE post_id = $1")
        .bind(post_id)
        .execute(&mut *conn)
        .await
        .map_err(map_sqlx_error)?;

    if tag_ids.is_empty() {
        return Ok(());
    }

    sqlx::query(
        "INSERT INTO post_tags (post_id, tag_id) \
         SELECT $1, tag_id FROM UNNEST($2::BIGINT[]) AS tag_id \
         ON CONFLICT DO NOTHING",
    )
    .bind(post_id)
    .bind(tag_ids)
    .execute(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    Ok(())
}

/// Tags of each post in `post_ids`, ordered by name.
pub(super) async fn tags_for_posts(
    conn: &mut PgConnection,
    post_ids: &[i64],
) -> Result<HashMap<i64, Vec<TagRecord>>, RepoError> {
    let mut grouped: HashMap<i64, Vec<TagRecord>> = HashMap::new();
    if post_ids.is_empty() {
        return Ok(grouped);
    }

    let rows = sqlx::query_as::<_, PostTagRow>(
        "SELECT pt.post_id, t.id, t.name, t.slug \
         FROM post_tags pt \
         INNER JOIN tags t ON t.id = pt.tag_id \
         WHERE pt.post_id = ANY($1) \
         ORDER BY t.name ASC",
    )
    .bind(post_ids)
    .fetch_all(&mut *conn)
    .await
    .map_err(map_sqlx_error)?;

    for row in rows {
        grouped.entry(row.post_id).or_default().push(TagRecord {
            id: row.id,
            name: row.name,
            slug: row.slug,
        });
    }
    Ok(grouped)
}

async fn find_tag_id(conn: &mut PgConnection, name: &str) -> Result<Option<i64>, RepoError> {
    sqlx::query_scalar::<_, i64>("SELECT id FROM tags WHERE name = $1")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await
        .map_err(map_sqlx_error)
}
