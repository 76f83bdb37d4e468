//! Repository behaviour against a real Postgres. Needs `DATABASE_URL`.

use std::sync::Arc;

use sqlx::PgPool;

use scrivo::application::pagination::PageRequest;
use scrivo::application::repos::{
    CommentsRepo, CommentsWriteRepo, CreateCommentParams, CreatePostParams, CreateUserParams,
    PostListFilter, PostsRepo, PostsWriteRepo, RepoError, StatsRepo, UpdatePostParams,
    UsersWriteRepo,
};
use scrivo::domain::tags::normalize_tag_names;
use scrivo::domain::types::PostStatus;
use scrivo::infra::db::PostgresRepositories;

const BODY: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

async fn author(repos: &PostgresRepositories, username: &str) -> i64 {
    repos
        .create_user(CreateUserParams {
            username: username.to_string(),
            email: format!("{username}@x.com"),
            hashed_password: "digest".to_string(),
            avatar_url: None,
        })
        .await
        .expect("create user")
        .id
}

fn post(author_id: i64, title: &str, tags: &[&str]) -> CreatePostParams {
    CreatePostParams {
        author_id,
        title: title.to_string(),
        content: BODY.to_string(),
        status: PostStatus::Published,
        tags: normalize_tag_names(tags.iter().map(|tag| Some(*tag))).expect("tags"),
    }
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn same_titles_get_suffixed_slugs(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let alice = author(&repos, "alice").await;

    let first = repos.create_post(post(alice, "Hello World", &[])).await.unwrap();
    let second = repos.create_post(post(alice, "Hello World", &[])).await.unwrap();
    let third = repos.create_post(post(alice, "Hello   World!", &[])).await.unwrap();
    assert_eq!(first.post.slug, "hello-world");
    assert_eq!(second.post.slug, "hello-world-1");
    assert_eq!(third.post.slug, "hello-world-2");
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn duplicate_username_maps_to_constraint(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    author(&repos, "alice").await;
    let err = repos
        .create_user(CreateUserParams {
            username: "alice".into(),
            email: "other@x.com".into(),
            hashed_password: "digest".into(),
            avatar_url: None,
        })
        .await
        .unwrap_err();
    assert!(
        matches!(err, RepoError::Duplicate { ref constraint } if constraint == "users_username_key"),
        "{err:?}"
    );
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn tags_are_shared_between_posts(pool: PgPool) {
    let repos = PostgresRepositories::new(pool.clone());
    let alice = author(&repos, "alice").await;

    let first = repos.create_post(post(alice, "First Post", &["rust"])).await.unwrap();
    let second = repos
        .create_post(post(alice, "Second Post", &["rust", "基线"]))
        .await
        .unwrap();
    assert_eq!(first.tags[0].id, second.tags[0].id);
    assert_eq!(second.tags[1].slug, "ji-xian");

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tags WHERE name = 'rust'")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);

    let updated = repos
        .update_post(UpdatePostParams {
            id: first.post.id,
            title: None,
            content: None,
            status: None,
            tags: Some(Vec::new()),
        })
        .await
        .unwrap();
    assert!(updated.tags.is_empty());
    assert_eq!(updated.post.slug, "first-post");

    let cloud = repos.tag_cloud().await.unwrap();
    assert_eq!(cloud.len(), 2);
    assert!(cloud.iter().all(|tag| tag.count == 1));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn list_filters_and_search_escape_wildcards(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let alice = author(&repos, "alice").await;
    let bob = author(&repos, "bob").await;
    repos.create_post(post(alice, "100% Rust", &["rust"])).await.unwrap();
    repos.create_post(post(bob, "Plain Title", &["web"])).await.unwrap();
    let mut draft = post(bob, "Draft Title", &["web"]);
    draft.status = PostStatus::Draft;
    repos.create_post(draft).await.unwrap();

    let page = PageRequest::new(1, 10).unwrap();
    let by_tag = repos
        .list_published(
            &PostListFilter {
                author: None,
                tag: Some("web".into()),
            },
            page,
        )
        .await
        .unwrap();
    assert_eq!(by_tag.len(), 1);
    assert_eq!(by_tag[0].author.username, "bob");

    let literal = repos.search_published(Some("%"), page).await.unwrap();
    assert_eq!(literal.len(), 1);
    assert_eq!(literal[0].post.title, "100% Rust");

    let all = repos.search_published(None, page).await.unwrap();
    assert_eq!(all.len(), 2);
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn concurrent_views_are_not_lost(pool: PgPool) {
    let repos = Arc::new(PostgresRepositories::new(pool));
    let alice = author(&repos, "alice").await;
    let created = repos.create_post(post(alice, "Popular", &[])).await.unwrap();

    let handles: Vec<_> = (0..25)
        .map(|_| {
            let repos = repos.clone();
            let id = created.post.id;
            tokio::spawn(async move { repos.record_view(id).await })
        })
        .collect();
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let post = PostsRepo::find_by_id(repos.as_ref(), created.post.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(post.post.view_count, 25);
    assert!(matches!(repos.record_view(-1).await, Err(RepoError::NotFound)));
}

#[sqlx::test(migrations = "./migrations")]
#[ignore = "requires DATABASE_URL"]
async fn deleting_a_parent_comment_orphans_replies(pool: PgPool) {
    let repos = PostgresRepositories::new(pool);
    let alice = author(&repos, "alice").await;
    let created = repos.create_post(post(alice, "Discussed", &[])).await.unwrap();

    let comment = |parent_id| CreateCommentParams {
        post_id: created.post.id,
        author_id: alice,
        text: "hello".into(),
        parent_id,
    };
    let parent = repos.create_comment(comment(None)).await.unwrap();
    let reply = repos
        .create_comment(comment(Some(parent.comment.id)))
        .await
        .unwrap();

    repos.delete_comment(parent.comment.id).await.unwrap();
    let orphan = CommentsRepo::find_by_id(&repos, reply.comment.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(orphan.parent_id, None);
    assert!(matches!(
        repos.delete_comment(parent.comment.id).await,
        Err(RepoError::NotFound)
    ));

    let late_reply = repos
        .create_comment(comment(Some(parent.comment.id)))
        .await
        .unwrap_err();
    assert!(late_reply.is_missing_parent(), "{late_reply:?}");

    repos.delete_post(created.post.id).await.unwrap();
    assert_eq!(repos.count_comments().await.unwrap(), 0);
}
