//! In-memory repositories and router helpers shared by the integration tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use http_body_util::BodyExt;
use serde_json::Value;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;
use tower::ServiceExt;

use scrivo::application::accounts::{AccountService, AvatarStore};
use scrivo::application::comments::CommentService;
use scrivo::application::pagination::PageRequest;
use scrivo::application::posts::PostService;
use scrivo::application::repos::{
    COMMENTS_PARENT_CONSTRAINT, CommentsRepo, CommentsWriteRepo, CreateCommentParams, CreatePostParams, CreateUserParams,
    PostListFilter, PostsRepo, PostsWriteRepo, RepoError, StatsRepo, USERS_EMAIL_CONSTRAINT,
    USERS_USERNAME_CONSTRAINT, UpdatePostParams, UsersRepo, UsersWriteRepo,
};
use scrivo::application::sentiment::{
    ClassifierError, ClassifierState, SentimentClassifier, SentimentService,
};
use scrivo::application::stats::StatsService;
use scrivo::application::tokens::TokenService;
use scrivo::cache::{CacheConfig, CacheGate};
use scrivo::domain::entities::{
    CommentDetail, CommentRecord, PostDetail, PostRecord, TagRecord, TagWithCount, UserRecord,
};
use scrivo::domain::slug::{derive_slug, generate_unique_slug_from_base};
use scrivo::domain::tags::TagDraft;
use scrivo::domain::types::PostStatus;
use scrivo::infra::http::{AppState, build_router};
use scrivo::infra::uploads::UploadStorage;

pub const SECRET: &[u8] = b"integration-test-secret";
pub const BODY: &str = "aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

#[derive(Default)]
struct Tables {
    users: Vec<UserRecord>,
    posts: Vec<PostRecord>,
    tags: Vec<TagRecord>,
    post_tags: Vec<(i64, i64)>,
    comments: Vec<CommentRecord>,
    next_id: i64,
}

impl Tables {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn detail(&self, post: &PostRecord) -> Result<PostDetail, RepoError> {
        let author = self
            .users
            .iter()
            .find(|user| user.id == post.author_id)
            .cloned()
            .ok_or_else(|| RepoError::Integrity {
                constraint: "posts_author_id_fkey".into(),
                message: format!("post {} has no author", post.id),
            })?;
        let mut tags: Vec<TagRecord> = self
            .post_tags
            .iter()
            .filter(|(post_id, _)| *post_id == post.id)
            .filter_map(|(_, tag_id)| self.tags.iter().find(|tag| tag.id == *tag_id).cloned())
            .collect();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(PostDetail {
            post: post.clone(),
            author,
            tags,
        })
    }

    fn resolve_tags(&mut self, drafts: &[TagDraft]) -> Result<Vec<i64>, RepoError> {
        let mut ids = Vec::with_capacity(drafts.len());
        for draft in drafts {
            if let Some(tag) = self.tags.iter().find(|tag| tag.name == draft.name) {
                ids.push(tag.id);
                continue;
            }
            let taken: HashSet<&str> = self.tags.iter().map(|tag| tag.slug.as_str()).collect();
            let slug = draft
                .allocate_slug(|candidate| !taken.contains(candidate))
                .map_err(|err| RepoError::InvalidInput {
                    message: format!("tags: {err}"),
                })?;
            let id = self.next_id();
            self.tags.push(TagRecord {
                id,
                name: draft.name.clone(),
                slug,
            });
            ids.push(id);
        }
        Ok(ids)
    }

    fn link_tags(&mut self, post_id: i64, tag_ids: &[i64]) {
        self.post_tags.retain(|(id, _)| *id != post_id);
        self.post_tags
            .extend(tag_ids.iter().map(|tag_id| (post_id, *tag_id)));
    }

    fn published_count(&self, tag_id: i64) -> i64 {
        self.post_tags
            .iter()
            .filter(|(_, id)| *id == tag_id)
            .filter(|(post_id, _)| {
                self.posts
                    .iter()
                    .any(|post| post.id == *post_id && post.status.is_published())
            })
            .count() as i64
    }

    fn ranked_tags(&self) -> Vec<TagWithCount> {
        let mut ranked: Vec<TagWithCount> = self
            .tags
            .iter()
            .map(|tag| TagWithCount {
                name: tag.name.clone(),
                slug: tag.slug.clone(),
                count: self.published_count(tag.id),
            })
            .collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        ranked
    }

    fn comment_detail(&self, comment: &CommentRecord) -> Result<CommentDetail, RepoError> {
        let author = self
            .users
            .iter()
            .find(|user| user.id == comment.author_id)
            .cloned()
            .ok_or(RepoError::NotFound)?;
        Ok(CommentDetail {
            comment: comment.clone(),
            author,
        })
    }
}

/// Every repository trait over one set of in-memory tables.
#[derive(Default)]
pub struct MemoryRepos {
    tables: Mutex<Tables>,
}

impl MemoryRepos {
    pub async fn deactivate(&self, username: &str) {
        let mut tables = self.tables.lock().await;
        if let Some(user) = tables.users.iter_mut().find(|user| user.username == username) {
            user.is_active = false;
        }
    }

    pub async fn comment(&self, id: i64) -> Option<CommentRecord> {
        let tables = self.tables.lock().await;
        tables.comments.iter().find(|comment| comment.id == id).cloned()
    }
}

#[async_trait]
impl UsersRepo for MemoryRepos {
    async fn find_active_by_username(
        &self,
        username: &str,
    ) -> Result<Option<UserRecord>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .iter()
            .find(|user| user.username == username && user.is_active)
            .cloned())
    }

    async fn username_taken(&self, username: &str) -> Result<bool, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().any(|user| user.username == username))
    }

    async fn email_taken(&self, email: &str) -> Result<bool, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables.users.iter().any(|user| user.email == email))
    }

    async fn list_active(&self, page: PageRequest) -> Result<Vec<UserRecord>, RepoError> {
        let tables = self.tables.lock().await;
        let active: Vec<UserRecord> = tables
            .users
            .iter()
            .filter(|user| user.is_active)
            .cloned()
            .collect();
        Ok(page.slice(&active))
    }
}

#[async_trait]
impl UsersWriteRepo for MemoryRepos {
    async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
        let mut tables = self.tables.lock().await;
        if tables.users.iter().any(|user| user.username == params.username) {
            return Err(RepoError::Duplicate {
                constraint: USERS_USERNAME_CONSTRAINT.to_string(),
            });
        }
        if tables.users.iter().any(|user| user.email == params.email) {
            return Err(RepoError::Duplicate {
                constraint: USERS_EMAIL_CONSTRAINT.to_string(),
            });
        }
        let user = UserRecord {
            id: tables.next_id(),
            username: params.username,
            email: params.email,
            hashed_password: params.hashed_password,
            is_active: true,
            date_joined: OffsetDateTime::now_utc(),
            avatar_url: params.avatar_url,
        };
        tables.users.push(user.clone());
        Ok(user)
    }
}

#[async_trait]
impl PostsRepo for MemoryRepos {
    async fn list_published(
        &self,
        filter: &PostListFilter,
        page: PageRequest,
    ) -> Result<Vec<PostDetail>, RepoError> {
        let tables = self.tables.lock().await;
        let mut matching = Vec::new();
        for post in tables.posts.iter().filter(|post| post.status.is_published()) {
            let detail = tables.detail(post)?;
            if filter
                .author
                .as_ref()
                .is_some_and(|author| *author != detail.author.username)
            {
                continue;
            }
            if filter
                .tag
                .as_ref()
                .is_some_and(|tag| !detail.tags.iter().any(|t| t.slug == *tag))
            {
                continue;
            }
            matching.push(detail);
        }
        Ok(page.slice(&matching))
    }

    async fn search_published(
        &self,
        query: Option<&str>,
        page: PageRequest,
    ) -> Result<Vec<PostDetail>, RepoError> {
        let tables = self.tables.lock().await;
        let needle = query.map(str::to_lowercase);
        let matching = tables
            .posts
            .iter()
            .filter(|post| post.status.is_published())
            .filter(|post| {
                needle.as_ref().is_none_or(|needle| {
                    post.title.to_lowercase().contains(needle.as_str())
                        || post.content.to_lowercase().contains(needle.as_str())
                })
            })
            .map(|post| tables.detail(post))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(page.slice(&matching))
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<PostDetail>, RepoError> {
        let tables = self.tables.lock().await;
        tables
            .posts
            .iter()
            .find(|post| post.slug == slug)
            .map(|post| tables.detail(post))
            .transpose()
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<PostDetail>, RepoError> {
        let tables = self.tables.lock().await;
        tables
            .posts
            .iter()
            .find(|post| post.id == id)
            .map(|post| tables.detail(post))
            .transpose()
    }

    async fn record_view(&self, post_id: i64) -> Result<i64, RepoError> {
        let mut tables = self.tables.lock().await;
        let post = tables
            .posts
            .iter_mut()
            .find(|post| post.id == post_id)
            .ok_or(RepoError::NotFound)?;
        post.view_count += 1;
        Ok(post.view_count)
    }
}

#[async_trait]
impl PostsWriteRepo for MemoryRepos {
    async fn create_post(&self, params: CreatePostParams) -> Result<PostDetail, RepoError> {
        let mut tables = self.tables.lock().await;
        let invalid_title = |err: scrivo::domain::slug::SlugError| RepoError::InvalidInput {
            message: format!("title: {err}"),
        };
        let base = derive_slug(&params.title).map_err(invalid_title)?;
        let slug = {
            let taken: HashSet<&str> = tables.posts.iter().map(|post| post.slug.as_str()).collect();
            generate_unique_slug_from_base(&base, |candidate| !taken.contains(candidate))
                .map_err(invalid_title)?
        };

        let now = OffsetDateTime::now_utc();
        let post = PostRecord {
            id: tables.next_id(),
            title: params.title,
            slug,
            content: params.content,
            status: params.status,
            view_count: 0,
            created_at: now,
            updated_at: now,
            author_id: params.author_id,
        };
        let tag_ids = tables.resolve_tags(&params.tags)?;
        tables.link_tags(post.id, &tag_ids);
        tables.posts.push(post.clone());
        tables.detail(&post)
    }

    async fn update_post(&self, params: UpdatePostParams) -> Result<PostDetail, RepoError> {
        let mut tables = self.tables.lock().await;
        let tag_ids = params
            .tags
            .as_deref()
            .map(|drafts| tables.resolve_tags(drafts))
            .transpose()?;
        let post = tables
            .posts
            .iter_mut()
            .find(|post| post.id == params.id)
            .ok_or(RepoError::NotFound)?;
        if let Some(title) = params.title {
            post.title = title;
        }
        if let Some(content) = params.content {
            post.content = content;
        }
        if let Some(status) = params.status {
            post.status = status;
        }
        post.updated_at = OffsetDateTime::now_utc();
        let post = post.clone();
        if let Some(tag_ids) = tag_ids {
            tables.link_tags(post.id, &tag_ids);
        }
        tables.detail(&post)
    }

    async fn delete_post(&self, id: i64) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        let before = tables.posts.len();
        tables.posts.retain(|post| post.id != id);
        if tables.posts.len() == before {
            return Err(RepoError::NotFound);
        }
        tables.post_tags.retain(|(post_id, _)| *post_id != id);
        tables.comments.retain(|comment| comment.post_id != id);
        Ok(())
    }
}

#[async_trait]
impl CommentsRepo for MemoryRepos {
    async fn list_for_post(
        &self,
        post_id: i64,
        page: PageRequest,
    ) -> Result<Vec<CommentDetail>, RepoError> {
        let tables = self.tables.lock().await;
        let comments = tables
            .comments
            .iter()
            .filter(|comment| comment.post_id == post_id)
            .map(|comment| tables.comment_detail(comment))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(page.slice(&comments))
    }

    async fn find_by_id(&self, id: i64) -> Result<Option<CommentRecord>, RepoError> {
        Ok(self.comment(id).await)
    }
}

#[async_trait]
impl CommentsWriteRepo for MemoryRepos {
    async fn create_comment(
        &self,
        params: CreateCommentParams,
    ) -> Result<CommentDetail, RepoError> {
        let mut tables = self.tables.lock().await;
        if let Some(parent_id) = params.parent_id {
            if !tables.comments.iter().any(|comment| comment.id == parent_id) {
                return Err(RepoError::Integrity {
                    constraint: COMMENTS_PARENT_CONSTRAINT.into(),
                    message: format!("parent comment {parent_id} does not exist"),
                });
            }
        }
        let comment = CommentRecord {
            id: tables.next_id(),
            post_id: params.post_id,
            author_id: params.author_id,
            text: params.text,
            created_at: OffsetDateTime::now_utc(),
            parent_id: params.parent_id,
        };
        tables.comments.push(comment.clone());
        tables.comment_detail(&comment)
    }

    async fn delete_comment(&self, id: i64) -> Result<(), RepoError> {
        let mut tables = self.tables.lock().await;
        let before = tables.comments.len();
        tables.comments.retain(|comment| comment.id != id);
        if tables.comments.len() == before {
            return Err(RepoError::NotFound);
        }
        for reply in tables
            .comments
            .iter_mut()
            .filter(|comment| comment.parent_id == Some(id))
        {
            reply.parent_id = None;
        }
        Ok(())
    }
}

#[async_trait]
impl StatsRepo for MemoryRepos {
    async fn count_published_posts(&self) -> Result<i64, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .posts
            .iter()
            .filter(|post| post.status == PostStatus::Published)
            .count() as i64)
    }

    async fn count_comments(&self) -> Result<i64, RepoError> {
        Ok(self.tables.lock().await.comments.len() as i64)
    }

    async fn popular_tags(&self, limit: i64) -> Result<Vec<TagWithCount>, RepoError> {
        let tables = self.tables.lock().await;
        Ok(tables
            .ranked_tags()
            .into_iter()
            .filter(|tag| tag.count > 0)
            .take(usize::try_from(limit).unwrap_or(0))
            .collect())
    }

    async fn tag_cloud(&self) -> Result<Vec<TagWithCount>, RepoError> {
        Ok(self.tables.lock().await.ranked_tags())
    }
}

/// Scores texts containing "good" as positive and everything else as negative.
pub struct KeywordClassifier;

#[async_trait]
impl SentimentClassifier for KeywordClassifier {
    async fn score(&self, text: &str) -> Result<f64, ClassifierError> {
        Ok(if text.contains("good") { 0.9 } else { 0.1 })
    }
}

pub struct TestApp {
    pub router: Router,
    pub repos: Arc<MemoryRepos>,
    pub cache: CacheGate,
    pub tokens: TokenService,
    _media: tempfile::TempDir,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_classifier(ClassifierState::Ready(Arc::new(KeywordClassifier)))
    }

    pub fn with_classifier(classifier: ClassifierState) -> Self {
        let media = tempfile::tempdir().expect("tempdir");
        let repos = Arc::new(MemoryRepos::default());
        let cache = CacheGate::in_memory(CacheConfig::default());
        let tokens = TokenService::new(SECRET, Duration::minutes(30));
        let state = app_state(repos.clone(), cache.clone(), tokens.clone(), media.path(), classifier);
        Self {
            router: build_router(state),
            repos,
            cache,
            tokens,
            _media: media,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("router response");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("response body")
            .to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or_else(|_| {
                Value::String(String::from_utf8_lossy(&bytes).into_owned())
            })
        };
        (status, value)
    }

    pub async fn register(&self, username: &str, email: &str, password: &str) -> (StatusCode, Value) {
        self.send(form(
            "/api/register",
            &format!("username={username}&email={email}&password={password}"),
        ))
        .await
    }

    pub async fn login(&self, username: &str, password: &str) -> (StatusCode, Value) {
        self.send(form(
            "/api/login",
            &format!("username={username}&password={password}"),
        ))
        .await
    }

    /// Register and log in, returning the bearer token.
    pub async fn user(&self, username: &str) -> String {
        let (status, body) = self
            .register(username, &format!("{username}%40x.com"), "secret1")
            .await;
        assert_eq!(status, StatusCode::OK, "register {username}: {body}");
        let (status, body) = self.login(username, "secret1").await;
        assert_eq!(status, StatusCode::OK, "login {username}: {body}");
        body["access_token"]
            .as_str()
            .expect("access token")
            .to_string()
    }

    pub async fn create_post(
        &self,
        token: &str,
        title: &str,
        status: &str,
        tags: &[&str],
    ) -> (StatusCode, Value) {
        let payload = serde_json::json!({
            "title": title,
            "content": BODY,
            "status": status,
            "tags": tags,
        });
        self.send(json(
            "POST",
            "/api/posts/",
            Some(token),
            payload,
        ))
        .await
    }
}

fn app_state(
    repos: Arc<MemoryRepos>,
    cache: CacheGate,
    tokens: TokenService,
    media: &Path,
    classifier: ClassifierState,
) -> AppState {
    let uploads = Arc::new(UploadStorage::new(media.to_path_buf(), "/media").expect("upload storage"));
    let avatars: Arc<dyn AvatarStore> = uploads.clone();
    AppState {
        accounts: AccountService::new(repos.clone(), repos.clone(), avatars, tokens),
        posts: PostService::new(repos.clone(), repos.clone(), repos.clone(), cache.clone()),
        comments: CommentService::new(repos.clone(), repos.clone(), repos.clone()),
        stats: StatsService::new(repos),
        sentiment: SentimentService::new(classifier),
        uploads,
        cache,
        max_request_bytes: 1024 * 1024,
    }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    with_token(Request::builder().method("GET").uri(uri), token)
        .body(Body::empty())
        .expect("request")
}

pub fn delete(uri: &str, token: Option<&str>) -> Request<Body> {
    with_token(Request::builder().method("DELETE").uri(uri), token)
        .body(Body::empty())
        .expect("request")
}

pub fn json(method: &str, uri: &str, token: Option<&str>, payload: Value) -> Request<Body> {
    with_token(Request::builder().method(method).uri(uri), token)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(payload.to_string()))
        .expect("request")
}

pub fn form(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_string()))
        .expect("request")
}

fn with_token(
    builder: axum::http::request::Builder,
    token: Option<&str>,
) -> axum::http::request::Builder {
    match token {
        Some(token) => builder.header(header::AUTHORIZATION, format!("Bearer {token}")),
        None => builder,
    }
}
