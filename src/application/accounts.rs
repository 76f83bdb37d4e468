//! Registration, login and per-request authentication.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use thiserror::Error;
use tracing::{info, warn};
use validator::Validate;

use crate::application::pagination::PageRequest;
use crate::application::passwords::{PasswordError, hash_password, verify_password};
use crate::application::repos::{
    CreateUserParams, RepoError, USERS_EMAIL_CONSTRAINT, USERS_USERNAME_CONSTRAINT, UsersRepo,
    UsersWriteRepo,
};
use crate::application::tokens::{TokenError, TokenService};
use crate::application::validation;
use crate::domain::entities::UserRecord;

#[derive(Debug, Clone, Validate)]
pub struct Registration {
    #[validate(length(min = 3, max = 50, message = "must be between 3 and 50 characters"))]
    pub username: String,
    #[validate(email(message = "must be a valid email address"))]
    pub email: String,
    #[validate(length(min = 6, message = "must be at least 6 characters"))]
    pub password: String,
}

/// Raw avatar bytes as received from the client.
#[derive(Debug, Clone)]
pub struct AvatarUpload {
    pub filename: Option<String>,
    pub content_type: Option<String>,
    pub bytes: Bytes,
}

/// Blob storage for avatars; returns the public relative URL of the stored file.
#[async_trait]
pub trait AvatarStore: Send + Sync {
    async fn store_avatar(&self, upload: AvatarUpload) -> Result<String, AvatarStoreError>;
}

#[derive(Debug, Error)]
#[error("failed to store avatar: {0}")]
pub struct AvatarStoreError(pub String);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessToken {
    pub access_token: String,
    pub token_type: &'static str,
}

#[derive(Debug, Error)]
pub enum AccountError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("a user with this username already exists")]
    DuplicateUsername,
    #[error("a user with this email already exists")]
    DuplicateEmail,
    #[error("incorrect username or password")]
    InvalidCredentials,
    #[error("user not found")]
    NotFound,
    #[error(transparent)]
    Password(#[from] PasswordError),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Avatar(#[from] AvatarStoreError),
    #[error(transparent)]
    Repo(#[from] RepoError),
}

/// Failures of the authentication gate.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing bearer token")]
    MissingToken,
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("no active user matches the token subject")]
    UnknownSubject,
    #[error(transparent)]
    Repo(#[from] RepoError),
}

#[derive(Clone)]
pub struct AccountService {
    reader: Arc<dyn UsersRepo>,
    writer: Arc<dyn UsersWriteRepo>,
    avatars: Arc<dyn AvatarStore>,
    tokens: TokenService,
}

impl AccountService {
    pub fn new(
        reader: Arc<dyn UsersRepo>,
        writer: Arc<dyn UsersWriteRepo>,
        avatars: Arc<dyn AvatarStore>,
        tokens: TokenService,
    ) -> Self {
        Self {
            reader,
            writer,
            avatars,
            tokens,
        }
    }

    pub async fn register(
        &self,
        registration: Registration,
        avatar: Option<AvatarUpload>,
    ) -> Result<UserRecord, AccountError> {
        validation::check(&registration).map_err(AccountError::Validation)?;

        if self.reader.username_taken(&registration.username).await? {
            return Err(AccountError::DuplicateUsername);
        }
        if self.reader.email_taken(&registration.email).await? {
            return Err(AccountError::DuplicateEmail);
        }

        let hashed_password = hash_password(&registration.password)?;
        let avatar_url = match avatar {
            Some(upload) if !upload.bytes.is_empty() => {
                Some(self.avatars.store_avatar(upload).await?)
            }
            _ => None,
        };

        let user = self
            .writer
            .create_user(CreateUserParams {
                username: registration.username,
                email: registration.email,
                hashed_password,
                avatar_url,
            })
            .await
            .map_err(|err| match err {
                RepoError::Duplicate { constraint } if constraint == USERS_USERNAME_CONSTRAINT => {
                    AccountError::DuplicateUsername
                }
                RepoError::Duplicate { constraint } if constraint == USERS_EMAIL_CONSTRAINT => {
                    AccountError::DuplicateEmail
                }
                other => AccountError::Repo(other),
            })?;

        info!(
            target = "scrivo::application::accounts",
            user_id = user.id,
            username = %user.username,
            "user registered"
        );
        Ok(user)
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<AccessToken, AccountError> {
        let user = self.reader.find_active_by_username(username).await?;
        let Some(user) = user.filter(|user| verify_password(password, &user.hashed_password))
        else {
            warn!(
                target = "scrivo::application::accounts",
                username = %username,
                "rejected login attempt"
            );
            return Err(AccountError::InvalidCredentials);
        };

        Ok(AccessToken {
            access_token: self.tokens.issue(&user.username)?,
            token_type: "bearer",
        })
    }

    /// Resolve a bearer token to an active user. Runs on every protected request.
    pub async fn authenticate(&self, token: &str) -> Result<UserRecord, AuthError> {
        let subject = self.tokens.verify(token)?;
        self.reader
            .find_active_by_username(&subject)
            .await?
            .ok_or(AuthError::UnknownSubject)
    }

    pub async fn list_users(&self, page: PageRequest) -> Result<Vec<UserRecord>, AccountError> {
        Ok(self.reader.list_active(page).await?)
    }

    pub async fn find_user(&self, username: &str) -> Result<UserRecord, AccountError> {
        self.reader
            .find_active_by_username(username)
            .await?
            .ok_or(AccountError::NotFound)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use time::{Duration, OffsetDateTime};

    use super::*;

    #[derive(Default)]
    struct StubUsers {
        users: Mutex<Vec<UserRecord>>,
    }

    #[async_trait]
    impl UsersRepo for StubUsers {
        async fn find_active_by_username(
            &self,
            username: &str,
        ) -> Result<Option<UserRecord>, RepoError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .find(|user| user.username == username && user.is_active)
                .cloned())
        }

        async fn username_taken(&self, username: &str) -> Result<bool, RepoError> {
            Ok(self
                .users
                .lock()
                .unwrap()
                .iter()
                .any(|user| user.username == username))
        }

        async fn email_taken(&self, email: &str) -> Result<bool, RepoError> {
            Ok(self.users.lock().unwrap().iter().any(|user| user.email == email))
        }

        async fn list_active(&self, page: PageRequest) -> Result<Vec<UserRecord>, RepoError> {
            let active: Vec<_> = self
                .users
                .lock()
                .unwrap()
                .iter()
                .filter(|user| user.is_active)
                .cloned()
                .collect();
            Ok(page.slice(&active))
        }
    }

    #[async_trait]
    impl UsersWriteRepo for StubUsers {
        async fn create_user(&self, params: CreateUserParams) -> Result<UserRecord, RepoError> {
            let mut users = self.users.lock().unwrap();
            let user = UserRecord {
                id: users.len() as i64 + 1,
                username: params.username,
                email: params.email,
                hashed_password: params.hashed_password,
                is_active: true,
                date_joined: OffsetDateTime::now_utc(),
                avatar_url: params.avatar_url,
            };
            users.push(user.clone());
            Ok(user)
        }
    }

    struct FixedAvatarStore;

    #[async_trait]
    impl AvatarStore for FixedAvatarStore {
        async fn store_avatar(&self, _upload: AvatarUpload) -> Result<String, AvatarStoreError> {
            Ok("/media/avatars/fixed.png".to_string())
        }
    }

    fn service() -> (AccountService, Arc<StubUsers>) {
        let users = Arc::new(StubUsers::default());
        let service = AccountService::new(
            users.clone(),
            users.clone(),
            Arc::new(FixedAvatarStore),
            TokenService::new(b"secret", Duration::minutes(30)),
        );
        (service, users)
    }

    fn registration(username: &str, email: &str) -> Registration {
        Registration {
            username: username.into(),
            email: email.into(),
            password: "secret1".into(),
        }
    }

    #[tokio::test]
    async fn register_then_login_yields_token_for_same_user() {
        let (service, _) = service();
        let user = service
            .register(registration("alice", "a@x.com"), None)
            .await
            .expect("register");
        assert_ne!(user.hashed_password, "secret1");
        assert!(user.avatar_url.is_none());

        let token = service.login("alice", "secret1").await.expect("login");
        assert_eq!(token.token_type, "bearer");
        assert_eq!(
            service.tokens.verify(&token.access_token).expect("verify"),
            "alice"
        );
        let authenticated = service
            .authenticate(&token.access_token)
            .await
            .expect("authenticate");
        assert_eq!(authenticated.id, user.id);
    }

    #[tokio::test]
    async fn duplicate_username_or_email_is_rejected() {
        let (service, _) = service();
        service
            .register(registration("alice", "a@x.com"), None)
            .await
            .expect("register");

        let err = service
            .register(registration("alice", "other@x.com"), None)
            .await
            .expect_err("duplicate username");
        assert!(matches!(err, AccountError::DuplicateUsername));

        let err = service
            .register(registration("bob", "a@x.com"), None)
            .await
            .expect_err("duplicate email");
        assert!(matches!(err, AccountError::DuplicateEmail));
    }

    #[tokio::test]
    async fn registration_fields_are_validated() {
        let (service, _) = service();
        let err = service
            .register(
                Registration {
                    username: "al".into(),
                    email: "not-an-email".into(),
                    password: "123".into(),
                },
                None,
            )
            .await
            .expect_err("invalid");
        let AccountError::Validation(message) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert!(message.contains("username"));
        assert!(message.contains("email"));
        assert!(message.contains("password"));
    }

    #[tokio::test]
    async fn avatar_url_is_recorded() {
        let (service, _) = service();
        let user = service
            .register(
                registration("carol", "c@x.com"),
                Some(AvatarUpload {
                    filename: Some("me.png".into()),
                    content_type: Some("image/png".into()),
                    bytes: Bytes::from_static(b"png"),
                }),
            )
            .await
            .expect("register");
        assert_eq!(user.avatar_url.as_deref(), Some("/media/avatars/fixed.png"));
    }

    #[tokio::test]
    async fn wrong_password_and_inactive_users_cannot_log_in() {
        let (service, users) = service();
        service
            .register(registration("alice", "a@x.com"), None)
            .await
            .expect("register");

        assert!(matches!(
            service.login("alice", "wrong-pass").await,
            Err(AccountError::InvalidCredentials)
        ));

        let token = service.login("alice", "secret1").await.expect("login");
        users.users.lock().unwrap()[0].is_active = false;

        assert!(matches!(
            service.login("alice", "secret1").await,
            Err(AccountError::InvalidCredentials)
        ));
        assert!(matches!(
            service.authenticate(&token.access_token).await,
            Err(AuthError::UnknownSubject)
        ));
    }
}
