use axum::Json;
use axum::extract::rejection::{FormRejection, JsonRejection, QueryRejection};
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::application::accounts::{AccountError, AuthError};
use crate::application::comments::CommentError;
use crate::application::error::ErrorReport;
use crate::application::pagination::PaginationError;
use crate::application::posts::PostError;
use crate::application::repos::RepoError;
use crate::application::sentiment::SentimentError;

#[derive(Debug, Serialize)]
pub struct ApiErrorBody {
    pub error: ApiErrorMessage,
}

pub mod codes {
    pub const UNAUTHENTICATED: &str = "unauthenticated";
    pub const FORBIDDEN: &str = "forbidden";
    pub const NOT_FOUND: &str = "not_found";
    pub const DUPLICATE: &str = "duplicate";
    pub const CONFLICT: &str = "conflict";
    pub const VALIDATION: &str = "validation_error";
    pub const BAD_REQUEST: &str = "bad_request";
    pub const DB_TIMEOUT: &str = "db_timeout";
    pub const UPSTREAM_UNAVAILABLE: &str = "upstream_unavailable";
    pub const INTERNAL: &str = "internal";
}

#[derive(Debug, Serialize)]
pub struct ApiErrorMessage {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

/// An error response with a stable `code`; `detail` only reaches the logs.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    code: &'static str,
    message: String,
    hint: Option<String>,
    detail: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
            hint: None,
            detail: None,
        }
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }

    fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    pub fn unauthenticated(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, codes::UNAUTHENTICATED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, codes::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, codes::NOT_FOUND, message)
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNPROCESSABLE_ENTITY, codes::VALIDATION, message)
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, codes::BAD_REQUEST, message)
    }

    pub fn internal(detail: impl Into<String>) -> Self {
        Self::new(
            StatusCode::INTERNAL_SERVER_ERROR,
            codes::INTERNAL,
            "Internal server error",
        )
        .with_detail(detail)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let report_message = format!(
            "{}: {}",
            self.code,
            self.detail.as_deref().unwrap_or(&self.message)
        );
        let body = ApiErrorBody {
            error: ApiErrorMessage {
                code: self.code.to_string(),
                message: self.message,
                hint: self.hint,
            },
        };
        let mut response = (self.status, Json(body)).into_response();
        if self.status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        ErrorReport::from_message("infra::http::api", self.status, report_message)
            .attach(&mut response);
        response
    }
}

impl From<RepoError> for ApiError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::NotFound => ApiError::not_found("Resource not found"),
            RepoError::Duplicate { constraint } => ApiError::new(
                StatusCode::CONFLICT,
                codes::CONFLICT,
                "Conflicting record already exists",
            )
            .with_hint("retry the request")
            .with_detail(constraint),
            RepoError::InvalidInput { message } => ApiError::validation(message),
            RepoError::Integrity { message, .. } => ApiError::new(
                StatusCode::CONFLICT,
                codes::CONFLICT,
                "Integrity constraint violated",
            )
            .with_detail(message),
            RepoError::Timeout => ApiError::new(
                StatusCode::SERVICE_UNAVAILABLE,
                codes::DB_TIMEOUT,
                "Database timeout",
            )
            .with_hint("retry the request"),
            RepoError::Pagination(err) => err.into(),
            RepoError::Persistence(message) => ApiError::internal(message),
        }
    }
}

impl From<PaginationError> for ApiError {
    fn from(err: PaginationError) -> Self {
        ApiError::validation(err.to_string())
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Repo(err) => err.into(),
            AuthError::MissingToken => ApiError::unauthenticated("Not authenticated"),
            other => {
                ApiError::unauthenticated("Could not validate credentials").with_detail(other.to_string())
            }
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Validation(message) => ApiError::validation(message),
            AccountError::DuplicateUsername => ApiError::new(
                StatusCode::BAD_REQUEST,
                codes::DUPLICATE,
                "Username already registered",
            ),
            AccountError::DuplicateEmail => ApiError::new(
                StatusCode::BAD_REQUEST,
                codes::DUPLICATE,
                "Email already registered",
            ),
            AccountError::InvalidCredentials => {
                ApiError::unauthenticated("Incorrect username or password")
            }
            AccountError::NotFound => ApiError::not_found("User not found"),
            AccountError::Repo(err) => err.into(),
            other => ApiError::internal(other.to_string()),
        }
    }
}

impl From<PostError> for ApiError {
    fn from(err: PostError) -> Self {
        match err {
            PostError::Validation(message) => ApiError::validation(message),
            PostError::Unauthenticated => ApiError::unauthenticated("Not authenticated"),
            PostError::Forbidden(action) => {
                ApiError::forbidden(format!("You are not allowed to {action}"))
            }
            PostError::NotFound => ApiError::not_found("Post not found"),
            PostError::AuthorNotFound => ApiError::not_found("User not found"),
            err @ PostError::Conflict { .. } => {
                ApiError::new(StatusCode::CONFLICT, codes::CONFLICT, err.to_string())
                    .with_hint("retry the request")
            }
            PostError::Repo(err) => err.into(),
        }
    }
}

impl From<CommentError> for ApiError {
    fn from(err: CommentError) -> Self {
        match err {
            CommentError::Validation(message) => ApiError::validation(message),
            CommentError::Unauthenticated => ApiError::unauthenticated("Not authenticated"),
            CommentError::Forbidden(action) => {
                ApiError::forbidden(format!("You are not allowed to {action}"))
            }
            CommentError::PostNotFound => ApiError::not_found("Post not found"),
            CommentError::NotFound => ApiError::not_found("Comment not found"),
            err @ CommentError::InvalidParent(_) => ApiError::bad_request(err.to_string()),
            CommentError::Repo(err) => err.into(),
        }
    }
}

impl From<SentimentError> for ApiError {
    fn from(err: SentimentError) -> Self {
        match err {
            SentimentError::EmptyText => ApiError::bad_request("Text must not be empty"),
            other => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                codes::UPSTREAM_UNAVAILABLE,
                "Sentiment analysis is unavailable",
            )
            .with_detail(other.to_string()),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        rejection_error(rejection.status(), rejection.body_text())
    }
}

impl From<FormRejection> for ApiError {
    fn from(rejection: FormRejection) -> Self {
        rejection_error(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::validation(rejection.body_text())
    }
}

fn rejection_error(status: StatusCode, text: String) -> ApiError {
    if status == StatusCode::UNPROCESSABLE_ENTITY {
        ApiError::validation(text)
    } else {
        ApiError::new(status, codes::BAD_REQUEST, text)
    }
}
