//! Bearer-token extractors backed by the authentication gate.
//!
//! Every protected request re-resolves its user, so a deactivated account is
//! locked out on its very next call.

use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};

use crate::application::accounts::AuthError;
use crate::domain::entities::UserRecord;
use crate::domain::policy::Actor;

use super::AppState;
use super::error::ApiError;
use super::middleware::RequestContext;

/// The authenticated caller; rejects the request with 401 when absent or invalid.
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRecord);

impl CurrentUser {
    pub fn actor(&self) -> Actor {
        Actor::User(self.0.id)
    }
}

/// The caller when a token is supplied; anonymous otherwise.
///
/// A token that is present but invalid is still rejected rather than silently
/// downgraded to anonymous.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<UserRecord>);

impl MaybeUser {
    pub fn actor(&self) -> Actor {
        self.0
            .as_ref()
            .map_or(Actor::Anonymous, |user| Actor::User(user.id))
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or(AuthError::MissingToken)?;
        let user = authenticate(parts, state, token).await?;
        Ok(Self(user))
    }
}

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match bearer_token(&parts.headers) {
            Some(token) => Ok(Self(Some(authenticate(parts, state, token).await?))),
            None => Ok(Self(None)),
        }
    }
}

async fn authenticate(
    parts: &Parts,
    state: &AppState,
    token: String,
) -> Result<UserRecord, ApiError> {
    let user = state.accounts.authenticate(&token).await?;
    if let Some(ctx) = parts.extensions.get::<RequestContext>() {
        ctx.record_user(user.id);
    }
    Ok(user)
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let raw = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = raw.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_string())
}
