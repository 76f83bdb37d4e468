//! Registration and login.

use axum::Json;
use axum::extract::{FromRequest, Multipart, Request, State};
use axum::extract::rejection::FormRejection;
use axum::http::header;
use axum::{Form, response::IntoResponse};

use crate::application::accounts::{AvatarUpload, Registration};
use crate::infra::http::AppState;
use crate::infra::http::error::ApiError;
use crate::infra::http::models::{LoginForm, RegisterForm, TokenResponse, UserView};

const AVATAR_FIELD: &str = "avatar";

/// `POST /api/register`: urlencoded or multipart form with an optional `avatar` file.
pub async fn register(
    State(state): State<AppState>,
    request: Request,
) -> Result<impl IntoResponse, ApiError> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("multipart/form-data"));

    let (registration, avatar) = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|err| ApiError::bad_request(err.body_text()))?;
        read_multipart_registration(multipart).await?
    } else {
        let Form(form) = Form::<RegisterForm>::from_request(request, &state)
            .await
            .map_err(ApiError::from)?;
        (registration_from(form), None)
    };

    let user = state.accounts.register(registration, avatar).await?;
    Ok(Json(UserView::from(user)))
}

/// `POST /api/login`
pub async fn login(
    State(state): State<AppState>,
    form: Result<Form<LoginForm>, FormRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Form(form) = form?;
    let token = state.accounts.login(&form.username, &form.password).await?;
    Ok(Json(TokenResponse::from(token)))
}

fn registration_from(form: RegisterForm) -> Registration {
    Registration {
        username: form.username,
        email: form.email,
        password: form.password,
    }
}

async fn read_multipart_registration(
    mut multipart: Multipart,
) -> Result<(Registration, Option<AvatarUpload>), ApiError> {
    let mut username = None;
    let mut email = None;
    let mut password = None;
    let mut avatar = None;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| ApiError::bad_request(format!("invalid multipart payload: {err}")))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if name == AVATAR_FIELD {
            let filename = field.file_name().map(str::to_string);
            let content_type = field.content_type().map(str::to_string);
            let bytes = field
                .bytes()
                .await
                .map_err(|err| ApiError::bad_request(format!("failed to read avatar: {err}")))?;
            avatar = Some(AvatarUpload {
                filename,
                content_type,
                bytes,
            });
            continue;
        }

        let value = field
            .text()
            .await
            .map_err(|err| ApiError::bad_request(format!("failed to read `{name}`: {err}")))?;
        match name.as_str() {
            "username" => username = Some(value),
            "email" => email = Some(value),
            "password" => password = Some(value),
            _ => {}
        }
    }

    let missing = |field: &str| ApiError::validation(format!("{field}: field required"));
    let form = RegisterForm {
        username: username.ok_or_else(|| missing("username"))?,
        email: email.ok_or_else(|| missing("email"))?,
        password: password.ok_or_else(|| missing("password"))?,
    };
    Ok((registration_from(form), avatar))
}
