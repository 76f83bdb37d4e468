use std::io::ErrorKind;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::header::{CACHE_CONTROL, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use tracing::error;

use crate::infra::http::AppState;
use crate::infra::http::error::ApiError;
use crate::infra::uploads::UploadStorageError;

const SOURCE: &str = "scrivo::http::media";

/// `GET {public_prefix}/{*path}`
pub async fn serve_upload(State(state): State<AppState>, Path(path): Path<String>) -> Response {
    match state.uploads.read(&path).await {
        Ok(bytes) => build_upload_response(&path, bytes),
        Err(UploadStorageError::InvalidPath) => ApiError::not_found("Upload not found").into_response(),
        Err(UploadStorageError::Io(err)) if err.kind() == ErrorKind::NotFound => {
            ApiError::not_found("Upload not found").into_response()
        }
        Err(err) => {
            error!(
                target = SOURCE,
                path = %path,
                error = %err,
                "failed to read stored upload"
            );
            ApiError::internal(err.to_string()).into_response()
        }
    }
}

fn build_upload_response(path: &str, bytes: Bytes) -> Response {
    let length = bytes.len();
    let mut response = Response::new(Body::from(bytes));
    *response.status_mut() = StatusCode::OK;

    let headers = response.headers_mut();
    let mime = mime_guess::from_path(path).first_or_octet_stream();
    if let Ok(value) = HeaderValue::from_str(mime.as_ref()) {
        headers.insert(CONTENT_TYPE, value);
    }
    if let Ok(value) = HeaderValue::from_str(&length.to_string()) {
        headers.insert(CONTENT_LENGTH, value);
    }
    // File names are content hashes.
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("public, max-age=31536000, immutable"),
    );

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_response_guesses_mime_from_extension() {
        let response = build_upload_response("avatars/abc.png", Bytes::from_static(b"\x89PNG"));
        assert_eq!(response.headers()[CONTENT_TYPE], "image/png");
        assert_eq!(response.headers()[CONTENT_LENGTH], "4");

        let response = build_upload_response("avatars/abc", Bytes::from_static(b"x"));
        assert_eq!(response.headers()[CONTENT_TYPE], "application/octet-stream");
    }
}
