//! Response cache middleware for the public post list.
//!
//! Serves cached `200 OK` responses for anonymous GET requests and stores fresh
//! ones on a miss. Requests that carry credentials always reach the handler.

use axum::{
    body::Body,
    extract::State,
    http::{HeaderValue, Method, Request, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use http_body_util::BodyExt;
use tracing::{debug, instrument, warn};

use super::{
    backend::CachedResponse,
    gate::CacheGate,
    keys::{CacheKey, Namespace},
};

/// Middleware for read-through caching of the post list.
#[instrument(skip_all, fields(path = %request.uri().path()))]
pub async fn post_list_cache(
    State(cache): State<CacheGate>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !cache.is_enabled()
        || request.method() != Method::GET
        || request.headers().contains_key(header::AUTHORIZATION)
    {
        return next.run(request).await;
    }

    let key = CacheKey::response(
        Namespace::Posts,
        request.uri().path(),
        request.uri().query().unwrap_or(""),
    );

    if let Some(cached) = cache.lookup(&key).await {
        return build_response(cached);
    }

    let generation = cache.generation(key.namespace);
    let response = next.run(request).await;
    if response.status() != StatusCode::OK {
        return response;
    }

    let (parts, body) = response.into_parts();
    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => {
            warn!(error = %err, "failed to buffer response for caching");
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };

    let cached = CachedResponse {
        status: parts.status.as_u16(),
        headers: parts
            .headers
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|s| (k.to_string(), s.to_string())))
            .collect(),
        body: bytes.clone(),
    };
    if cache.store_if_current(key, cached, generation).await {
        debug!(cache = "posts", "cached response");
    }

    Response::from_parts(parts, Body::from(bytes))
}

/// Build a response from cached data.
fn build_response(cached: CachedResponse) -> Response {
    let mut builder = Response::builder().status(cached.status);

    for (name, value) in cached.headers {
        if let Ok(header_value) = HeaderValue::from_str(&value) {
            builder = builder.header(name, header_value);
        }
    }

    builder
        .body(Body::from(cached.body))
        .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
}
