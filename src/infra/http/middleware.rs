use std::sync::{Arc, OnceLock};
use std::time::Instant;

use axum::{body::Body, http::Request, middleware::Next, response::Response};
use tracing::{error, warn};
use uuid::Uuid;

use crate::application::error::ErrorReport;

/// Per-request diagnostics shared between middleware and extractors.
#[derive(Clone, Debug)]
pub struct RequestContext {
    pub request_id: String,
    user_id: Arc<OnceLock<i64>>,
}

impl RequestContext {
    pub fn new() -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            user_id: Arc::new(OnceLock::new()),
        }
    }

    /// Remember which user the request authenticated as.
    pub fn record_user(&self, user_id: i64) {
        let _ = self.user_id.set(user_id);
    }

    pub fn user_id(&self) -> Option<i64> {
        self.user_id.get().copied()
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn set_request_context(mut request: Request<Body>, next: Next) -> Response {
    let ctx = RequestContext::new();
    request.extensions_mut().insert(ctx.clone());

    let mut response = next.run(request).await;
    response.extensions_mut().insert(ctx);
    response
}

pub async fn log_responses(request: Request<Body>, next: Next) -> Response {
    let method = request.method().clone();
    let uri = request.uri().clone();
    let start = Instant::now();
    let ctx = request.extensions().get::<RequestContext>().cloned();

    let mut response = next.run(request).await;
    let status = response.status();

    if status.is_client_error() || status.is_server_error() {
        let elapsed_ms = start.elapsed().as_millis();
        let report = response.extensions_mut().remove::<ErrorReport>();
        let (source, messages) = match report {
            Some(report) => (report.source, report.messages),
            None => ("unknown", Vec::new()),
        };
        let detail = messages
            .first()
            .cloned()
            .unwrap_or_else(|| "no diagnostic available".to_string());
        let request_id = ctx
            .as_ref()
            .map(|ctx| ctx.request_id.as_str())
            .unwrap_or("");
        let user_id = ctx
            .as_ref()
            .and_then(RequestContext::user_id)
            .map(|id| id.to_string())
            .unwrap_or_default();

        if status.is_server_error() {
            error!(
                target = "scrivo::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                user_id = user_id,
                "request failed",
            );
        } else {
            warn!(
                target = "scrivo::http::response",
                status = status.as_u16(),
                method = %method,
                path = %uri.path(),
                query = uri.query().unwrap_or(""),
                elapsed_ms = elapsed_ms,
                source = source,
                detail = %detail,
                chain = ?messages,
                request_id = request_id,
                user_id = user_id,
                "client request error",
            );
        }
    }

    response
}
