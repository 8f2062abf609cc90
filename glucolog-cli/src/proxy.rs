//! Local caching proxy.
//!
//! Every request that reaches the proxy is rewritten onto the configured
//! origin and handed to the active cache worker. Responses carry an
//! `x-glucolog-cache` header set to `hit`, `miss` or `bypass`.

use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, HeaderName, HeaderValue, Response, StatusCode},
    Router,
};
use glucolog_core::cache::{CacheWorker, FetchOutcome, FetchRequest, Fetcher};
use reqwest::Url;
use tower_http::trace::TraceLayer;

pub const CACHE_HEADER: &str = "x-glucolog-cache";

/// Headers that describe the upstream connection rather than the payload.
const SKIPPED_HEADERS: [&str; 7] = [
    "connection",
    "keep-alive",
    "transfer-encoding",
    "upgrade",
    "proxy-connection",
    "content-length",
    "content-encoding",
];

struct ProxyState<F> {
    worker: Arc<CacheWorker<F>>,
    origin: Url,
}

impl<F> Clone for ProxyState<F> {
    fn clone(&self) -> Self {
        Self {
            worker: Arc::clone(&self.worker),
            origin: self.origin.clone(),
        }
    }
}

pub fn router<F: Fetcher + 'static>(worker: Arc<CacheWorker<F>>, origin: Url) -> Router {
    Router::new()
        .fallback(intercept::<F>)
        .with_state(ProxyState { worker, origin })
        .layer(TraceLayer::new_for_http())
}

async fn intercept<F: Fetcher + 'static>(
    State(state): State<ProxyState<F>>,
    request: Request,
) -> Response<Body> {
    // Path and query replace the origin's; scheme, host and port never change.
    let mut url = state.origin.clone();
    url.set_path(request.uri().path());
    url.set_query(request.uri().query());
    let fetch = FetchRequest::get(url.as_str()).with_method(request.method().as_str());

    match state.worker.handle_fetch(&fetch).await {
        Ok(outcome) => into_response(outcome),
        Err(e) => {
            tracing::warn!("Upstream fetch failed for {}: {}", url, e);
            error_response(StatusCode::BAD_GATEWAY, e.to_string())
        }
    }
}

fn into_response(outcome: FetchOutcome) -> Response<Body> {
    let FetchOutcome {
        response, source, ..
    } = outcome;

    // Opaque responses have no readable status; serve them as-is.
    let status = if response.is_opaque() {
        StatusCode::OK
    } else {
        StatusCode::from_u16(response.status).unwrap_or(StatusCode::BAD_GATEWAY)
    };

    let mut builder = Response::builder().status(status);
    for (name, value) in &response.headers {
        if SKIPPED_HEADERS.iter().any(|h| name.eq_ignore_ascii_case(h)) {
            continue;
        }
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            builder = builder.header(name, value);
        }
    }
    builder = builder.header(CACHE_HEADER, source.to_string());

    builder
        .body(Body::from(response.body))
        .unwrap_or_else(|e| error_response(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

fn error_response(status: StatusCode, message: String) -> Response<Body> {
    let mut response = Response::new(Body::from(message));
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}
