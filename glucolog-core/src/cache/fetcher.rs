//! The network seam of the cache worker.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex, PoisonError};

use reqwest::header::{CACHE_CONTROL, PRAGMA};
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};

use super::error::FetchError;

/// Whether intermediate HTTP caches may answer the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CacheMode {
    #[default]
    Default,
    /// Always go to the origin server.
    Reload,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub url: String,
    pub method: String,
    pub cache_mode: CacheMode,
}

impl FetchRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            method: "GET".to_string(),
            cache_mode: CacheMode::Default,
        }
    }

    /// A GET that bypasses intermediate HTTP caches.
    pub fn reload(url: impl Into<String>) -> Self {
        Self {
            cache_mode: CacheMode::Reload,
            ..Self::get(url)
        }
    }

    pub fn with_method(mut self, method: impl Into<String>) -> Self {
        self.method = method.into();
        self
    }

    pub fn is_get(&self) -> bool {
        self.method.eq_ignore_ascii_case("GET")
    }

    /// Scheme part of the URL, e.g. `https`.
    pub fn scheme(&self) -> Option<&str> {
        self.url.split_once("://").map(|(scheme, _)| scheme)
    }
}

/// How much of a response the caller is allowed to inspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin response.
    Basic,
    /// Cross-origin response with readable status.
    Cors,
    /// Cross-origin response fetched without CORS; status reads as 0.
    Opaque,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchResponse {
    pub status: u16,
    pub kind: ResponseKind,
    pub headers: Vec<(String, String)>,
    #[serde(with = "body_base64")]
    pub body: Vec<u8>,
}

impl FetchResponse {
    pub fn new(status: u16, kind: ResponseKind, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            kind,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn opaque(body: impl Into<Vec<u8>>) -> Self {
        Self::new(0, ResponseKind::Opaque, body)
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// 2xx with a readable status.
    pub fn is_ok(&self) -> bool {
        self.kind != ResponseKind::Opaque && (200..300).contains(&self.status)
    }

    pub fn is_opaque(&self) -> bool {
        self.kind == ResponseKind::Opaque
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

mod body_base64 {
    use base64::{engine::general_purpose::STANDARD, Engine};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(body: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(body))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD
            .decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}

/// Performs network requests on behalf of the cache worker.
pub trait Fetcher: Send + Sync {
    fn fetch(
        &self,
        request: &FetchRequest,
    ) -> impl Future<Output = Result<FetchResponse, FetchError>> + Send;
}

impl<T: Fetcher> Fetcher for Arc<T> {
    fn fetch(
        &self,
        request: &FetchRequest,
    ) -> impl Future<Output = Result<FetchResponse, FetchError>> + Send {
        (**self).fetch(request)
    }
}

/// Fetcher backed by `reqwest`.
///
/// Responses from the configured origin are `basic`, other origins are
/// `cors`, and origins listed as no-cors come back `opaque`.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    origin: Url,
    no_cors_origins: Vec<String>,
}

impl HttpFetcher {
    pub fn new(origin: Url) -> Self {
        Self {
            client: reqwest::Client::new(),
            origin,
            no_cors_origins: Vec::new(),
        }
    }

    pub fn with_no_cors_origins(mut self, origins: Vec<String>) -> Self {
        self.no_cors_origins = origins
            .into_iter()
            .map(|o| o.trim_end_matches('/').to_string())
            .collect();
        self
    }

    pub fn origin(&self) -> &Url {
        &self.origin
    }

    fn classify(&self, url: &Url) -> ResponseKind {
        if url.origin() == self.origin.origin() {
            return ResponseKind::Basic;
        }
        let origin = url.origin().ascii_serialization();
        if self.no_cors_origins.iter().any(|o| *o == origin) {
            ResponseKind::Opaque
        } else {
            ResponseKind::Cors
        }
    }
}

impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let url = self
            .origin
            .join(&request.url)
            .map_err(|_| FetchError::InvalidUrl(request.url.clone()))?;
        let method = Method::from_bytes(request.method.to_ascii_uppercase().as_bytes())
            .map_err(|_| FetchError::InvalidMethod(request.method.clone()))?;
        let kind = self.classify(&url);

        let mut builder = self.client.request(method, url.clone());
        if request.cache_mode == CacheMode::Reload {
            builder = builder
                .header(CACHE_CONTROL, "no-cache")
                .header(PRAGMA, "no-cache");
        }

        let response = builder
            .send()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Network(e.to_string()))?
            .to_vec();

        tracing::debug!("Fetched {} -> {} ({:?})", url, status, kind);

        if kind == ResponseKind::Opaque {
            return Ok(FetchResponse::opaque(body));
        }
        Ok(FetchResponse {
            status,
            kind,
            headers,
            body,
        })
    }
}

/// An in-memory network: answers from a fixed route table and records
/// every request it sees.
#[derive(Debug, Default)]
pub struct MemoryFetcher {
    routes: Mutex<HashMap<String, Result<FetchResponse, FetchError>>>,
    requests: Mutex<Vec<FetchRequest>>,
}

impl MemoryFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn respond(&self, url: impl Into<String>, response: FetchResponse) {
        self.lock_routes().insert(url.into(), Ok(response));
    }

    pub fn fail(&self, url: impl Into<String>, error: FetchError) {
        self.lock_routes().insert(url.into(), Err(error));
    }

    /// Drops every route, as if the network went away.
    pub fn disconnect(&self) {
        self.lock_routes().clear();
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of requests seen for `url`.
    pub fn hits(&self, url: &str) -> usize {
        self.requests().iter().filter(|r| r.url == url).count()
    }

    fn lock_routes(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<String, Result<FetchResponse, FetchError>>> {
        self.routes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Fetcher for MemoryFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        self.requests
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(request.clone());

        self.lock_routes()
            .get(&request.url)
            .cloned()
            .unwrap_or_else(|| Err(FetchError::Network(format!("no route to {}", request.url))))
    }
}
