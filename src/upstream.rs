//! Upstream Client
//!
//! Forwards requests to the REST backend and hands back a buffered response.

use std::time::Duration;

use axum::body::Bytes;
use axum::http::{header, HeaderMap, HeaderValue, Method, StatusCode};
use serde_json::Value;
use tracing::debug;

use crate::error::{ProxyError, Result};

/// Request headers copied onto the upstream request.
const FORWARDED_HEADERS: [header::HeaderName; 3] =
    [header::ACCEPT, header::AUTHORIZATION, header::CONTENT_TYPE];

// == Upstream Response ==
/// A fully buffered upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub content_type: Option<HeaderValue>,
    pub body: Bytes,
}

impl UpstreamResponse {
    /// Parses the body as JSON when the upstream answered 2xx with a JSON
    /// content type. Anything else is not cacheable.
    pub fn cacheable_json(&self) -> Option<Value> {
        if !self.status.is_success() {
            return None;
        }
        let is_json = self
            .content_type
            .as_ref()
            .and_then(|v| v.to_str().ok())
            .map(|v| v.starts_with("application/json") || v.contains("+json"))
            .unwrap_or(false);
        if !is_json {
            return None;
        }
        serde_json::from_slice(&self.body).ok()
    }
}

// == Upstream Client ==
/// Thin wrapper around a shared `reqwest::Client` and the backend base URL.
#[derive(Debug, Clone)]
pub struct UpstreamClient {
    client: reqwest::Client,
    base_url: String,
}

impl UpstreamClient {
    /// Creates a client for `base_url` with a per-request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProxyError::Internal(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // == Send ==
    /// Sends `method path_and_query` upstream with the allowed headers.
    pub async fn send(
        &self,
        method: Method,
        path_and_query: &str,
        headers: &HeaderMap,
        body: Bytes,
    ) -> Result<UpstreamResponse> {
        let url = format!("{}{}", self.base_url, path_and_query);
        debug!(%method, %url, "forwarding upstream");

        let mut request = self.client.request(method, &url);
        for name in FORWARDED_HEADERS.iter() {
            if let Some(value) = headers.get(name) {
                request = request.header(name, value);
            }
        }
        if !body.is_empty() {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let content_type = response.headers().get(header::CONTENT_TYPE).cloned();
        let body = response.bytes().await?;

        Ok(UpstreamResponse {
            status,
            content_type,
            body,
        })
    }

    /// Sends a plain `GET` with the given headers.
    pub async fn get(&self, path_and_query: &str, headers: &HeaderMap) -> Result<UpstreamResponse> {
        self.send(Method::GET, path_and_query, headers, Bytes::new())
            .await
    }
}
