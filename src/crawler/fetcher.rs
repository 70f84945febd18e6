//! Page rendering
//!
//! This module defines the boundary to whatever renders pages for the
//! crawler, plus a plain HTTP implementation:
//! - The `PageRenderer` trait the coordinator dispatches through
//! - `RenderedPage`, the response handed to backoff and traversal
//! - `HttpRenderer`, which applies the request identity and timeout
//!
//! The HTTP renderer does not execute page actions; a browser-backed
//! renderer would run them before returning the page.

use crate::identity::RequestIdentity;
use crate::model::TraversalRequest;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{redirect::Policy, Client, Proxy};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use thiserror::Error;

/// Errors raised while fetching or rendering a page
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("Request timed out: {0}")]
    Timeout(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Failed to read response body: {0}")]
    Body(String),

    #[error("Failed to build HTTP client: {0}")]
    Client(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout(e.to_string())
        } else if e.is_body() || e.is_decode() {
            FetchError::Body(e.to_string())
        } else if e.is_builder() {
            FetchError::Client(e.to_string())
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

/// A fetched page as seen by the crawl core
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// Final URL after redirects
    pub url: String,
    /// HTTP status code
    pub status: u16,
    /// Response headers
    pub headers: HeaderMap,
    /// Page body
    pub body: String,
}

impl RenderedPage {
    pub fn new(url: impl Into<String>, status: u16, body: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            status,
            headers: HeaderMap::new(),
            body: body.into(),
        }
    }

    /// Adds a header; invalid names or values are ignored
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            self.headers.insert(name, value);
        }
        self
    }

    /// Returns a header value as text
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Renders a traversal request into a page
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(
        &self,
        request: &TraversalRequest,
        identity: &RequestIdentity,
    ) -> Result<RenderedPage, FetchError>;
}

/// Builds an HTTP client for one proxy (or none)
///
/// # Arguments
///
/// * `timeout` - Navigation timeout applied to the whole request
/// * `proxy` - Proxy URL all traffic goes through
///
/// # Returns
///
/// * `Ok(Client)` - Successfully built HTTP client
/// * `Err(reqwest::Error)` - Invalid proxy or TLS backend failure
pub fn build_http_client(timeout: Duration, proxy: Option<&str>) -> Result<Client, reqwest::Error> {
    let mut builder = Client::builder()
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10).min(timeout))
        .redirect(Policy::limited(10))
        .gzip(true)
        .brotli(true);

    if let Some(proxy) = proxy {
        builder = builder.proxy(Proxy::all(proxy)?);
    }

    builder.build()
}

/// Renderer backed by plain HTTP GET requests
pub struct HttpRenderer {
    timeout: Duration,
    direct: Client,
    proxied: Mutex<HashMap<String, Client>>,
}

impl HttpRenderer {
    pub fn new(timeout: Duration) -> Result<Self, FetchError> {
        Ok(Self {
            timeout,
            direct: build_http_client(timeout, None)?,
            proxied: Mutex::new(HashMap::new()),
        })
    }

    /// Returns the client for a proxy, building and caching it on first use
    fn client_for(&self, proxy: Option<&str>) -> Result<Client, FetchError> {
        let Some(proxy) = proxy else {
            return Ok(self.direct.clone());
        };

        let mut clients = self.proxied.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = clients.get(proxy) {
            return Ok(client.clone());
        }

        let client = build_http_client(self.timeout, Some(proxy))?;
        clients.insert(proxy.to_string(), client.clone());
        Ok(client)
    }
}

#[async_trait]
impl PageRenderer for HttpRenderer {
    async fn render(
        &self,
        request: &TraversalRequest,
        identity: &RequestIdentity,
    ) -> Result<RenderedPage, FetchError> {
        if !request.actions.is_empty() {
            let names: Vec<&str> = request.actions.iter().map(|a| a.name()).collect();
            tracing::debug!(
                "Skipping page actions for {} (plain HTTP): {:?}",
                request.url,
                names
            );
        }

        let client = self.client_for(identity.proxy.as_deref())?;
        let response = client
            .get(&request.url)
            .header(USER_AGENT, identity.user_agent.as_str())
            .send()
            .await?;

        let url = response.url().to_string();
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;

        Ok(RenderedPage {
            url,
            status,
            headers,
            body,
        })
    }
}
