// Search API client: bearer-token authenticated GETs.
//
// A thin reqwest wrapper. Unlike most clients, a non-2xx status is not an
// error here: it comes back as `HttpOutcome::Failure` with the status and
// body, and the caller decides whether to keep going. Only transport
// failures (DNS, TLS, connection reset) surface as `Err`.

use std::collections::BTreeMap;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, AUTHORIZATION};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use super::params::RequestParameters;

/// Default recent-search endpoint.
pub const DEFAULT_SEARCH_ENDPOINT: &str = "https://api.twitter.com/2/tweets/search/recent";

/// User agent sent with every request.
pub const USER_AGENT: &str = concat!("snowbot/", env!("CARGO_PKG_VERSION"));

/// Status code and body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: String,
}

/// Result of an HTTP call that reached the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HttpOutcome {
    /// 2xx response.
    Success(ApiResponse),
    /// Any other status. Logged by whoever produced it, never raised.
    Failure(ApiResponse),
}

impl HttpOutcome {
    /// Classify a status/body pair.
    pub fn from_parts(status: u16, body: String) -> Self {
        let response = ApiResponse { status, body };
        if (200..300).contains(&status) {
            HttpOutcome::Success(response)
        } else {
            HttpOutcome::Failure(response)
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, HttpOutcome::Success(_))
    }

    pub fn status(&self) -> u16 {
        self.response().status
    }

    pub fn body(&self) -> &str {
        &self.response().body
    }

    /// Decode the body as JSON, regardless of status.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_str(self.body())
            .with_context(|| format!("Failed to decode response body (HTTP {})", self.status()))
    }

    fn response(&self) -> &ApiResponse {
        match self {
            HttpOutcome::Success(r) | HttpOutcome::Failure(r) => r,
        }
    }
}

/// Fetches one page of results. The seam between pagination and HTTP.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch_page(&self, endpoint: &str, params: &RequestParameters) -> Result<HttpOutcome>;
}

/// HTTP client for the search endpoints, authenticated with an app bearer token.
pub struct SearchClient {
    client: reqwest::Client,
}

impl SearchClient {
    /// Build a client that sends `Authorization: Bearer <token>` plus any
    /// extra headers on every request.
    pub fn new(bearer_token: &str, extra_headers: &BTreeMap<String, String>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        let auth = HeaderValue::from_str(&format!("Bearer {bearer_token}"))
            .context("Bearer token contains characters not allowed in a header")?;
        headers.insert(AUTHORIZATION, auth);

        for (name, value) in extra_headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .with_context(|| format!("Invalid extra header name: {name}"))?;
            let value = HeaderValue::from_str(value)
                .with_context(|| format!("Invalid value for extra header {name}"))?;
            headers.insert(name, value);
        }

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .default_headers(headers)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self { client })
    }
}

#[async_trait]
impl PageFetcher for SearchClient {
    async fn fetch_page(&self, endpoint: &str, params: &RequestParameters) -> Result<HttpOutcome> {
        debug!(endpoint = endpoint, params = %params.to_json_string(), "Search GET request");

        let response = self
            .client
            .get(endpoint)
            .query(&params.query_pairs())
            .send()
            .await
            .with_context(|| format!("Search request to {endpoint} failed"))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .context("Failed to read search response body")?;

        let outcome = HttpOutcome::from_parts(status, body);
        if !outcome.is_success() {
            warn!(status = status, body = outcome.body(), "Search request returned an error status");
        }
        Ok(outcome)
    }
}
