// Post-creation client: retweets and quote posts for the bot account.
//
// Every request is OAuth1-signed with the bot credentials. As with search,
// an error status is returned as `HttpOutcome::Failure` and logged rather
// than raised.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use tracing::{info, warn};

use super::oauth1::{authorization_header, Nonce};
use crate::config::BotCredentials;
use crate::search::client::{HttpOutcome, USER_AGENT};

/// Public API root.
pub const DEFAULT_API_BASE: &str = "https://api.twitter.com";

/// Text of the quote post for a given search query.
pub fn quote_text(query: &str) -> String {
    format!(
        "Surfacing this Tweet with the v2 Recent search endpoint, sorting by relevancy. \n\n\
         Searching for Tweets from the last 24 hours that match this filter: #{query}"
    )
}

/// The two posting actions. `PostClient` does them over HTTP; tests
/// substitute recorders.
#[async_trait]
pub trait PostActions: Send + Sync {
    async fn retweet(&self, author_id: &str, tweet_id: &str) -> Result<HttpOutcome>;
    async fn quote_tweet(&self, tweet_id: &str, query: &str) -> Result<HttpOutcome>;
}

pub struct PostClient {
    client: reqwest::Client,
    credentials: BotCredentials,
    api_base: String,
}

impl PostClient {
    pub fn new(credentials: BotCredentials) -> Result<Self> {
        Self::with_base_url(credentials, DEFAULT_API_BASE)
    }

    pub fn with_base_url(credentials: BotCredentials, api_base: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            credentials,
            api_base: api_base.trim_end_matches('/').to_string(),
        })
    }

    async fn post_json(&self, url: &str, payload: &Value) -> Result<HttpOutcome> {
        let auth = authorization_header(&self.credentials, "POST", url, &[], &Nonce::generate())?;

        let response = self
            .client
            .post(url)
            .header(reqwest::header::AUTHORIZATION, auth)
            .json(payload)
            .send()
            .await
            .with_context(|| format!("POST {url} failed"))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        let outcome = HttpOutcome::from_parts(status, body);
        if !outcome.is_success() {
            warn!(status = status, body = outcome.body(), url = url, "Post request returned an error status");
        }
        Ok(outcome)
    }
}

#[async_trait]
impl PostActions for PostClient {
    /// `POST /2/users/{author_id}/retweets`
    async fn retweet(&self, author_id: &str, tweet_id: &str) -> Result<HttpOutcome> {
        let url = format!("{}/2/users/{author_id}/retweets", self.api_base);
        info!(tweet_id = tweet_id, author_id = author_id, "Retweeting");
        self.post_json(&url, &json!({ "tweet_id": tweet_id })).await
    }

    /// `POST /2/tweets` quoting `tweet_id`.
    async fn quote_tweet(&self, tweet_id: &str, query: &str) -> Result<HttpOutcome> {
        let url = format!("{}/2/tweets", self.api_base);
        let payload = json!({ "text": quote_text(query), "quote_tweet_id": tweet_id });
        info!(tweet_id = tweet_id, "Quoting");
        self.post_json(&url, &payload).await
    }
}
