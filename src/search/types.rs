// Serde types for search responses.
//
// Only the fields the ranking and quoting code reads are typed. Everything
// else on a post is kept in `extra` so nothing is lost when a page is
// re-serialized.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One page of `GET /2/tweets/search/*`.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SearchPage {
    #[serde(default)]
    pub data: Vec<Tweet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub includes: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

/// Pagination metadata attached to each page.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct PageMeta {
    #[serde(default)]
    pub result_count: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub newest_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub oldest_id: Option<String>,
}

/// A post as returned by the v2 API.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Tweet {
    pub id: String,
    #[serde(default)]
    pub text: String,
    /// Absent unless `tweet.fields` requested `public_metrics`.
    #[serde(default)]
    pub public_metrics: PublicMetrics,
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

/// Engagement counters. Missing counters read as zero.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct PublicMetrics {
    #[serde(default)]
    pub like_count: u64,
    #[serde(default)]
    pub retweet_count: u64,
    #[serde(default)]
    pub reply_count: u64,
    #[serde(default)]
    pub quote_count: u64,
}

impl PublicMetrics {
    /// Likes + retweets + replies + quotes.
    pub fn total(&self) -> u64 {
        self.like_count
            .saturating_add(self.retweet_count)
            .saturating_add(self.reply_count)
            .saturating_add(self.quote_count)
    }
}
