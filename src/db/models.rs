// Data models that map to database rows.
//
// Kept apart from the queries so the pipeline and output code can use them
// without depending on a particular backend.

use serde::{Deserialize, Serialize};

use crate::scoring::engagement::RankedTweet;

/// Format for `updated_at`, always UTC.
pub const UPDATED_AT_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One row of the `top_tweets` table.
///
/// Counters are `i64` because that's what both SQLite INTEGER and
/// PostgreSQL BIGINT hand back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopTweet {
    pub id: String,
    pub score: i64,
    pub likes: i64,
    pub retweets: i64,
    pub replies: i64,
    pub quotes: i64,
    pub updated_at: String,
}

impl TopTweet {
    /// Stamp a ranked post with the time of this refresh.
    pub fn from_ranked(ranked: &RankedTweet, updated_at: &str) -> Self {
        Self {
            id: ranked.id.clone(),
            score: to_i64(ranked.score),
            likes: to_i64(ranked.likes),
            retweets: to_i64(ranked.retweets),
            replies: to_i64(ranked.replies),
            quotes: to_i64(ranked.quotes),
            updated_at: updated_at.to_string(),
        }
    }

    /// Public link to the post.
    pub fn url(&self) -> String {
        format!("https://twitter.com/i/status/{}", self.id)
    }
}

fn to_i64(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}
