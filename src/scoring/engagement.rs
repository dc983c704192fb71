// Engagement scoring and ranking.
//
// A post's score is the plain sum of its four public counters: likes,
// retweets, replies and quotes. Posts under the minimum are dropped, the
// rest sorted by score with ties kept in arrival order.
//
// The quote picker uses a narrower signal (likes + retweets only) and a
// strict threshold, since it acts on a single post.

use serde::Serialize;

use crate::search::types::Tweet;

/// A post that cleared the engagement floor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RankedTweet {
    pub id: String,
    /// Likes + retweets + replies + quotes.
    pub score: u64,
    pub likes: u64,
    pub retweets: u64,
    pub replies: u64,
    pub quotes: u64,
}

impl RankedTweet {
    /// Score a post from its public metrics. Missing counters count as 0.
    pub fn from_tweet(tweet: &Tweet) -> Self {
        let m = &tweet.public_metrics;
        Self {
            id: tweet.id.clone(),
            score: m.total(),
            likes: m.like_count,
            retweets: m.retweet_count,
            replies: m.reply_count,
            quotes: m.quote_count,
        }
    }
}

/// Knobs for `top_tweets`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RankingOptions {
    /// Inclusive engagement floor.
    pub minimum: u64,
    /// How many rows to keep.
    pub top_n: usize,
}

impl Default for RankingOptions {
    fn default() -> Self {
        Self {
            minimum: crate::config::DEFAULT_ENGAGEMENTS_MINIMUM,
            top_n: crate::config::DEFAULT_MAX_TOP_TWEETS,
        }
    }
}

/// Score every post and keep the ones with `score >= minimum`, in input order.
pub fn score_tweets<'a, I>(tweets: I, minimum: u64) -> Vec<RankedTweet>
where
    I: IntoIterator<Item = &'a Tweet>,
{
    tweets
        .into_iter()
        .map(RankedTweet::from_tweet)
        .filter(|r| r.score >= minimum)
        .collect()
}

/// Sort by score, highest first, and keep the first `top_n`.
pub fn rank(mut scored: Vec<RankedTweet>, top_n: usize) -> Vec<RankedTweet> {
    // sort_by is stable, so equal scores stay in arrival order
    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(top_n);
    scored
}

/// Score, filter and rank in one step: the rows the top_tweets table holds.
pub fn top_tweets<'a, I>(tweets: I, options: &RankingOptions) -> Vec<RankedTweet>
where
    I: IntoIterator<Item = &'a Tweet>,
{
    rank(score_tweets(tweets, options.minimum), options.top_n)
}

/// The post to quote: highest likes + retweets, provided that sum is
/// strictly greater than `minimum`. The earliest post wins a tie.
pub fn select_quote_candidate(tweets: &[Tweet], minimum: u64) -> Option<&Tweet> {
    let signal = |t: &Tweet| {
        t.public_metrics
            .like_count
            .saturating_add(t.public_metrics.retweet_count)
    };

    let mut best: Option<&Tweet> = None;
    for tweet in tweets {
        let better = match best {
            Some(b) => signal(tweet) > signal(b),
            None => true,
        };
        if better {
            best = Some(tweet);
        }
    }

    best.filter(|t| signal(t) > minimum)
}
