// Quote/retweet pipeline: one relevancy-sorted search page → pick → post.
//
// Recent search with `sort_order=relevancy` front-loads the most relevant
// posts, so only the first page (100 posts) is requested. Those are
// re-ranked by likes + retweets and the winner is quoted or retweeted if it
// clears the threshold.

use anyhow::Result;
use tracing::{info, warn};

use crate::actions::poster::PostActions;
use crate::search::client::{HttpOutcome, PageFetcher, DEFAULT_SEARCH_ENDPOINT};
use crate::search::params::{build_request_parameters, ParameterRequest};
use crate::search::stream::{OutputFormat, ResultStream, StreamOptions};
use crate::search::types::{SearchPage, Tweet};
use crate::search::SearchError;
use crate::scoring::engagement::select_quote_candidate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Quote,
    Retweet,
}

#[derive(Debug, Clone)]
pub struct QuoteRequest {
    pub query: String,
    pub start_time_hours_ago: u32,
    pub metrics_minimum: u64,
    pub action: Action,
    /// Account to retweet as. Only used for `Action::Retweet`.
    pub author_id: String,
    /// Pick a candidate but don't post.
    pub dry_run: bool,
}

#[derive(Debug, Clone)]
pub struct QuoteReport {
    pub tweets_seen: usize,
    pub picked: Option<Tweet>,
    /// Response of the post request, if one was made.
    pub outcome: Option<HttpOutcome>,
}

/// Stream options for the single relevancy page.
pub fn search_options(query: &str, hours_ago: u32) -> Result<StreamOptions, SearchError> {
    let request = ParameterRequest {
        query: query.to_string(),
        results_per_call: Some(100),
        start_time: Some(format!("{hours_ago}h")),
        sort_order: Some("relevancy".to_string()),
        tweet_fields: Some("public_metrics".to_string()),
        ..Default::default()
    };

    Ok(StreamOptions {
        endpoint: DEFAULT_SEARCH_ENDPOINT.to_string(),
        request_parameters: build_request_parameters(&request)?,
        max_tweets: None,
        max_pages: Some(1),
        output_format: OutputFormat::Responses,
    })
}

pub async fn run(
    fetcher: &dyn PageFetcher,
    poster: &dyn PostActions,
    request: &QuoteRequest,
) -> Result<QuoteReport> {
    info!(query = %request.query, "Searching for a post to surface");

    let options = search_options(&request.query, request.start_time_hours_ago)?;
    let items = ResultStream::new(fetcher, options)?.collect().await?;

    let tweets: Vec<Tweet> = match items.into_iter().next() {
        Some(first) => serde_json::from_value::<SearchPage>(first)?.data,
        None => Vec::new(),
    };

    if tweets.is_empty() {
        info!("No tweets from search request");
        return Ok(QuoteReport {
            tweets_seen: 0,
            picked: None,
            outcome: None,
        });
    }

    let Some(picked) = select_quote_candidate(&tweets, request.metrics_minimum).cloned() else {
        info!(
            tweets = tweets.len(),
            minimum = request.metrics_minimum,
            "No tweet above the metrics minimum"
        );
        return Ok(QuoteReport {
            tweets_seen: tweets.len(),
            picked: None,
            outcome: None,
        });
    };

    if request.dry_run {
        info!(tweet_id = %picked.id, "Dry run; not posting");
        return Ok(QuoteReport {
            tweets_seen: tweets.len(),
            picked: Some(picked),
            outcome: None,
        });
    }

    let outcome = match request.action {
        Action::Quote => poster.quote_tweet(&picked.id, &request.query).await?,
        Action::Retweet => poster.retweet(&request.author_id, &picked.id).await?,
    };
    if !outcome.is_success() {
        warn!(status = outcome.status(), "Post was not accepted");
    }

    Ok(QuoteReport {
        tweets_seen: tweets.len(),
        picked: Some(picked),
        outcome: Some(outcome),
    })
}
