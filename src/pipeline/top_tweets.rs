// Top-tweets pipeline: search → aggregate → rank → replace table.
//
// Pages come from a response-format stream. Every post from every page is
// scored, the best `top_n` at or above the engagement floor are kept, and the
// top_tweets table is replaced with them. A database failure is logged and
// reported in the summary rather than returned, so a scheduled run still
// exits cleanly and prints what it found.
//
// A failed search request is different: the pages seen so far are an
// incomplete picture, so the table is left as it was and the run errors.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, error, info, warn};

use crate::db::models::{TopTweet, UPDATED_AT_FORMAT};
use crate::db::Database;
use crate::scoring::engagement::{top_tweets, RankingOptions};
use crate::search::stream::ResultStream;
use crate::search::types::{SearchPage, Tweet};

/// What a run found and whether the table was written.
#[derive(Debug, Clone)]
pub struct TopTweetsSummary {
    pub pages: usize,
    pub tweets_seen: usize,
    /// Posts at or above the engagement floor, before truncation.
    pub engaged: usize,
    pub rows: Vec<TopTweet>,
    pub persisted: bool,
}

/// Drain `stream`, rank what it produced and replace the table.
///
/// `stream` must use the responses output format; items that don't decode as
/// a search page are skipped with a warning. If the stream ends on a failed
/// request the table is not touched and an error is returned.
pub async fn run(
    mut stream: ResultStream<'_>,
    db: &dyn Database,
    options: &RankingOptions,
    now: DateTime<Utc>,
) -> Result<TopTweetsSummary> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::default_spinner().template("  {spinner} {msg}")?);
    spinner.set_message("Searching...");

    let mut pages = 0usize;
    let mut collected: Vec<Tweet> = Vec::new();

    while let Some(item) = stream.next().await? {
        match serde_json::from_value::<SearchPage>(item) {
            Ok(page) => {
                pages += 1;
                debug!(count = page.data.len(), "Tweets in response");
                collected.extend(page.data);
                spinner.set_message(format!(
                    "{} pages, {} tweets collected",
                    pages,
                    collected.len()
                ));
                spinner.tick();
            }
            Err(e) => warn!(error = %e, "Skipping item that is not a search page"),
        }
    }
    spinner.finish_and_clear();

    if let Some(failure) = stream.failure() {
        error!(
            status = failure.status(),
            pages = pages,
            "Search did not complete; leaving top_tweets unchanged"
        );
        bail!(
            "Search ended on a bad response (HTTP {}) after {} pages; top_tweets left unchanged: {}",
            failure.status(),
            pages,
            crate::output::truncate_chars(failure.body(), 200)
        );
    }

    info!(tweets = collected.len(), pages = pages, "Collected tweets");

    let engaged = collected
        .iter()
        .filter(|t| t.public_metrics.total() >= options.minimum)
        .count();
    let ranked = top_tweets(&collected, options);

    let updated_at = now.format(UPDATED_AT_FORMAT).to_string();
    let rows: Vec<TopTweet> = ranked
        .iter()
        .map(|r| TopTweet::from_ranked(r, &updated_at))
        .collect();

    for row in &rows {
        debug!(score = row.score, url = %row.url(), "Top tweet");
    }

    let persisted = match db.replace_top_tweets(&rows).await {
        Ok(()) => {
            info!(rows = rows.len(), "Wrote top tweets");
            true
        }
        Err(e) => {
            error!(error = %format!("{e:#}"), "Failed to write top tweets");
            false
        }
    };

    Ok(TopTweetsSummary {
        pages,
        tweets_seen: collected.len(),
        engaged,
        rows,
        persisted,
    })
}
