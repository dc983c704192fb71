// Colored terminal output for ranked posts and action results.
//
// main.rs display calls delegate here.

use colored::Colorize;

use crate::db::models::TopTweet;
use crate::pipeline::quote::{Action, QuoteReport};
use crate::pipeline::top_tweets::TopTweetsSummary;

/// Display the ranked top-tweets table.
pub fn display_top_tweets(rows: &[TopTweet]) {
    if rows.is_empty() {
        println!("No top tweets yet. Run `snowbot top` first.");
        return;
    }

    println!(
        "\n{}",
        format!("=== Top Tweets ({}) ===", rows.len()).bold()
    );
    println!();

    println!(
        "  {:>4}  {:>6}  {:>6}  {:>6}  {:>6}  {:>6}  {}",
        "Rank".dimmed(),
        "Score".dimmed(),
        "Likes".dimmed(),
        "RTs".dimmed(),
        "Reply".dimmed(),
        "Quote".dimmed(),
        "Link".dimmed(),
    );
    println!("  {}", "-".repeat(84).dimmed());

    for (i, row) in rows.iter().enumerate() {
        println!(
            "  {:>4}. {:>6}  {:>6}  {:>6}  {:>6}  {:>6}  {}",
            i + 1,
            colorize_score(row.score),
            row.likes,
            row.retweets,
            row.replies,
            row.quotes,
            row.url().cyan(),
        );
    }

    if let Some(first) = rows.first() {
        println!();
        println!("  {}", format!("Updated {} UTC", first.updated_at).dimmed());
    }
}

/// Summary line after a `top` run.
pub fn display_top_summary(summary: &TopTweetsSummary, minimum: u64) {
    println!(
        "Collected {} tweets over {} pages; {} with at least {} engagements.",
        summary.tweets_seen, summary.pages, summary.engaged, minimum
    );
    display_top_tweets(&summary.rows);
    println!();
    if summary.persisted {
        println!("{} Wrote {} rows to top_tweets", "✓".green(), summary.rows.len());
    } else {
        println!(
            "{} Could not write top_tweets; see the log for details",
            "✗".red()
        );
    }
}

/// Result of a quote or retweet run.
pub fn display_quote_report(report: &QuoteReport, action: Action) {
    let Some(tweet) = &report.picked else {
        if report.tweets_seen == 0 {
            println!("No tweets from search request.");
        } else {
            println!(
                "None of {} tweets cleared the metrics minimum.",
                report.tweets_seen
            );
        }
        return;
    };

    let m = &tweet.public_metrics;
    println!(
        "Picked https://twitter.com/i/status/{} ({} likes, {} retweets)",
        tweet.id, m.like_count, m.retweet_count
    );
    println!("  {}", super::truncate_chars(&tweet.text, 120).dimmed());

    let verb = match action {
        Action::Quote => "Quote",
        Action::Retweet => "Retweet",
    };
    match &report.outcome {
        None => println!("{} skipped (dry run)", verb.yellow()),
        Some(outcome) if outcome.is_success() => {
            println!("{} {} posted (HTTP {})", "✓".green(), verb, outcome.status())
        }
        Some(outcome) => println!(
            "{} {} failed (HTTP {}): {}",
            "✗".red(),
            verb,
            outcome.status(),
            super::truncate_chars(outcome.body(), 200)
        ),
    }
}

fn colorize_score(score: i64) -> String {
    let text = score.to_string();
    if score >= 100 {
        text.red().bold().to_string()
    } else if score >= 25 {
        text.yellow().to_string()
    } else {
        text.normal().to_string()
    }
}
