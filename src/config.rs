use std::env;

use anyhow::{Context, Result};

/// Default engagement floor for a post to make the top table.
pub const DEFAULT_ENGAGEMENTS_MINIMUM: u64 = 5;
/// Default number of rows kept in the top table.
pub const DEFAULT_MAX_TOP_TWEETS: usize = 10;
/// Default look-back window for the quote/retweet search.
pub const DEFAULT_START_TIME_HOURS_AGO: u32 = 24;

/// Bot account credentials for posting (OAuth 1.0a user context).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BotCredentials {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_secret: String,
}

impl BotCredentials {
    fn is_complete(&self) -> bool {
        !self.consumer_key.is_empty()
            && !self.consumer_secret.is_empty()
            && !self.access_token.is_empty()
            && !self.access_secret.is_empty()
    }
}

/// Process configuration loaded from environment variables.
///
/// Secrets only come from the environment. The .env file is loaded at
/// startup via dotenvy. Search settings have their own layered loader in
/// `search::settings`; this struct covers the bot, ranking and storage.
pub struct Config {
    pub db_path: String,
    /// PostgreSQL URL. Either DATABASE_URL, or assembled from the
    /// DATABASE_HOST / NAME / USER / PASSWORD variables.
    pub database_url: Option<String>,
    pub bot: BotCredentials,
    /// App bearer token for the quote/retweet search.
    pub search_bearer_token: String,
    /// Account that retweets are made on behalf of.
    pub author_id: String,
    /// Query for the quote/retweet search.
    pub quote_query: String,
    /// likes + retweets must exceed this for a post to be quoted.
    pub metrics_minimum: u64,
    pub start_time_hours_ago: u32,
    pub engagements_minimum: u64,
    pub max_top_tweets: usize,
}

impl Config {
    /// Load configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup.
    ///
    /// Empty values count as unset. Numeric variables that are set but
    /// don't parse are an error rather than silently falling back.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let text = |key: &str| get(key).unwrap_or_default();

        let database_url = get("DATABASE_URL").or_else(|| {
            let host = get("DATABASE_HOST")?;
            let name = get("DATABASE_NAME")?;
            let user = get("DATABASE_USER")?;
            let password = get("DATABASE_PASSWORD").unwrap_or_default();
            Some(format!(
                "postgres://{}:{}@{host}:5432/{name}",
                encode_userinfo(&user),
                encode_userinfo(&password)
            ))
        });

        Ok(Self {
            db_path: get("SNOWBOT_DB_PATH").unwrap_or_else(|| "./snowbot.db".to_string()),
            database_url,
            bot: BotCredentials {
                consumer_key: text("SNOWBOT_CONSUMER_KEY"),
                consumer_secret: text("SNOWBOT_CONSUMER_SECRET"),
                access_token: text("SNOWBOT_ACCESS_TOKEN"),
                access_secret: text("SNOWBOT_ACCESS_SECRET"),
            },
            search_bearer_token: text("SEARCHTWEETS_BEARER_TOKEN"),
            author_id: text("SNOWBOT_AUTHOR_ID"),
            quote_query: text("SNOWBOT_QUERY"),
            metrics_minimum: parse_or(get("SNOWBOT_METRICS_MINIMUM"), "SNOWBOT_METRICS_MINIMUM", 0)?,
            start_time_hours_ago: parse_or(
                get("SNOWBOT_START_TIME_HOURS_AGO"),
                "SNOWBOT_START_TIME_HOURS_AGO",
                DEFAULT_START_TIME_HOURS_AGO,
            )?,
            engagements_minimum: parse_or(
                get("ENGAGEMENTS_MINIMUM"),
                "ENGAGEMENTS_MINIMUM",
                DEFAULT_ENGAGEMENTS_MINIMUM,
            )?,
            max_top_tweets: parse_or(
                get("MAX_TOP_TWEETS"),
                "MAX_TOP_TWEETS",
                DEFAULT_MAX_TOP_TWEETS,
            )?,
        })
    }

    /// Check that all four bot credentials are configured.
    /// Call this before any operation that posts.
    pub fn require_bot_credentials(&self) -> Result<()> {
        if !self.bot.is_complete() {
            anyhow::bail!(
                "Bot credentials incomplete. Set SNOWBOT_CONSUMER_KEY, SNOWBOT_CONSUMER_SECRET,\n\
                 SNOWBOT_ACCESS_TOKEN and SNOWBOT_ACCESS_SECRET in your .env file."
            );
        }
        Ok(())
    }

    /// Check that the search bearer token is configured.
    pub fn require_search(&self) -> Result<()> {
        if self.search_bearer_token.is_empty() {
            anyhow::bail!("SEARCHTWEETS_BEARER_TOKEN not set. Add it to your .env file.");
        }
        Ok(())
    }

    /// Check everything the quote and retweet commands need.
    pub fn require_quote(&self) -> Result<()> {
        self.require_search()?;
        if self.quote_query.is_empty() {
            anyhow::bail!("SNOWBOT_QUERY not set. Add it to your .env file.");
        }
        Ok(())
    }

    /// Retweeting also needs the account id to retweet as.
    pub fn require_retweet(&self) -> Result<()> {
        self.require_quote()?;
        if self.author_id.is_empty() {
            anyhow::bail!("SNOWBOT_AUTHOR_ID not set. Add it to your .env file.");
        }
        Ok(())
    }
}

fn parse_or<T: std::str::FromStr>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(v) => v
            .trim()
            .parse()
            .with_context(|| format!("{key} must be a non-negative integer, got '{v}'")),
        None => Ok(default),
    }
}

fn encode_userinfo(s: &str) -> String {
    percent_encoding::utf8_percent_encode(s, percent_encoding::NON_ALPHANUMERIC).to_string()
}
