use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing::{debug, info};

use snowbot::actions::poster::PostClient;
use snowbot::config::Config;
use snowbot::credentials::{ensure_bearer_token, load_credentials, DEFAULT_CREDENTIAL_KEY};
use snowbot::db::Database;
use snowbot::output::ndjson::ResultWriter;
use snowbot::output::terminal;
use snowbot::pipeline::quote::{Action, QuoteRequest};
use snowbot::scoring::engagement::RankingOptions;
use snowbot::search::client::SearchClient;
use snowbot::search::settings::{parse_header_json, read_config_file, SearchSettings};
use snowbot::search::stream::{OutputFormat, ResultStream};
use snowbot::status::StorageLocation;

/// Snowbot: search recent posts, rank them by engagement, and act on the best.
///
/// Collects posts matching a keyword filter, keeps a table of the most
/// engaged ones, and can quote or retweet the standout post.
#[derive(Parser)]
#[command(name = "snowbot", version, about)]
struct Cli {
    /// Verbose logging (same as RUST_LOG=snowbot=debug)
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database
    Init,

    /// Run a search and print or save the results
    Search(SearchArgs),

    /// Collect posts, rank them by engagement, and replace the top_tweets table
    Top {
        #[command(flatten)]
        search: SearchArgs,

        /// How many rows to keep (default: MAX_TOP_TWEETS or 10)
        #[arg(long)]
        max_top_tweets: Option<usize>,

        /// Engagement floor (default: ENGAGEMENTS_MINIMUM or 5)
        #[arg(long)]
        engagements_minimum: Option<u64>,
    },

    /// Quote the most-engaged recent post matching SNOWBOT_QUERY
    Quote {
        /// Pick a post but don't publish the quote
        #[arg(long)]
        dry_run: bool,
    },

    /// Retweet the most-engaged recent post matching SNOWBOT_QUERY
    Retweet {
        /// Pick a post but don't retweet it
        #[arg(long)]
        dry_run: bool,
    },

    /// Show the current top_tweets table
    Report,

    /// Show database status
    Status,
}

/// Search flags. Anything left unset falls back to the credential file,
/// then the config file, then SEARCHTWEETS_* query defaults.
#[derive(Args, Debug, Clone)]
struct SearchArgs {
    /// Search query
    #[arg(long)]
    query: Option<String>,

    /// Comma-separated tweet fields
    #[arg(long)]
    tweet_fields: Option<String>,

    /// Comma-separated user fields
    #[arg(long)]
    user_fields: Option<String>,

    /// Comma-separated media fields
    #[arg(long)]
    media_fields: Option<String>,

    /// Comma-separated place fields
    #[arg(long)]
    place_fields: Option<String>,

    /// Comma-separated poll fields
    #[arg(long)]
    poll_fields: Option<String>,

    /// Comma-separated object expansions
    #[arg(long)]
    expansions: Option<String>,

    /// Count granularity (minute, hour, day); switches to the counts endpoint
    #[arg(long)]
    granularity: Option<String>,

    /// recency or relevancy
    #[arg(long)]
    sort_order: Option<String>,

    #[arg(long)]
    since_id: Option<String>,

    #[arg(long)]
    until_id: Option<String>,

    /// Window start: YYYY-mm-DDTHH:MM, YYYYmmDDHHMM, YYYY-mm-DD, or 3d / 12h / 15m
    #[arg(long)]
    start_time: Option<String>,

    /// Window end, same formats as --start-time
    #[arg(long)]
    end_time: Option<String>,

    /// Results per request (max_results), 10 to 100 for recent search
    #[arg(long)]
    results_per_call: Option<u32>,

    /// Stop after this many results
    #[arg(long)]
    max_tweets: Option<u64>,

    /// Stop after this many requests
    #[arg(long)]
    max_pages: Option<u32>,

    /// r: raw responses, a: atomic tweets with expansions inline, m: message stream
    #[arg(long)]
    output_format: Option<String>,

    /// Split saved results into files of this many items
    #[arg(long)]
    results_per_file: Option<u64>,

    /// Save results to <prefix>.json (or chunked files)
    #[arg(long)]
    filename_prefix: Option<String>,

    /// Don't print results to stdout
    #[arg(long)]
    no_print_stream: bool,

    /// Extra request headers as a JSON object
    #[arg(long)]
    extra_headers: Option<String>,

    /// TOML credential file (default: ~/.twitter_keys.toml)
    #[arg(long)]
    credential_file: Option<PathBuf>,

    /// Table in the credential file to read
    #[arg(long, default_value = DEFAULT_CREDENTIAL_KEY)]
    credential_file_key: String,

    /// Let the credential file win over SEARCHTWEETS_* variables
    #[arg(long)]
    no_env_overwrite: bool,

    /// TOML config file with search parameters
    #[arg(long)]
    config_file: Option<PathBuf>,
}

impl SearchArgs {
    /// The command-line layer of the search settings.
    fn to_settings(&self) -> Result<SearchSettings> {
        Ok(SearchSettings {
            extra_headers: self
                .extra_headers
                .as_deref()
                .map(parse_header_json)
                .transpose()?,
            query: self.query.clone(),
            granularity: self.granularity.clone(),
            start_time: self.start_time.clone(),
            end_time: self.end_time.clone(),
            since_id: self.since_id.clone(),
            until_id: self.until_id.clone(),
            sort_order: self.sort_order.clone(),
            tweet_fields: self.tweet_fields.clone(),
            user_fields: self.user_fields.clone(),
            media_fields: self.media_fields.clone(),
            place_fields: self.place_fields.clone(),
            poll_fields: self.poll_fields.clone(),
            expansions: self.expansions.clone(),
            results_per_call: self.results_per_call,
            max_tweets: self.max_tweets,
            max_pages: self.max_pages,
            output_format: self.output_format.clone(),
            results_per_file: self.results_per_file,
            filename_prefix: self.filename_prefix.clone(),
            print_stream: self.no_print_stream.then_some(false),
            ..Default::default()
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if missing)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let filter = if cli.debug {
        tracing_subscriber::EnvFilter::new("snowbot=debug")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("snowbot=info"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Init => {
            info!("Initializing snowbot database...");
            let config = Config::load()?;
            let db = init_database(&config).await?;
            let table_count = db.table_count().await?;
            if config.database_url.is_some() {
                println!("Database initialized (PostgreSQL)");
            } else {
                println!("Database initialized at: {}", config.db_path);
            }
            println!("Tables: {table_count}");
            println!("\nNext: put your credentials in .env or ~/.twitter_keys.toml");
            println!("Then run: snowbot top --query \"snow\"");
        }

        Commands::Search(args) => {
            let settings = load_search_settings(&args).await?;
            let options = settings.stream_options()?;
            let client = search_client(&settings)?;
            let mut stream = ResultStream::new(&client, options)?;

            let mut writer = (settings.filename_prefix.is_some()
                || settings.results_per_file.is_some())
            .then(|| {
                ResultWriter::new(
                    settings.filename_prefix_or_default(),
                    settings.results_per_file,
                    Utc::now(),
                )
            });
            let print_stream = settings.print_stream.unwrap_or(true);

            let mut items = 0u64;
            while let Some(item) = stream.next().await? {
                if let Some(w) = writer.as_mut() {
                    w.write(&item)?;
                }
                if print_stream {
                    println!("{}", serde_json::to_string(&item)?);
                }
                items += 1;
            }

            if let Some(w) = writer {
                for file in w.finish()? {
                    info!(file = %file.display(), "Saved results");
                }
            }
            info!(
                items = items,
                requests = stream.requests_made(),
                "Search finished"
            );
        }

        Commands::Top {
            search,
            max_top_tweets,
            engagements_minimum,
        } => {
            let config = Config::load()?;
            let db = open_database(&config).await?;

            let settings = load_search_settings(&search).await?;
            // Ranking needs raw pages with metrics, never counts.
            let settings = SearchSettings {
                output_format: Some(OutputFormat::Responses.to_string()),
                granularity: None,
                tweet_fields: Some(with_public_metrics(settings.tweet_fields.as_deref())),
                ..settings
            };
            let options = settings.stream_options()?;
            let client = search_client(&settings)?;
            let stream = ResultStream::new(&client, options)?;

            let ranking = RankingOptions {
                minimum: engagements_minimum.unwrap_or(config.engagements_minimum),
                top_n: max_top_tweets.unwrap_or(config.max_top_tweets),
            };
            let summary =
                snowbot::pipeline::top_tweets::run(stream, db.as_ref(), &ranking, Utc::now())
                    .await?;
            terminal::display_top_summary(&summary, ranking.minimum);
        }

        Commands::Quote { dry_run } => {
            let config = Config::load()?;
            config.require_quote()?;
            run_quote(&config, Action::Quote, dry_run).await?;
        }

        Commands::Retweet { dry_run } => {
            let config = Config::load()?;
            config.require_retweet()?;
            run_quote(&config, Action::Retweet, dry_run).await?;
        }

        Commands::Report => {
            let config = Config::load()?;
            let db = open_database(&config).await?;
            let rows = db.get_top_tweets().await?;
            terminal::display_top_tweets(&rows);
        }

        Commands::Status => {
            let config = Config::load()?;
            match config.database_url.as_deref() {
                Some(url) if snowbot::db::is_postgres_url(url) => {
                    let db = open_database(&config).await?;
                    snowbot::status::show(Some(&db), StorageLocation::Postgres).await?;
                }
                _ => {
                    let db = if std::path::Path::new(&config.db_path).exists() {
                        Some(open_database(&config).await?)
                    } else {
                        None
                    };
                    snowbot::status::show(db.as_ref(), StorageLocation::SqliteFile(&config.db_path))
                        .await?;
                }
            }
        }
    }

    Ok(())
}

/// Merge every settings layer, lowest first: env query defaults, config
/// file, credentials, command line. Fills in a bearer token if only the
/// consumer key/secret are configured.
async fn load_search_settings(args: &SearchArgs) -> Result<SearchSettings> {
    let env_layer = SearchSettings::env_defaults(|key| std::env::var(key).ok());

    let file_layer = match &args.config_file {
        Some(path) => read_config_file(path)?,
        None => SearchSettings::default(),
    };
    debug!(settings = ?file_layer.redacted(), "Config file settings");

    let credential_layer = load_credentials(
        args.credential_file.as_deref(),
        Some(&args.credential_file_key),
        !args.no_env_overwrite,
        |key| std::env::var(key).ok(),
    );

    let merged = env_layer
        .merge(file_layer)
        .merge(credential_layer)
        .merge(args.to_settings()?);
    debug!(settings = ?merged.redacted(), "Combined search settings");

    ensure_bearer_token(merged).await
}

fn search_client(settings: &SearchSettings) -> Result<SearchClient> {
    let headers = settings.extra_headers.clone().unwrap_or_default();
    SearchClient::new(settings.require_bearer_token()?, &headers)
}

/// `public_metrics` added to a tweet.fields list if it isn't there.
fn with_public_metrics(fields: Option<&str>) -> String {
    match fields {
        Some(f) if f.split(',').any(|x| x.trim() == "public_metrics") => f.to_string(),
        Some(f) if !f.trim().is_empty() => format!("{f},public_metrics"),
        _ => "public_metrics".to_string(),
    }
}

async fn run_quote(config: &Config, action: Action, dry_run: bool) -> Result<()> {
    if !dry_run {
        config.require_bot_credentials()?;
    }

    let client = SearchClient::new(&config.search_bearer_token, &BTreeMap::new())?;
    let poster = PostClient::new(config.bot.clone())?;
    let request = QuoteRequest {
        query: config.quote_query.clone(),
        start_time_hours_ago: config.start_time_hours_ago,
        metrics_minimum: config.metrics_minimum,
        action,
        author_id: config.author_id.clone(),
        dry_run,
    };

    let report = snowbot::pipeline::quote::run(&client, &poster, &request).await?;
    terminal::display_quote_report(&report, action);
    Ok(())
}

/// Open the configured database: PostgreSQL for a postgres:// URL,
/// otherwise the existing SQLite file.
async fn open_database(config: &Config) -> Result<Arc<dyn Database>> {
    if let Some(url) = config.database_url.as_deref() {
        if snowbot::db::is_postgres_url(url) {
            return connect_postgres(url).await;
        }
    }
    open_sqlite(&config.db_path)
}

/// Like `open_database`, but creates the SQLite file if needed.
async fn init_database(config: &Config) -> Result<Arc<dyn Database>> {
    if let Some(url) = config.database_url.as_deref() {
        if snowbot::db::is_postgres_url(url) {
            return connect_postgres(url).await;
        }
    }
    initialize_sqlite(&config.db_path)
}

#[cfg(feature = "postgres")]
async fn connect_postgres(url: &str) -> Result<Arc<dyn Database>> {
    info!("Using PostgreSQL backend");
    snowbot::db::connect_postgres(url).await
}

#[cfg(not(feature = "postgres"))]
async fn connect_postgres(_url: &str) -> Result<Arc<dyn Database>> {
    anyhow::bail!(
        "DATABASE_URL points to PostgreSQL but the 'postgres' feature is not compiled in.\n\
         Rebuild with: cargo build --features postgres"
    )
}

#[cfg(feature = "sqlite")]
fn open_sqlite(path: &str) -> Result<Arc<dyn Database>> {
    snowbot::db::open_sqlite(path)
}

#[cfg(feature = "sqlite")]
fn initialize_sqlite(path: &str) -> Result<Arc<dyn Database>> {
    snowbot::db::initialize_sqlite(path)
}

#[cfg(not(feature = "sqlite"))]
fn open_sqlite(_path: &str) -> Result<Arc<dyn Database>> {
    anyhow::bail!("No SQLite support compiled in. Set DATABASE_URL to a postgres:// URL.")
}

#[cfg(not(feature = "sqlite"))]
fn initialize_sqlite(path: &str) -> Result<Arc<dyn Database>> {
    open_sqlite(path)
}
