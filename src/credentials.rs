// Search API credentials.
//
// Credentials live in a TOML file under a top-level key:
//
//   [search_tweets_v2]
//   endpoint = "https://api.twitter.com/2/tweets/search/recent"
//   bearer_token = "AAAA..."
//   # or consumer_key + consumer_secret to have a bearer token generated
//   [search_tweets_v2.extra_headers]
//   X-Header = "value"
//
// and/or in SEARCHTWEETS_* environment variables. A missing file or key is
// not fatal; the environment can supply everything on its own.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use tracing::{error, info, warn};

use crate::search::settings::{header_map, SearchSettings};

/// Top-level key read from the credential file by default.
pub const DEFAULT_CREDENTIAL_KEY: &str = "search_tweets_v2";

/// App-only OAuth2 token endpoint.
pub const OAUTH2_TOKEN_ENDPOINT: &str = "https://api.twitter.com/oauth2/token";

const DEFAULT_CREDENTIAL_FILE: &str = ".twitter_keys.toml";

const ENV_ENDPOINT: &str = "SEARCHTWEETS_ENDPOINT";
const ENV_BEARER_TOKEN: &str = "SEARCHTWEETS_BEARER_TOKEN";
const ENV_CONSUMER_KEY: &str = "SEARCHTWEETS_CONSUMER_KEY";
const ENV_CONSUMER_SECRET: &str = "SEARCHTWEETS_CONSUMER_SECRET";

/// `~/.twitter_keys.toml`, or a relative path if there is no home directory.
pub fn default_credential_path() -> PathBuf {
    dirs::home_dir()
        .map(|home| home.join(DEFAULT_CREDENTIAL_FILE))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CREDENTIAL_FILE))
}

/// Build the credentials layer from a file and the environment.
///
/// With `env_overwrite` set, environment values win over file values;
/// otherwise the file wins. Only endpoint, tokens, consumer key/secret
/// and extra headers are taken from either source.
pub fn load_credentials(
    filename: Option<&Path>,
    key: Option<&str>,
    env_overwrite: bool,
    lookup: impl Fn(&str) -> Option<String>,
) -> SearchSettings {
    let path = filename
        .map(Path::to_path_buf)
        .unwrap_or_else(default_credential_path);
    let key = key.unwrap_or(DEFAULT_CREDENTIAL_KEY);

    let from_file = match read_credential_file(&path, key) {
        Ok(settings) => settings,
        Err(e) => {
            warn!(error = %format!("{e:#}"), "Could not read credential file; using environment variables");
            SearchSettings::default()
        }
    };
    let from_env = env_credentials(lookup);

    if env_overwrite {
        from_file.merge(from_env)
    } else {
        from_env.merge(from_file)
    }
}

fn read_credential_file(path: &Path, key: &str) -> Result<SearchSettings> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Cannot read {}", path.display()))?;
    parse_credentials(&content, key).with_context(|| format!("In {}", path.display()))
}

/// Parse credential-file text, selecting the table under `key`.
pub fn parse_credentials(content: &str, key: &str) -> Result<SearchSettings> {
    let table: toml::Table = content.parse().context("Failed to parse TOML")?;
    let Some(section) = table.get(key).and_then(toml::Value::as_table) else {
        bail!("missing the credential key [{key}]");
    };

    let text = |k: &str| {
        section
            .get(k)
            .and_then(toml::Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    Ok(SearchSettings {
        endpoint: text("endpoint"),
        bearer_token: text("bearer_token"),
        consumer_key: text("consumer_key"),
        consumer_secret: text("consumer_secret"),
        extra_headers: section
            .get("extra_headers")
            .map(|v| header_map("extra_headers", v))
            .transpose()?,
        ..Default::default()
    })
}

fn env_credentials(lookup: impl Fn(&str) -> Option<String>) -> SearchSettings {
    let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
    SearchSettings {
        endpoint: get(ENV_ENDPOINT),
        bearer_token: get(ENV_BEARER_TOKEN),
        consumer_key: get(ENV_CONSUMER_KEY),
        consumer_secret: get(ENV_CONSUMER_SECRET),
        ..Default::default()
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Exchange a consumer key/secret for an app-only bearer token
/// (client-credentials grant).
pub async fn generate_bearer_token(consumer_key: &str, consumer_secret: &str) -> Result<String> {
    info!("Requesting bearer token from OAuth2 endpoint");

    let client = reqwest::Client::builder()
        .user_agent(crate::search::client::USER_AGENT)
        .build()
        .context("Failed to build HTTP client")?;

    let response = client
        .post(OAUTH2_TOKEN_ENDPOINT)
        .basic_auth(consumer_key, Some(consumer_secret))
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await
        .context("Bearer token request failed")?;

    let status = response.status();
    let body = response
        .text()
        .await
        .context("Failed to read bearer token response")?;

    if !status.is_success() {
        error!(status = status.as_u16(), body = %body, "Bearer token request rejected");
        bail!("Bearer token request returned HTTP {status}");
    }

    let token: TokenResponse =
        serde_json::from_str(&body).context("Bearer token response has no access_token")?;
    Ok(token.access_token)
}

/// Fill in `bearer_token` from the consumer key/secret when only those are set.
pub async fn ensure_bearer_token(settings: SearchSettings) -> Result<SearchSettings> {
    if settings.bearer_token.is_some() {
        return Ok(settings);
    }
    match (&settings.consumer_key, &settings.consumer_secret) {
        (Some(key), Some(secret)) => {
            let token = generate_bearer_token(key, secret).await?;
            Ok(SearchSettings {
                bearer_token: Some(token),
                ..settings
            })
        }
        _ => bail!(
            "No bearer token configured. Set SEARCHTWEETS_BEARER_TOKEN, or bearer_token \
             (or consumer_key and consumer_secret) in the credential file."
        ),
    }
}
