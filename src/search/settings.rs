// Layered search settings.
//
// A search run is configured from up to four layers, lowest first:
// environment query defaults, a TOML config file, credentials (file or env),
// and command-line flags. Every field is optional in every layer and
// `merge` lets the higher layer win field by field. The merged settings are
// then turned into the `StreamOptions` the result stream runs on.

use std::collections::BTreeMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use toml::Value as TomlValue;

use super::client::DEFAULT_SEARCH_ENDPOINT;
use super::params::{
    build_request_parameters, change_to_count_endpoint, validate_count_api, ParameterRequest,
};
use super::stream::{OutputFormat, StreamOptions};
use super::SearchError;

/// Prefix for chunked result files when none is configured.
pub const DEFAULT_FILENAME_PREFIX: &str = "twitter_search_results";

/// Page size used when no layer sets one.
pub const DEFAULT_RESULTS_PER_CALL: u32 = 100;

const REDACTED: &str = "****";

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchSettings {
    // Connection
    pub endpoint: Option<String>,
    pub bearer_token: Option<String>,
    pub consumer_key: Option<String>,
    pub consumer_secret: Option<String>,
    pub extra_headers: Option<BTreeMap<String, String>>,

    // Request
    pub query: Option<String>,
    pub granularity: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub since_id: Option<String>,
    pub until_id: Option<String>,
    pub sort_order: Option<String>,
    pub tweet_fields: Option<String>,
    pub user_fields: Option<String>,
    pub media_fields: Option<String>,
    pub place_fields: Option<String>,
    pub poll_fields: Option<String>,
    pub expansions: Option<String>,
    pub results_per_call: Option<u32>,

    // Stream
    pub max_tweets: Option<u64>,
    pub max_pages: Option<u32>,
    pub output_format: Option<String>,

    // Output
    pub results_per_file: Option<u64>,
    pub filename_prefix: Option<String>,
    pub print_stream: Option<bool>,
}

impl SearchSettings {
    /// Overlay `over` onto `self`. Fields set in `over` win.
    pub fn merge(self, over: SearchSettings) -> SearchSettings {
        SearchSettings {
            endpoint: over.endpoint.or(self.endpoint),
            bearer_token: over.bearer_token.or(self.bearer_token),
            consumer_key: over.consumer_key.or(self.consumer_key),
            consumer_secret: over.consumer_secret.or(self.consumer_secret),
            extra_headers: over.extra_headers.or(self.extra_headers),
            query: over.query.or(self.query),
            granularity: over.granularity.or(self.granularity),
            start_time: over.start_time.or(self.start_time),
            end_time: over.end_time.or(self.end_time),
            since_id: over.since_id.or(self.since_id),
            until_id: over.until_id.or(self.until_id),
            sort_order: over.sort_order.or(self.sort_order),
            tweet_fields: over.tweet_fields.or(self.tweet_fields),
            user_fields: over.user_fields.or(self.user_fields),
            media_fields: over.media_fields.or(self.media_fields),
            place_fields: over.place_fields.or(self.place_fields),
            poll_fields: over.poll_fields.or(self.poll_fields),
            expansions: over.expansions.or(self.expansions),
            results_per_call: over.results_per_call.or(self.results_per_call),
            max_tweets: over.max_tweets.or(self.max_tweets),
            max_pages: over.max_pages.or(self.max_pages),
            output_format: over.output_format.or(self.output_format),
            results_per_file: over.results_per_file.or(self.results_per_file),
            filename_prefix: over.filename_prefix.or(self.filename_prefix),
            print_stream: over.print_stream.or(self.print_stream),
        }
    }

    /// Query defaults from `SEARCHTWEETS_QUERY`, `SEARCHTWEETS_START_TIME`
    /// and `SEARCHTWEETS_TWEET_FIELDS`.
    pub fn env_defaults(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());
        SearchSettings {
            query: get("SEARCHTWEETS_QUERY"),
            start_time: get("SEARCHTWEETS_START_TIME"),
            tweet_fields: get("SEARCHTWEETS_TWEET_FIELDS"),
            ..Default::default()
        }
    }

    /// Copy with secrets masked, for logging.
    pub fn redacted(&self) -> SearchSettings {
        let mask = |v: &Option<String>| v.as_ref().map(|_| REDACTED.to_string());
        SearchSettings {
            bearer_token: mask(&self.bearer_token),
            consumer_key: mask(&self.consumer_key),
            consumer_secret: mask(&self.consumer_secret),
            ..self.clone()
        }
    }

    pub fn output_format(&self) -> Result<OutputFormat, SearchError> {
        match self.output_format.as_deref() {
            Some(letter) => letter.parse(),
            None => Ok(OutputFormat::default()),
        }
    }

    pub fn endpoint_or_default(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_SEARCH_ENDPOINT)
    }

    pub fn require_bearer_token(&self) -> Result<&str, SearchError> {
        self.bearer_token
            .as_deref()
            .filter(|t| !t.is_empty())
            .ok_or(SearchError::MissingSetting("bearer_token"))
    }

    pub fn filename_prefix_or_default(&self) -> &str {
        self.filename_prefix
            .as_deref()
            .unwrap_or(DEFAULT_FILENAME_PREFIX)
    }

    /// The builder input for these settings. Fails without a query.
    pub fn parameter_request(&self) -> Result<ParameterRequest, SearchError> {
        let query = self
            .query
            .clone()
            .filter(|q| !q.trim().is_empty())
            .ok_or(SearchError::MissingSetting("query"))?;

        Ok(ParameterRequest {
            query,
            granularity: self.granularity.clone(),
            results_per_call: Some(self.results_per_call.unwrap_or(DEFAULT_RESULTS_PER_CALL)),
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
        })
    }

    /// Derive the stream configuration: built parameters, the endpoint
    /// (switched to counts when `granularity` is set), caps and format.
    pub fn stream_options(&self) -> Result<StreamOptions, SearchError> {
        let request_parameters = build_request_parameters(&self.parameter_request()?)?;

        let mut endpoint = self.endpoint_or_default().to_string();
        if self.granularity.as_deref().is_some_and(|g| !g.is_empty()) {
            endpoint = change_to_count_endpoint(&endpoint);
        }
        validate_count_api(&request_parameters, &endpoint)?;

        Ok(StreamOptions {
            endpoint,
            request_parameters,
            max_tweets: self.max_tweets,
            max_pages: self.max_pages,
            output_format: self.output_format()?,
        })
    }
}

/// Read a TOML config file into a settings layer.
///
/// Keys from every table are flattened into one namespace (a key in a later
/// table overwrites an earlier one) and `-` in key names becomes `_`, so
/// `[search_rules] results-per-call = 100` sets `results_per_call`. Unknown
/// keys are ignored.
pub fn read_config_file(path: &Path) -> Result<SearchSettings> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file {}", path.display()))?;
    parse_config(&content).with_context(|| format!("Invalid config file {}", path.display()))
}

/// Parse config-file text. See [`read_config_file`].
pub fn parse_config(content: &str) -> Result<SearchSettings> {
    let table: toml::Table = content.parse().context("Failed to parse TOML")?;

    let mut flat: BTreeMap<String, TomlValue> = BTreeMap::new();
    for (key, value) in table {
        match value {
            TomlValue::Table(section) if key != "extra_headers" => {
                for (k, v) in section {
                    flat.insert(normalize_key(&k), v);
                }
            }
            other => {
                flat.insert(normalize_key(&key), other);
            }
        }
    }

    settings_from_flat(&flat)
}

fn normalize_key(key: &str) -> String {
    key.replace('-', "_")
}

fn settings_from_flat(flat: &BTreeMap<String, TomlValue>) -> Result<SearchSettings> {
    let text = |key: &str| flat.get(key).and_then(toml_to_string);

    Ok(SearchSettings {
        endpoint: text("endpoint"),
        bearer_token: text("bearer_token"),
        consumer_key: text("consumer_key"),
        consumer_secret: text("consumer_secret"),
        extra_headers: flat
            .get("extra_headers")
            .map(|v| header_map("extra_headers", v))
            .transpose()?,
        query: text("query"),
        granularity: text("granularity"),
        start_time: text("start_time"),
        end_time: text("end_time"),
        since_id: text("since_id"),
        until_id: text("until_id"),
        sort_order: text("sort_order"),
        tweet_fields: text("tweet_fields"),
        user_fields: text("user_fields"),
        media_fields: text("media_fields"),
        place_fields: text("place_fields"),
        poll_fields: text("poll_fields"),
        expansions: text("expansions"),
        results_per_call: number(flat, "results_per_call")?,
        max_tweets: number(flat, "max_tweets")?,
        max_pages: number(flat, "max_pages")?,
        output_format: text("output_format"),
        results_per_file: number(flat, "results_per_file")?,
        filename_prefix: text("filename_prefix"),
        print_stream: flag(flat, "print_stream")?,
    })
}

/// Render a scalar TOML value as a setting string. Arrays become
/// comma-separated lists, which is what the field-selection parameters want.
fn toml_to_string(value: &TomlValue) -> Option<String> {
    match value {
        TomlValue::String(s) => Some(s.clone()),
        TomlValue::Integer(i) => Some(i.to_string()),
        TomlValue::Float(f) => Some(f.to_string()),
        TomlValue::Boolean(b) => Some(b.to_string()),
        TomlValue::Datetime(dt) => Some(dt.to_string()),
        TomlValue::Array(items) => {
            let parts: Vec<String> = items.iter().filter_map(toml_to_string).collect();
            Some(parts.join(","))
        }
        TomlValue::Table(_) => None,
    }
}

fn number<T>(flat: &BTreeMap<String, TomlValue>, key: &str) -> Result<Option<T>>
where
    T: TryFrom<i64> + std::str::FromStr,
{
    let Some(value) = flat.get(key) else {
        return Ok(None);
    };
    let parsed = match value {
        TomlValue::Integer(i) => T::try_from(*i).ok(),
        TomlValue::String(s) => s.trim().parse::<T>().ok(),
        _ => None,
    };
    match parsed {
        Some(n) => Ok(Some(n)),
        None => bail!("'{key}' must be a non-negative integer, got {value}"),
    }
}

fn flag(flat: &BTreeMap<String, TomlValue>, key: &str) -> Result<Option<bool>> {
    match flat.get(key) {
        None => Ok(None),
        Some(TomlValue::Boolean(b)) => Ok(Some(*b)),
        Some(TomlValue::String(s)) => match s.to_ascii_lowercase().as_str() {
            "true" | "yes" | "1" => Ok(Some(true)),
            "false" | "no" | "0" => Ok(Some(false)),
            _ => bail!("'{key}' must be true or false, got '{s}'"),
        },
        Some(other) => bail!("'{key}' must be true or false, got {other}"),
    }
}

/// Interpret a TOML table (or a JSON object in a string) as header pairs.
pub(crate) fn header_map(key: &str, value: &TomlValue) -> Result<BTreeMap<String, String>> {
    match value {
        TomlValue::Table(t) => Ok(t
            .iter()
            .filter_map(|(k, v)| toml_to_string(v).map(|s| (k.clone(), s)))
            .collect()),
        TomlValue::String(s) => parse_header_json(s),
        other => bail!("'{key}' must be a table of header names to values, got {other}"),
    }
}

/// Parse `{"Header": "value", ...}` as passed to `--extra-headers`.
pub fn parse_header_json(raw: &str) -> Result<BTreeMap<String, String>> {
    let parsed: BTreeMap<String, serde_json::Value> =
        serde_json::from_str(raw).context("Extra headers must be a JSON object")?;
    Ok(parsed
        .into_iter()
        .map(|(k, v)| {
            let value = match v {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
            (k, value)
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_prefers_higher_layer() {
        let file = SearchSettings {
            query: Some("snow".into()),
            max_tweets: Some(500),
            results_per_call: Some(10),
            ..Default::default()
        };
        let cli = SearchSettings {
            query: Some("snow has:media".into()),
            ..Default::default()
        };

        let merged = file.merge(cli);
        assert_eq!(merged.query.as_deref(), Some("snow has:media"));
        assert_eq!(merged.max_tweets, Some(500));
        assert_eq!(merged.results_per_call, Some(10));
    }

    #[test]
    fn test_env_defaults_skip_empty_values() {
        let settings = SearchSettings::env_defaults(|key| match key {
            "SEARCHTWEETS_QUERY" => Some("snow".into()),
            "SEARCHTWEETS_START_TIME" => Some(String::new()),
            _ => None,
        });
        assert_eq!(settings.query.as_deref(), Some("snow"));
        assert_eq!(settings.start_time, None);
        assert_eq!(settings.tweet_fields, None);
    }

    #[test]
    fn test_redacted_masks_secrets_only() {
        let settings = SearchSettings {
            bearer_token: Some("AAAA-secret".into()),
            consumer_key: Some("ck".into()),
            query: Some("snow".into()),
            ..Default::default()
        };
        let shown = settings.redacted();
        assert_eq!(shown.bearer_token.as_deref(), Some(REDACTED));
        assert_eq!(shown.consumer_key.as_deref(), Some(REDACTED));
        assert_eq!(shown.consumer_secret, None);
        assert_eq!(shown.query.as_deref(), Some("snow"));
    }

    #[test]
    fn test_parse_config_flattens_sections() {
        let settings = parse_config(
            r#"
            [search_rules]
            query = "snow OR snowfall"
            start-time = 2021-01-01T00:00:00
            tweet-fields = ["id", "public_metrics"]

            [search_params]
            results-per-call = 100
            max-tweets = "250"

            [output_params]
            save_file = true
            filename_prefix = "snow"
            results_per_file = 1000
            "#,
        )
        .unwrap();

        assert_eq!(settings.query.as_deref(), Some("snow OR snowfall"));
        assert_eq!(settings.start_time.as_deref(), Some("2021-01-01T00:00:00"));
        assert_eq!(settings.tweet_fields.as_deref(), Some("id,public_metrics"));
        assert_eq!(settings.results_per_call, Some(100));
        assert_eq!(settings.max_tweets, Some(250));
        assert_eq!(settings.results_per_file, Some(1000));
        assert_eq!(settings.filename_prefix.as_deref(), Some("snow"));
    }

    #[test]
    fn test_parse_config_rejects_bad_number() {
        let err = parse_config("[search_params]\nmax-pages = \"lots\"\n").unwrap_err();
        assert!(format!("{err:#}").contains("max_pages"));
    }

    #[test]
    fn test_extra_headers_table() {
        let settings = parse_config("[extra_headers]\nX-Trace = \"abc\"\n").unwrap();
        let headers = settings.extra_headers.unwrap();
        assert_eq!(headers.get("X-Trace").map(String::as_str), Some("abc"));
    }

    #[test]
    fn test_stream_options_switches_to_counts() {
        let settings = SearchSettings {
            query: Some("snow".into()),
            granularity: Some("day".into()),
            ..Default::default()
        };
        let options = settings.stream_options().unwrap();
        assert_eq!(
            options.endpoint,
            "https://api.twitter.com/2/tweets/counts/recent"
        );
        assert!(!options.request_parameters.contains_key("max_results"));
    }

    #[test]
    fn test_stream_options_requires_query() {
        let err = SearchSettings::default().stream_options().unwrap_err();
        assert_eq!(err, SearchError::MissingSetting("query"));
    }

    #[test]
    fn test_bad_output_format() {
        let settings = SearchSettings {
            query: Some("snow".into()),
            output_format: Some("x".into()),
            ..Default::default()
        };
        assert_eq!(
            settings.stream_options().unwrap_err(),
            SearchError::InvalidOutputFormat("x".into())
        );
    }
}
