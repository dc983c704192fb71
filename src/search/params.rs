// Request parameter building and endpoint selection.
//
// The search API has two response shapes behind two URL families: posts
// (`/2/tweets/search/{recent,all}`) and aggregate counts
// (`/2/tweets/counts/{recent,all}`). A `granularity` parameter is what marks
// a counts request, so the builder, the classifier, and the URL rewriter all
// key off that one parameter.

use serde_json::{Map, Value};

use super::time::normalize_timestamp;
use super::SearchError;

/// The one parameter that distinguishes a counts request.
pub const GRANULARITY_KEY: &str = "granularity";

/// Pagination token parameter name.
pub const NEXT_TOKEN_KEY: &str = "next_token";

/// Everything the builder can turn into request parameters.
///
/// Empty strings are treated the same as `None`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterRequest {
    pub query: String,
    pub granularity: Option<String>,
    pub results_per_call: Option<u32>,
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
}

/// Built request parameters, keyed by API parameter name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestParameters(Map<String, Value>);

impl RequestParameters {
    /// The structured mapping.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Serialize as a JSON text payload.
    pub fn to_json_string(&self) -> String {
        Value::Object(self.0.clone()).to_string()
    }

    /// Parse a JSON text payload back into parameters.
    pub fn from_json_str(payload: &str) -> serde_json::Result<Self> {
        serde_json::from_str(payload).map(Self)
    }

    /// Flatten into GET query pairs. Strings are sent as-is, numbers in
    /// their decimal form.
    pub fn query_pairs(&self) -> Vec<(String, String)> {
        self.0
            .iter()
            .map(|(k, v)| {
                let value = match v {
                    Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                (k.clone(), value)
            })
            .collect()
    }

    /// A copy of these parameters with the pagination token set.
    pub fn with_next_token(&self, token: &str) -> Self {
        let mut map = self.0.clone();
        map.insert(NEXT_TOKEN_KEY.to_string(), Value::String(token.to_string()));
        Self(map)
    }

    fn insert_str(&mut self, key: &str, value: &Option<String>) {
        if let Some(v) = non_empty(value) {
            self.0.insert(key.to_string(), Value::String(v.to_string()));
        }
    }
}

/// Build request parameters for a search or counts request.
///
/// The query is whitespace-collapsed so multi-line queries from config files
/// work. Time bounds go through the timestamp normalizer and fail if they
/// can't be parsed. When `granularity` is set the page-size, sort, and
/// field-selection parameters are dropped; the counts endpoint rejects them.
pub fn build_request_parameters(
    request: &ParameterRequest,
) -> Result<RequestParameters, SearchError> {
    let mut params = RequestParameters::default();
    params.0.insert(
        "query".to_string(),
        Value::String(collapse_whitespace(&request.query)),
    );

    // Supported by both the search and counts endpoints.
    if let Some(start) = non_empty(&request.start_time) {
        params.0.insert(
            "start_time".to_string(),
            Value::String(normalize_timestamp(start)?),
        );
    }
    if let Some(end) = non_empty(&request.end_time) {
        params.0.insert(
            "end_time".to_string(),
            Value::String(normalize_timestamp(end)?),
        );
    }
    params.insert_str("since_id", &request.since_id);
    params.insert_str("until_id", &request.until_id);

    if non_empty(&request.granularity).is_some() {
        params.insert_str(GRANULARITY_KEY, &request.granularity);
    } else {
        if let Some(n) = request.results_per_call {
            params.0.insert("max_results".to_string(), Value::from(n));
        }
        params.insert_str("sort_order", &request.sort_order);
        params.insert_str("tweet.fields", &request.tweet_fields);
        params.insert_str("user.fields", &request.user_fields);
        params.insert_str("media.fields", &request.media_fields);
        params.insert_str("place.fields", &request.place_fields);
        params.insert_str("poll.fields", &request.poll_fields);
        params.insert_str("expansions", &request.expansions);
    }

    Ok(params)
}

/// Which endpoint family a parameter set targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndpointKind {
    Search,
    Counts,
}

/// Classify a parameter set by the presence of `granularity`.
pub fn infer_endpoint(params: &RequestParameters) -> EndpointKind {
    if params.contains_key(GRANULARITY_KEY) {
        EndpointKind::Counts
    } else {
        EndpointKind::Search
    }
}

/// Rewrite a search URL into its counts equivalent.
///
/// `https://api.twitter.com/2/tweets/search/recent` becomes
/// `https://api.twitter.com/2/tweets/counts/recent`. URLs that already
/// mention `counts` come back unchanged, so this is idempotent.
pub fn change_to_count_endpoint(endpoint: &str) -> String {
    if endpoint.contains("counts") {
        return endpoint.to_string();
    }
    let search_type = endpoint.rsplit('/').next().unwrap_or_default();
    let base = endpoint.split("tweets").next().unwrap_or_default();
    format!("{base}tweets/counts/{search_type}")
}

/// Reject a counts request aimed at a non-counts endpoint.
pub fn validate_count_api(params: &RequestParameters, endpoint: &str) -> Result<(), SearchError> {
    if params.contains_key(GRANULARITY_KEY) && !endpoint.contains("counts") {
        return Err(SearchError::CountsEndpointRequired(endpoint.to_string()));
    }
    Ok(())
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|s| !s.is_empty())
}
