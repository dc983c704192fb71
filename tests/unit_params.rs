// Unit tests for request-parameter building and endpoint handling.

use snowbot::search::params::{
    build_request_parameters, change_to_count_endpoint, infer_endpoint, validate_count_api,
    EndpointKind, ParameterRequest, RequestParameters,
};
use snowbot::search::SearchError;

const RECENT: &str = "https://api.twitter.com/2/tweets/search/recent";
const ALL: &str = "https://api.twitter.com/2/tweets/search/all";
const COUNTS_RECENT: &str = "https://api.twitter.com/2/tweets/counts/recent";

fn keys(params: &RequestParameters) -> Vec<&str> {
    params.as_map().keys().map(String::as_str).collect()
}

fn full_request() -> ParameterRequest {
    ParameterRequest {
        query: "snow has:media".to_string(),
        results_per_call: Some(100),
        sort_order: Some("recency".to_string()),
        tweet_fields: Some("id,public_metrics".to_string()),
        user_fields: Some("username".to_string()),
        media_fields: Some("url".to_string()),
        place_fields: Some("full_name".to_string()),
        poll_fields: Some("options".to_string()),
        expansions: Some("author_id".to_string()),
        ..Default::default()
    }
}

// ============================================================
// build_request_parameters
// ============================================================

#[test]
fn query_only() {
    let params = build_request_parameters(&ParameterRequest {
        query: "snow".to_string(),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(keys(&params), vec!["query"]);
}

#[test]
fn query_whitespace_collapsed() {
    let params = build_request_parameters(&ParameterRequest {
        query: "snow\n   OR\tsnowfall  ".to_string(),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(
        params.get("query").and_then(|v| v.as_str()),
        Some("snow OR snowfall")
    );
}

#[test]
fn all_optional_keys_emitted_without_granularity() {
    let params = build_request_parameters(&full_request()).unwrap();
    let mut got = keys(&params);
    got.sort();
    assert_eq!(
        got,
        vec![
            "expansions",
            "max_results",
            "media.fields",
            "place.fields",
            "poll.fields",
            "query",
            "sort_order",
            "tweet.fields",
            "user.fields",
        ]
    );
    assert_eq!(params.get("max_results").and_then(|v| v.as_u64()), Some(100));
}

#[test]
fn granularity_drops_page_size_and_fields() {
    let request = ParameterRequest {
        granularity: Some("day".to_string()),
        start_time: Some("2021-01-01".to_string()),
        ..full_request()
    };
    let params = build_request_parameters(&request).unwrap();
    let mut got = keys(&params);
    got.sort();
    assert_eq!(got, vec!["granularity", "query", "start_time"]);
}

#[test]
fn time_bounds_normalized() {
    let request = ParameterRequest {
        query: "snow".to_string(),
        start_time: Some("201708020000".to_string()),
        end_time: Some("2017-08-03 12:00".to_string()),
        ..Default::default()
    };
    let params = build_request_parameters(&request).unwrap();
    assert_eq!(
        params.get("start_time").and_then(|v| v.as_str()),
        Some("2017-08-02T00:00:00Z")
    );
    assert_eq!(
        params.get("end_time").and_then(|v| v.as_str()),
        Some("2017-08-03T12:00:00Z")
    );
}

#[test]
fn bad_time_bound_is_an_error() {
    let request = ParameterRequest {
        query: "snow".to_string(),
        start_time: Some("last tuesday".to_string()),
        ..Default::default()
    };
    assert_eq!(
        build_request_parameters(&request),
        Err(SearchError::InvalidTimestamp("last tuesday".to_string()))
    );
}

#[test]
fn empty_strings_are_omitted() {
    let request = ParameterRequest {
        query: "snow".to_string(),
        start_time: Some(String::new()),
        since_id: Some(String::new()),
        tweet_fields: Some(String::new()),
        ..Default::default()
    };
    assert_eq!(keys(&build_request_parameters(&request).unwrap()), vec!["query"]);
}

#[test]
fn id_bounds_pass_through() {
    let request = ParameterRequest {
        query: "snow".to_string(),
        since_id: Some("100".to_string()),
        until_id: Some("200".to_string()),
        granularity: Some("hour".to_string()),
        ..Default::default()
    };
    let params = build_request_parameters(&request).unwrap();
    assert!(params.contains_key("since_id"));
    assert!(params.contains_key("until_id"));
}

#[test]
fn json_payload_round_trips() {
    let params = build_request_parameters(&full_request()).unwrap();
    let parsed = RequestParameters::from_json_str(&params.to_json_string()).unwrap();
    assert_eq!(parsed, params);
}

#[test]
fn query_pairs_render_numbers_plainly() {
    let params = build_request_parameters(&full_request()).unwrap();
    let pairs = params.query_pairs();
    assert!(pairs.contains(&("max_results".to_string(), "100".to_string())));
    assert!(pairs.contains(&("query".to_string(), "snow has:media".to_string())));
}

#[test]
fn next_token_attached_to_copy() {
    let params = build_request_parameters(&full_request()).unwrap();
    let paged = params.with_next_token("abc");
    assert!(!params.contains_key("next_token"));
    assert_eq!(paged.get("next_token").and_then(|v| v.as_str()), Some("abc"));
}

// ============================================================
// Endpoint classification and rewriting
// ============================================================

#[test]
fn infer_by_granularity() {
    let search = build_request_parameters(&full_request()).unwrap();
    assert_eq!(infer_endpoint(&search), EndpointKind::Search);

    let counts = build_request_parameters(&ParameterRequest {
        granularity: Some("day".to_string()),
        ..full_request()
    })
    .unwrap();
    assert_eq!(infer_endpoint(&counts), EndpointKind::Counts);
}

#[test]
fn rewrite_search_to_counts() {
    assert_eq!(change_to_count_endpoint(RECENT), COUNTS_RECENT);
    assert_eq!(
        change_to_count_endpoint(ALL),
        "https://api.twitter.com/2/tweets/counts/all"
    );
}

#[test]
fn rewrite_is_idempotent() {
    let once = change_to_count_endpoint(RECENT);
    assert_eq!(change_to_count_endpoint(&once), once);
}

#[test]
fn validation_rejects_granularity_on_search_endpoint() {
    let counts = build_request_parameters(&ParameterRequest {
        query: "snow".to_string(),
        granularity: Some("day".to_string()),
        ..Default::default()
    })
    .unwrap();
    assert_eq!(
        validate_count_api(&counts, RECENT),
        Err(SearchError::CountsEndpointRequired(RECENT.to_string()))
    );
    assert_eq!(validate_count_api(&counts, COUNTS_RECENT), Ok(()));
}

#[test]
fn validation_accepts_plain_search_anywhere() {
    let search = build_request_parameters(&full_request()).unwrap();
    assert_eq!(validate_count_api(&search, RECENT), Ok(()));
    assert_eq!(validate_count_api(&search, COUNTS_RECENT), Ok(()));
}
