// Result stream tests against a scripted page fetcher.
//
// The fetcher hands out canned responses in order and records every request,
// so pagination, caps, and output shaping can be checked without a network.

use std::collections::VecDeque;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::{json, Value};

use snowbot::search::client::{HttpOutcome, PageFetcher};
use snowbot::search::params::{build_request_parameters, ParameterRequest, RequestParameters};
use snowbot::search::stream::{OutputFormat, ResultStream, StreamOptions, StreamState};
use snowbot::search::SearchError;

const RECENT: &str = "https://api.twitter.com/2/tweets/search/recent";

struct ScriptedFetcher {
    responses: Mutex<VecDeque<HttpOutcome>>,
    calls: Mutex<Vec<(String, RequestParameters)>>,
}

impl ScriptedFetcher {
    fn new(responses: Vec<HttpOutcome>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<(String, RequestParameters)> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl PageFetcher for ScriptedFetcher {
    async fn fetch_page(&self, endpoint: &str, params: &RequestParameters) -> Result<HttpOutcome> {
        self.calls
            .lock()
            .unwrap()
            .push((endpoint.to_string(), params.clone()));
        let next = self.responses.lock().unwrap().pop_front();
        Ok(next.unwrap_or_else(|| HttpOutcome::from_parts(500, "script exhausted".into())))
    }
}

fn ok(body: Value) -> HttpOutcome {
    HttpOutcome::from_parts(200, body.to_string())
}

/// A search page with `ids` as posts and an optional continuation token.
fn page(ids: &[&str], next_token: Option<&str>) -> HttpOutcome {
    let data: Vec<Value> = ids
        .iter()
        .map(|id| json!({"id": id, "text": format!("post {id}"), "author_id": "u1"}))
        .collect();
    let mut meta = json!({"result_count": ids.len()});
    if let Some(token) = next_token {
        meta["next_token"] = json!(token);
    }
    ok(json!({
        "data": data,
        "includes": {"users": [{"id": "u1", "username": "flurry"}]},
        "meta": meta,
    }))
}

fn search_params() -> RequestParameters {
    build_request_parameters(&ParameterRequest {
        query: "snow".to_string(),
        results_per_call: Some(10),
        ..Default::default()
    })
    .unwrap()
}

fn options(format: OutputFormat, max_tweets: Option<u64>, max_pages: Option<u32>) -> StreamOptions {
    StreamOptions {
        endpoint: RECENT.to_string(),
        request_parameters: search_params(),
        max_tweets,
        max_pages,
        output_format: format,
    }
}

fn ids(items: &[Value]) -> Vec<&str> {
    items
        .iter()
        .filter_map(|v| v.get("id").and_then(Value::as_str))
        .collect()
}

// ============================================================
// Pagination
// ============================================================

#[tokio::test]
async fn follows_next_token_until_exhausted() {
    let fetcher = ScriptedFetcher::new(vec![
        page(&["1", "2"], Some("t1")),
        page(&["3"], Some("t2")),
        page(&["4"], None),
    ]);
    let stream = ResultStream::new(&fetcher, options(OutputFormat::Atomic, None, None)).unwrap();
    let items = stream.collect().await.unwrap();

    assert_eq!(ids(&items), vec!["1", "2", "3", "4"]);

    let calls = fetcher.calls();
    assert_eq!(calls.len(), 3);
    assert!(!calls[0].1.contains_key("next_token"));
    assert_eq!(calls[1].1.get("next_token"), Some(&json!("t1")));
    assert_eq!(calls[2].1.get("next_token"), Some(&json!("t2")));
    assert!(calls.iter().all(|(endpoint, _)| endpoint == RECENT));
}

#[tokio::test]
async fn max_pages_stops_paging() {
    let fetcher = ScriptedFetcher::new(vec![
        page(&["1"], Some("t1")),
        page(&["2"], Some("t2")),
        page(&["3"], Some("t3")),
    ]);
    let stream =
        ResultStream::new(&fetcher, options(OutputFormat::Atomic, None, Some(2))).unwrap();
    let items = stream.collect().await.unwrap();

    assert_eq!(ids(&items), vec!["1", "2"]);
    assert_eq!(fetcher.calls().len(), 2);
}

#[tokio::test]
async fn state_moves_to_done() {
    let fetcher = ScriptedFetcher::new(vec![page(&["1"], None)]);
    let mut stream =
        ResultStream::new(&fetcher, options(OutputFormat::Atomic, None, None)).unwrap();
    assert_eq!(stream.state(), StreamState::NotStarted);

    assert!(stream.next().await.unwrap().is_some());
    assert_eq!(stream.state(), StreamState::Yielding);

    assert!(stream.next().await.unwrap().is_none());
    assert_eq!(stream.state(), StreamState::Done);
    assert_eq!(stream.requests_made(), 1);

    // Stays finished.
    assert!(stream.next().await.unwrap().is_none());
    assert_eq!(fetcher.calls().len(), 1);
}

// ============================================================
// max_tweets per output format
// ============================================================

#[tokio::test]
async fn atomic_caps_items_mid_page() {
    let fetcher = ScriptedFetcher::new(vec![
        page(&["1", "2", "3"], Some("t1")),
        page(&["4", "5"], None),
    ]);
    let mut stream =
        ResultStream::new(&fetcher, options(OutputFormat::Atomic, Some(2), None)).unwrap();
    let mut items = Vec::new();
    while let Some(item) = stream.next().await.unwrap() {
        items.push(item);
    }

    assert_eq!(ids(&items), vec!["1", "2"]);
    assert_eq!(stream.total_results(), 2);
    assert_eq!(fetcher.calls().len(), 1);
}

#[tokio::test]
async fn atomic_expands_includes() {
    let fetcher = ScriptedFetcher::new(vec![page(&["1"], None)]);
    let stream = ResultStream::new(&fetcher, options(OutputFormat::Atomic, None, None)).unwrap();
    let items = stream.collect().await.unwrap();

    assert_eq!(items.len(), 1);
    assert_eq!(
        items[0].pointer("/author/username"),
        Some(&json!("flurry"))
    );
}

#[tokio::test]
async fn messages_append_includes_and_meta() {
    let fetcher = ScriptedFetcher::new(vec![page(&["1", "2"], None)]);
    let stream =
        ResultStream::new(&fetcher, options(OutputFormat::Messages, None, None)).unwrap();
    let items = stream.collect().await.unwrap();

    assert_eq!(items.len(), 4);
    assert_eq!(ids(&items[..2]), vec!["1", "2"]);
    assert!(items[2].get("users").is_some());
    assert_eq!(items[3].get("result_count"), Some(&json!(2)));
    // Posts stay unexpanded.
    assert!(items[0].get("author").is_none());
}

#[tokio::test]
async fn messages_cap_counts_posts_only() {
    let fetcher = ScriptedFetcher::new(vec![
        page(&["1", "2"], Some("t1")),
        page(&["3", "4"], None),
    ]);
    let stream =
        ResultStream::new(&fetcher, options(OutputFormat::Messages, Some(3), None)).unwrap();
    let items = stream.collect().await.unwrap();

    assert_eq!(ids(&items), vec!["1", "2", "3"]);
    assert_eq!(items.len(), 7);
    assert_eq!(fetcher.calls().len(), 2);
}

#[tokio::test]
async fn responses_cap_by_result_count() {
    let fetcher = ScriptedFetcher::new(vec![
        page(&["1", "2"], Some("t1")),
        page(&["3", "4"], Some("t2")),
        page(&["5", "6"], None),
    ]);
    let stream =
        ResultStream::new(&fetcher, options(OutputFormat::Responses, Some(3), None)).unwrap();
    let items = stream.collect().await.unwrap();

    // Whole pages are yielded: 2 posts, then 2 more reaches the cap.
    assert_eq!(items.len(), 2);
    assert_eq!(fetcher.calls().len(), 2);
    assert!(items[0].get("meta").is_some());
}

// ============================================================
// Ending conditions
// ============================================================

#[tokio::test]
async fn error_status_ends_stream_keeping_earlier_items() {
    let fetcher = ScriptedFetcher::new(vec![
        page(&["1"], Some("t1")),
        HttpOutcome::from_parts(429, r#"{"title":"Too Many Requests"}"#.into()),
    ]);
    let mut stream =
        ResultStream::new(&fetcher, options(OutputFormat::Atomic, None, None)).unwrap();
    let mut items = Vec::new();
    while let Some(item) = stream.next().await.unwrap() {
        items.push(item);
    }

    assert_eq!(ids(&items), vec!["1"]);
    assert_eq!(stream.state(), StreamState::Done);
    assert_eq!(fetcher.calls().len(), 2);
}

#[tokio::test]
async fn failure_is_kept_on_the_stream() {
    let fetcher = ScriptedFetcher::new(vec![
        page(&["1"], Some("t1")),
        HttpOutcome::from_parts(503, "unavailable".into()),
    ]);
    let mut stream =
        ResultStream::new(&fetcher, options(OutputFormat::Responses, None, None)).unwrap();
    while stream.next().await.unwrap().is_some() {}

    let failure = stream.failure().unwrap();
    assert_eq!(failure.status(), 503);
    assert_eq!(failure.body(), "unavailable");
}

#[tokio::test]
async fn normal_end_has_no_failure() {
    let fetcher = ScriptedFetcher::new(vec![page(&["1"], None)]);
    let mut stream =
        ResultStream::new(&fetcher, options(OutputFormat::Responses, None, None)).unwrap();
    while stream.next().await.unwrap().is_some() {}

    assert_eq!(stream.state(), StreamState::Done);
    assert!(stream.failure().is_none());
}

#[tokio::test]
async fn undecodable_body_is_kept_as_failure() {
    let fetcher = ScriptedFetcher::new(vec![HttpOutcome::from_parts(200, "<html>".into())]);
    let mut stream =
        ResultStream::new(&fetcher, options(OutputFormat::Atomic, None, None)).unwrap();
    assert!(stream.next().await.unwrap().is_none());
    assert_eq!(stream.failure().map(|f| f.status()), Some(200));
}

#[tokio::test]
async fn first_request_failure_yields_nothing() {
    let fetcher = ScriptedFetcher::new(vec![HttpOutcome::from_parts(
        401,
        r#"{"title":"Unauthorized"}"#.into(),
    )]);
    let stream = ResultStream::new(&fetcher, options(OutputFormat::Responses, None, None)).unwrap();
    assert!(stream.collect().await.unwrap().is_empty());
}

#[tokio::test]
async fn page_without_data_ends_stream() {
    let fetcher = ScriptedFetcher::new(vec![
        ok(json!({"meta": {"result_count": 0, "next_token": "t1"}})),
        page(&["never"], None),
    ]);
    let stream = ResultStream::new(&fetcher, options(OutputFormat::Atomic, None, None)).unwrap();
    assert!(stream.collect().await.unwrap().is_empty());
    assert_eq!(fetcher.calls().len(), 1);
}

#[tokio::test]
async fn undecodable_body_ends_stream() {
    let fetcher = ScriptedFetcher::new(vec![HttpOutcome::from_parts(200, "<html>".into())]);
    let stream = ResultStream::new(&fetcher, options(OutputFormat::Atomic, None, None)).unwrap();
    assert!(stream.collect().await.unwrap().is_empty());
}

// ============================================================
// Counts endpoint
// ============================================================

fn counts_params() -> RequestParameters {
    build_request_parameters(&ParameterRequest {
        query: "snow".to_string(),
        granularity: Some("day".to_string()),
        ..Default::default()
    })
    .unwrap()
}

#[tokio::test]
async fn granularity_switches_to_counts_endpoint() {
    let fetcher = ScriptedFetcher::new(vec![
        ok(json!({
            "data": [{"start": "2021-01-01T00:00:00.000Z", "end": "2021-01-02T00:00:00.000Z", "tweet_count": 40}],
            "meta": {"total_tweet_count": 40, "next_token": "c1"}
        })),
        ok(json!({
            "data": [{"start": "2021-01-02T00:00:00.000Z", "end": "2021-01-03T00:00:00.000Z", "tweet_count": 7}],
            "meta": {"total_tweet_count": 7}
        })),
    ]);
    let stream = ResultStream::new(
        &fetcher,
        StreamOptions {
            endpoint: RECENT.to_string(),
            request_parameters: counts_params(),
            max_tweets: Some(1),
            max_pages: None,
            output_format: OutputFormat::Responses,
        },
    )
    .unwrap();
    assert_eq!(
        stream.endpoint(),
        "https://api.twitter.com/2/tweets/counts/recent"
    );

    // Counts pages don't count against max_tweets.
    let items = stream.collect().await.unwrap();
    assert_eq!(items.len(), 2);

    let calls = fetcher.calls();
    assert!(calls
        .iter()
        .all(|(endpoint, _)| endpoint.ends_with("/tweets/counts/recent")));
}

#[test]
fn output_format_letters() {
    assert_eq!("r".parse::<OutputFormat>(), Ok(OutputFormat::Responses));
    assert_eq!("a".parse::<OutputFormat>(), Ok(OutputFormat::Atomic));
    assert_eq!("m".parse::<OutputFormat>(), Ok(OutputFormat::Messages));
    assert_eq!(
        "x".parse::<OutputFormat>(),
        Err(SearchError::InvalidOutputFormat("x".to_string()))
    );
    assert_eq!(OutputFormat::default().to_string(), "r");
}
