// Paginated result stream.
//
// A `ResultStream` issues one request at a time and hands back result items
// one at a time. When a page is used up it follows `meta.next_token` until
// the token runs out, `max_tweets` items have been produced, or `max_pages`
// requests have been made.
//
// States: NotStarted -> Fetching -> Yielding -> (Fetching | Done).
//
// Error statuses are not fatal: the stream logs them and ends, keeping
// whatever it already produced. The response that ended it is kept and
// exposed through `failure()` so callers can tell a failed search from an
// exhausted one.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use anyhow::Result;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use super::client::{HttpOutcome, PageFetcher};
use super::expand::Includes;
use super::pacer::Pacer;
use super::params::{
    change_to_count_endpoint, infer_endpoint, validate_count_api, EndpointKind, RequestParameters,
};
use super::SearchError;

/// How pages are reshaped into output items.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// `r`: each raw API response page is one item.
    #[default]
    Responses,
    /// `a`: each post is one item, with `includes` expanded inline.
    Atomic,
    /// `m`: each post is one item, followed by the page's `includes` and `meta`.
    Messages,
}

impl OutputFormat {
    /// The single-letter name used on the command line and in config files.
    pub fn as_letter(&self) -> &'static str {
        match self {
            OutputFormat::Responses => "r",
            OutputFormat::Atomic => "a",
            OutputFormat::Messages => "m",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = SearchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "r" => Ok(OutputFormat::Responses),
            "a" => Ok(OutputFormat::Atomic),
            "m" => Ok(OutputFormat::Messages),
            other => Err(SearchError::InvalidOutputFormat(other.to_string())),
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_letter())
    }
}

/// What a stream needs to run.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamOptions {
    /// Search URL. Rewritten to the counts URL when the parameters carry
    /// `granularity`.
    pub endpoint: String,
    /// Built once; each page request is a copy with `next_token` added.
    pub request_parameters: RequestParameters,
    /// Cap on items produced; `None` means unlimited.
    pub max_tweets: Option<u64>,
    /// Cap on requests made; `None` means unlimited.
    pub max_pages: Option<u32>,
    pub output_format: OutputFormat,
}

/// Where a `ResultStream` is in its request cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    /// No request made yet.
    NotStarted,
    /// A page request is in flight.
    Fetching,
    /// Handing out items from the last page; may fetch again when they run out.
    Yielding,
    /// Finished: token exhausted, a cap reached, or a request failed.
    Done,
}

/// Sequential paginating reader over the search or counts endpoint.
///
/// Borrows the fetcher, so the same client can drive several streams one
/// after another. Not restartable: once `Done`, `next` keeps returning `None`.
pub struct ResultStream<'a> {
    fetcher: &'a dyn PageFetcher,
    endpoint: String,
    kind: EndpointKind,
    request_parameters: RequestParameters,
    max_tweets: u64,
    max_pages: u32,
    output_format: OutputFormat,
    pacer: Option<Pacer>,
    state: StreamState,
    buffer: VecDeque<Value>,
    next_token: Option<String>,
    total_results: u64,
    n_requests: u32,
    failure: Option<HttpOutcome>,
}

impl<'a> ResultStream<'a> {
    /// Create a stream. If the parameters carry `granularity` the endpoint is
    /// switched to its counts variant.
    pub fn new(fetcher: &'a dyn PageFetcher, options: StreamOptions) -> Result<Self, SearchError> {
        let kind = infer_endpoint(&options.request_parameters);
        let endpoint = match kind {
            EndpointKind::Counts => change_to_count_endpoint(&options.endpoint),
            EndpointKind::Search => options.endpoint,
        };
        validate_count_api(&options.request_parameters, &endpoint)?;

        Ok(Self {
            fetcher,
            pacer: Pacer::for_endpoint(&endpoint),
            endpoint,
            kind,
            request_parameters: options.request_parameters,
            max_tweets: options.max_tweets.unwrap_or(u64::MAX),
            max_pages: options.max_pages.unwrap_or(u32::MAX),
            output_format: options.output_format,
            state: StreamState::NotStarted,
            buffer: VecDeque::new(),
            next_token: None,
            total_results: 0,
            n_requests: 0,
            failure: None,
        })
    }

    /// The endpoint requests go to, after any counts rewrite.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Current position in the request cycle.
    pub fn state(&self) -> StreamState {
        self.state
    }

    /// Items counted against `max_tweets` so far.
    pub fn total_results(&self) -> u64 {
        self.total_results
    }

    /// Requests issued so far.
    pub fn requests_made(&self) -> u32 {
        self.n_requests
    }

    /// The response that ended the stream early: an error status, or a
    /// success whose body wasn't JSON. `None` if the stream ended normally
    /// or is still running.
    pub fn failure(&self) -> Option<&HttpOutcome> {
        self.failure.as_ref()
    }

    /// The next output item, or `None` once the stream is exhausted.
    ///
    /// Transport failures propagate as `Err`; error statuses end the stream.
    pub async fn next(&mut self) -> Result<Option<Value>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Ok(Some(item));
            }

            match self.state {
                StreamState::NotStarted => {
                    self.fetch(None).await?;
                }
                StreamState::Yielding => match self.next_token.clone() {
                    Some(token) if self.may_continue() => {
                        debug!(requests = self.n_requests, "Paging");
                        self.fetch(Some(&token)).await?;
                    }
                    _ => self.finish(),
                },
                StreamState::Fetching | StreamState::Done => return Ok(None),
            }
        }
    }

    /// Drain the stream into a vector.
    ///
    /// Consumes the stream, so `failure()` is no longer reachable; callers that
    /// need to tell a failed search apart should loop over `next` instead.
    pub async fn collect(mut self) -> Result<Vec<Value>> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await? {
            items.push(item);
        }
        Ok(items)
    }

    fn may_continue(&self) -> bool {
        self.total_results < self.max_tweets && self.n_requests < self.max_pages
    }

    fn finish(&mut self) {
        if self.state != StreamState::Done {
            info!(
                total = self.total_results,
                requests = self.n_requests,
                "Ending stream"
            );
        }
        self.state = StreamState::Done;
        self.next_token = None;
    }

    async fn fetch(&mut self, token: Option<&str>) -> Result<()> {
        self.state = StreamState::Fetching;

        let params = match token {
            Some(t) => self.request_parameters.with_next_token(t),
            None => self.request_parameters.clone(),
        };

        if let Some(pacer) = self.pacer.as_mut() {
            pacer.wait().await;
        }

        let outcome = self.fetcher.fetch_page(&self.endpoint, &params).await?;
        self.n_requests += 1;

        let page: Value = match &outcome {
            HttpOutcome::Failure(resp) => {
                warn!(
                    status = resp.status,
                    body = %resp.body,
                    params = %params.to_json_string(),
                    "Search request failed; ending stream"
                );
                self.failure = Some(outcome.clone());
                self.finish();
                return Ok(());
            }
            HttpOutcome::Success(_) => match outcome.json() {
                Ok(v) => v,
                Err(e) => {
                    error!(error = %e, "Error parsing content as JSON; ending stream");
                    self.failure = Some(outcome.clone());
                    self.finish();
                    return Ok(());
                }
            },
        };

        self.load_page(page);
        Ok(())
    }

    fn load_page(&mut self, page: Value) {
        self.next_token = page
            .get("meta")
            .and_then(|m| m.get("next_token"))
            .and_then(Value::as_str)
            .map(str::to_string);

        let Some(items) = page.get("data").and_then(Value::as_array).cloned() else {
            debug!("Page has no data; ending stream");
            self.finish();
            return;
        };

        match self.output_format {
            OutputFormat::Responses => self.load_response(page),
            OutputFormat::Atomic => {
                let includes = Includes::from_value(page.get("includes"));
                for item in items {
                    if !self.take_slot() {
                        break;
                    }
                    self.buffer.push_back(includes.expand(item));
                }
            }
            OutputFormat::Messages => {
                for item in items {
                    if !self.take_slot() {
                        break;
                    }
                    self.buffer.push_back(item);
                }
                for section in ["includes", "meta"] {
                    if let Some(v) = page.get(section) {
                        self.buffer.push_back(v.clone());
                    }
                }
            }
        }

        self.state = StreamState::Yielding;
    }

    fn load_response(&mut self, page: Value) {
        // Counts pages are always passed through; only posts count against max_tweets.
        if self.kind == EndpointKind::Counts {
            self.buffer.push_back(page);
            return;
        }
        if self.total_results >= self.max_tweets {
            return;
        }
        let result_count = page
            .get("meta")
            .and_then(|m| m.get("result_count"))
            .and_then(Value::as_u64)
            .unwrap_or(0);
        self.buffer.push_back(page);
        self.total_results = self.total_results.saturating_add(result_count);
    }

    /// Count one item against `max_tweets`; false if the cap is reached.
    fn take_slot(&mut self) -> bool {
        if self.total_results >= self.max_tweets {
            return false;
        }
        self.total_results += 1;
        true
    }
}
