// Search API layer: request building, pagination, and response shaping.
//
// Everything needed to turn a search configuration into a stream of result
// items. Each submodule handles one step: timestamps and parameters are
// pure, the client does HTTP, and the stream drives pagination.

pub mod client;
pub mod expand;
pub mod pacer;
pub mod params;
pub mod settings;
pub mod stream;
pub mod time;
pub mod types;

use thiserror::Error;

/// Errors the search layer raises instead of logging.
///
/// HTTP failures are not in here on purpose: they come back as
/// `client::HttpOutcome::Failure` and the caller decides what to do.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SearchError {
    /// None of the accepted date/time shapes matched.
    #[error("unrecognized date/time '{0}' (expected YYYYMMDDHHMM, YYYY-MM-DD, YYYY-MM-DD HH:MM, YYYY-MM-DDTHH:MM, or <N>d/<N>h/<N>m)")]
    InvalidTimestamp(String),

    /// A `granularity` parameter was sent to an endpoint that only returns posts.
    #[error("request carries 'granularity' but endpoint {0} is not a counts endpoint")]
    CountsEndpointRequired(String),

    /// Output format letter other than r, a, or m.
    #[error("unknown output format '{0}' (expected r, a, or m)")]
    InvalidOutputFormat(String),

    /// A required setting was not supplied by any configuration layer.
    #[error("missing required setting: {0}")]
    MissingSetting(&'static str),
}
