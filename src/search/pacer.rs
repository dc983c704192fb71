// Minimum-interval pacing between page requests.
//
// The full-archive endpoint allows one request per second per app, and
// bursts get a 429. Pages for that endpoint go through a pacer that keeps
// consecutive requests at least `interval` apart. Recent search is not paced.

use tokio::time::{Duration, Instant};

/// Endpoint path fragment that needs pacing.
pub const FULL_ARCHIVE_PATH: &str = "tweets/search/all";

/// Gap enforced between full-archive page requests.
pub const FULL_ARCHIVE_INTERVAL: Duration = Duration::from_secs(2);

/// Keeps successive calls to `wait` at least `interval` apart.
#[derive(Debug)]
pub struct Pacer {
    /// Minimum time between requests
    interval: Duration,
    /// When the last request was allowed through
    last_request: Option<Instant>,
}

impl Pacer {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_request: None,
        }
    }

    /// The pacer for `endpoint`, if it needs one.
    pub fn for_endpoint(endpoint: &str) -> Option<Self> {
        endpoint
            .contains(FULL_ARCHIVE_PATH)
            .then(|| Self::new(FULL_ARCHIVE_INTERVAL))
    }

    /// Sleep until the interval since the previous call has elapsed.
    /// The first call returns immediately.
    pub async fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.interval {
                tokio::time::sleep(self.interval - elapsed).await;
            }
        }
        self.last_request = Some(Instant::now());
    }
}
