use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

pub(crate) const MAX_ATTEMPTS: usize = 4;
const BASE_DELAY: Duration = Duration::from_secs(2);
const MAX_DELAY: Duration = Duration::from_secs(30);

/// Throttling is reported either by status or only in the error body.
pub(crate) fn is_throttled(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE {
        return true;
    }
    if status.is_success() {
        return false;
    }
    let lower = body.to_lowercase();
    lower.contains("resource_exhausted")
        || lower.contains("rate limit")
        || lower.contains("quota")
        || lower.contains("overloaded")
}

pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get("retry-after")?.to_str().ok()?.trim();
    value.parse::<u64>().ok().map(Duration::from_secs)
}

#[derive(Debug, Clone)]
pub(crate) struct Backoff {
    service: &'static str,
    attempt: usize,
    delay: Duration,
}

impl Backoff {
    pub(crate) fn new(service: &'static str) -> Self {
        Self {
            service,
            attempt: 0,
            delay: BASE_DELAY,
        }
    }

    /// Counts an attempt; false once the budget is spent.
    pub(crate) fn next_attempt(&mut self) -> bool {
        if self.attempt >= MAX_ATTEMPTS {
            return false;
        }
        self.attempt += 1;
        true
    }

    pub(crate) fn can_retry(&self) -> bool {
        self.attempt < MAX_ATTEMPTS
    }

    pub(crate) async fn wait(&mut self, retry_after: Option<Duration>) {
        let wait = self.planned_wait(retry_after);
        warn!(
            "{} throttled; retrying in {:.1}s (attempt {}/{})",
            self.service,
            wait.as_secs_f32(),
            self.attempt,
            MAX_ATTEMPTS
        );
        sleep(wait).await;
        self.delay = (self.delay * 2).min(MAX_DELAY);
    }

    fn planned_wait(&self, retry_after: Option<Duration>) -> Duration {
        match retry_after {
            Some(hint) if hint > self.delay => hint.min(MAX_DELAY),
            _ => self.delay,
        }
    }
}
