//! Process-wide minimum spacing between outbound API calls

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Enforces a minimum interval between consecutive [`RateLimiter::wait`] returns
///
/// Share one instance (behind an `Arc`) between every client in the process.
/// The lock is held across the sleep, so concurrent callers are released one
/// interval apart.
#[derive(Debug)]
pub struct RateLimiter {
    min_interval: Duration,
    last_dispatch: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_dispatch: Mutex::new(None),
        }
    }

    /// Wait until a request may be dispatched. The first call returns immediately.
    pub async fn wait(&self) {
        let mut last = self.last_dispatch.lock().await;

        if let Some(prev) = *last {
            let elapsed = prev.elapsed();
            if elapsed < self.min_interval {
                let wait_time = self.min_interval - elapsed;
                log::debug!("Rate limiting: waiting {} ms", wait_time.as_millis());
                tokio::time::sleep(wait_time).await;
            }
        }

        *last = Some(Instant::now());
    }
}
