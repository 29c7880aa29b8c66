use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Per-provider last-request timestamp, shared across fallback attempts for
/// one run (spec §4.5/§5): no cross-request state beyond "when did we last
/// talk to this provider".
#[derive(Default)]
pub struct RateLimiter {
    last_request: Mutex<HashMap<String, Instant>>,
}

impl RateLimiter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sleep for `max(0, 1/rate - (now - last))`, then record `now`.
    pub async fn wait_if_needed(&self, provider: &str, requests_per_second: f64) {
        let min_interval = Duration::from_secs_f64(1.0 / requests_per_second);

        let wait = {
            let guard = self.last_request.lock().unwrap();
            guard.get(provider).and_then(|last| {
                let elapsed = last.elapsed();
                (elapsed < min_interval).then(|| min_interval - elapsed)
            })
        };

        if let Some(wait) = wait {
            tokio::time::sleep(wait).await;
        }

        self.last_request
            .lock()
            .unwrap()
            .insert(provider.to_string(), Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn second_call_waits_at_least_min_interval() {
        let limiter = RateLimiter::new();
        limiter.wait_if_needed("crossref", 10.0).await;
        let start = Instant::now();
        limiter.wait_if_needed("crossref", 10.0).await;
        assert!(start.elapsed() >= Duration::from_millis(90));
    }

    #[tokio::test]
    async fn distinct_providers_do_not_block_each_other() {
        let limiter = RateLimiter::new();
        limiter.wait_if_needed("crossref", 1.0).await;
        let start = Instant::now();
        limiter.wait_if_needed("semantic_scholar", 1.0).await;
        assert!(start.elapsed() < Duration::from_millis(50));
    }
}
