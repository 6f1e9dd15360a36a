//! Polling utilities shared by the resolution engine and the step layer
//!
//! Blocking waits with bounded timeouts are the only suspension points in
//! the engine; this module owns the cadence.

use anyhow::Result;
use std::future::Future;
use std::time::{Duration, Instant};

/// Configuration for polling operations
#[derive(Clone)]
pub struct PollConfig {
    pub timeout_ms: u64,
    pub initial_interval_ms: u64,
    pub max_interval_ms: u64,
    pub use_exponential_backoff: bool,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10000,
            initial_interval_ms: 100,
            max_interval_ms: 500,
            use_exponential_backoff: true,
        }
    }
}

impl PollConfig {
    pub fn with_timeout(timeout_ms: u64) -> Self {
        Self {
            timeout_ms,
            ..Self::default()
        }
    }
}

/// Call `check_fn` repeatedly until it returns `true` or the timeout elapses.
///
/// The predicate is fallible: a check that errors aborts the wait, since an
/// erroring probe will not become true by waiting longer. Returns `Ok(true)`
/// if the condition was met, `Ok(false)` on timeout.
pub async fn wait_until<F, Fut>(check_fn: F, config: PollConfig) -> Result<bool>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<bool>>,
{
    let start = Instant::now();
    let timeout = Duration::from_millis(config.timeout_ms);
    let mut interval = config.initial_interval_ms;

    loop {
        if check_fn().await? {
            return Ok(true);
        }
        if start.elapsed() >= timeout {
            return Ok(false);
        }

        tokio::time::sleep(Duration::from_millis(interval)).await;

        if config.use_exponential_backoff {
            interval = (interval * 3 / 2).min(config.max_interval_ms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[tokio::test]
    async fn succeeds_once_condition_holds() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls_clone = calls.clone();
        let ok = wait_until(
            move || {
                let calls = calls_clone.clone();
                async move { Ok(calls.fetch_add(1, Ordering::SeqCst) >= 2) }
            },
            PollConfig {
                timeout_ms: 2000,
                initial_interval_ms: 10,
                max_interval_ms: 20,
                use_exponential_backoff: true,
            },
        )
        .await
        .unwrap();
        assert!(ok);
        assert!(calls.load(Ordering::SeqCst) >= 3);
    }

    #[tokio::test]
    async fn times_out_when_condition_never_holds() {
        let ok = wait_until(
            || async { Ok(false) },
            PollConfig {
                timeout_ms: 50,
                initial_interval_ms: 10,
                max_interval_ms: 10,
                use_exponential_backoff: false,
            },
        )
        .await
        .unwrap();
        assert!(!ok);
    }

    #[tokio::test]
    async fn probe_errors_abort_the_wait() {
        let result = wait_until(
            || async { anyhow::bail!("probe broke") },
            PollConfig::with_timeout(1000),
        )
        .await;
        assert!(result.is_err());
    }
}
