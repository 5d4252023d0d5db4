//! Staggered fetch of independent keys with per-key failure isolation.

use crate::core::error::{FetchError, with_timeout};
use futures::future::join_all;
use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug)]
pub struct BatchOutcome<K, T> {
    /// In key order
    pub succeeded: Vec<(K, T)>,
    pub failed: Vec<(K, FetchError)>,
}

impl<K, T> BatchOutcome<K, T> {
    pub fn is_success(&self) -> bool {
        !self.succeeded.is_empty()
    }

    /// Successful entries, or `EmptyResult` when every key failed.
    pub fn into_result(self) -> Result<Vec<(K, T)>, FetchError> {
        if self.succeeded.is_empty() {
            Err(FetchError::EmptyResult)
        } else {
            Ok(self.succeeded)
        }
    }
}

/// Fetches every key concurrently, delaying key `i` by `stagger * i` to
/// spread load on the upstream. Each call is bounded by `timeout`. Failed
/// keys are logged and reported separately; they never abort the others.
pub async fn fetch_staggered<K, T, F, Fut>(
    keys: Vec<K>,
    stagger: Duration,
    timeout: Duration,
    fetch: F,
) -> BatchOutcome<K, T>
where
    K: Display,
    F: Fn(&K) -> Fut,
    Fut: Future<Output = Result<T, FetchError>>,
{
    debug!(keys = keys.len(), ?stagger, "Starting batch fetch");
    let calls = keys.into_iter().enumerate().map(|(index, key)| {
        let call = fetch(&key);
        async move {
            if index > 0 && !stagger.is_zero() {
                tokio::time::sleep(stagger * index as u32).await;
            }
            let result = with_timeout(timeout, call).await;
            (key, result)
        }
    });

    let mut outcome = BatchOutcome {
        succeeded: Vec::new(),
        failed: Vec::new(),
    };
    for (key, result) in join_all(calls).await {
        match result {
            Ok(value) => outcome.succeeded.push((key, value)),
            Err(e) => {
                warn!(key = %key, error = %e, "Fetch failed, excluding key from batch");
                outcome.failed.push((key, e));
            }
        }
    }
    debug!(
        succeeded = outcome.succeeded.len(),
        failed = outcome.failed.len(),
        "Batch fetch finished"
    );
    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use tokio::time::Instant;

    fn symbols(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[tokio::test]
    async fn test_partial_failure_keeps_successes() {
        let keys = symbols(&["AAPL", "BAD1", "MSFT", "BAD2", "NVDA"]);
        let outcome = fetch_staggered(keys, Duration::ZERO, Duration::from_secs(10), |key| {
            let key = key.clone();
            async move {
                if key.starts_with("BAD") {
                    Err(FetchError::NotFound(key))
                } else {
                    Ok(key.len())
                }
            }
        })
        .await;

        assert!(outcome.is_success());
        assert_eq!(outcome.failed.len(), 2);
        let ok: Vec<&str> = outcome.succeeded.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(ok, vec!["AAPL", "MSFT", "NVDA"]);
        assert_eq!(outcome.into_result().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_total_failure_is_empty_result() {
        let keys = symbols(&["BAD1", "BAD2"]);
        let outcome: BatchOutcome<String, ()> =
            fetch_staggered(keys, Duration::ZERO, Duration::from_secs(10), |key| {
                let key = key.clone();
                async move { Err(FetchError::network(key)) }
            })
            .await;

        assert!(!outcome.is_success());
        assert_eq!(outcome.into_result().unwrap_err(), FetchError::EmptyResult);
    }

    #[tokio::test(start_paused = true)]
    async fn test_requests_are_staggered() {
        let start = Instant::now();
        let started = Arc::new(Mutex::new(Vec::new()));
        let keys = symbols(&["A", "B", "C", "D"]);

        let log = Arc::clone(&started);
        fetch_staggered(keys, Duration::from_millis(300), Duration::from_secs(10), |key| {
            let key = key.clone();
            let log = Arc::clone(&log);
            async move {
                log.lock().push((key, start.elapsed()));
                Ok(())
            }
        })
        .await;

        let started = started.lock();
        let offsets: Vec<u128> = started.iter().map(|(_, at)| at.as_millis()).collect();
        assert_eq!(offsets, vec![0, 300, 600, 900]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_key_times_out_without_blocking_others() {
        let keys = symbols(&["HANG", "OK"]);
        let outcome = fetch_staggered(keys, Duration::ZERO, Duration::from_secs(10), |key| {
            let hang = key == "HANG";
            async move {
                if hang {
                    tokio::time::sleep(Duration::from_secs(3600)).await;
                }
                Ok(1)
            }
        })
        .await;

        assert_eq!(outcome.succeeded.len(), 1);
        assert_eq!(outcome.failed[0].0, "HANG");
        assert_eq!(
            outcome.failed[0].1,
            FetchError::Timeout(Duration::from_secs(10))
        );
    }
}
