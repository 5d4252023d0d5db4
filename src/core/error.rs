//! Failure taxonomy shared by every fetcher and stream.

use std::future::Future;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// Transport or connectivity failure, including non-success HTTP statuses
    #[error("network error: {0}")]
    Network(String),

    /// Response body did not have the expected shape
    #[error("unexpected response: {0}")]
    Decode(String),

    /// Symbol or currency pair unknown upstream
    #[error("not found: {0}")]
    NotFound(String),

    /// A batch fetch produced zero usable entries
    #[error("no data available")]
    EmptyResult,

    #[error("request timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

impl FetchError {
    pub fn network(msg: impl Into<String>) -> Self {
        FetchError::Network(msg.into())
    }

    pub fn decode(msg: impl Into<String>) -> Self {
        FetchError::Decode(msg.into())
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else if err.is_timeout() {
            // The client timeout is not carried on the error
            FetchError::Network(format!("timed out: {err}"))
        } else {
            FetchError::Network(err.to_string())
        }
    }
}

impl From<serde_json::Error> for FetchError {
    fn from(err: serde_json::Error) -> Self {
        FetchError::Decode(err.to_string())
    }
}

/// Bounds a single network call. Elapsing counts as an ordinary fetch failure.
pub async fn with_timeout<T, Fut>(limit: Duration, call: Fut) -> Result<T, FetchError>
where
    Fut: Future<Output = Result<T, FetchError>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout(limit)),
    }
}
