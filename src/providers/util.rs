use crate::core::config::NetworkConfig;
use crate::core::error::FetchError;
use anyhow::{Context, Result};
use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

/// Builds the HTTP client shared by every provider. The client timeout bounds
/// each request on top of the per-call timeouts applied by the streams.
pub fn build_client(network: &NetworkConfig) -> Result<Client> {
    Client::builder()
        .user_agent(network.user_agent.as_str())
        .timeout(network.timeout())
        .build()
        .context("Failed to build HTTP client")
}

/// Builds the client used for assistant replies. A streamed reply can run
/// longer than the network timeout, so only connecting and each read are
/// bounded.
pub fn build_assistant_client(network: &NetworkConfig) -> Result<Client> {
    Client::builder()
        .user_agent(network.user_agent.as_str())
        .connect_timeout(network.timeout())
        .read_timeout(network.timeout())
        .build()
        .context("Failed to build assistant HTTP client")
}

/// Joins `base` and `path` and appends the query parameters.
pub fn endpoint(base: &str, path: &str, params: &[(&str, &str)]) -> Result<Url, FetchError> {
    let raw = format!("{}/{}", base.trim_end_matches('/'), path.trim_start_matches('/'));
    Url::parse_with_params(&raw, params)
        .map_err(|e| FetchError::network(format!("invalid URL {raw}: {e}")))
}

/// Appends `segment` to the URL path, percent-encoding it so that it stays a
/// single segment.
pub fn push_segment(mut url: Url, segment: &str) -> Result<Url, FetchError> {
    url.path_segments_mut()
        .map_err(|_| FetchError::network("base URL cannot take path segments"))?
        .pop_if_empty()
        .push(segment);
    Ok(url)
}

/// Maps 404 to `NotFound(what)` and any other non-success status to
/// `Network`.
pub fn check_status(response: Response, what: &str) -> Result<Response, FetchError> {
    let status = response.status();
    if status == StatusCode::NOT_FOUND {
        return Err(FetchError::NotFound(what.to_string()));
    }
    if !status.is_success() {
        return Err(FetchError::Network(format!("HTTP {status} for {what}")));
    }
    Ok(response)
}

/// GETs `url` and decodes its JSON body.
pub async fn get_json<T: DeserializeOwned>(
    client: &Client,
    url: Url,
    what: &str,
) -> Result<T, FetchError> {
    debug!("Requesting {}", url);
    let response = client.get(url).send().await?;
    let text = check_status(response, what)?.text().await?;
    serde_json::from_str(&text)
        .map_err(|e| FetchError::decode(format!("failed to parse response for {what}: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_joins_and_encodes() {
        let url = endpoint(
            "http://localhost:8080/",
            "/v1/finance/search",
            &[("q", "BRK B"), ("quotesCount", "10")],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/v1/finance/search?q=BRK+B&quotesCount=10"
        );
    }

    #[test]
    fn test_push_segment_encodes_separators() {
        let url = endpoint("http://localhost:8080/", "v8/finance/chart", &[("range", "1d")]).unwrap();
        let url = push_segment(url, "BRK/B?x#y").unwrap();
        assert_eq!(
            url.as_str(),
            "http://localhost:8080/v8/finance/chart/BRK%2FB%3Fx%23y?range=1d"
        );
    }

    #[test]
    fn test_endpoint_rejects_garbage_base() {
        let err = endpoint("not a url", "latest/USD", &[]).unwrap_err();
        assert!(matches!(err, FetchError::Network(msg) if msg.starts_with("invalid URL")));
    }

    #[test]
    fn test_build_client_from_defaults() {
        assert!(build_client(&NetworkConfig::default()).is_ok());
        assert!(build_assistant_client(&NetworkConfig::default()).is_ok());
    }
}
