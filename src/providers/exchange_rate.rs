use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, instrument};

use crate::core::currency::{ExchangeRates, RateProvider};
use crate::core::error::FetchError;
use crate::providers::util::{endpoint, get_json};

/// Rate tables from an exchangerate-api compatible service.
pub struct ExchangeRateApiProvider {
    client: Client,
    base_url: String,
}

impl ExchangeRateApiProvider {
    pub fn new(client: Client, base_url: &str) -> Self {
        ExchangeRateApiProvider {
            client,
            base_url: base_url.to_string(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct LatestRatesResponse {
    base: String,
    #[serde(default)]
    date: String,
    rates: HashMap<String, f64>,
}

#[async_trait]
impl RateProvider for ExchangeRateApiProvider {
    #[instrument(name = "ExchangeRateFetch", skip(self), fields(base = %base))]
    async fn fetch_rates(&self, base: &str) -> Result<ExchangeRates, FetchError> {
        let code = base.trim().to_uppercase();
        let url = endpoint(&self.base_url, &format!("latest/{code}"), &[])?;
        let data: LatestRatesResponse = get_json(&self.client, url, &code).await?;
        debug!(count = data.rates.len(), date = %data.date, "Received rate table");

        Ok(ExchangeRates {
            base: data.base,
            date: data.date,
            rates: data.rates,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn create_mock_server(code: &str, status: u16, body: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("/latest/{code}")))
            .respond_with(ResponseTemplate::new(status).set_body_string(body))
            .mount(&mock_server)
            .await;
        mock_server
    }

    fn provider(server: &MockServer) -> ExchangeRateApiProvider {
        ExchangeRateApiProvider::new(Client::new(), &server.uri())
    }

    #[tokio::test]
    async fn test_successful_rates_fetch() {
        let body = r#"{
            "base": "USD",
            "date": "2024-01-15",
            "time_last_updated": 1705276800,
            "rates": {"EUR": 0.9, "GBP": 0.79, "JPY": 148.2}
        }"#;
        let server = create_mock_server("USD", 200, body).await;

        let rates = provider(&server).fetch_rates("usd").await.unwrap();
        assert_eq!(rates.base, "USD");
        assert_eq!(rates.date, "2024-01-15");
        assert_eq!(rates.rate_to("EUR"), 0.9);
        assert_eq!(rates.rate_to("USD"), 1.0);
        assert_eq!(rates.rate_to("XXX"), 0.0);
    }

    #[tokio::test]
    async fn test_unknown_currency_is_not_found() {
        let server = create_mock_server("ABC", 404, r#"{"result":"error"}"#).await;
        let err = provider(&server).fetch_rates("ABC").await.unwrap_err();
        assert_eq!(err, FetchError::NotFound("ABC".to_string()));
    }

    #[tokio::test]
    async fn test_server_error_is_network_error() {
        let server = create_mock_server("USD", 500, "").await;
        let err = provider(&server).fetch_rates("USD").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "network error: HTTP 500 Internal Server Error for USD"
        );
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let server = create_mock_server("USD", 200, r#"{"base": "USD", "rate": {}}"#).await;
        let err = provider(&server).fetch_rates("USD").await.unwrap_err();
        assert!(matches!(err, FetchError::Decode(_)));
        assert!(
            err.to_string()
                .contains("failed to parse response for USD")
        );
    }
}
