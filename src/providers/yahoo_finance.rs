use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::core::error::FetchError;
use crate::core::price::{Quote, QuoteProvider, SymbolMatch};
use crate::providers::util::{endpoint, get_json, push_segment};

const EQUITY: &str = "EQUITY";
const DEFAULT_CURRENCY: &str = "USD";

// YahooFinanceProvider implementation for QuoteProvider
pub struct YahooFinanceProvider {
    client: Client,
    base_url: String,
}

impl YahooFinanceProvider {
    pub fn new(client: Client, base_url: &str) -> Self {
        YahooFinanceProvider {
            client,
            base_url: base_url.to_string(),
        }
    }
}

#[derive(Deserialize, Debug)]
struct YahooChartResponse {
    chart: ChartResult,
}

#[derive(Deserialize, Debug)]
struct ChartResult {
    result: Option<Vec<ChartItem>>,
    error: Option<ChartError>,
}

#[derive(Deserialize, Debug)]
struct ChartError {
    description: Option<String>,
}

#[derive(Deserialize, Debug)]
struct ChartItem {
    meta: ChartMeta,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    regular_market_price: Option<f64>,
    previous_close: Option<f64>,
    chart_previous_close: Option<f64>,
    long_name: Option<String>,
    short_name: Option<String>,
    exchange_name: Option<String>,
    currency: Option<String>,
}

#[derive(Deserialize, Debug)]
struct YahooSearchResponse {
    #[serde(default)]
    quotes: Vec<SearchQuote>,
}

#[derive(Deserialize, Debug)]
struct SearchQuote {
    symbol: String,
    shortname: Option<String>,
    longname: Option<String>,
    #[serde(rename = "quoteType", default)]
    quote_type: String,
    #[serde(default)]
    exchange: String,
}

impl From<SearchQuote> for SymbolMatch {
    fn from(quote: SearchQuote) -> Self {
        SymbolMatch {
            name: quote
                .longname
                .or(quote.shortname)
                .unwrap_or_else(|| quote.symbol.clone()),
            symbol: quote.symbol,
            exchange: quote.exchange,
        }
    }
}

#[async_trait]
impl QuoteProvider for YahooFinanceProvider {
    #[instrument(
        name = "YahooQuoteFetch",
        skip(self),
        fields(symbol = %symbol)
    )]
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, FetchError> {
        let url = endpoint(
            &self.base_url,
            "v8/finance/chart",
            &[("interval", "1d"), ("range", "1d")],
        )?;
        let url = push_segment(url, symbol)?;
        let data: YahooChartResponse = get_json(&self.client, url, symbol).await?;

        let item = match data.chart.result.and_then(|items| items.into_iter().next()) {
            Some(item) => item,
            None => {
                let reason = data
                    .chart
                    .error
                    .and_then(|e| e.description)
                    .unwrap_or_else(|| "no chart data".to_string());
                debug!(%reason, "Empty chart result");
                return Err(FetchError::NotFound(symbol.to_string()));
            }
        };

        let meta = item.meta;
        let price = meta.regular_market_price.ok_or_else(|| {
            FetchError::decode(format!("missing regularMarketPrice for {symbol}"))
        })?;

        Ok(Quote {
            symbol: symbol.to_string(),
            price,
            previous_close: meta
                .previous_close
                .or(meta.chart_previous_close)
                .unwrap_or(0.0),
            long_name: meta.long_name,
            short_name: meta.short_name,
            exchange: meta.exchange_name,
            currency: Some(
                meta.currency
                    .unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
            ),
        })
    }

    #[instrument(name = "YahooSymbolSearch", skip(self))]
    async fn search_symbols(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SymbolMatch>, FetchError> {
        let limit = limit.to_string();
        let url = endpoint(
            &self.base_url,
            "v1/finance/search",
            &[("q", query), ("quotesCount", limit.as_str())],
        )?;
        let data: YahooSearchResponse = get_json(&self.client, url, query).await?;

        let matches: Vec<SymbolMatch> = data
            .quotes
            .into_iter()
            .filter(|quote| quote.quote_type == EQUITY)
            .map(SymbolMatch::from)
            .collect();
        debug!(count = matches.len(), "Search returned equities");
        Ok(matches)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    pub async fn create_mock_server(symbol: &str, mock_response: &str) -> MockServer {
        let mock_server = MockServer::start().await;
        let request_path = format!("/v8/finance/chart/{symbol}");

        Mock::given(method("GET"))
            .and(path(request_path))
            .and(query_param("interval", "1d"))
            .and(query_param("range", "1d"))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        mock_server
    }

    fn provider(server: &MockServer) -> YahooFinanceProvider {
        YahooFinanceProvider::new(Client::new(), &server.uri())
    }

    #[tokio::test]
    async fn test_successful_quote_fetch() {
        let mock_response = r#"{
            "chart": {
                "result": [{
                    "meta": {
                        "currency": "USD",
                        "symbol": "AAPL",
                        "exchangeName": "NMS",
                        "regularMarketPrice": 190.5,
                        "previousClose": 185.0,
                        "longName": "Apple Inc.",
                        "shortName": "Apple"
                    }
                }],
                "error": null
            }
        }"#;

        let mock_server = create_mock_server("AAPL", mock_response).await;
        let quote = provider(&mock_server).fetch_quote("AAPL").await.unwrap();

        assert_eq!(quote.price, 190.5);
        assert_eq!(quote.previous_close, 185.0);
        assert!((quote.change() - 5.5).abs() < 1e-9);
        assert_eq!(quote.display_name(), "Apple Inc.");
        assert_eq!(quote.exchange.as_deref(), Some("NMS"));
        assert_eq!(quote.currency.as_deref(), Some("USD"));
    }

    #[tokio::test]
    async fn test_quote_falls_back_to_chart_previous_close() {
        let mock_response = r#"{
            "chart": {
                "result": [{
                    "meta": {
                        "regularMarketPrice": 100.0,
                        "chartPreviousClose": 80.0
                    }
                }]
            }
        }"#;

        let mock_server = create_mock_server("F", mock_response).await;
        let quote = provider(&mock_server).fetch_quote("F").await.unwrap();
        assert_eq!(quote.previous_close, 80.0);
        assert!((quote.percent_change() - 25.0).abs() < 1e-9);
        assert_eq!(quote.display_name(), "Ford Motor");
        assert_eq!(quote.currency.as_deref(), Some("USD"));
    }

    #[tokio::test]
    async fn test_no_quote_result_data() {
        let mock_response = r#"{
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
            }
        }"#;
        let mock_server = create_mock_server("INVALID", mock_response).await;

        let result = provider(&mock_server).fetch_quote("INVALID").await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "not found: INVALID"
        );
    }

    #[tokio::test]
    async fn test_quote_symbol_stays_one_path_segment() {
        let mock_response = r#"{"chart": {"result": [{"meta": {"currency": "USD", "regularMarketPrice": 410.5}}]}}"#;
        let mock_server = create_mock_server("BRK%2FB", mock_response).await;

        let quote = provider(&mock_server).fetch_quote("BRK/B").await.unwrap();
        assert_eq!(quote.symbol, "BRK/B");
        assert_eq!(quote.price, 410.5);
    }

    #[tokio::test]
    async fn test_quote_http_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v8/finance/chart/AAPL"))
            .respond_with(ResponseTemplate::new(429))
            .mount(&mock_server)
            .await;

        let result = provider(&mock_server).fetch_quote("AAPL").await;
        assert_eq!(
            result.unwrap_err().to_string(),
            "network error: HTTP 429 Too Many Requests for AAPL"
        );
    }

    #[tokio::test]
    async fn test_quote_missing_price_is_decode_error() {
        let mock_response = r#"{"chart": {"result": [{"meta": {"currency": "USD"}}]}}"#;
        let mock_server = create_mock_server("AAPL", mock_response).await;

        let result = provider(&mock_server).fetch_quote("AAPL").await;
        assert_eq!(
            result.unwrap_err(),
            FetchError::Decode("missing regularMarketPrice for AAPL".to_string())
        );
    }

    #[tokio::test]
    async fn test_search_keeps_equities_only() {
        let mock_server = MockServer::start().await;
        let mock_response = r#"{
            "quotes": [
                {"symbol": "AAPL", "shortname": "Apple Inc.", "longname": "Apple Inc.", "quoteType": "EQUITY", "exchange": "NMS"},
                {"symbol": "AAPL240119C00150000", "shortname": "AAPL Jan 2024 150 Call", "quoteType": "OPTION", "exchange": "OPR"},
                {"symbol": "APLE", "shortname": "Apple Hospitality REIT", "quoteType": "EQUITY", "exchange": "NYQ"},
                {"symbol": "APC.F", "quoteType": "EQUITY", "exchange": "FRA"}
            ]
        }"#;
        Mock::given(method("GET"))
            .and(path("/v1/finance/search"))
            .and(query_param("q", "APPLE"))
            .and(query_param("quotesCount", "10"))
            .respond_with(ResponseTemplate::new(200).set_body_string(mock_response))
            .mount(&mock_server)
            .await;

        let matches = provider(&mock_server)
            .search_symbols("APPLE", 10)
            .await
            .unwrap();

        let names: Vec<(&str, &str)> = matches
            .iter()
            .map(|m| (m.symbol.as_str(), m.name.as_str()))
            .collect();
        assert_eq!(
            names,
            vec![
                ("AAPL", "Apple Inc."),
                ("APLE", "Apple Hospitality REIT"),
                ("APC.F", "APC.F"),
            ]
        );
        assert_eq!(matches[0].exchange, "NMS");
    }

    #[tokio::test]
    async fn test_search_without_quotes_is_empty() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/finance/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"count": 0}"#))
            .mount(&mock_server)
            .await;

        let matches = provider(&mock_server)
            .search_symbols("ZZZZ", 10)
            .await
            .unwrap();
        assert!(matches.is_empty());
    }
}
