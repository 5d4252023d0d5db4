//! In-memory providers for stream tests.

use crate::core::currency::{ExchangeRates, RateProvider};
use crate::core::error::FetchError;
use crate::core::price::{Quote, QuoteProvider, SymbolMatch};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};

#[derive(Default)]
pub struct StaticRates {
    tables: Mutex<HashMap<String, HashMap<String, f64>>>,
    failing: Mutex<HashSet<String>>,
    pub calls: Mutex<Vec<String>>,
}

impl StaticRates {
    pub fn with(self, base: &str, rates: &[(&str, f64)]) -> Self {
        self.set(base, rates);
        self
    }

    pub fn set(&self, base: &str, rates: &[(&str, f64)]) {
        let table = rates.iter().map(|(c, r)| (c.to_string(), *r)).collect();
        self.tables.lock().insert(base.to_string(), table);
    }

    pub fn fail(&self, base: &str) {
        self.failing.lock().insert(base.to_string());
    }

    pub fn recover(&self, base: &str) {
        self.failing.lock().remove(base);
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }
}

#[async_trait]
impl RateProvider for StaticRates {
    async fn fetch_rates(&self, base: &str) -> Result<ExchangeRates, FetchError> {
        self.calls.lock().push(base.to_string());
        if self.failing.lock().contains(base) {
            return Err(FetchError::network("connection refused"));
        }
        let rates = self
            .tables
            .lock()
            .get(base)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(base.to_string()))?;
        Ok(ExchangeRates {
            base: base.to_string(),
            date: "2024-01-15".to_string(),
            rates,
        })
    }
}

#[derive(Default)]
pub struct StaticQuotes {
    quotes: Mutex<HashMap<String, Quote>>,
    matches: Mutex<Vec<SymbolMatch>>,
    failing: Mutex<HashSet<String>>,
    pub calls: Mutex<Vec<String>>,
}

impl StaticQuotes {
    pub fn with_quote(self, symbol: &str, price: f64, previous_close: f64) -> Self {
        self.set_quote(symbol, price, previous_close);
        self
    }

    pub fn set_quote(&self, symbol: &str, price: f64, previous_close: f64) {
        let quote = Quote {
            symbol: symbol.to_string(),
            price,
            previous_close,
            long_name: None,
            short_name: None,
            exchange: None,
            currency: Some("USD".to_string()),
        };
        self.quotes.lock().insert(symbol.to_string(), quote);
    }

    pub fn with_currency(self, symbol: &str, currency: &str) -> Self {
        if let Some(quote) = self.quotes.lock().get_mut(symbol) {
            quote.currency = Some(currency.to_string());
        }
        self
    }

    pub fn with_matches(self, matches: &[(&str, &str)]) -> Self {
        *self.matches.lock() = matches
            .iter()
            .map(|(symbol, name)| SymbolMatch {
                symbol: symbol.to_string(),
                name: name.to_string(),
                exchange: "NMS".to_string(),
            })
            .collect();
        self
    }

    pub fn fail(&self, symbol: &str) {
        self.failing.lock().insert(symbol.to_string());
    }

    pub fn fail_all(&self, symbols: &[&str]) {
        for symbol in symbols {
            self.fail(symbol);
        }
    }
}

#[async_trait]
impl QuoteProvider for StaticQuotes {
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, FetchError> {
        self.calls.lock().push(symbol.to_string());
        if self.failing.lock().contains(symbol) {
            return Err(FetchError::network("HTTP 429 Too Many Requests"));
        }
        self.quotes
            .lock()
            .get(symbol)
            .cloned()
            .ok_or_else(|| FetchError::NotFound(symbol.to_string()))
    }

    async fn search_symbols(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SymbolMatch>, FetchError> {
        self.calls.lock().push(format!("search:{query}"));
        if self.failing.lock().contains(query) {
            return Err(FetchError::network("search unavailable"));
        }
        Ok(self
            .matches
            .lock()
            .iter()
            .filter(|m| m.symbol.starts_with(query))
            .take(limit)
            .cloned()
            .collect())
    }
}
