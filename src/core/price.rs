//! Stock quote abstractions and core types

use crate::core::error::FetchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub previous_close: f64,
    pub long_name: Option<String>,
    pub short_name: Option<String>,
    pub exchange: Option<String>,
    pub currency: Option<String>,
}

impl Quote {
    pub fn change(&self) -> f64 {
        self.price - self.previous_close
    }

    pub fn percent_change(&self) -> f64 {
        if self.previous_close > 0.0 {
            self.change() / self.previous_close * 100.0
        } else {
            0.0
        }
    }

    /// Long name, then short name, then the built-in company table, then the
    /// symbol itself.
    pub fn display_name(&self) -> String {
        self.long_name
            .clone()
            .or_else(|| self.short_name.clone())
            .or_else(|| company_name(&self.symbol).map(str::to_string))
            .unwrap_or_else(|| self.symbol.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SymbolMatch {
    pub symbol: String,
    pub name: String,
    pub exchange: String,
}

pub const DEFAULT_SEARCH_LIMIT: usize = 10;

#[async_trait]
pub trait QuoteProvider: Send + Sync {
    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, FetchError>;

    /// Equity matches only, in upstream order. May be empty.
    async fn search_symbols(
        &self,
        query: &str,
        limit: usize,
    ) -> Result<Vec<SymbolMatch>, FetchError>;
}

const COMPANY_NAMES: &[(&str, &str)] = &[
    ("AAPL", "Apple Inc."),
    ("TSLA", "Tesla Inc."),
    ("NVDA", "NVIDIA Corporation"),
    ("MSFT", "Microsoft Corporation"),
    ("AMZN", "Amazon.com Inc."),
    ("META", "Meta Platforms Inc."),
    ("AMD", "Advanced Micro Devices"),
    ("NFLX", "Netflix Inc."),
    ("F", "Ford Motor"),
    ("GM", "General Motors"),
    ("T", "AT&T Inc."),
    ("VZ", "Verizon"),
    ("XOM", "Exxon Mobil"),
];

pub fn company_name(symbol: &str) -> Option<&'static str> {
    COMPANY_NAMES
        .iter()
        .find(|(s, _)| *s == symbol)
        .map(|(_, name)| *name)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quote(price: f64, previous_close: f64) -> Quote {
        Quote {
            symbol: "AAPL".to_string(),
            price,
            previous_close,
            long_name: None,
            short_name: None,
            exchange: None,
            currency: None,
        }
    }

    #[test]
    fn test_change_and_percent() {
        let q = quote(110.0, 100.0);
        assert!((q.change() - 10.0).abs() < 1e-9);
        assert!((q.percent_change() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn test_percent_change_without_previous_close() {
        let q = quote(110.0, 0.0);
        assert_eq!(q.change(), 110.0);
        assert_eq!(q.percent_change(), 0.0);
    }

    #[test]
    fn test_display_name_fallbacks() {
        let mut q = quote(1.0, 1.0);
        assert_eq!(q.display_name(), "Apple Inc.");
        q.short_name = Some("Apple".into());
        assert_eq!(q.display_name(), "Apple");
        q.long_name = Some("Apple Incorporated".into());
        assert_eq!(q.display_name(), "Apple Incorporated");

        let unknown = Quote {
            symbol: "ZZZZ".into(),
            ..quote(1.0, 1.0)
        };
        assert_eq!(unknown.display_name(), "ZZZZ");
    }
}
