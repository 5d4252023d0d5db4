//! Stock list categories with per-symbol price history.

use crate::core::config::StreamSettings;
use crate::core::error::FetchError;
use crate::core::history::{QuoteSample, SeriesBook, TrackedSeries};
use crate::core::price::{Quote, QuoteProvider};
use crate::refresh::batch::fetch_staggered;
use crate::refresh::{CycleOutcome, RefreshController, Refresher, UiSnapshot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

const DEFAULT_EXCHANGE: &str = "NASDAQ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum StockCategory {
    #[default]
    MostActive,
    Gainers,
    Losers,
}

impl StockCategory {
    pub const ALL: [StockCategory; 3] = [
        StockCategory::MostActive,
        StockCategory::Gainers,
        StockCategory::Losers,
    ];

    pub fn symbols(&self) -> &'static [&'static str] {
        match self {
            StockCategory::MostActive => &["AAPL", "TSLA", "NVDA", "MSFT", "AMZN"],
            StockCategory::Gainers => &["NVDA", "AMD", "TSLA", "META", "NFLX"],
            StockCategory::Losers => &["F", "GM", "T", "VZ", "XOM"],
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            StockCategory::MostActive => "Most Active",
            StockCategory::Gainers => "Gainers",
            StockCategory::Losers => "Losers",
        }
    }

    /// Gainers by percent change descending, losers ascending, most active in
    /// list order.
    fn sort(&self, quotes: &mut [StockQuote]) {
        match self {
            StockCategory::MostActive => {}
            StockCategory::Gainers => {
                quotes.sort_by(|a, b| b.percent_change.total_cmp(&a.percent_change))
            }
            StockCategory::Losers => {
                quotes.sort_by(|a, b| a.percent_change.total_cmp(&b.percent_change))
            }
        }
    }
}

impl fmt::Display for StockCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for StockCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().replace(['_', ' '], "-").as_str() {
            "most-active" | "active" => Ok(StockCategory::MostActive),
            "gainers" => Ok(StockCategory::Gainers),
            "losers" => Ok(StockCategory::Losers),
            other => Err(format!(
                "unknown category '{other}', expected most-active, gainers or losers"
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StockQuote {
    pub symbol: String,
    pub name: String,
    pub price: f64,
    pub change: f64,
    pub percent_change: f64,
    pub exchange: String,
}

impl From<&Quote> for StockQuote {
    fn from(quote: &Quote) -> Self {
        StockQuote {
            symbol: quote.symbol.clone(),
            name: quote.display_name(),
            price: quote.price,
            change: quote.change(),
            percent_change: quote.percent_change(),
            exchange: quote
                .exchange
                .clone()
                .unwrap_or_else(|| DEFAULT_EXCHANGE.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StockBoard {
    pub category: StockCategory,
    pub quotes: Vec<StockQuote>,
    /// Price history per symbol, across categories
    pub history: SeriesBook<QuoteSample>,
}

impl StockBoard {
    pub fn series(&self, symbol: &str) -> Option<&TrackedSeries<QuoteSample>> {
        self.history.get(symbol)
    }
}

pub struct StockRefresher {
    quotes: Arc<dyn QuoteProvider>,
    stagger: Duration,
    timeout: Duration,
    history: usize,
}

#[async_trait]
impl Refresher for StockRefresher {
    type Input = StockCategory;
    type Fetched = Vec<(String, Quote)>;
    type Value = StockBoard;

    async fn fetch(&self, category: &StockCategory) -> Result<Self::Fetched, FetchError> {
        let symbols: Vec<String> = category.symbols().iter().map(|s| s.to_string()).collect();
        let quotes = &self.quotes;
        fetch_staggered(symbols, self.stagger, self.timeout, |symbol| {
            let symbol = symbol.clone();
            async move { quotes.fetch_quote(&symbol).await }
        })
        .await
        .into_result()
    }

    fn fold(
        &self,
        category: &StockCategory,
        fetched: Self::Fetched,
        previous: Option<&StockBoard>,
        at: DateTime<Utc>,
    ) -> StockBoard {
        let mut history = previous
            .map(|board| board.history.clone())
            .unwrap_or_else(|| SeriesBook::new(self.history));
        let mut quotes = Vec::with_capacity(fetched.len());
        for (symbol, quote) in &fetched {
            history = history.record(
                symbol,
                QuoteSample {
                    symbol: symbol.clone(),
                    timestamp: at,
                    price: quote.price,
                },
            );
            quotes.push(StockQuote::from(quote));
        }
        category.sort(&mut quotes);
        StockBoard {
            category: *category,
            quotes,
            history,
        }
    }

    fn failure_message(&self, err: &FetchError) -> String {
        format!("Failed to load stocks: {err}")
    }
}

pub struct StockStream {
    controller: RefreshController<StockRefresher>,
}

impl StockStream {
    pub fn new(
        quotes: Arc<dyn QuoteProvider>,
        settings: &StreamSettings,
        timeout: Duration,
    ) -> Self {
        let refresher = StockRefresher {
            quotes,
            stagger: settings.stagger(),
            timeout,
            history: settings.history,
        };
        StockStream {
            controller: RefreshController::new("stocks", refresher, settings.policy()),
        }
    }

    pub fn controller(&self) -> &RefreshController<StockRefresher> {
        &self.controller
    }

    pub fn snapshot(&self) -> Arc<UiSnapshot<StockBoard>> {
        self.controller.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<UiSnapshot<StockBoard>>> {
        self.controller.subscribe()
    }

    pub fn category(&self) -> StockCategory {
        self.controller.current_input().unwrap_or_default()
    }

    pub async fn load(&self, category: StockCategory) -> CycleOutcome {
        self.controller.refresh_with(category).await
    }

    /// Reloads only when `category` differs from the one on screen.
    pub async fn select_category(&self, category: StockCategory) -> CycleOutcome {
        if self.controller.current_input() == Some(category) {
            return CycleOutcome::Skipped;
        }
        self.load(category).await
    }

    pub async fn refresh(&self) -> CycleOutcome {
        match self.controller.current_input() {
            Some(_) => self.controller.refresh().await,
            None => self.load(StockCategory::default()).await,
        }
    }

    pub fn set_auto_refresh(&self, enabled: bool) {
        self.controller.set_auto_refresh(enabled);
    }

    pub fn stop(&self) {
        self.controller.stop();
    }
}
