//! Forex dashboard: a fixed set of currency pairs refreshed together.

use crate::core::config::StreamSettings;
use crate::core::currency::RateProvider;
use crate::core::error::FetchError;
use crate::core::history::{RateSample, SeriesBook, TrackedSeries};
use crate::refresh::batch::fetch_staggered;
use crate::refresh::{CycleOutcome, RefreshController, Refresher, UiSnapshot};
use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub const FAILURE_MESSAGE: &str =
    "Unable to load any forex pairs. Check your internet connection.";

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CurrencyPair {
    pub from: String,
    pub to: String,
}

impl CurrencyPair {
    pub fn new(from: &str, to: &str) -> Self {
        CurrencyPair {
            from: from.to_uppercase(),
            to: to.to_uppercase(),
        }
    }
}

impl fmt::Display for CurrencyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.from, self.to)
    }
}

impl FromStr for CurrencyPair {
    type Err = String;

    /// Parses `"USD/EUR"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().split_once('/') {
            Some((from, to))
                if from.len() == 3
                    && to.len() == 3
                    && from.chars().chain(to.chars()).all(|c| c.is_ascii_alphabetic()) =>
            {
                Ok(CurrencyPair::new(from, to))
            }
            _ => Err(format!("invalid currency pair '{s}', expected e.g. USD/EUR")),
        }
    }
}

pub fn parse_pairs(pairs: &[String]) -> Result<Vec<CurrencyPair>> {
    pairs
        .iter()
        .map(|pair| {
            pair.parse::<CurrencyPair>()
                .map_err(anyhow::Error::msg)
                .context("Invalid forex_pairs entry in config")
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForexPairView {
    pub pair: CurrencyPair,
    pub rate: f64,
    /// Difference between the two newest samples
    pub change: Option<f64>,
    pub history: TrackedSeries<RateSample>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ForexBoard {
    /// Pairs fetched in the latest cycle, in configured order
    pub pairs: Vec<ForexPairView>,
    pub book: SeriesBook<RateSample>,
}

pub struct ForexRefresher {
    rates: Arc<dyn RateProvider>,
    stagger: Duration,
    timeout: Duration,
    history: usize,
}

#[async_trait]
impl Refresher for ForexRefresher {
    type Input = Vec<CurrencyPair>;
    type Fetched = Vec<(CurrencyPair, f64)>;
    type Value = ForexBoard;

    async fn fetch(&self, pairs: &Vec<CurrencyPair>) -> Result<Self::Fetched, FetchError> {
        let rates = &self.rates;
        fetch_staggered(pairs.clone(), self.stagger, self.timeout, |pair| {
            let pair = pair.clone();
            async move {
                let table = rates.fetch_rates(&pair.from).await?;
                Ok(table.rate_to(&pair.to))
            }
        })
        .await
        .into_result()
    }

    fn fold(
        &self,
        _pairs: &Vec<CurrencyPair>,
        fetched: Self::Fetched,
        previous: Option<&ForexBoard>,
        at: DateTime<Utc>,
    ) -> ForexBoard {
        let mut book = previous
            .map(|board| board.book.clone())
            .unwrap_or_else(|| SeriesBook::new(self.history));
        for (pair, rate) in &fetched {
            book = book.record(
                &pair.to_string(),
                RateSample {
                    timestamp: at,
                    rate: *rate,
                },
            );
        }

        let pairs = fetched
            .into_iter()
            .filter_map(|(pair, rate)| {
                let history = book.get(&pair.to_string())?.clone();
                Some(ForexPairView {
                    change: history.delta(),
                    pair,
                    rate,
                    history,
                })
            })
            .collect();
        ForexBoard { pairs, book }
    }

    fn failure_message(&self, _err: &FetchError) -> String {
        FAILURE_MESSAGE.to_string()
    }
}

pub struct ForexStream {
    controller: RefreshController<ForexRefresher>,
    pairs: Vec<CurrencyPair>,
}

impl ForexStream {
    pub fn new(
        rates: Arc<dyn RateProvider>,
        pairs: Vec<CurrencyPair>,
        settings: &StreamSettings,
        timeout: Duration,
    ) -> Self {
        let refresher = ForexRefresher {
            rates,
            stagger: settings.stagger(),
            timeout,
            history: settings.history,
        };
        ForexStream {
            controller: RefreshController::new("forex", refresher, settings.policy()),
            pairs,
        }
    }

    pub fn pairs(&self) -> &[CurrencyPair] {
        &self.pairs
    }

    pub fn controller(&self) -> &RefreshController<ForexRefresher> {
        &self.controller
    }

    pub fn snapshot(&self) -> Arc<UiSnapshot<ForexBoard>> {
        self.controller.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<UiSnapshot<ForexBoard>>> {
        self.controller.subscribe()
    }

    /// Loads every configured pair. Auto-refresh starts after the first
    /// successful load.
    pub async fn refresh(&self) -> CycleOutcome {
        self.controller.refresh_with(self.pairs.clone()).await
    }

    pub fn set_auto_refresh(&self, enabled: bool) {
        self.controller.set_auto_refresh(enabled);
    }

    pub fn stop(&self) {
        self.controller.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::default_forex_pairs;
    use crate::streams::testing::StaticRates;

    fn settings() -> StreamSettings {
        StreamSettings {
            debounce_ms: 0,
            interval_secs: Some(3),
            history: 30,
            stagger_ms: 300,
        }
    }

    fn pairs(list: &[&str]) -> Vec<CurrencyPair> {
        list.iter().map(|p| p.parse().unwrap()).collect()
    }

    fn rates() -> Arc<StaticRates> {
        Arc::new(
            StaticRates::default()
                .with("USD", &[("EUR", 0.92), ("GBP", 0.79), ("JPY", 149.5)])
                .with("EUR", &[("GBP", 0.86)])
                .with("GBP", &[("USD", 1.27)]),
        )
    }

    #[test]
    fn test_pair_parsing() {
        let pair: CurrencyPair = "usd/eur".parse().unwrap();
        assert_eq!(pair, CurrencyPair::new("USD", "EUR"));
        assert_eq!(pair.to_string(), "USD/EUR");
        assert!("USDEUR".parse::<CurrencyPair>().is_err());
        assert!("US/EUR".parse::<CurrencyPair>().is_err());
        assert_eq!(parse_pairs(&default_forex_pairs()).unwrap().len(), 10);

        let err = parse_pairs(&["USD-EUR".to_string()]).unwrap_err();
        assert_eq!(err.to_string(), "Invalid forex_pairs entry in config");
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_failure_renders_available_pairs() {
        let source = rates();
        source.fail("EUR");
        let stream = ForexStream::new(
            source,
            pairs(&["USD/EUR", "EUR/GBP", "GBP/USD", "USD/JPY"]),
            &settings(),
            Duration::from_secs(10),
        );
        assert_eq!(stream.refresh().await, CycleOutcome::Applied);

        let snapshot = stream.snapshot();
        assert_eq!(snapshot.error, None);
        let board = snapshot.value.as_ref().unwrap();
        let shown: Vec<String> = board.pairs.iter().map(|p| p.pair.to_string()).collect();
        assert_eq!(shown, vec!["USD/EUR", "GBP/USD", "USD/JPY"]);
        assert_eq!(board.pairs[0].rate, 0.92);
        assert_eq!(board.pairs[0].change, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_total_failure_keeps_board() {
        let source = rates();
        let stream = ForexStream::new(
            source.clone(),
            pairs(&["USD/EUR", "GBP/USD"]),
            &settings(),
            Duration::from_secs(10),
        );
        stream.refresh().await;

        source.fail("USD");
        source.fail("GBP");
        assert_eq!(stream.refresh().await, CycleOutcome::Failed);

        let snapshot = stream.snapshot();
        assert_eq!(snapshot.error.as_deref(), Some(FAILURE_MESSAGE));
        assert_eq!(snapshot.value.as_ref().map(|b| b.pairs.len()), Some(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_tracks_two_newest_samples() {
        let source = rates();
        let stream = ForexStream::new(
            source.clone(),
            pairs(&["USD/EUR"]),
            &settings(),
            Duration::from_secs(10),
        );
        stream.refresh().await;
        source.set("USD", &[("EUR", 0.95)]);
        stream.refresh().await;

        let snapshot = stream.snapshot();
        let view = &snapshot.value.as_ref().unwrap().pairs[0];
        assert_eq!(view.history.len(), 2);
        assert!((view.change.unwrap() - 0.03).abs() < 1e-9);
    }

    #[tokio::test(start_paused = true)]
    async fn test_history_is_bounded() {
        let stream = ForexStream::new(
            rates(),
            pairs(&["USD/GBP"]),
            &StreamSettings {
                history: 5,
                ..settings()
            },
            Duration::from_secs(10),
        );
        stream.refresh().await;
        tokio::time::sleep(Duration::from_millis(30_500)).await;

        let snapshot = stream.snapshot();
        let board = snapshot.value.as_ref().unwrap();
        assert_eq!(board.pairs[0].history.len(), 5);
        assert_eq!(board.book.get("USD/GBP").map(|s| s.capacity()), Some(5));
        stream.stop();
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_failure_does_not_arm_timer() {
        let source = rates();
        source.fail("USD");
        let stream = ForexStream::new(
            source.clone(),
            pairs(&["USD/EUR"]),
            &settings(),
            Duration::from_secs(10),
        );
        assert_eq!(stream.refresh().await, CycleOutcome::Failed);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(source.call_count(), 1);

        source.recover("USD");
        assert_eq!(stream.refresh().await, CycleOutcome::Applied);
        assert!(stream.controller().is_auto_refresh_armed());
    }
}
