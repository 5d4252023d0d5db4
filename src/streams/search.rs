//! Debounced stock symbol search.

use crate::core::config::StreamSettings;
use crate::core::error::{FetchError, with_timeout};
use crate::core::price::{DEFAULT_SEARCH_LIMIT, QuoteProvider, SymbolMatch};
use crate::refresh::{CycleOutcome, RefreshController, RefreshPolicy, Refresher, UiSnapshot};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

pub struct SearchRefresher {
    quotes: Arc<dyn QuoteProvider>,
    limit: usize,
    timeout: Duration,
}

#[async_trait]
impl Refresher for SearchRefresher {
    type Input = String;
    type Fetched = Vec<SymbolMatch>;
    type Value = Vec<SymbolMatch>;

    async fn fetch(&self, query: &String) -> Result<Vec<SymbolMatch>, FetchError> {
        with_timeout(self.timeout, self.quotes.search_symbols(query, self.limit)).await
    }

    fn fold(
        &self,
        _query: &String,
        matches: Vec<SymbolMatch>,
        _previous: Option<&Vec<SymbolMatch>>,
        _at: DateTime<Utc>,
    ) -> Vec<SymbolMatch> {
        matches
    }

    fn degrade(
        &self,
        _query: &String,
        _previous: Option<&Vec<SymbolMatch>>,
    ) -> Option<Vec<SymbolMatch>> {
        Some(Vec::new())
    }

    fn failure_message(&self, err: &FetchError) -> String {
        format!("Search failed: {err}")
    }
}

pub struct SearchStream {
    controller: RefreshController<SearchRefresher>,
}

impl SearchStream {
    pub fn new(
        quotes: Arc<dyn QuoteProvider>,
        settings: &StreamSettings,
        timeout: Duration,
    ) -> Self {
        let refresher = SearchRefresher {
            quotes,
            limit: DEFAULT_SEARCH_LIMIT,
            timeout,
        };
        // Results never go stale on their own
        let policy = RefreshPolicy {
            auto_refresh: None,
            ..settings.policy()
        };
        SearchStream {
            controller: RefreshController::new("search", refresher, policy),
        }
    }

    pub fn controller(&self) -> &RefreshController<SearchRefresher> {
        &self.controller
    }

    pub fn snapshot(&self) -> Arc<UiSnapshot<Vec<SymbolMatch>>> {
        self.controller.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<UiSnapshot<Vec<SymbolMatch>>>> {
        self.controller.subscribe()
    }

    /// Upper-cases the query and searches after the debounce delay. An empty
    /// query clears the results without searching.
    pub fn on_query_changed(&self, text: &str) {
        let query = text.trim().to_uppercase();
        if query.is_empty() {
            self.controller.clear(|_| None);
        } else {
            self.controller.submit(query);
        }
    }

    /// Searches right away, bypassing the debounce.
    pub async fn search_now(&self, text: &str) -> CycleOutcome {
        let query = text.trim().to_uppercase();
        if query.is_empty() {
            self.controller.clear(|_| None);
            return CycleOutcome::Skipped;
        }
        self.controller.refresh_with(query).await
    }

    pub fn stop(&self) {
        self.controller.stop();
    }
}
