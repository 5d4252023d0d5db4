//! Live currency conversion driven by an amount form.

use crate::core::config::StreamSettings;
use crate::core::currency::{
    ConversionResult, CurrencyItem, ExchangeRates, RateProvider, currency_catalog,
};
use crate::core::error::{FetchError, with_timeout};
use crate::core::history::{RateSample, SeriesBook, TrackedSeries};
use crate::core::price::QuoteProvider;
use crate::refresh::{CycleOutcome, RefreshController, Refresher, UiSnapshot};
use crate::streams::Reading;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

pub const FAILURE_MESSAGE: &str = "Couldn't update rates";

/// Base used to list the available currencies.
const CATALOG_BASE: &str = "USD";

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionRequest {
    pub amount: f64,
    pub shares: Option<f64>,
    pub from: String,
    pub to: String,
}

impl ConversionRequest {
    pub fn pair_key(&self) -> String {
        pair_key(&self.from, &self.to)
    }

    /// True when both requests convert the same amount between the same
    /// currencies, whatever their share counts.
    fn same_conversion(&self, other: &ConversionRequest) -> bool {
        self.amount == other.amount && self.from == other.from && self.to == other.to
    }
}

pub fn pair_key(from: &str, to: &str) -> String {
    format!("{from}_{to}")
}

/// Accepts the text shapes `^\d*\.?\d*$` allows, including the empty string.
pub fn is_numeric_text(text: &str) -> bool {
    text.chars().all(|c| c.is_ascii_digit() || c == '.') && text.matches('.').count() <= 1
}

fn parse_positive(text: &str) -> Option<f64> {
    text.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite() && *value > 0.0)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionForm {
    pub amount: String,
    pub shares: String,
    pub from: String,
    pub to: String,
    pub stock: Option<String>,
}

impl Default for ConversionForm {
    fn default() -> Self {
        ConversionForm {
            amount: String::new(),
            shares: String::new(),
            from: "USD".to_string(),
            to: "EUR".to_string(),
            stock: None,
        }
    }
}

impl ConversionForm {
    /// `None` unless the amount is a positive number.
    pub fn request(&self) -> Option<ConversionRequest> {
        Some(ConversionRequest {
            amount: parse_positive(&self.amount)?,
            shares: parse_positive(&self.shares),
            from: self.from.clone(),
            to: self.to.clone(),
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ConversionView {
    pub request: ConversionRequest,
    pub result: Option<ConversionResult>,
    pub converted: Reading,
    /// `amount * shares`
    pub total_in_from: Reading,
    /// `converted * shares`
    pub total_in_to: Reading,
    /// Rate history per `FROM_TO` pair
    pub history: SeriesBook<RateSample>,
}

impl ConversionView {
    pub fn series(&self) -> Option<&TrackedSeries<RateSample>> {
        self.history.get(&self.request.pair_key())
    }

    pub fn delta(&self) -> Option<f64> {
        self.history.delta(&self.request.pair_key())
    }

    fn blanked(&self) -> Self {
        ConversionView {
            result: None,
            converted: Reading::Blank,
            total_in_from: Reading::Blank,
            total_in_to: Reading::Blank,
            ..self.clone()
        }
    }
}

fn totals(request: &ConversionRequest, converted: Reading) -> (Reading, Reading) {
    let Some(shares) = request.shares else {
        return (Reading::Blank, Reading::Blank);
    };
    match converted {
        Reading::Value(value) => (
            Reading::Value(request.amount * shares),
            Reading::Value(value * shares),
        ),
        other => (other, other),
    }
}

pub struct ConversionRefresher {
    rates: Arc<dyn RateProvider>,
    timeout: Duration,
    history: usize,
}

#[async_trait]
impl Refresher for ConversionRefresher {
    type Input = ConversionRequest;
    type Fetched = ExchangeRates;
    type Value = ConversionView;

    async fn fetch(&self, input: &ConversionRequest) -> Result<ExchangeRates, FetchError> {
        debug!(from = %input.from, to = %input.to, amount = input.amount, "Converting");
        with_timeout(self.timeout, self.rates.fetch_rates(&input.from)).await
    }

    fn fold(
        &self,
        input: &ConversionRequest,
        rates: ExchangeRates,
        previous: Option<&ConversionView>,
        at: DateTime<Utc>,
    ) -> ConversionView {
        let rate = rates.rate_to(&input.to);
        let result = ConversionResult::compute(input.amount, rate, &input.from, &input.to);
        let sample = RateSample {
            timestamp: at,
            rate,
        };
        let history = match previous {
            Some(view) => view.history.record(&input.pair_key(), sample),
            None => SeriesBook::new(self.history).record(&input.pair_key(), sample),
        };
        let converted = Reading::Value(result.converted_amount);
        let (total_in_from, total_in_to) = totals(input, converted);
        ConversionView {
            request: input.clone(),
            result: Some(result),
            converted,
            total_in_from,
            total_in_to,
            history,
        }
    }

    fn degrade(
        &self,
        input: &ConversionRequest,
        previous: Option<&ConversionView>,
    ) -> Option<ConversionView> {
        let (total_in_from, total_in_to) = totals(input, Reading::Unavailable);
        Some(ConversionView {
            request: input.clone(),
            result: None,
            converted: Reading::Unavailable,
            total_in_from,
            total_in_to,
            history: previous
                .map(|view| view.history.clone())
                .unwrap_or_else(|| SeriesBook::new(self.history)),
        })
    }

    fn failure_message(&self, _err: &FetchError) -> String {
        FAILURE_MESSAGE.to_string()
    }
}

/// Form state plus the refresh controller that keeps its result current.
pub struct ConversionStream {
    controller: RefreshController<ConversionRefresher>,
    form: Mutex<ConversionForm>,
    currencies: Mutex<Vec<CurrencyItem>>,
    rates: Arc<dyn RateProvider>,
    quotes: Arc<dyn QuoteProvider>,
    timeout: Duration,
}

impl ConversionStream {
    pub fn new(
        rates: Arc<dyn RateProvider>,
        quotes: Arc<dyn QuoteProvider>,
        settings: &StreamSettings,
        timeout: Duration,
    ) -> Self {
        let refresher = ConversionRefresher {
            rates: Arc::clone(&rates),
            timeout,
            history: settings.history,
        };
        ConversionStream {
            controller: RefreshController::new("conversion", refresher, settings.policy()),
            form: Mutex::new(ConversionForm::default()),
            currencies: Mutex::new(Vec::new()),
            rates,
            quotes,
            timeout,
        }
    }

    pub fn controller(&self) -> &RefreshController<ConversionRefresher> {
        &self.controller
    }

    pub fn snapshot(&self) -> Arc<UiSnapshot<ConversionView>> {
        self.controller.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<Arc<UiSnapshot<ConversionView>>> {
        self.controller.subscribe()
    }

    pub fn form(&self) -> ConversionForm {
        self.form.lock().clone()
    }

    pub fn currencies(&self) -> Vec<CurrencyItem> {
        self.currencies.lock().clone()
    }

    /// Returns `false` when the keystroke is rejected. A usable amount is
    /// converted after the debounce delay; anything else blanks the result.
    pub fn on_amount_changed(&self, text: &str) -> bool {
        if !is_numeric_text(text) {
            debug!(text, "Ignoring non-numeric amount");
            return false;
        }
        let request = {
            let mut form = self.form.lock();
            form.amount = text.to_string();
            form.request()
        };
        match request {
            Some(request) => self.controller.submit(request),
            None => self.controller.clear(|view| view.map(ConversionView::blanked)),
        }
        true
    }

    /// A share count only rescales the totals, so it is applied to the result
    /// on screen unless a conversion for other inputs is pending.
    pub fn on_shares_changed(&self, text: &str) -> bool {
        if !is_numeric_text(text) {
            debug!(text, "Ignoring non-numeric share count");
            return false;
        }
        let request = {
            let mut form = self.form.lock();
            form.shares = text.to_string();
            form.request()
        };
        let Some(request) = request else {
            return true;
        };
        let settled = self.controller.is_idle()
            && self
                .controller
                .current_input()
                .is_some_and(|current| current.same_conversion(&request));
        if settled {
            self.controller.amend(request.clone(), |view| {
                let (total_in_from, total_in_to) = totals(&request, view.converted);
                ConversionView {
                    request: request.clone(),
                    total_in_from,
                    total_in_to,
                    ..view.clone()
                }
            });
        } else {
            self.controller.submit(request);
        }
        true
    }

    pub fn select_from(&self, code: &str) -> Option<JoinHandle<CycleOutcome>> {
        self.form.lock().from = code.to_uppercase();
        self.convert_now()
    }

    pub fn select_to(&self, code: &str) -> Option<JoinHandle<CycleOutcome>> {
        self.form.lock().to = code.to_uppercase();
        self.convert_now()
    }

    pub fn swap(&self) -> Option<JoinHandle<CycleOutcome>> {
        {
            let mut guard = self.form.lock();
            let form = &mut *guard;
            std::mem::swap(&mut form.from, &mut form.to);
        }
        self.convert_now()
    }

    fn convert_now(&self) -> Option<JoinHandle<CycleOutcome>> {
        let request = self.form.lock().request()?;
        Some(self.controller.spawn_refresh_with(request))
    }

    /// Uses the stock's price as the amount. Its trading currency becomes the
    /// source currency when that currency is in the loaded list. Converts
    /// right away when a share count is set.
    pub async fn select_stock(&self, symbol: &str) -> Result<Option<CycleOutcome>, FetchError> {
        let quote = with_timeout(self.timeout, self.quotes.fetch_quote(symbol)).await?;
        info!(symbol = %quote.symbol, price = quote.price, "Stock selected for conversion");

        let currency = quote
            .currency
            .as_deref()
            .map(str::to_uppercase)
            .filter(|code| self.currencies.lock().iter().any(|item| &item.code == code));
        let request = {
            let mut form = self.form.lock();
            form.stock = Some(quote.symbol.clone());
            form.amount = quote.price.to_string();
            if let Some(code) = currency {
                form.from = code;
            }
            if parse_positive(&form.shares).is_some() {
                form.request()
            } else {
                None
            }
        };
        match request {
            Some(request) => Ok(Some(self.controller.refresh_with(request).await)),
            None => Ok(None),
        }
    }

    pub async fn load_currencies(&self) -> Result<Vec<CurrencyItem>, FetchError> {
        let rates = with_timeout(self.timeout, self.rates.fetch_rates(CATALOG_BASE)).await?;
        let catalog = currency_catalog(&rates);
        debug!(count = catalog.len(), "Loaded currency list");
        *self.currencies.lock() = catalog.clone();
        Ok(catalog)
    }

    pub fn set_auto_refresh(&self, enabled: bool) {
        self.controller.set_auto_refresh(enabled);
    }

    pub fn stop(&self) {
        self.controller.stop();
    }
}
