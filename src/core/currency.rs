//! Currency conversion abstractions

use crate::core::error::FetchError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Rates for one base currency, as returned by the upstream source.
///
/// The source never lists the base against itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeRates {
    pub base: String,
    pub date: String,
    pub rates: HashMap<String, f64>,
}

impl ExchangeRates {
    /// Rate from the base to `target`. Same-currency requests are `1.0`;
    /// a pair missing upstream passes through as `0.0`.
    pub fn rate_to(&self, target: &str) -> f64 {
        if target.eq_ignore_ascii_case(&self.base) {
            return 1.0;
        }
        self.rates.get(target).copied().unwrap_or(0.0)
    }
}

#[async_trait]
pub trait RateProvider: Send + Sync {
    async fn fetch_rates(&self, base: &str) -> Result<ExchangeRates, FetchError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CurrencyItem {
    pub code: String,
    pub name: String,
}

impl CurrencyItem {
    pub fn from_code(code: &str) -> Self {
        let code = code.to_uppercase();
        let name = currency_name(&code).unwrap_or(&code).to_string();
        CurrencyItem { code, name }
    }
}

const CURRENCY_NAMES: &[(&str, &str)] = &[
    ("USD", "United States Dollar"),
    ("EUR", "Euro"),
    ("GBP", "British Pound Sterling"),
    ("JPY", "Japanese Yen"),
    ("AUD", "Australian Dollar"),
    ("CAD", "Canadian Dollar"),
    ("CHF", "Swiss Franc"),
    ("CNY", "Chinese Yuan"),
    ("INR", "Indian Rupee"),
    ("MXN", "Mexican Peso"),
    ("BRL", "Brazilian Real"),
    ("ZAR", "South African Rand"),
    ("RUB", "Russian Ruble"),
    ("KRW", "South Korean Won"),
    ("SGD", "Singapore Dollar"),
    ("HKD", "Hong Kong Dollar"),
    ("NOK", "Norwegian Krone"),
    ("SEK", "Swedish Krona"),
    ("DKK", "Danish Krone"),
    ("NZD", "New Zealand Dollar"),
    ("TRY", "Turkish Lira"),
    ("PLN", "Polish Zloty"),
    ("THB", "Thai Baht"),
    ("IDR", "Indonesian Rupiah"),
    ("MYR", "Malaysian Ringgit"),
    ("PHP", "Philippine Peso"),
    ("CZK", "Czech Koruna"),
    ("HUF", "Hungarian Forint"),
    ("ILS", "Israeli New Shekel"),
    ("CLP", "Chilean Peso"),
    ("PKR", "Pakistani Rupee"),
    ("AED", "United Arab Emirates Dirham"),
    ("SAR", "Saudi Riyal"),
    ("EGP", "Egyptian Pound"),
];

pub fn currency_name(code: &str) -> Option<&'static str> {
    CURRENCY_NAMES
        .iter()
        .find(|(c, _)| *c == code)
        .map(|(_, name)| *name)
}

/// Builds the selectable currency list from a rate table, adding the base
/// currency itself. Sorted by code.
pub fn currency_catalog(rates: &ExchangeRates) -> Vec<CurrencyItem> {
    let mut items: Vec<CurrencyItem> = rates
        .rates
        .keys()
        .map(|code| CurrencyItem::from_code(code))
        .collect();
    if !items.iter().any(|item| item.code == rates.base) {
        items.push(CurrencyItem::from_code(&rates.base));
    }
    items.sort_by(|a, b| a.code.cmp(&b.code));
    items
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub rate: f64,
    pub inverse_rate: f64,
    pub converted_amount: f64,
    pub from: String,
    pub to: String,
}

impl ConversionResult {
    pub fn compute(amount: f64, rate: f64, from: &str, to: &str) -> Self {
        let inverse_rate = if rate > 0.0 { 1.0 / rate } else { 0.0 };
        ConversionResult {
            rate,
            inverse_rate,
            converted_amount: amount * rate,
            from: from.to_string(),
            to: to.to_string(),
        }
    }

    /// "1 USD = 0.9000 EUR"
    pub fn rate_label(&self) -> String {
        format!("1 {} = {:.4} {}", self.from, self.rate, self.to)
    }
}
