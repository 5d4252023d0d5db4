//! Core domain types and provider abstractions

pub mod assistant;
pub mod config;
pub mod currency;
pub mod error;
pub mod history;
pub mod log;
pub mod price;

// Re-export main types for cleaner imports
pub use assistant::AssistantProvider;
pub use currency::{ConversionResult, CurrencyItem, ExchangeRates, RateProvider};
pub use error::FetchError;
pub use history::{QuoteSample, RateSample, SeriesBook, TrackedSeries};
pub use price::{Quote, QuoteProvider, SymbolMatch};
