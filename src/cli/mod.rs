//! Terminal front end for the streams.

pub mod ask;
pub mod convert;
pub mod currencies;
pub mod forex;
pub mod search;
pub mod setup;
pub mod stocks;
pub mod ui;

use crate::core::assistant::AssistantProvider;
use crate::core::config::{AppConfig, GEMINI_API_KEY_ENV};
use crate::core::currency::RateProvider;
use crate::core::price::QuoteProvider;
use crate::providers::{
    ExchangeRateApiProvider, GeminiProvider, YahooFinanceProvider, build_assistant_client,
    build_client,
};
use crate::refresh::{RefreshState, UiSnapshot};
use anyhow::{Result, bail};
use reqwest::Client;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, info};

/// Providers built once from the config and shared by every command.
pub struct Services {
    pub config: AppConfig,
    pub rates: Arc<dyn RateProvider>,
    pub quotes: Arc<dyn QuoteProvider>,
    assistant_client: Client,
}

impl Services {
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let client = build_client(&config.network)?;
        let rates: Arc<dyn RateProvider> = Arc::new(ExchangeRateApiProvider::new(
            client.clone(),
            &config.providers.exchange_rate.base_url,
        ));
        let quotes: Arc<dyn QuoteProvider> = Arc::new(YahooFinanceProvider::new(
            client.clone(),
            &config.providers.yahoo.base_url,
        ));
        let assistant_client = build_assistant_client(&config.network)?;
        Ok(Services {
            config,
            rates,
            quotes,
            assistant_client,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.config.network.timeout()
    }

    /// Fails when no API key is configured.
    pub fn assistant(&self) -> Result<Arc<dyn AssistantProvider>> {
        let Some(api_key) = self.config.gemini_api_key() else {
            bail!(
                "No Gemini API key configured. Set providers.gemini.api_key or {GEMINI_API_KEY_ENV}"
            );
        };
        let gemini = &self.config.providers.gemini;
        debug!(model = %gemini.model, "Using Gemini assistant");
        Ok(Arc::new(GeminiProvider::new(
            self.assistant_client.clone(),
            &gemini.base_url,
            &gemini.model,
            api_key,
            self.config.generation.clone(),
        )))
    }
}

/// Renders every settled snapshot until Ctrl-C or the stream stops.
pub async fn watch_snapshots<V>(
    mut rx: watch::Receiver<Arc<UiSnapshot<V>>>,
    render: impl Fn(&UiSnapshot<V>),
) -> Result<()> {
    println!(
        "{}",
        ui::style_text("Watching for updates, press Ctrl-C to stop", ui::StyleType::Subtle)
    );
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let snapshot = Arc::clone(&rx.borrow_and_update());
                if snapshot.is_stopped() {
                    break;
                }
                // A timer tick publishes Loading before the fresh value
                if snapshot.state == RefreshState::Ready {
                    ui::print_separator();
                    render(&snapshot);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Interrupted, stopping watch");
                break;
            }
        }
    }
    Ok(())
}

/// Prints the stream's error line and the last update time, when present.
pub fn print_status<V>(snapshot: &UiSnapshot<V>) {
    if let Some(error) = &snapshot.error {
        println!("{}", ui::style_text(error, ui::StyleType::Error));
    }
    if let Some(at) = snapshot.last_update {
        let line = format!("Updated {}", at.with_timezone(&chrono::Local).format("%H:%M:%S"));
        println!("{}", ui::style_text(&line, ui::StyleType::Subtle));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::StreamSettings;
    use crate::streams::conversion::ConversionStream;
    use crate::streams::testing::{StaticQuotes, StaticRates};
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_watch_renders_once_per_tick() {
        let settings = StreamSettings {
            debounce_ms: 0,
            interval_secs: Some(3),
            history: 30,
            stagger_ms: 0,
        };
        let stream = ConversionStream::new(
            Arc::new(StaticRates::default().with("USD", &[("EUR", 0.9)])),
            Arc::new(StaticQuotes::default()),
            &settings,
            Duration::from_secs(10),
        );
        stream.on_amount_changed("100");
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(stream.controller().is_auto_refresh_armed());

        let renders = AtomicUsize::new(0);
        let watching = watch_snapshots(stream.subscribe(), |snapshot| {
            assert_eq!(snapshot.state, RefreshState::Ready);
            renders.fetch_add(1, Ordering::SeqCst);
        });
        let driver = async {
            tokio::time::sleep(Duration::from_millis(3_500)).await;
            stream.stop();
        };
        let (result, ()) = tokio::join!(watching, driver);

        assert!(result.is_ok());
        assert_eq!(renders.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_assistant_requires_api_key() {
        let mut config = AppConfig::default();
        config.providers.gemini.api_key = Some("   ".to_string());
        // Only meaningful when the variable is not exported by the environment
        if std::env::var(GEMINI_API_KEY_ENV).is_ok() {
            return;
        }
        let services = Services::from_config(config).unwrap();
        let err = services.assistant().err().unwrap();
        assert!(err.to_string().starts_with("No Gemini API key configured"));
    }

    #[test]
    fn test_assistant_with_configured_key() {
        let mut config = AppConfig::default();
        config.providers.gemini.api_key = Some("secret".to_string());
        let services = Services::from_config(config).unwrap();
        assert!(services.assistant().is_ok());
        assert_eq!(services.timeout(), Duration::from_secs(10));
    }
}
