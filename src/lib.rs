pub mod cli;
pub mod core;
pub mod providers;
pub mod refresh;
pub mod streams;

use crate::cli::Services;
use crate::cli::convert::ConvertArgs;
use crate::core::config::AppConfig;
use crate::streams::stocks::StockCategory;
use anyhow::Result;
use tracing::{debug, info};

pub enum AppCommand {
    Currencies,
    Convert(ConvertArgs),
    Stocks { category: StockCategory, watch: bool },
    Forex { watch: bool },
    Search { query: String },
    Ask { question: String, stream: bool },
    Analyze { pair: String },
    Tips,
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    info!("fxtrack starting...");

    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!(
        pairs = config.forex_pairs.len(),
        timeout_secs = config.network.timeout_secs,
        "Loaded config"
    );
    let services = Services::from_config(config)?;

    match command {
        AppCommand::Currencies => cli::currencies::run(&services).await,
        AppCommand::Convert(args) => cli::convert::run(&services, &args).await,
        AppCommand::Stocks { category, watch } => {
            cli::stocks::run(&services, category, watch).await
        }
        AppCommand::Forex { watch } => cli::forex::run(&services, watch).await,
        AppCommand::Search { query } => cli::search::run(&services, &query).await,
        AppCommand::Ask { question, stream } => {
            cli::ask::ask(&services, &question, stream).await
        }
        AppCommand::Analyze { pair } => cli::ask::analyze(&services, &pair).await,
        AppCommand::Tips => cli::ask::tips(&services).await,
    }
}
