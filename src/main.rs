use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand};
use fxtrack::cli::convert::ConvertArgs;
use fxtrack::core::log::init_logging;
use fxtrack::streams::stocks::StockCategory;

#[derive(Parser)]
#[command(version, about)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Path to optional configuration file
    #[arg(short, long, global = true)]
    config_path: Option<String>,

    #[command(subcommand)]
    command: Option<Commands>,
}

impl From<Commands> for fxtrack::AppCommand {
    fn from(cmd: Commands) -> fxtrack::AppCommand {
        match cmd {
            Commands::Currencies => fxtrack::AppCommand::Currencies,
            Commands::Convert {
                amount,
                from,
                to,
                shares,
                stock,
                watch,
            } => fxtrack::AppCommand::Convert(ConvertArgs {
                amount,
                from,
                to,
                shares,
                stock,
                watch,
            }),
            Commands::Stocks { category, watch } => {
                fxtrack::AppCommand::Stocks { category, watch }
            }
            Commands::Forex { watch } => fxtrack::AppCommand::Forex { watch },
            Commands::Search { query } => fxtrack::AppCommand::Search { query },
            Commands::Ask { question, stream } => fxtrack::AppCommand::Ask {
                question: question.join(" "),
                stream,
            },
            Commands::Analyze { pair } => fxtrack::AppCommand::Analyze { pair },
            Commands::Tips => fxtrack::AppCommand::Tips,
            Commands::Setup => unreachable!("Setup command should be handled separately"),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Create default configuration
    Setup,
    /// List the currencies available for conversion
    Currencies,
    /// Convert an amount between two currencies
    Convert {
        amount: String,
        from: String,
        to: String,
        /// Also show totals for this many shares
        #[arg(long)]
        shares: Option<String>,
        /// Use this stock's price and trading currency as AMOUNT and FROM
        #[arg(long)]
        stock: Option<String>,
        /// Keep refreshing until interrupted
        #[arg(short, long)]
        watch: bool,
    },
    /// Display a stock list
    Stocks {
        /// most-active, gainers or losers
        #[arg(short = 'k', long, default_value = "most-active")]
        category: StockCategory,
        /// Keep refreshing until interrupted
        #[arg(short, long)]
        watch: bool,
    },
    /// Display the configured forex pairs
    Forex {
        /// Keep refreshing until interrupted
        #[arg(short, long)]
        watch: bool,
    },
    /// Search stock symbols by name or ticker
    Search { query: String },
    /// Ask the forex assistant a question
    Ask {
        #[arg(required = true)]
        question: Vec<String>,
        /// Print the reply as it is generated
        #[arg(long)]
        stream: bool,
    },
    /// Ask the assistant to analyze a currency pair, e.g. USD/EUR
    Analyze { pair: String },
    /// General forex trading tips
    Tips,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(cli.verbose);

    let result = match cli.command {
        Some(Commands::Setup) => match cli.config_path.as_deref() {
            Some(path) => fxtrack::cli::setup::setup_at_path(path),
            None => fxtrack::cli::setup::setup(),
        },
        Some(cmd) => fxtrack::run_command(cmd.into(), cli.config_path.as_deref()).await,
        None => {
            Cli::command().print_help()?;
            Ok(())
        }
    };

    if let Err(e) = &result {
        tracing::error!(error = %e, "Application failed");
    }
    result
}
