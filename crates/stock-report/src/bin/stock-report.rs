//! Generate an investment report from the command line
//!
//! # Usage
//!
//! ```bash
//! # Gemini (default)
//! export GOOGLE_API_KEY="..."
//!
//! # or any OpenAI-compatible server
//! export OPENAI_API_KEY="..."
//! export OPENAI_API_BASE="http://localhost:1234/v1"
//!
//! cargo run --bin stock-report -- AAPL MSFT NVDA
//! cargo run --bin stock-report -- --provider openai --model gpt-4o-mini --json aapl tsla
//!
//! # Daily OHLC history as JSON, newest first
//! cargo run --bin stock-report -- history MSFT
//! ```
//!
//! Exit status: 0 on success, 2 for empty input, 3 when the text service rate
//! limited the report, 4 when a ticker has no price history, 1 otherwise.

use clap::{Parser, Subcommand};
use report_utils::{LogFormat, init_tracing_with};
use std::process::ExitCode;
use stock_report::narrative::provider_from_config;
use stock_report::{
    CandleHistory, Narrators, ProviderKind, ReportAggregator, ReportConfig, ReportError, SymbolSet,
    YahooFinanceClient,
};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "stock-report")]
#[command(about = "Multi-stage narrative investment report for a set of stocks", long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Option<Command>,

    /// Ticker symbols, e.g. AAPL MSFT
    symbols: Vec<String>,

    /// Print the JSON envelope instead of the Markdown report
    #[arg(long)]
    json: bool,

    /// Text-generation backend: gemini or openai
    #[arg(long, env = "REPORT_LLM_PROVIDER")]
    provider: Option<ProviderKind>,

    /// Model name passed to the backend
    #[arg(long, env = "REPORT_LLM_MODEL")]
    model: Option<String>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
enum Command {
    /// Print the full daily OHLC history of one ticker, newest first
    History {
        /// Ticker symbol, e.g. MSFT
        ticker: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    let args = Args::parse();
    let format = if args.log_json {
        LogFormat::Json
    } else {
        LogFormat::Pretty
    };
    init_tracing_with(format, "info");

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run(args: Args) -> anyhow::Result<()> {
    if let Some(Command::History { ticker }) = &args.command {
        return history(ticker).await;
    }

    let symbols = SymbolSet::parse(&args.symbols)?;

    let mut config = ReportConfig::from_env()?;
    if let Some(provider) = args.provider {
        config.narrator.provider = provider;
    }
    if let Some(model) = args.model {
        config.narrator.model = model;
    }
    config.validate()?;

    info!(
        "Generating report for {} with {:?}/{}",
        symbols, config.narrator.provider, config.narrator.model
    );

    let provider = provider_from_config(&config.narrator)?;
    let narrators = Narrators::from_provider(provider, &config.narrator);
    let aggregator = ReportAggregator::with_yahoo(narrators, config);

    let report = aggregator.generate(&symbols).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report.envelope())?);
    } else {
        println!("{}", report.render_markdown());
    }

    info!(
        "Done in {:.1?}{}",
        report.elapsed(),
        if report.is_degraded() { " (degraded)" } else { "" }
    );
    Ok(())
}

async fn history(ticker: &str) -> anyhow::Result<()> {
    let client = YahooFinanceClient::new();
    let history = CandleHistory::fetch(&client, ticker).await?;
    println!("{}", serde_json::to_string_pretty(&history.candles)?);
    Ok(())
}

/// Exit status for a failed run, following the HTTP status of the error
fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<ReportError>().map(ReportError::status_code) {
        Some(400) => 2,
        Some(429) => 3,
        Some(404) => 4,
        _ => 1,
    }
}
