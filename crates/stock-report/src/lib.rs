//! Narrative investment reports for a set of stock symbols
//!
//! A report is produced in four stages, each backed by a text-generation
//! service:
//!
//! - Market summary: price-change statistics over a six-month window,
//!   tabulated and narrated
//! - Company profiles: one narrative per symbol from profile data and
//!   headlines, fanned out with a concurrency cap
//! - Recommendations: built from excerpts of the two stages above
//! - Ranking table: one row per symbol, produced last
//!
//! The first two run concurrently under independent deadlines. A failed or
//! slow stage degrades its own section and the report is still produced.
//!
//! [`CandleHistory`] separately serves the full daily OHLC history of one
//! ticker, newest bar first.
//!
//! # Example
//!
//! ```rust,ignore
//! use stock_report::{Narrators, ReportAggregator, ReportConfig, SymbolSet};
//! use stock_report::narrative::provider_from_config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ReportConfig::from_env()?;
//!     let provider = provider_from_config(&config.narrator)?;
//!     let narrators = Narrators::from_provider(provider, &config.narrator);
//!
//!     let aggregator = ReportAggregator::with_yahoo(narrators, config);
//!     let symbols = SymbolSet::parse(["AAPL", "MSFT"])?;
//!
//!     let report = aggregator.generate(&symbols).await?;
//!     println!("{}", report.render_markdown());
//!     Ok(())
//! }
//! ```

pub mod agents;
pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;
pub mod narrative;
pub mod performance;
pub mod prompts;
pub mod symbols;

// Re-export main types for convenience
pub use agents::{CompanyAnalyses, CompanyProfiler, MarketSummarizer, RecommendationSynthesizer};
pub use api::{
    Candle, CandleSource, CompanyProfile, Headline, PricePoint, PriceSeries, PriceSource,
    PriceWindow, ProfileSource, YahooFinanceClient,
};
pub use config::{ExcerptLimits, NarratorConfig, ProviderKind, ReportConfig};
pub use engine::{
    FailureKind, PipelineState, Report, ReportAggregator, ReportEnvelope, SectionKind, Stage,
    StageFailure, StageResult,
};
pub use error::{ReportError, Result};
pub use history::CandleHistory;
pub use narrative::{NarrativeError, NarrativeGenerator, Narrators};
pub use performance::PerformanceRecord;
pub use symbols::SymbolSet;
