//! Error types for report generation

use crate::narrative::NarrativeError;
use report_llm::LLMError;
use thiserror::Error;

/// Errors that can escape report generation
///
/// Almost every failure inside the pipeline is turned into report content;
/// these are the few that reach the caller.
#[derive(Debug, Error)]
pub enum ReportError {
    /// Symbol list was empty after normalisation
    #[error("Provide a non-empty list of valid stock symbols.")]
    InvalidSymbols,

    /// A single ticker was blank
    #[error("Stock ticker cannot be empty.")]
    EmptyTicker,

    /// The ticker exists in no price history
    #[error("No data found for {0}")]
    NoData(String),

    /// Narrative service refused the top-level report call
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Price data could not be fetched for any symbol
    #[error("Price source error: {0}")]
    PriceSource(String),

    /// Yahoo Finance API error
    #[error("Yahoo Finance error: {0}")]
    YahooFinanceError(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Narrative provider could not be constructed
    #[error("LLM provider error: {0}")]
    Provider(#[from] LLMError),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl ReportError {
    /// HTTP status a transport layer should answer with
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidSymbols | Self::EmptyTicker => 400,
            Self::NoData(_) => 404,
            Self::RateLimited(_) => 429,
            _ => 500,
        }
    }
}

impl From<NarrativeError> for ReportError {
    fn from(err: NarrativeError) -> Self {
        match err {
            NarrativeError::RateLimited(msg) => Self::RateLimited(msg),
            NarrativeError::Failed(msg) => Self::Other(msg),
        }
    }
}

/// Result type alias for report operations
pub type Result<T> = std::result::Result<T, ReportError>;
