//! Market data collaborators
//!
//! The pipeline only talks to these traits. [`YahooFinanceClient`] is the
//! production implementation; tests substitute their own.

pub mod yahoo;

pub use yahoo::YahooFinanceClient;

use crate::error::Result;
use crate::symbols::SymbolSet;
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Placeholder for any profile field that could not be fetched
pub const NOT_AVAILABLE: &str = "N/A";

/// One closing price
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: DateTime<Utc>,
    pub close: f64,
}

/// Closing prices for one symbol, oldest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    pub symbol: String,
    pub points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, mut points: Vec<PricePoint>) -> Self {
        points.sort_by_key(|p| p.date);
        Self {
            symbol: symbol.into(),
            points,
        }
    }

    /// Close prices that can take part in change math
    pub fn valid_closes(&self) -> Vec<f64> {
        self.points
            .iter()
            .map(|p| p.close)
            .filter(|c| c.is_finite() && *c > 0.0)
            .collect()
    }
}

/// Lookback window for a price download
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceWindow {
    pub days: u32,
}

impl PriceWindow {
    pub fn days(days: u32) -> Self {
        Self { days }
    }

    pub fn six_months() -> Self {
        Self::days(180)
    }

    /// Start and end of the window ending at `end`
    pub fn bounds(&self, end: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
        (end - Duration::days(i64::from(self.days)), end)
    }

    /// Column label used in the performance table
    pub fn label(&self) -> String {
        match self.days {
            30 => "1-Month".to_string(),
            90 => "3-Month".to_string(),
            180 => "6-Month".to_string(),
            365 => "1-Year".to_string(),
            d => format!("{d}-Day"),
        }
    }
}

impl Default for PriceWindow {
    fn default() -> Self {
        Self::six_months()
    }
}

/// A news headline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Headline {
    pub title: String,
}

impl Headline {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
        }
    }
}

/// Descriptive data for one company
///
/// Never absent: fields that could not be fetched hold [`NOT_AVAILABLE`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanyProfile {
    pub symbol: String,
    pub name: String,
    pub sector: String,
    pub market_cap: String,
    pub summary: String,
    pub headlines: Vec<Headline>,
}

impl CompanyProfile {
    /// Profile with every field degraded
    pub fn unavailable(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            name: NOT_AVAILABLE.to_string(),
            sector: NOT_AVAILABLE.to_string(),
            market_cap: NOT_AVAILABLE.to_string(),
            summary: NOT_AVAILABLE.to_string(),
            headlines: Vec::new(),
        }
    }

    /// Attach at most `limit` headlines, skipping blank titles
    pub fn with_headlines(mut self, headlines: Vec<Headline>, limit: usize) -> Self {
        self.headlines = headlines
            .into_iter()
            .filter(|h| !h.title.trim().is_empty())
            .take(limit)
            .collect();
        self
    }

    /// Headline titles joined for a prompt
    pub fn headline_line(&self) -> String {
        self.headlines
            .iter()
            .map(|h| h.title.as_str())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

/// One daily OHLC bar
///
/// Serialized with the column names of a Yahoo daily download.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Candle {
    pub date: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    #[serde(rename = "Adj Close")]
    pub adj_close: f64,
    pub volume: u64,
}

/// Source of historical closing prices
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Download closing prices for every symbol in one batch
    ///
    /// Symbols without data are simply missing from the map. An `Err` means
    /// the batch as a whole failed.
    async fn fetch_series(
        &self,
        symbols: &SymbolSet,
        window: PriceWindow,
    ) -> Result<HashMap<String, PriceSeries>>;
}

/// Source of company descriptions and news
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ProfileSource: Send + Sync {
    /// Always returns a profile, degraded to sentinels on failure
    async fn fetch_profile(&self, symbol: &str) -> CompanyProfile;

    /// Up to `limit` recent headlines, empty on failure
    async fn fetch_news(&self, symbol: &str, limit: usize) -> Vec<Headline>;
}

/// Source of full daily OHLC history
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CandleSource: Send + Sync {
    /// Every daily bar available for `symbol`, in any order
    ///
    /// A ticker without data yields an empty vector, not an error.
    async fn fetch_candles(&self, symbol: &str) -> Result<Vec<Candle>>;
}
