//! Full daily price history for one ticker, newest bar first

use crate::api::{Candle, CandleSource};
use crate::error::{ReportError, Result};
use serde::Serialize;
use tracing::{info, instrument};

/// OHLC bars for one ticker, most recent first
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandleHistory {
    pub symbol: String,
    pub candles: Vec<Candle>,
}

impl CandleHistory {
    /// Fetch and order the history for `ticker`
    ///
    /// The ticker is trimmed and uppercased. A blank ticker is
    /// [`ReportError::EmptyTicker`] and a ticker without any bars is
    /// [`ReportError::NoData`].
    #[instrument(skip(source))]
    pub async fn fetch(source: &dyn CandleSource, ticker: &str) -> Result<Self> {
        let symbol = ticker.trim().to_ascii_uppercase();
        if symbol.is_empty() {
            return Err(ReportError::EmptyTicker);
        }

        let mut candles = source.fetch_candles(&symbol).await?;
        if candles.is_empty() {
            return Err(ReportError::NoData(symbol));
        }

        candles.sort_by(|a, b| b.date.cmp(&a.date));
        info!("{} daily bars for {}", candles.len(), symbol);
        Ok(Self { symbol, candles })
    }

    pub fn latest(&self) -> Option<&Candle> {
        self.candles.first()
    }
}
