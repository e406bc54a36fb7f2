//! Yahoo Finance API client

use super::{
    Candle, CandleSource, CompanyProfile, Headline, NOT_AVAILABLE, PricePoint, PriceSeries,
    PriceSource, PriceWindow, ProfileSource,
};
use crate::error::{ReportError, Result};
use crate::symbols::SymbolSet;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use std::collections::HashMap;
use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;
use time::OffsetDateTime;
use tracing::{debug, info, instrument, warn};
use yahoo_finance_api as yahoo;

type SharedRateLimiter = Arc<RateLimiter<NotKeyed, InMemoryState, DefaultClock>>;

/// Yahoo Finance API client
///
/// Profile and news lookups share one limiter so a batch of symbols never
/// bursts the quote-summary and search endpoints. Price history is not paced.
#[derive(Clone)]
pub struct YahooFinanceClient {
    rate_limiter: SharedRateLimiter,
}

impl YahooFinanceClient {
    /// Create a client pacing lookups one per 500 ms
    pub fn new() -> Self {
        Self::with_interval(Duration::from_millis(500))
    }

    /// Create a client pacing lookups one per `interval`
    pub fn with_interval(interval: Duration) -> Self {
        let quota = Quota::with_period(interval)
            .unwrap_or_else(|| Quota::per_second(NonZeroU32::MAX));
        Self {
            rate_limiter: Arc::new(RateLimiter::direct(quota)),
        }
    }

    /// Closing prices for one symbol between `start` and `end`
    pub async fn get_close_history(
        &self,
        symbol: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<PriceSeries> {
        let provider = connector()?;

        let start_odt = OffsetDateTime::from_unix_timestamp(start.timestamp())
            .map_err(|e| ReportError::YahooFinanceError(format!("Invalid start timestamp: {e}")))?;
        let end_odt = OffsetDateTime::from_unix_timestamp(end.timestamp())
            .map_err(|e| ReportError::YahooFinanceError(format!("Invalid end timestamp: {e}")))?;

        let response = provider
            .get_quote_history(symbol, start_odt, end_odt)
            .await
            .map_err(|e| ReportError::YahooFinanceError(e.to_string()))?;

        let quotes = response
            .quotes()
            .map_err(|e| ReportError::YahooFinanceError(e.to_string()))?;

        let points = quotes
            .iter()
            .filter_map(|q| {
                let ts = i64::try_from(q.timestamp).ok()?;
                Some(PricePoint {
                    date: DateTime::from_timestamp(ts, 0)?,
                    close: q.close,
                })
            })
            .collect();

        Ok(PriceSeries::new(symbol, points))
    }

    /// Every daily bar Yahoo has for `symbol`, oldest first
    pub async fn get_candle_history(&self, symbol: &str) -> Result<Vec<Candle>> {
        let response = connector()?
            .get_quote_range(symbol, "1d", "max")
            .await
            .map_err(|e| ReportError::YahooFinanceError(e.to_string()))?;

        let quotes = match response.quotes() {
            Ok(quotes) => quotes,
            Err(yahoo::YahooError::NoQuotes | yahoo::YahooError::NoResult) => Vec::new(),
            Err(e) => return Err(ReportError::YahooFinanceError(e.to_string())),
        };

        Ok(quotes.iter().filter_map(candle_from_quote).collect())
    }

    async fn ticker_info(&self, symbol: &str) -> Result<yahoo::YQuoteSummary> {
        self.rate_limiter.until_ready().await;

        // Needs `&mut` to cache the session crumb
        let mut provider = connector()?;
        provider
            .get_ticker_info(symbol)
            .await
            .map_err(|e| ReportError::YahooFinanceError(e.to_string()))
    }

    async fn search(&self, symbol: &str) -> Result<yahoo::YSearchResult> {
        self.rate_limiter.until_ready().await;

        connector()?
            .search_ticker(symbol)
            .await
            .map_err(|e| ReportError::YahooFinanceError(e.to_string()))
    }
}

fn connector() -> Result<yahoo::YahooConnector> {
    yahoo::YahooConnector::new().map_err(|e| ReportError::YahooFinanceError(e.to_string()))
}

impl Default for YahooFinanceClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PriceSource for YahooFinanceClient {
    #[instrument(skip(self, symbols), fields(symbols = %symbols, days = window.days))]
    async fn fetch_series(
        &self,
        symbols: &SymbolSet,
        window: PriceWindow,
    ) -> Result<HashMap<String, PriceSeries>> {
        let (start, end) = window.bounds(Utc::now());
        let distinct = symbols.distinct();

        let fetches = distinct
            .iter()
            .map(|symbol| self.get_close_history(symbol, start, end));
        let results = join_all(fetches).await;

        let mut series = HashMap::new();
        let mut last_error = None;
        for (symbol, result) in distinct.iter().zip(results) {
            match result {
                Ok(s) => {
                    debug!("{} price points for {}", s.points.len(), symbol);
                    series.insert(symbol.clone(), s);
                }
                Err(e) => {
                    warn!("No price data for {}: {}", symbol, e);
                    last_error = Some(e);
                }
            }
        }

        // Partial results are fine; only a batch with nothing at all is an error
        if series.is_empty() {
            if let Some(e) = last_error {
                return Err(ReportError::PriceSource(e.to_string()));
            }
        }

        info!("Downloaded price data for {}/{} symbols", series.len(), distinct.len());
        Ok(series)
    }
}

#[async_trait]
impl ProfileSource for YahooFinanceClient {
    #[instrument(skip(self))]
    async fn fetch_profile(&self, symbol: &str) -> CompanyProfile {
        match self.ticker_info(symbol).await {
            Ok(summary) => profile_from_summary(symbol, &summary),
            Err(e) => {
                warn!("Error fetching company info for {}: {}", symbol, e);
                CompanyProfile::unavailable(symbol)
            }
        }
    }

    #[instrument(skip(self))]
    async fn fetch_news(&self, symbol: &str, limit: usize) -> Vec<Headline> {
        match self.search(symbol).await {
            Ok(result) => result
                .news
                .into_iter()
                .map(|n| Headline::new(n.title))
                .take(limit)
                .collect(),
            Err(e) => {
                warn!("Error fetching news for {}: {}", symbol, e);
                Vec::new()
            }
        }
    }
}

#[async_trait]
impl CandleSource for YahooFinanceClient {
    #[instrument(skip(self))]
    async fn fetch_candles(&self, symbol: &str) -> Result<Vec<Candle>> {
        let candles = self.get_candle_history(symbol).await?;
        debug!("{} daily bars for {}", candles.len(), symbol);
        Ok(candles)
    }
}

/// Profile fields from a quote summary, each falling back to [`NOT_AVAILABLE`]
///
/// The business summary is kept whole; the profiler excerpts it.
pub fn profile_from_summary(symbol: &str, summary: &yahoo::YQuoteSummary) -> CompanyProfile {
    let mut profile = CompanyProfile::unavailable(symbol);

    let Some(data) = summary
        .quote_summary
        .as_ref()
        .and_then(|s| s.result.as_ref())
        .and_then(|r| r.first())
    else {
        return profile;
    };

    if let Some(name) = data
        .quote_type
        .as_ref()
        .and_then(|q| pick_name(q.long_name.as_deref(), q.short_name.as_deref()))
    {
        profile.name = name;
    }

    if let Some(asset) = &data.asset_profile {
        if let Some(sector) = non_blank(asset.sector.as_deref()) {
            profile.sector = sector;
        }
        if let Some(text) = non_blank(asset.long_business_summary.as_deref()) {
            profile.summary = text;
        }
    }

    if let Some(cap) = data.summary_detail.as_ref().and_then(|d| d.market_cap) {
        profile.market_cap = cap.to_string();
    }

    profile
}

fn candle_from_quote(quote: &yahoo::Quote) -> Option<Candle> {
    let ts = i64::try_from(quote.timestamp).ok()?;
    Some(Candle {
        date: DateTime::from_timestamp(ts, 0)?,
        open: quote.open,
        high: quote.high,
        low: quote.low,
        close: quote.close,
        adj_close: quote.adjclose,
        volume: quote.volume,
    })
}

/// Prefer the long company name, fall back to the short one
fn pick_name(long_name: Option<&str>, short_name: Option<&str>) -> Option<String> {
    non_blank(long_name).or_else(|| non_blank(short_name))
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty() && *v != NOT_AVAILABLE)
        .map(ToString::to_string)
}
