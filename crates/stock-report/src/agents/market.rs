//! Market performance summary

use crate::api::{PriceSource, PriceWindow};
use crate::engine::{Stage, StageFailure, StageResult};
use crate::narrative::NarrativeGenerator;
use crate::performance::{self, PerformanceRecord};
use crate::prompts;
use crate::symbols::SymbolSet;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Returned instead of an analysis when no symbol has usable prices
pub const NO_DATA: &str = "No valid stock data found for the given symbols.";

/// Compares price performance across symbols and narrates it
pub struct MarketSummarizer {
    prices: Arc<dyn PriceSource>,
    narrator: Arc<dyn NarrativeGenerator>,
    window: PriceWindow,
}

impl MarketSummarizer {
    pub fn new(
        prices: Arc<dyn PriceSource>,
        narrator: Arc<dyn NarrativeGenerator>,
        window: PriceWindow,
    ) -> Self {
        Self {
            prices,
            narrator,
            window,
        }
    }

    /// Change statistics for every symbol with enough data
    ///
    /// A failed download yields no records rather than an error.
    pub async fn summarize_performance(&self, symbols: &SymbolSet) -> Vec<PerformanceRecord> {
        match self.prices.fetch_series(symbols, self.window).await {
            Ok(series) => performance::compute(symbols, &series),
            Err(e) => {
                warn!("Error fetching data: {}", e);
                Vec::new()
            }
        }
    }

    /// Narrative comparison of the symbols' performance
    #[instrument(skip(self, symbols), fields(symbols = %symbols))]
    pub async fn analyze(&self, symbols: &SymbolSet) -> StageResult {
        let records = self.summarize_performance(symbols).await;
        if records.is_empty() {
            warn!("No valid stock data found");
            return StageResult::Success(NO_DATA.to_string());
        }

        let table = performance::render_table(&records, &self.window.label());
        info!("Performance table:\n{}", table);

        let prompt = prompts::market_analysis_prompt(&table, &self.window.label());
        match self.narrator.generate(&prompt).await {
            Ok(text) => {
                info!("Market analysis completed");
                StageResult::Success(text)
            }
            Err(e) => {
                warn!("Error in market analysis: {}", e);
                StageResult::Failure(StageFailure::from_narrative(Stage::Market, e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{MockPriceSource, PricePoint, PriceSeries};
    use crate::engine::FailureKind;
    use crate::error::ReportError;
    use crate::narrative::{MockNarrativeGenerator, NarrativeError};
    use chrono::{Duration, TimeZone, Utc};
    use std::collections::HashMap;

    fn series(symbol: &str, closes: &[f64]) -> (String, PriceSeries) {
        let start = Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap();
        let points = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PricePoint {
                date: start + Duration::days(i as i64),
                close,
            })
            .collect();
        (symbol.to_string(), PriceSeries::new(symbol, points))
    }

    fn prices_returning(map: HashMap<String, PriceSeries>) -> MockPriceSource {
        let mut prices = MockPriceSource::new();
        prices
            .expect_fetch_series()
            .returning(move |_, _| Ok(map.clone()));
        prices
    }

    #[tokio::test]
    async fn test_analyze_embeds_table_in_prompt() {
        let prices = prices_returning(
            [series("AAPL", &[100.0, 102.0, 104.0]), series("MSFT", &[50.0, 49.0])]
                .into_iter()
                .collect(),
        );

        let mut narrator = MockNarrativeGenerator::new();
        narrator
            .expect_generate()
            .withf(|prompt| {
                prompt.contains("6-Month % Change") && prompt.contains("AAPL") && prompt.contains("-2.00")
            })
            .times(1)
            .returning(|_| Ok("AAPL outperformed".to_string()));

        let summarizer =
            MarketSummarizer::new(Arc::new(prices), Arc::new(narrator), PriceWindow::six_months());
        let symbols = SymbolSet::parse(["AAPL", "MSFT"]).unwrap();

        assert_eq!(
            summarizer.analyze(&symbols).await,
            StageResult::Success("AAPL outperformed".to_string())
        );
    }

    #[tokio::test]
    async fn test_no_usable_data_is_not_a_failure() {
        let prices = prices_returning([series("ONE", &[10.0])].into_iter().collect());
        let mut narrator = MockNarrativeGenerator::new();
        narrator.expect_generate().never();

        let summarizer =
            MarketSummarizer::new(Arc::new(prices), Arc::new(narrator), PriceWindow::six_months());
        let symbols = SymbolSet::parse(["ONE"]).unwrap();

        assert_eq!(
            summarizer.analyze(&symbols).await,
            StageResult::Success(NO_DATA.to_string())
        );
    }

    #[tokio::test]
    async fn test_download_failure_yields_sentinel() {
        let mut prices = MockPriceSource::new();
        prices
            .expect_fetch_series()
            .returning(|_, _| Err(ReportError::PriceSource("offline".to_string())));
        let mut narrator = MockNarrativeGenerator::new();
        narrator.expect_generate().never();

        let summarizer =
            MarketSummarizer::new(Arc::new(prices), Arc::new(narrator), PriceWindow::six_months());
        let symbols = SymbolSet::parse(["AAPL"]).unwrap();

        assert!(summarizer.summarize_performance(&symbols).await.is_empty());
        assert_eq!(summarizer.analyze(&symbols).await.text(), NO_DATA);
    }

    #[tokio::test]
    async fn test_narrative_failure_becomes_data() {
        let prices = prices_returning([series("AAPL", &[1.0, 2.0])].into_iter().collect());
        let mut narrator = MockNarrativeGenerator::new();
        narrator
            .expect_generate()
            .returning(|_| Err(NarrativeError::RateLimited("quota".to_string())));

        let summarizer =
            MarketSummarizer::new(Arc::new(prices), Arc::new(narrator), PriceWindow::six_months());
        let result = summarizer
            .analyze(&SymbolSet::parse(["AAPL"]).unwrap())
            .await;

        let failure = result.failure().unwrap();
        assert_eq!(failure.stage, Stage::Market);
        assert_eq!(failure.kind, FailureKind::RateLimited);
    }
}
