//! Investment recommendations over the market and company sections

use crate::agents::CompanyAnalyses;
use crate::config::ExcerptLimits;
use crate::engine::{Stage, StageFailure, StageResult};
use crate::narrative::NarrativeGenerator;
use crate::prompts;
use crate::symbols::SymbolSet;
use report_utils::excerpt;
use std::sync::Arc;
use tracing::{info, instrument, warn};

/// Combines upstream sections into per-symbol recommendations
pub struct RecommendationSynthesizer {
    narrator: Arc<dyn NarrativeGenerator>,
    market_chars: usize,
    profile_chars: usize,
}

impl RecommendationSynthesizer {
    pub fn new(narrator: Arc<dyn NarrativeGenerator>, limits: &ExcerptLimits) -> Self {
        Self {
            narrator,
            market_chars: limits.market_for_synthesis,
            profile_chars: limits.profile_for_synthesis,
        }
    }

    /// Prompt over excerpts of both upstream results, degraded or not
    pub fn build_prompt(
        &self,
        symbols: &SymbolSet,
        market: &StageResult,
        companies: &CompanyAnalyses,
    ) -> String {
        prompts::recommendation_prompt(
            symbols,
            &excerpt(&market.text(), self.market_chars),
            &companies.excerpts(self.profile_chars),
        )
    }

    #[instrument(skip_all, fields(symbols = %symbols))]
    pub async fn synthesize(
        &self,
        symbols: &SymbolSet,
        market: &StageResult,
        companies: &CompanyAnalyses,
    ) -> StageResult {
        let prompt = self.build_prompt(symbols, market, companies);

        match self.narrator.generate(&prompt).await {
            Ok(text) => {
                info!("Stock recommendations completed");
                StageResult::Success(text)
            }
            Err(e) => {
                warn!("Error in stock recommendations: {}", e);
                StageResult::Failure(StageFailure::from_narrative(Stage::Synthesis, e))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::narrative::MockNarrativeGenerator;
    use std::time::Duration;

    fn companies(symbols: &SymbolSet) -> CompanyAnalyses {
        let failure = StageFailure::timeout(Stage::Profiles, Duration::from_secs(180));
        CompanyAnalyses::degraded(symbols, &failure)
    }

    #[test]
    fn test_prompt_is_bounded() {
        let synthesizer = RecommendationSynthesizer::new(
            Arc::new(MockNarrativeGenerator::new()),
            &ExcerptLimits::default(),
        );
        let symbols = SymbolSet::parse(["AAPL", "MSFT"]).unwrap();
        let market = StageResult::Success("m".repeat(5000));

        let prompt = synthesizer.build_prompt(&symbols, &market, &companies(&symbols));
        assert!(prompt.contains(&format!("{}...", "m".repeat(1000))));
        assert!(!prompt.contains(&"m".repeat(1001)));
        assert!(prompt.contains("AAPL: Company analysis timed out after 180s."));
    }

    #[tokio::test]
    async fn test_synthesize_uses_degraded_inputs() {
        let mut narrator = MockNarrativeGenerator::new();
        narrator
            .expect_generate()
            .withf(|prompt| prompt.contains("Market analysis timed out after 120s."))
            .times(1)
            .returning(|_| Ok("Hold everything".to_string()));

        let synthesizer =
            RecommendationSynthesizer::new(Arc::new(narrator), &ExcerptLimits::default());
        let symbols = SymbolSet::parse(["AAPL"]).unwrap();
        let market =
            StageResult::Failure(StageFailure::timeout(Stage::Market, Duration::from_secs(120)));

        let result = synthesizer
            .synthesize(&symbols, &market, &companies(&symbols))
            .await;
        assert_eq!(result, StageResult::Success("Hold everything".to_string()));
    }
}
