//! Report pipeline coordinator
//!
//! Runs the four stages for one request:
//!
//! ```text
//! PENDING -> MARKET_AND_PROFILE_RUNNING -> SYNTHESIZING -> SCORING -> DONE
//! ```
//!
//! The market and profile branches run concurrently, each under its own
//! deadline. Synthesis starts only after both have resolved. Every stage
//! runs on its own task so a timeout can abort it and a panic stays inside
//! it. Failures become placeholder text in the report; the only error that
//! reaches the caller is a rate limit on the final ranking call.

use crate::agents::{CompanyAnalyses, CompanyProfiler, MarketSummarizer, RecommendationSynthesizer};
use crate::api::{PriceSource, ProfileSource, YahooFinanceClient};
use crate::config::ReportConfig;
use crate::engine::result::{PipelineState, Report, Stage, StageFailure, StageResult};
use crate::error::{ReportError, Result};
use crate::narrative::{NarrativeError, NarrativeGenerator, Narrators};
use crate::prompts;
use crate::symbols::SymbolSet;
use report_utils::excerpt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Coordinates the stages of a report
///
/// Holds no per-request state; one instance can serve many requests.
pub struct ReportAggregator {
    market: Arc<MarketSummarizer>,
    profiler: CompanyProfiler,
    synthesizer: Arc<RecommendationSynthesizer>,
    lead: Arc<dyn NarrativeGenerator>,
    config: ReportConfig,
}

impl ReportAggregator {
    pub fn new(
        prices: Arc<dyn PriceSource>,
        profiles: Arc<dyn ProfileSource>,
        narrators: Narrators,
        config: ReportConfig,
    ) -> Self {
        Self {
            market: Arc::new(MarketSummarizer::new(
                prices,
                narrators.market,
                config.price_window(),
            )),
            profiler: CompanyProfiler::new(profiles, narrators.company, &config),
            synthesizer: Arc::new(RecommendationSynthesizer::new(
                narrators.strategist,
                &config.excerpts,
            )),
            lead: narrators.lead,
            config,
        }
    }

    /// Aggregator over Yahoo Finance for both prices and profiles
    pub fn with_yahoo(narrators: Narrators, config: ReportConfig) -> Self {
        let yahoo = Arc::new(YahooFinanceClient::with_interval(config.fetch_interval));
        Self::new(yahoo.clone(), yahoo, narrators, config)
    }

    pub fn config(&self) -> &ReportConfig {
        &self.config
    }

    /// Produce the report for `symbols`
    ///
    /// Returns `Err` only when the ranking call is rate limited.
    #[instrument(skip(self, symbols), fields(request_id = %Uuid::new_v4(), symbols = %symbols))]
    pub async fn generate(&self, symbols: &SymbolSet) -> Result<Report> {
        let started = Instant::now();
        let mut run = PipelineRun::new();

        // Both branches
        run.advance(PipelineState::MarketAndProfileRunning);
        let branch_permits = Arc::new(Semaphore::new(self.config.branch_concurrency));

        let market_task = {
            let market = Arc::clone(&self.market);
            let permits = Arc::clone(&branch_permits);
            let symbols = symbols.clone();
            tokio::spawn(async move {
                let _permit = permits.acquire_owned().await;
                market.analyze(&symbols).await
            })
        };

        let profile_task = {
            let profiler = self.profiler.clone();
            let permits = Arc::clone(&branch_permits);
            let symbols = symbols.clone();
            tokio::spawn(async move {
                let _permit = permits.acquire_owned().await;
                profiler.analyze(&symbols).await
            })
        };

        let (market, profiles) = tokio::join!(
            join_stage(market_task, self.config.market_timeout, Stage::Market),
            join_stage(profile_task, self.config.profile_timeout, Stage::Profiles),
        );

        let market = market.unwrap_or_else(StageResult::Failure);
        run.record(&market);

        let companies = match profiles {
            Ok(analyses) => {
                for failure in analyses.failures() {
                    run.record_failure(failure);
                }
                analyses
            }
            Err(failure) => {
                let analyses = CompanyAnalyses::degraded(symbols, &failure);
                run.record_failure(failure);
                analyses
            }
        };

        // Synthesis
        run.advance(PipelineState::Synthesizing);
        let synthesis_task = {
            let synthesizer = Arc::clone(&self.synthesizer);
            let symbols = symbols.clone();
            let market = market.clone();
            let companies = companies.clone();
            tokio::spawn(async move { synthesizer.synthesize(&symbols, &market, &companies).await })
        };
        let recommendations = join_stage(
            synthesis_task,
            self.config.synthesis_timeout,
            Stage::Synthesis,
        )
        .await
        .unwrap_or_else(StageResult::Failure);
        run.record(&recommendations);

        // Ranking table
        run.advance(PipelineState::Scoring);
        let market_text = market.text();
        let company_text = companies.render();
        let recommendations_text = recommendations.text();

        let limit = self.config.excerpts.scoring;
        let prompt = prompts::ranking_rows_prompt(
            symbols,
            &excerpt(&market_text, limit),
            &excerpt(&company_text, limit),
            &excerpt(&recommendations_text, limit),
        );
        let scoring_task = {
            let lead = Arc::clone(&self.lead);
            tokio::spawn(async move { lead.generate(&prompt).await })
        };
        let rows = match join_stage(scoring_task, self.config.scoring_timeout, Stage::Scoring).await
        {
            Ok(Ok(rows)) => StageResult::Success(rows),
            Ok(Err(NarrativeError::RateLimited(reason))) => {
                warn!("Ranking call rate limited: {}", reason);
                return Err(ReportError::RateLimited(reason));
            }
            Ok(Err(e)) => StageResult::Failure(StageFailure::from_narrative(Stage::Scoring, e)),
            Err(failure) => StageResult::Failure(failure),
        };
        run.record(&rows);

        run.advance(PipelineState::Done);
        let elapsed = started.elapsed();
        let PipelineRun {
            trace, failures, ..
        } = run;

        if failures.is_empty() {
            info!("Report completed in {:.2?}", elapsed);
        } else {
            warn!(
                "Report completed in {:.2?} with {} degraded part(s)",
                elapsed,
                failures.len()
            );
        }

        Ok(Report::new(
            symbols.clone(),
            [market_text, company_text, recommendations_text, rows.text()],
            failures,
            trace,
            elapsed,
        ))
    }
}

/// Wait for a stage task under `limit`
///
/// On expiry the task is aborted. A panic inside the task comes back as an
/// error naming the stage.
async fn join_stage<T>(
    mut handle: JoinHandle<T>,
    limit: Duration,
    stage: Stage,
) -> std::result::Result<T, StageFailure> {
    match timeout(limit, &mut handle).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => {
            warn!("{} stage task failed: {}", stage, e);
            Err(StageFailure::error(stage, format!("stage task failed: {e}")))
        }
        Err(_) => {
            handle.abort();
            warn!("{} stage timed out after {:?}", stage, limit);
            Err(StageFailure::timeout(stage, limit))
        }
    }
}

/// Per-request progress; only the coordinator task touches it
struct PipelineRun {
    state: PipelineState,
    trace: Vec<PipelineState>,
    failures: Vec<StageFailure>,
}

impl PipelineRun {
    fn new() -> Self {
        Self {
            state: PipelineState::Pending,
            trace: vec![PipelineState::Pending],
            failures: Vec::new(),
        }
    }

    fn advance(&mut self, next: PipelineState) {
        info!("{} -> {}", self.state, next);
        self.state = next;
        self.trace.push(next);
    }

    fn record(&mut self, result: &StageResult) {
        if let Some(failure) = result.failure() {
            self.record_failure(failure.clone());
        }
    }

    fn record_failure(&mut self, failure: StageFailure) {
        warn!(stage = %failure.stage, "Degraded: {}", failure);
        self.failures.push(failure);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{CompanyProfile, MockPriceSource, MockProfileSource, PricePoint, PriceSeries};
    use crate::engine::result::{FailureKind, SectionKind};
    use crate::narrative::MockNarrativeGenerator;
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    fn prices() -> MockPriceSource {
        let mut prices = MockPriceSource::new();
        prices.expect_fetch_series().returning(|symbols, _| {
            let start = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();
            Ok(symbols
                .iter()
                .map(|s| {
                    let points = vec![
                        PricePoint { date: start, close: 10.0 },
                        PricePoint { date: start + chrono::Duration::days(1), close: 11.0 },
                    ];
                    (s.to_string(), PriceSeries::new(s, points))
                })
                .collect::<HashMap<_, _>>())
        });
        prices
    }

    fn profiles() -> MockProfileSource {
        let mut profiles = MockProfileSource::new();
        profiles
            .expect_fetch_profile()
            .returning(|symbol| CompanyProfile::unavailable(symbol));
        profiles.expect_fetch_news().returning(|_, _| Vec::new());
        profiles
    }

    fn replying(text: &'static str) -> Arc<dyn NarrativeGenerator> {
        let mut narrator = MockNarrativeGenerator::new();
        narrator
            .expect_generate()
            .returning(move |_| Ok(text.to_string()));
        Arc::new(narrator)
    }

    fn failing(err: NarrativeError) -> Arc<dyn NarrativeGenerator> {
        let mut narrator = MockNarrativeGenerator::new();
        narrator
            .expect_generate()
            .returning(move |_| Err(err.clone()));
        Arc::new(narrator)
    }

    fn aggregator(narrators: Narrators) -> ReportAggregator {
        ReportAggregator::new(
            Arc::new(prices()),
            Arc::new(profiles()),
            narrators,
            ReportConfig::default(),
        )
    }

    fn narrators() -> Narrators {
        Narrators {
            market: replying("market view"),
            company: replying("company view"),
            strategist: replying("buy"),
            lead: replying("| AAPL | 2 | Good |"),
        }
    }

    #[tokio::test]
    async fn test_clean_run_visits_every_state() {
        let symbols = SymbolSet::parse(["AAPL"]).unwrap();
        let report = aggregator(narrators()).generate(&symbols).await.unwrap();

        assert_eq!(
            report.trace(),
            &[
                PipelineState::Pending,
                PipelineState::MarketAndProfileRunning,
                PipelineState::Synthesizing,
                PipelineState::Scoring,
                PipelineState::Done,
            ]
        );
        assert!(!report.is_degraded());
        assert_eq!(report.section(SectionKind::MarketOverview).body, "market view");
        assert_eq!(
            report.section(SectionKind::CompanyFundamentals).body,
            "**AAPL**: company view"
        );
        assert_eq!(report.section(SectionKind::RankingTable).body, "| AAPL | 2 | Good |");
    }

    #[tokio::test]
    async fn test_scoring_rate_limit_propagates() {
        let narrators = Narrators {
            lead: failing(NarrativeError::RateLimited("quota exhausted".into())),
            ..narrators()
        };
        let symbols = SymbolSet::parse(["AAPL"]).unwrap();
        let err = aggregator(narrators).generate(&symbols).await.unwrap_err();

        assert!(matches!(err, ReportError::RateLimited(_)));
        assert_eq!(err.status_code(), 429);
    }

    #[tokio::test]
    async fn test_stage_rate_limit_degrades_section() {
        let narrators = Narrators {
            strategist: failing(NarrativeError::RateLimited("quota".into())),
            ..narrators()
        };
        let symbols = SymbolSet::parse(["AAPL"]).unwrap();
        let report = aggregator(narrators).generate(&symbols).await.unwrap();

        assert!(report.is_degraded());
        assert_eq!(report.failures()[0].stage, Stage::Synthesis);
        assert_eq!(report.failures()[0].kind, FailureKind::RateLimited);
        assert!(
            report
                .section(SectionKind::Recommendations)
                .body
                .starts_with("Error generating recommendations")
        );
    }

    #[tokio::test]
    async fn test_scoring_failure_degrades_table() {
        let narrators = Narrators {
            lead: failing(NarrativeError::Failed("HTTP 500".into())),
            ..narrators()
        };
        let symbols = SymbolSet::parse(["AAPL"]).unwrap();
        let report = aggregator(narrators).generate(&symbols).await.unwrap();

        assert_eq!(
            report.section(SectionKind::RankingTable).body,
            "Error generating ranking table: HTTP 500"
        );
    }

    #[tokio::test]
    async fn test_join_stage_reports_panics() {
        let handle = tokio::spawn(async {
            panic!("synthesizer exploded");
        });
        let failure = join_stage::<()>(handle, Duration::from_secs(1), Stage::Synthesis)
            .await
            .unwrap_err();

        assert_eq!(failure.kind, FailureKind::Error);
        assert!(failure.placeholder().starts_with("Error generating recommendations"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_join_stage_times_out() {
        let handle = tokio::spawn(async {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        });
        let failure = join_stage(handle, Duration::from_secs(120), Stage::Market)
            .await
            .unwrap_err();

        assert_eq!(failure.placeholder(), "Market analysis timed out after 120s.");
    }
}
