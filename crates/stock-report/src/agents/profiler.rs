//! Per-symbol company analysis with bounded fan-out

use crate::api::{CompanyProfile, NOT_AVAILABLE, ProfileSource};
use crate::config::ReportConfig;
use crate::engine::{Stage, StageFailure, StageResult};
use crate::narrative::NarrativeGenerator;
use crate::prompts;
use crate::symbols::SymbolSet;
use report_utils::excerpt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

/// Limits the profiler works under
#[derive(Debug, Clone, Copy)]
struct ProfilerLimits {
    concurrency: usize,
    symbol_timeout: Duration,
    news_limit: usize,
    headline_limit: usize,
    summary_chars: usize,
}

/// Builds a profile per symbol and narrates it
///
/// Cheap to clone; each symbol runs on its own task.
#[derive(Clone)]
pub struct CompanyProfiler {
    profiles: Arc<dyn ProfileSource>,
    narrator: Arc<dyn NarrativeGenerator>,
    limits: ProfilerLimits,
}

impl CompanyProfiler {
    pub fn new(
        profiles: Arc<dyn ProfileSource>,
        narrator: Arc<dyn NarrativeGenerator>,
        config: &ReportConfig,
    ) -> Self {
        Self {
            profiles,
            narrator,
            limits: ProfilerLimits {
                concurrency: config.profile_concurrency,
                symbol_timeout: config.symbol_timeout,
                news_limit: config.news_limit,
                headline_limit: config.headline_limit,
                summary_chars: config.excerpts.summary,
            },
        }
    }

    /// Profile with headlines attached and the summary excerpted
    pub async fn profile(&self, symbol: &str) -> CompanyProfile {
        let mut profile = self.profiles.fetch_profile(symbol).await;
        if profile.summary != NOT_AVAILABLE {
            profile.summary = excerpt(&profile.summary, self.limits.summary_chars);
        }

        let news = self
            .profiles
            .fetch_news(symbol, self.limits.news_limit)
            .await;
        profile.with_headlines(news, self.limits.headline_limit)
    }

    /// Narrative analysis of one symbol
    pub async fn analyze_symbol(&self, symbol: &str) -> StageResult {
        let profile = self.profile(symbol).await;
        let prompt = prompts::company_analysis_prompt(&profile);

        match self.narrator.generate(&prompt).await {
            Ok(text) => {
                debug!("Company analysis completed for {}", symbol);
                StageResult::Success(text)
            }
            Err(e) => {
                warn!("Error in company analysis for {}: {}", symbol, e);
                StageResult::Failure(
                    StageFailure::from_narrative(Stage::Profiles, e).for_symbol(symbol),
                )
            }
        }
    }

    /// Analyze every distinct symbol, at most `min(n, concurrency)` at a time
    ///
    /// Completion order is arbitrary; the result follows symbol-set order and
    /// always has one entry per distinct symbol.
    #[instrument(skip(self, symbols), fields(symbols = %symbols))]
    pub async fn analyze(&self, symbols: &SymbolSet) -> CompanyAnalyses {
        let distinct = symbols.distinct();
        let width = distinct.len().min(self.limits.concurrency).max(1);
        let semaphore = Arc::new(Semaphore::new(width));
        let symbol_timeout = self.limits.symbol_timeout;

        let mut join_set = JoinSet::new();
        for (index, symbol) in distinct.iter().cloned().enumerate() {
            let sem = Arc::clone(&semaphore);
            let worker = self.clone();

            join_set.spawn(async move {
                let result = match sem.acquire_owned().await {
                    Ok(_permit) => {
                        match timeout(symbol_timeout, worker.analyze_symbol(&symbol)).await {
                            Ok(result) => result,
                            Err(_) => {
                                warn!("Company analysis for {} timed out", symbol);
                                StageResult::Failure(
                                    StageFailure::timeout(Stage::Profiles, symbol_timeout)
                                        .for_symbol(&symbol),
                                )
                            }
                        }
                    }
                    Err(e) => StageResult::Failure(
                        StageFailure::error(Stage::Profiles, e.to_string()).for_symbol(&symbol),
                    ),
                };
                (index, result)
            });
        }

        let mut slots: Vec<Option<StageResult>> = vec![None; distinct.len()];
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((index, result)) => slots[index] = Some(result),
                // The slot stays empty and is filled below
                Err(e) => warn!("Company analysis task failed: {}", e),
            }
        }

        let entries: Vec<_> = distinct
            .into_iter()
            .zip(slots)
            .map(|(symbol, slot)| {
                let result = slot.unwrap_or_else(|| {
                    StageResult::Failure(
                        StageFailure::error(Stage::Profiles, "analysis task aborted")
                            .for_symbol(&symbol),
                    )
                });
                (symbol, result)
            })
            .collect();

        let analyses = CompanyAnalyses { entries };
        info!(
            "Company analyses completed: {}/{} succeeded",
            analyses.success_count(),
            analyses.len()
        );
        analyses
    }
}

/// Company analysis per symbol, in symbol-set order
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompanyAnalyses {
    entries: Vec<(String, StageResult)>,
}

impl CompanyAnalyses {
    /// Every symbol carries the same branch-level failure
    pub fn degraded(symbols: &SymbolSet, failure: &StageFailure) -> Self {
        Self {
            entries: symbols
                .distinct()
                .into_iter()
                .map(|symbol| (symbol, StageResult::Failure(failure.clone())))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, symbol: &str) -> Option<&StageResult> {
        self.entries
            .iter()
            .find(|(s, _)| s == symbol)
            .map(|(_, result)| result)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &StageResult)> {
        self.entries.iter().map(|(s, r)| (s.as_str(), r))
    }

    pub fn success_count(&self) -> usize {
        self.entries.iter().filter(|(_, r)| r.is_success()).count()
    }

    /// Symbol-scoped failures, in symbol order
    pub fn failures(&self) -> Vec<StageFailure> {
        self.entries
            .iter()
            .filter_map(|(_, r)| r.failure().cloned())
            .collect()
    }

    /// `(symbol, excerpt)` pairs for a downstream prompt
    pub fn excerpts(&self, max_chars: usize) -> Vec<(String, String)> {
        self.entries
            .iter()
            .map(|(s, r)| (s.clone(), excerpt(&r.text(), max_chars)))
            .collect()
    }

    /// Section body: one `**SYMBOL**: analysis` entry per symbol
    pub fn render(&self) -> String {
        self.entries
            .iter()
            .map(|(s, r)| format!("**{s}**: {}", r.text()))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{Headline, MockProfileSource};
    use crate::engine::FailureKind;
    use crate::narrative::{MockNarrativeGenerator, NarrativeError};

    fn profiles() -> MockProfileSource {
        let mut profiles = MockProfileSource::new();
        profiles.expect_fetch_profile().returning(|symbol| {
            let mut profile = CompanyProfile::unavailable(symbol);
            profile.name = format!("{symbol} Corp");
            profile.summary = "x".repeat(800);
            profile
        });
        profiles.expect_fetch_news().returning(|symbol, limit| {
            (0..limit)
                .map(|i| Headline::new(format!("{symbol} headline {i}")))
                .collect()
        });
        profiles
    }

    #[tokio::test]
    async fn test_profile_applies_limits() {
        let profiler = CompanyProfiler::new(
            Arc::new(profiles()),
            Arc::new(MockNarrativeGenerator::new()),
            &ReportConfig::default(),
        );

        let profile = profiler.profile("AAPL").await;
        assert_eq!(profile.name, "AAPL Corp");
        assert_eq!(profile.summary.chars().count(), 503);
        assert_eq!(profile.headlines.len(), 2);
    }

    #[tokio::test]
    async fn test_one_failing_symbol_degrades_only_itself() {
        let mut narrator = MockNarrativeGenerator::new();
        narrator.expect_generate().returning(|prompt| {
            if prompt.contains("analysis for MSFT") {
                Err(NarrativeError::Failed("backend error".to_string()))
            } else {
                Ok("Solid business".to_string())
            }
        });

        let profiler =
            CompanyProfiler::new(Arc::new(profiles()), Arc::new(narrator), &ReportConfig::default());
        let symbols = SymbolSet::parse(["AAPL", "MSFT", "NVDA"]).unwrap();
        let analyses = profiler.analyze(&symbols).await;

        let order: Vec<_> = analyses.iter().map(|(s, _)| s).collect();
        assert_eq!(order, vec!["AAPL", "MSFT", "NVDA"]);
        assert_eq!(analyses.success_count(), 2);
        assert_eq!(
            analyses.get("MSFT").unwrap().text(),
            "Error analyzing MSFT: backend error"
        );
        assert_eq!(analyses.failures().len(), 1);
    }

    /// Panics for one symbol, succeeds for the rest
    struct ExplodingProfiles {
        bad: &'static str,
    }

    #[async_trait::async_trait]
    impl ProfileSource for ExplodingProfiles {
        async fn fetch_profile(&self, symbol: &str) -> CompanyProfile {
            assert_ne!(symbol, self.bad, "profile lookup exploded");
            CompanyProfile::unavailable(symbol)
        }

        async fn fetch_news(&self, _symbol: &str, _limit: usize) -> Vec<Headline> {
            Vec::new()
        }
    }

    #[tokio::test]
    async fn test_panicking_source_is_contained() {
        let mut narrator = MockNarrativeGenerator::new();
        narrator
            .expect_generate()
            .returning(|_| Ok("fine".to_string()));

        let profiler = CompanyProfiler::new(
            Arc::new(ExplodingProfiles { bad: "BAD" }),
            Arc::new(narrator),
            &ReportConfig::default(),
        );
        let analyses = profiler
            .analyze(&SymbolSet::parse(["GOOD", "BAD"]).unwrap())
            .await;

        assert_eq!(analyses.len(), 2);
        assert!(analyses.get("GOOD").unwrap().is_success());
        let failure = analyses.get("BAD").unwrap().failure().unwrap();
        assert_eq!(failure.kind, FailureKind::Error);
        assert_eq!(failure.symbol.as_deref(), Some("BAD"));
    }

    #[test]
    fn test_render_and_excerpts() {
        let analyses = CompanyAnalyses {
            entries: vec![
                ("AAPL".to_string(), StageResult::Success("a".repeat(400))),
                (
                    "MSFT".to_string(),
                    StageResult::Failure(
                        StageFailure::timeout(Stage::Profiles, Duration::from_secs(60))
                            .for_symbol("MSFT"),
                    ),
                ),
            ],
        };

        let rendered = analyses.render();
        assert!(rendered.starts_with("**AAPL**: aaa"));
        assert!(rendered.ends_with("**MSFT**: Analysis of MSFT timed out after 60s."));

        let excerpts = analyses.excerpts(300);
        assert_eq!(excerpts[0].1.chars().count(), 303);
        assert_eq!(excerpts[1].1, "Analysis of MSFT timed out after 60s.");
    }

    #[test]
    fn test_degraded_covers_every_symbol() {
        let failure = StageFailure::timeout(Stage::Profiles, Duration::from_secs(180));
        let analyses =
            CompanyAnalyses::degraded(&SymbolSet::parse(["A", "B"]).unwrap(), &failure);
        assert_eq!(analyses.len(), 2);
        assert_eq!(analyses.success_count(), 0);
        assert!(analyses.render().contains("**B**: Company analysis timed out after 180s."));
    }
}
