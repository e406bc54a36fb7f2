//! Configuration for report generation

use crate::api::PriceWindow;
use crate::error::{ReportError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;

/// Text-generation backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// Google Gemini (default, what the service was built against)
    #[default]
    Gemini,
    /// OpenAI or any OpenAI-compatible server
    OpenAI,
}

impl FromStr for ProviderKind {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" | "google" => Ok(Self::Gemini),
            "openai" => Ok(Self::OpenAI),
            other => Err(ReportError::ConfigError(format!(
                "unknown provider '{other}', expected 'gemini' or 'openai'"
            ))),
        }
    }
}

/// Settings shared by every narrator role
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NarratorConfig {
    pub provider: ProviderKind,
    pub model: String,
    pub max_tokens: usize,
    pub temperature: f32,
    /// Upper bound on narrative calls in flight across all roles
    pub max_in_flight: usize,
}

impl Default for NarratorConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::Gemini,
            model: "gemini-2.0-flash-001".to_string(),
            max_tokens: 2048,
            temperature: 0.4,
            max_in_flight: 5,
        }
    }
}

/// Character budgets applied when one stage's output feeds another's prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExcerptLimits {
    /// Company business summary inside a profile
    pub summary: usize,
    /// Market analysis handed to the recommendation prompt
    pub market_for_synthesis: usize,
    /// Each company analysis handed to the recommendation prompt
    pub profile_for_synthesis: usize,
    /// Each prior section handed to the ranking-table prompt
    pub scoring: usize,
}

impl Default for ExcerptLimits {
    fn default() -> Self {
        Self {
            summary: 500,
            market_for_synthesis: 1000,
            profile_for_synthesis: 300,
            scoring: 500,
        }
    }
}

/// Configuration for the report pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// Deadline for the market branch
    pub market_timeout: Duration,

    /// Deadline for the whole company-profile branch
    pub profile_timeout: Duration,

    /// Deadline for a single symbol inside the profile branch
    pub symbol_timeout: Duration,

    /// Deadline for the recommendation stage
    pub synthesis_timeout: Duration,

    /// Deadline for the ranking-table call
    pub scoring_timeout: Duration,

    /// Concurrent symbols in the profile fan-out
    pub profile_concurrency: usize,

    /// Concurrent top-level branches
    pub branch_concurrency: usize,

    /// News items fetched per symbol
    pub news_limit: usize,

    /// Headlines quoted in a company prompt
    pub headline_limit: usize,

    /// Prompt excerpt budgets
    pub excerpts: ExcerptLimits,

    /// Length of the price history window in days
    pub price_window_days: u32,

    /// Minimum spacing between profile/news fetches
    pub fetch_interval: Duration,

    /// Narrative service settings
    pub narrator: NarratorConfig,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            market_timeout: Duration::from_secs(120),
            profile_timeout: Duration::from_secs(180),
            symbol_timeout: Duration::from_secs(60),
            synthesis_timeout: Duration::from_secs(120),
            scoring_timeout: Duration::from_secs(120),
            profile_concurrency: 5,
            branch_concurrency: 3,
            news_limit: 3,
            headline_limit: 2,
            excerpts: ExcerptLimits::default(),
            price_window_days: 180,
            fetch_interval: Duration::from_millis(500),
            narrator: NarratorConfig::default(),
        }
    }
}

impl ReportConfig {
    /// Create a new configuration builder
    pub fn builder() -> ReportConfigBuilder {
        ReportConfigBuilder::default()
    }

    /// Defaults overridden by `REPORT_*` environment variables
    ///
    /// Durations are whole seconds except `REPORT_FETCH_INTERVAL_MS`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`ReportConfig::from_env`] with variables read from `lookup`
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = parse_var::<u64>(&lookup, "REPORT_MARKET_TIMEOUT_SECS")? {
            config.market_timeout = Duration::from_secs(v);
        }
        if let Some(v) = parse_var::<u64>(&lookup, "REPORT_PROFILE_TIMEOUT_SECS")? {
            config.profile_timeout = Duration::from_secs(v);
        }
        if let Some(v) = parse_var::<u64>(&lookup, "REPORT_SYMBOL_TIMEOUT_SECS")? {
            config.symbol_timeout = Duration::from_secs(v);
        }
        if let Some(v) = parse_var::<u64>(&lookup, "REPORT_SYNTHESIS_TIMEOUT_SECS")? {
            config.synthesis_timeout = Duration::from_secs(v);
        }
        if let Some(v) = parse_var::<u64>(&lookup, "REPORT_SCORING_TIMEOUT_SECS")? {
            config.scoring_timeout = Duration::from_secs(v);
        }
        if let Some(v) = parse_var(&lookup, "REPORT_PROFILE_CONCURRENCY")? {
            config.profile_concurrency = v;
        }
        if let Some(v) = parse_var(&lookup, "REPORT_BRANCH_CONCURRENCY")? {
            config.branch_concurrency = v;
        }
        if let Some(v) = parse_var(&lookup, "REPORT_NEWS_LIMIT")? {
            config.news_limit = v;
        }
        if let Some(v) = parse_var(&lookup, "REPORT_HEADLINE_LIMIT")? {
            config.headline_limit = v;
        }
        if let Some(v) = parse_var(&lookup, "REPORT_SUMMARY_CHARS")? {
            config.excerpts.summary = v;
        }
        if let Some(v) = parse_var(&lookup, "REPORT_MARKET_EXCERPT_CHARS")? {
            config.excerpts.market_for_synthesis = v;
        }
        if let Some(v) = parse_var(&lookup, "REPORT_PROFILE_EXCERPT_CHARS")? {
            config.excerpts.profile_for_synthesis = v;
        }
        if let Some(v) = parse_var(&lookup, "REPORT_SCORING_EXCERPT_CHARS")? {
            config.excerpts.scoring = v;
        }
        if let Some(v) = parse_var(&lookup, "REPORT_PRICE_WINDOW_DAYS")? {
            config.price_window_days = v;
        }
        if let Some(v) = parse_var::<u64>(&lookup, "REPORT_FETCH_INTERVAL_MS")? {
            config.fetch_interval = Duration::from_millis(v);
        }
        if let Some(v) = parse_var(&lookup, "REPORT_LLM_PROVIDER")? {
            config.narrator.provider = v;
        }
        if let Some(model) = lookup("REPORT_LLM_MODEL") {
            config.narrator.model = model;
        }
        if let Some(v) = parse_var(&lookup, "REPORT_LLM_MAX_TOKENS")? {
            config.narrator.max_tokens = v;
        }
        if let Some(v) = parse_var(&lookup, "REPORT_LLM_TEMPERATURE")? {
            config.narrator.temperature = v;
        }
        if let Some(v) = parse_var(&lookup, "REPORT_LLM_MAX_IN_FLIGHT")? {
            config.narrator.max_in_flight = v;
        }

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let timeouts = [
            ("market_timeout", self.market_timeout),
            ("profile_timeout", self.profile_timeout),
            ("symbol_timeout", self.symbol_timeout),
            ("synthesis_timeout", self.synthesis_timeout),
            ("scoring_timeout", self.scoring_timeout),
        ];
        if let Some((name, _)) = timeouts.iter().find(|(_, d)| d.is_zero()) {
            return Err(ReportError::ConfigError(format!(
                "{name} must be greater than 0"
            )));
        }

        if self.profile_concurrency == 0 || self.branch_concurrency == 0 {
            return Err(ReportError::ConfigError(
                "profile_concurrency and branch_concurrency must be greater than 0".to_string(),
            ));
        }

        if self.narrator.max_in_flight == 0 {
            return Err(ReportError::ConfigError(
                "narrator.max_in_flight must be greater than 0".to_string(),
            ));
        }

        if self.price_window_days < 2 {
            return Err(ReportError::ConfigError(
                "price_window_days must cover at least two trading days".to_string(),
            ));
        }

        if self.narrator.model.trim().is_empty() {
            return Err(ReportError::ConfigError("narrator.model is empty".to_string()));
        }

        Ok(())
    }

    /// Price history window derived from `price_window_days`
    pub fn price_window(&self) -> PriceWindow {
        PriceWindow::days(self.price_window_days)
    }

    /// Worst-case wall time of one report: the slower of the two parallel
    /// branches plus the two sequential stages
    pub fn worst_case_duration(&self) -> Duration {
        self.market_timeout.max(self.profile_timeout) + self.synthesis_timeout + self.scoring_timeout
    }
}

fn parse_var<T>(var: &impl Fn(&str) -> Option<String>, name: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    var(name)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| ReportError::ConfigError(format!("{name}={raw:?}: {e}")))
        })
        .transpose()
}

/// Builder for ReportConfig
#[derive(Debug, Default)]
pub struct ReportConfigBuilder {
    market_timeout: Option<Duration>,
    profile_timeout: Option<Duration>,
    symbol_timeout: Option<Duration>,
    synthesis_timeout: Option<Duration>,
    scoring_timeout: Option<Duration>,
    profile_concurrency: Option<usize>,
    branch_concurrency: Option<usize>,
    news_limit: Option<usize>,
    headline_limit: Option<usize>,
    excerpts: Option<ExcerptLimits>,
    price_window_days: Option<u32>,
    fetch_interval: Option<Duration>,
    narrator: Option<NarratorConfig>,
}

impl ReportConfigBuilder {
    pub fn market_timeout(mut self, duration: Duration) -> Self {
        self.market_timeout = Some(duration);
        self
    }

    pub fn profile_timeout(mut self, duration: Duration) -> Self {
        self.profile_timeout = Some(duration);
        self
    }

    pub fn symbol_timeout(mut self, duration: Duration) -> Self {
        self.symbol_timeout = Some(duration);
        self
    }

    pub fn synthesis_timeout(mut self, duration: Duration) -> Self {
        self.synthesis_timeout = Some(duration);
        self
    }

    pub fn scoring_timeout(mut self, duration: Duration) -> Self {
        self.scoring_timeout = Some(duration);
        self
    }

    pub fn profile_concurrency(mut self, limit: usize) -> Self {
        self.profile_concurrency = Some(limit);
        self
    }

    pub fn branch_concurrency(mut self, limit: usize) -> Self {
        self.branch_concurrency = Some(limit);
        self
    }

    pub fn news_limit(mut self, limit: usize) -> Self {
        self.news_limit = Some(limit);
        self
    }

    pub fn headline_limit(mut self, limit: usize) -> Self {
        self.headline_limit = Some(limit);
        self
    }

    pub fn excerpts(mut self, limits: ExcerptLimits) -> Self {
        self.excerpts = Some(limits);
        self
    }

    pub fn price_window_days(mut self, days: u32) -> Self {
        self.price_window_days = Some(days);
        self
    }

    pub fn fetch_interval(mut self, interval: Duration) -> Self {
        self.fetch_interval = Some(interval);
        self
    }

    pub fn narrator(mut self, narrator: NarratorConfig) -> Self {
        self.narrator = Some(narrator);
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<ReportConfig> {
        let defaults = ReportConfig::default();

        let config = ReportConfig {
            market_timeout: self.market_timeout.unwrap_or(defaults.market_timeout),
            profile_timeout: self.profile_timeout.unwrap_or(defaults.profile_timeout),
            symbol_timeout: self.symbol_timeout.unwrap_or(defaults.symbol_timeout),
            synthesis_timeout: self.synthesis_timeout.unwrap_or(defaults.synthesis_timeout),
            scoring_timeout: self.scoring_timeout.unwrap_or(defaults.scoring_timeout),
            profile_concurrency: self
                .profile_concurrency
                .unwrap_or(defaults.profile_concurrency),
            branch_concurrency: self
                .branch_concurrency
                .unwrap_or(defaults.branch_concurrency),
            news_limit: self.news_limit.unwrap_or(defaults.news_limit),
            headline_limit: self.headline_limit.unwrap_or(defaults.headline_limit),
            excerpts: self.excerpts.unwrap_or(defaults.excerpts),
            price_window_days: self.price_window_days.unwrap_or(defaults.price_window_days),
            fetch_interval: self.fetch_interval.unwrap_or(defaults.fetch_interval),
            narrator: self.narrator.unwrap_or(defaults.narrator),
        };

        config.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = ReportConfig::default();
        assert_eq!(config.market_timeout, Duration::from_secs(120));
        assert_eq!(config.profile_timeout, Duration::from_secs(180));
        assert_eq!(config.symbol_timeout, Duration::from_secs(60));
        assert_eq!(config.profile_concurrency, 5);
        assert_eq!(config.excerpts.market_for_synthesis, 1000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_builder() {
        let config = ReportConfig::builder()
            .market_timeout(Duration::from_secs(5))
            .profile_concurrency(2)
            .build()
            .unwrap();

        assert_eq!(config.market_timeout, Duration::from_secs(5));
        assert_eq!(config.profile_concurrency, 2);
        assert_eq!(config.profile_timeout, Duration::from_secs(180));
    }

    #[test]
    fn test_validation_rejects_zero_values() {
        assert!(ReportConfig::builder().profile_concurrency(0).build().is_err());
        assert!(
            ReportConfig::builder()
                .scoring_timeout(Duration::ZERO)
                .build()
                .is_err()
        );

        let config = ReportConfig {
            narrator: NarratorConfig {
                max_in_flight: 0,
                ..NarratorConfig::default()
            },
            ..ReportConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_provider_kind_parsing() {
        assert_eq!("OpenAI".parse::<ProviderKind>().unwrap(), ProviderKind::OpenAI);
        assert_eq!(" gemini ".parse::<ProviderKind>().unwrap(), ProviderKind::Gemini);
        assert!("ollama".parse::<ProviderKind>().is_err());
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name: &str| vars.get(name).cloned()
    }

    #[test]
    fn test_lookup_overrides() {
        let config = ReportConfig::from_lookup(lookup(&[
            ("REPORT_SYMBOL_TIMEOUT_SECS", "30"),
            ("REPORT_BRANCH_CONCURRENCY", "2"),
            ("REPORT_NEWS_LIMIT", "5"),
            ("REPORT_HEADLINE_LIMIT", " 4 "),
            ("REPORT_SUMMARY_CHARS", "250"),
            ("REPORT_MARKET_EXCERPT_CHARS", "800"),
            ("REPORT_PROFILE_EXCERPT_CHARS", "200"),
            ("REPORT_SCORING_EXCERPT_CHARS", "400"),
            ("REPORT_LLM_PROVIDER", "openai"),
            ("REPORT_LLM_TEMPERATURE", "0.1"),
        ]))
        .unwrap();

        assert_eq!(config.symbol_timeout, Duration::from_secs(30));
        assert_eq!(config.branch_concurrency, 2);
        assert_eq!(config.news_limit, 5);
        assert_eq!(config.headline_limit, 4);
        assert_eq!(
            config.excerpts,
            ExcerptLimits {
                summary: 250,
                market_for_synthesis: 800,
                profile_for_synthesis: 200,
                scoring: 400,
            }
        );
        assert_eq!(config.narrator.provider, ProviderKind::OpenAI);
        assert!((config.narrator.temperature - 0.1).abs() < f32::EPSILON);
        // Untouched values keep their defaults
        assert_eq!(config.profile_concurrency, 5);
    }

    #[test]
    fn test_lookup_rejects_bad_values() {
        let err = ReportConfig::from_lookup(lookup(&[("REPORT_NEWS_LIMIT", "three")])).unwrap_err();
        assert!(err.to_string().contains("REPORT_NEWS_LIMIT"));

        // Parses, then fails validation
        assert!(ReportConfig::from_lookup(lookup(&[("REPORT_BRANCH_CONCURRENCY", "0")])).is_err());
        assert!(ReportConfig::from_lookup(lookup(&[])).is_ok());
    }

    #[test]
    fn test_worst_case_duration() {
        let config = ReportConfig::default();
        // max(120, 180) + 120 + 120
        assert_eq!(config.worst_case_duration(), Duration::from_secs(420));
    }
}
