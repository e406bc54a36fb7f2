//! Stage results and the assembled report

use crate::narrative::NarrativeError;
use crate::symbols::SymbolSet;
use serde::Serialize;
use std::fmt;
use std::time::Duration;

/// Appended to every report
pub const DISCLAIMER: &str = "**Disclaimer:** This analysis is for informational purposes only and should not be considered as financial advice. Please consult with a qualified financial advisor before making investment decisions.";

/// Named step of the pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Market,
    Profiles,
    Synthesis,
    Scoring,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Market => "market",
            Self::Profiles => "profiles",
            Self::Synthesis => "synthesis",
            Self::Scoring => "scoring",
        }
    }

    fn title(self) -> &'static str {
        match self {
            Self::Market => "Market analysis",
            Self::Profiles => "Company analysis",
            Self::Synthesis => "Recommendation synthesis",
            Self::Scoring => "Ranking table",
        }
    }

    fn error_prefix(self) -> &'static str {
        match self {
            Self::Market => "Error in market analysis",
            Self::Profiles => "Error in company analysis",
            Self::Synthesis => "Error generating recommendations",
            Self::Scoring => "Error generating ranking table",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    RateLimited,
    Error,
}

/// Why a stage, or one symbol inside it, produced no narrative
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageFailure {
    pub stage: Stage,
    pub kind: FailureKind,
    /// Symbol the failure is scoped to, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub symbol: Option<String>,
    pub reason: String,
}

impl StageFailure {
    pub fn timeout(stage: Stage, after: Duration) -> Self {
        Self {
            stage,
            kind: FailureKind::Timeout,
            symbol: None,
            reason: format!("timed out after {}s", after.as_secs()),
        }
    }

    pub fn error(stage: Stage, reason: impl Into<String>) -> Self {
        Self {
            stage,
            kind: FailureKind::Error,
            symbol: None,
            reason: reason.into(),
        }
    }

    pub fn from_narrative(stage: Stage, err: NarrativeError) -> Self {
        match err {
            NarrativeError::RateLimited(reason) => Self {
                stage,
                kind: FailureKind::RateLimited,
                symbol: None,
                reason: format!("Rate limited: {reason}"),
            },
            NarrativeError::Failed(reason) => Self::error(stage, reason),
        }
    }

    /// Scope the failure to one symbol
    pub fn for_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    /// Text substituted for the missing narrative
    pub fn placeholder(&self) -> String {
        match (self.kind, self.symbol.as_deref()) {
            (FailureKind::Timeout, Some(symbol)) => {
                format!("Analysis of {symbol} {}.", self.reason)
            }
            (FailureKind::Timeout, None) => format!("{} {}.", self.stage.title(), self.reason),
            (_, Some(symbol)) => format!("Error analyzing {symbol}: {}", self.reason),
            (_, None) => format!("{}: {}", self.stage.error_prefix(), self.reason),
        }
    }
}

impl fmt::Display for StageFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.placeholder())
    }
}

/// Narrative text or the reason there is none
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageResult {
    Success(String),
    Failure(StageFailure),
}

impl StageResult {
    /// Narrative text, or the failure placeholder
    pub fn text(&self) -> String {
        match self {
            Self::Success(text) => text.clone(),
            Self::Failure(failure) => failure.placeholder(),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }

    pub fn failure(&self) -> Option<&StageFailure> {
        match self {
            Self::Success(_) => None,
            Self::Failure(failure) => Some(failure),
        }
    }
}

/// Coordinator progress through one report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    Pending,
    MarketAndProfileRunning,
    Synthesizing,
    Scoring,
    Done,
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::MarketAndProfileRunning => "MARKET_AND_PROFILE_RUNNING",
            Self::Synthesizing => "SYNTHESIZING",
            Self::Scoring => "SCORING",
            Self::Done => "DONE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    MarketOverview,
    CompanyFundamentals,
    Recommendations,
    RankingTable,
}

impl SectionKind {
    /// Report order
    pub const ALL: [Self; 4] = [
        Self::MarketOverview,
        Self::CompanyFundamentals,
        Self::Recommendations,
        Self::RankingTable,
    ];

    pub fn heading(self) -> &'static str {
        match self {
            Self::MarketOverview => "Section 1: Market Performance Overview",
            Self::CompanyFundamentals => "Section 2: Company Fundamentals and Sector Overview",
            Self::Recommendations => "Section 3: Investment Recommendations",
            Self::RankingTable => "Section 4: Investment Opportunities Summary",
        }
    }

    fn preamble(self) -> Option<&'static str> {
        match self {
            Self::RankingTable => Some(
                "Based on the comprehensive analysis above, here is the investment ranking:\n\n\
                 | Stock Ticker | Investment Score (1-10) | Rationale |\n\
                 |--------------|-------------------------|-----------|",
            ),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportSection {
    pub kind: SectionKind,
    pub body: String,
}

/// Finished report; immutable once assembled
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    symbols: SymbolSet,
    sections: [ReportSection; 4],
    disclaimer: String,
    failures: Vec<StageFailure>,
    trace: Vec<PipelineState>,
    elapsed: Duration,
}

impl Report {
    /// `bodies` are in [`SectionKind::ALL`] order
    pub fn new(
        symbols: SymbolSet,
        bodies: [String; 4],
        failures: Vec<StageFailure>,
        trace: Vec<PipelineState>,
        elapsed: Duration,
    ) -> Self {
        let mut bodies = bodies.into_iter();
        let sections = SectionKind::ALL.map(|kind| ReportSection {
            kind,
            body: bodies.next().unwrap_or_default(),
        });

        Self {
            symbols,
            sections,
            disclaimer: DISCLAIMER.to_string(),
            failures,
            trace,
            elapsed,
        }
    }

    pub fn symbols(&self) -> &SymbolSet {
        &self.symbols
    }

    pub fn sections(&self) -> &[ReportSection] {
        &self.sections
    }

    pub fn section(&self, kind: SectionKind) -> &ReportSection {
        // ALL is the construction order
        let index = SectionKind::ALL.iter().position(|k| *k == kind).unwrap_or(0);
        &self.sections[index]
    }

    pub fn disclaimer(&self) -> &str {
        &self.disclaimer
    }

    /// Every stage or symbol that fell back to a placeholder
    pub fn failures(&self) -> &[StageFailure] {
        &self.failures
    }

    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }

    /// States visited, in order
    pub fn trace(&self) -> &[PipelineState] {
        &self.trace
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// The full document
    pub fn render_markdown(&self) -> String {
        let mut out = format!("# Stock Investment Report for {}\n", self.symbols.joined());

        for section in &self.sections {
            out.push_str(&format!("\n## {}\n", section.kind.heading()));
            if let Some(preamble) = section.kind.preamble() {
                out.push('\n');
                out.push_str(preamble);
                out.push('\n');
            }
            out.push_str(section.body.trim_end());
            out.push('\n');
        }

        out.push('\n');
        out.push_str(&self.disclaimer);
        out
    }

    /// Response body for a transport layer
    pub fn envelope(&self) -> ReportEnvelope {
        ReportEnvelope {
            status: "success",
            symbols: self.symbols.clone(),
            report: self.render_markdown(),
        }
    }
}

/// `{"status": "success", "symbols": [...], "report": "..."}`
#[derive(Debug, Clone, Serialize)]
pub struct ReportEnvelope {
    pub status: &'static str,
    pub symbols: SymbolSet,
    pub report: String,
}
