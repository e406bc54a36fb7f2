//! Report stages that talk to the narrative service

pub mod market;
pub mod profiler;
pub mod strategist;

pub use market::{MarketSummarizer, NO_DATA};
pub use profiler::{CompanyAnalyses, CompanyProfiler};
pub use strategist::RecommendationSynthesizer;
