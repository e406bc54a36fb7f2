//! Report pipeline
//!
//! - `aggregator`: the stage coordinator
//! - `result`: stage results and the assembled report

pub mod aggregator;
pub mod result;

pub use aggregator::ReportAggregator;
pub use result::{
    DISCLAIMER, FailureKind, PipelineState, Report, ReportEnvelope, ReportSection, SectionKind,
    Stage, StageFailure, StageResult,
};
