//! Shared utilities for the stock-report workspace
//!
//! Logging setup and the text excerpt helper used to bound prompt sizes.

pub mod excerpt;
pub mod logging;

pub use excerpt::{ELLIPSIS, excerpt};
pub use logging::{LogFormat, init_tracing, init_tracing_with};
