//! Prompt text for the report narrators
//!
//! - `system`: role descriptions, one per narrator
//! - `user`: per-stage prompt builders

mod system;
mod user;

pub use system::*;
pub use user::*;
