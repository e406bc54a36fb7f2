//! Text-generation backends used by the stock report
//!
//! Each report stage sends a role prompt plus one user prompt and wants prose
//! back. [`LLMProvider`] hides whether that goes to Gemini or to an
//! OpenAI-compatible server; pick one with the `gemini` / `openai` features.

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;

#[cfg(any(feature = "openai", feature = "gemini"))]
pub mod providers;

pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{Message, Role};
pub use provider::LLMProvider;
