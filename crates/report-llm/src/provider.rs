use crate::{CompletionRequest, CompletionResponse, Result};
use async_trait::async_trait;

/// A backend that turns one prompt into prose
///
/// Shared across every report stage behind an `Arc`, so one instance sees
/// concurrent calls. Throttling is the caller's job.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Short backend label for logs
    fn name(&self) -> &str;
}
