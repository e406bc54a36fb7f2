//! Narrative generation for report stages
//!
//! Every stage turns structured data into prose through a
//! [`NarrativeGenerator`]. The production implementation, [`LlmNarrator`],
//! wraps an [`LLMProvider`] with a role-specific system prompt and a shared
//! bound on calls in flight.

use crate::config::{NarratorConfig, ProviderKind};
use crate::error::Result;
use crate::prompts;
use async_trait::async_trait;
use report_llm::providers::{GeminiProvider, OpenAIProvider};
use report_llm::{CompletionRequest, LLMError, LLMProvider, Message};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::Semaphore;
use tracing::{debug, instrument, warn};

/// Text used when the service answers with nothing
pub const EMPTY_RESPONSE: &str = "No response";

/// Failure of a single narrative call
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum NarrativeError {
    /// Service refused because of quota or request rate
    #[error("{0}")]
    RateLimited(String),

    /// Anything else
    #[error("{0}")]
    Failed(String),
}

impl NarrativeError {
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited(_))
    }
}

impl From<LLMError> for NarrativeError {
    fn from(err: LLMError) -> Self {
        if err.is_rate_limited() {
            Self::RateLimited(err.to_string())
        } else {
            Self::Failed(err.to_string())
        }
    }
}

/// Turns a prompt into prose
///
/// Implementations must tolerate concurrent calls and do not retry.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NarrativeGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> std::result::Result<String, NarrativeError>;
}

/// Persona a narrator speaks as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NarratorRole {
    MarketAnalyst,
    CompanyResearcher,
    StockStrategist,
    TeamLead,
}

impl NarratorRole {
    pub fn system_prompt(self) -> &'static str {
        match self {
            Self::MarketAnalyst => prompts::MARKET_ANALYST,
            Self::CompanyResearcher => prompts::COMPANY_RESEARCHER,
            Self::StockStrategist => prompts::STOCK_STRATEGIST,
            Self::TeamLead => prompts::TEAM_LEAD,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::MarketAnalyst => "market_analyst",
            Self::CompanyResearcher => "company_researcher",
            Self::StockStrategist => "stock_strategist",
            Self::TeamLead => "team_lead",
        }
    }
}

impl fmt::Display for NarratorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// LLM-backed narrator for one role
pub struct LlmNarrator {
    role: NarratorRole,
    provider: Arc<dyn LLMProvider>,
    permits: Arc<Semaphore>,
    config: NarratorConfig,
}

impl LlmNarrator {
    /// `permits` is shared with every other narrator on the same service
    pub fn new(
        role: NarratorRole,
        provider: Arc<dyn LLMProvider>,
        permits: Arc<Semaphore>,
        config: NarratorConfig,
    ) -> Self {
        Self {
            role,
            provider,
            permits,
            config,
        }
    }

    pub fn role(&self) -> NarratorRole {
        self.role
    }

    fn request(&self, prompt: &str) -> CompletionRequest {
        CompletionRequest::builder(&self.config.model)
            .system(format!(
                "{}\n\n{}",
                self.role.system_prompt(),
                prompts::MARKDOWN_OUTPUT
            ))
            .add_message(Message::user(prompt))
            .max_tokens(self.config.max_tokens)
            .temperature(self.config.temperature)
            .build()
    }
}

#[async_trait]
impl NarrativeGenerator for LlmNarrator {
    #[instrument(skip(self, prompt), fields(role = %self.role, provider = self.provider.name()))]
    async fn generate(&self, prompt: &str) -> std::result::Result<String, NarrativeError> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|e| NarrativeError::Failed(format!("narrator closed: {e}")))?;

        debug!("Prompt is {} chars", prompt.chars().count());
        let response = self.provider.complete(self.request(prompt)).await?;
        if response.is_truncated() {
            warn!("Response cut short: {:?}", response.stop_reason);
        }

        match response.message.text() {
            Some(text) => Ok(text.to_string()),
            None => {
                warn!("Empty response (stop reason {:?})", response.stop_reason);
                Ok(EMPTY_RESPONSE.to_string())
            }
        }
    }
}

/// The four narrator roles a report needs
#[derive(Clone)]
pub struct Narrators {
    pub market: Arc<dyn NarrativeGenerator>,
    pub company: Arc<dyn NarrativeGenerator>,
    pub strategist: Arc<dyn NarrativeGenerator>,
    pub lead: Arc<dyn NarrativeGenerator>,
}

impl Narrators {
    /// One narrator per role over a shared provider and in-flight bound
    pub fn from_provider(provider: Arc<dyn LLMProvider>, config: &NarratorConfig) -> Self {
        let permits = Arc::new(Semaphore::new(config.max_in_flight));
        let narrator = |role| -> Arc<dyn NarrativeGenerator> {
            Arc::new(LlmNarrator::new(
                role,
                Arc::clone(&provider),
                Arc::clone(&permits),
                config.clone(),
            ))
        };

        Self {
            market: narrator(NarratorRole::MarketAnalyst),
            company: narrator(NarratorRole::CompanyResearcher),
            strategist: narrator(NarratorRole::StockStrategist),
            lead: narrator(NarratorRole::TeamLead),
        }
    }

    /// Same generator for every role
    pub fn uniform(generator: Arc<dyn NarrativeGenerator>) -> Self {
        Self {
            market: Arc::clone(&generator),
            company: Arc::clone(&generator),
            strategist: Arc::clone(&generator),
            lead: generator,
        }
    }
}

/// Build the configured provider from its environment variables
pub fn provider_from_config(config: &NarratorConfig) -> Result<Arc<dyn LLMProvider>> {
    let provider: Arc<dyn LLMProvider> = match config.provider {
        ProviderKind::Gemini => Arc::new(GeminiProvider::from_env()?),
        ProviderKind::OpenAI => Arc::new(OpenAIProvider::from_env()?),
    };
    Ok(provider)
}
