//! Generation backends.
//!
//! Phases talk to a [`GenerationService`]; concrete backends are agent CLIs
//! run as subprocesses ([`cli_agent::CliAgent`]) composed into a routed
//! fallback chain ([`fallback::FallbackGenerator`]).

pub mod cli_agent;
pub mod fallback;
pub mod runner;

pub use crate::model_router::TaskKind;
use async_trait::async_trait;
use thiserror::Error;

/// One prompt for one backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationRequest {
    pub task: TaskKind,
    pub prompt: String,
    pub system_prompt: Option<String>,
}

impl GenerationRequest {
    pub fn new(task: TaskKind, prompt: impl Into<String>) -> Self {
        Self {
            task,
            prompt: prompt.into(),
            system_prompt: None,
        }
    }

    pub fn with_system_prompt(mut self, system_prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(system_prompt.into());
        self
    }
}

/// Backend failures. Unavailable and rate-limited backends are transient.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    /// No backend could be started or authenticated for the task.
    #[error("misconfigured: {0}")]
    Misconfigured(String),
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &str;

    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError>;
}
