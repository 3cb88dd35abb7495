//! Phase executors.
//!
//! Each executor reads the workflow state, issues generation requests and
//! returns the [`StateCommand`](crate::state_machine::StateCommand) the
//! orchestrator should commit. Executors never mutate state themselves.
//!
//! An executor error means the phase could not produce a result: generation
//! retries were exhausted, output kept failing validation, or the workflow was
//! cancelled.

pub mod architect;
pub mod builder;
pub mod consultant;

pub use architect::run_architect_phase;
pub use builder::run_builder_phase;
pub use consultant::run_consultant_phase;

use crate::agents::{GenerationRequest, GenerationService};
use crate::cancel::CancelToken;
use crate::config::FactoryConfig;
use crate::error::FactoryError;

/// What every phase executor needs besides the state.
pub struct PhaseContext<'a> {
    pub generator: &'a dyn GenerationService,
    pub config: &'a FactoryConfig,
    pub cancel: CancelToken,
}

impl<'a> PhaseContext<'a> {
    pub fn new(
        generator: &'a dyn GenerationService,
        config: &'a FactoryConfig,
        cancel: CancelToken,
    ) -> Self {
        Self {
            generator,
            config,
            cancel,
        }
    }

    /// Calls the generator, retrying transient failures with linear backoff.
    ///
    /// Errors that [`FactoryError::is_retryable`] rejects are returned at once.
    ///
    /// A result that arrives after cancellation is discarded.
    pub async fn generate_with_retry(
        &mut self,
        request: &GenerationRequest,
    ) -> Result<String, FactoryError> {
        let policy = &self.config.failure_policy;
        let mut attempt = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(FactoryError::Cancelled);
            }

            let result = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(FactoryError::Cancelled),
                result = self.generator.generate(request) => result,
            };
            if self.cancel.is_cancelled() {
                return Err(FactoryError::Cancelled);
            }

            let err = match result {
                Ok(output) => return Ok(output),
                Err(err) => FactoryError::from(err),
            };
            if !err.is_retryable() {
                tracing::error!(task = %request.task, "generation failed, not retrying: {}", err);
                return Err(err);
            }
            if attempt >= policy.max_retries {
                tracing::error!(
                    task = %request.task,
                    "generation failed after {} attempt(s): {}",
                    attempt + 1,
                    err
                );
                return Err(err);
            }

            attempt += 1;
            let delay = policy.backoff(attempt);
            tracing::warn!(
                task = %request.task,
                "generation failed ({}), retrying in {:?} (attempt {}/{})",
                err,
                delay,
                attempt,
                policy.max_retries
            );
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => return Err(FactoryError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/phase_tests.rs"]
mod tests;
