//! Routed generation with fallback across backends.

use crate::agents::cli_agent::CliAgent;
use crate::agents::{GenerationError, GenerationRequest, GenerationService};
use crate::config::FactoryConfig;
use crate::model_router::{ModelRoute, ModelRouter};
use crate::structured_logger::StructuredLogger;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;

/// Builds the backend for one route.
pub type BackendFactory =
    Box<dyn Fn(&ModelRoute) -> Result<Arc<dyn GenerationService>> + Send + Sync>;

/// Tries each route in the request's chain until one succeeds.
///
/// Returns the first success, or the last backend error once the chain is
/// exhausted. Routes whose backend cannot be built are skipped.
pub struct FallbackGenerator {
    router: ModelRouter,
    factory: BackendFactory,
    logger: Option<Arc<StructuredLogger>>,
}

impl FallbackGenerator {
    pub fn new(router: ModelRouter, factory: BackendFactory) -> Self {
        Self {
            router,
            factory,
            logger: None,
        }
    }

    /// Generator over the agent CLIs named in `config`.
    pub fn from_config(config: &FactoryConfig) -> Result<Self> {
        let router = ModelRouter::new(&config.routing)?;
        let config = config.clone();
        let factory: BackendFactory = Box::new(move |route| {
            let agent = CliAgent::from_route(route, &config)?;
            Ok(Arc::new(agent) as Arc<dyn GenerationService>)
        });
        Ok(Self::new(router, factory))
    }

    pub fn with_logger(mut self, logger: Arc<StructuredLogger>) -> Self {
        self.logger = Some(logger);
        self
    }

    pub fn router(&self) -> &ModelRouter {
        &self.router
    }
}

#[async_trait]
impl GenerationService for FallbackGenerator {
    fn name(&self) -> &str {
        "fallback"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let chain = self.router.chain(request.task);
        let mut last_error = None;

        for route in chain {
            let backend = match (self.factory)(route) {
                Ok(backend) => backend,
                Err(e) => {
                    tracing::warn!(route = %route, "skipping route: {:#}", e);
                    if last_error.is_none() {
                        last_error =
                            Some(GenerationError::Misconfigured(format!("{}: {:#}", route, e)));
                    }
                    continue;
                }
            };

            if let Some(logger) = &self.logger {
                logger.log_agent_invocation(backend.name(), request.task.as_str());
            }
            tracing::debug!(backend = backend.name(), task = %request.task, "generating");

            match backend.generate(request).await {
                Ok(output) => {
                    if let Some(logger) = &self.logger {
                        logger.log_agent_complete(backend.name(), true, None);
                    }
                    return Ok(output);
                }
                Err(e) => {
                    tracing::warn!(backend = backend.name(), "generation failed: {}", e);
                    if let Some(logger) = &self.logger {
                        logger.log_agent_complete(backend.name(), false, Some(&e.to_string()));
                    }
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| {
            GenerationError::Misconfigured(format!(
                "no routes configured for task '{}'",
                request.task
            ))
        }))
    }
}
