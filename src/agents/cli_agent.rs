//! Agent CLIs (claude, codex, gemini, ...) as generation backends.

use crate::agents::runner::{run_process, RunnerConfig};
use crate::agents::{GenerationError, GenerationRequest, GenerationService};
use crate::config::{AgentConfig, FactoryConfig, PromptInput};
use crate::failure::classify_failure;
use crate::model_router::ModelRoute;
use anyhow::Result;
use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::process::Command;

const MODEL_PLACEHOLDER: &str = "{model}";

/// Prompt text plus the system prompt to pass as a flag, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedPrompt {
    pub prompt: String,
    pub system_prompt_arg: Option<String>,
}

/// Agents with a system prompt flag get it separately; for the rest it is
/// prepended to the prompt within a <system-context> tag.
pub fn prepare_prompt(
    request: &GenerationRequest,
    supports_system_prompt_arg: bool,
) -> PreparedPrompt {
    if supports_system_prompt_arg {
        return PreparedPrompt {
            prompt: request.prompt.clone(),
            system_prompt_arg: request.system_prompt.clone(),
        };
    }

    let prompt = match &request.system_prompt {
        Some(sys) => format!(
            "<system-context>\n{}\n</system-context>\n\n{}",
            sys, request.prompt
        ),
        None => request.prompt.clone(),
    };
    PreparedPrompt {
        prompt,
        system_prompt_arg: None,
    }
}

/// Substitutes `{model}` in configured arguments.
///
/// Without a model, an argument holding the placeholder is dropped together
/// with the flag right before it (`--model {model}` disappears entirely).
pub fn render_args(args: &[String], model: Option<&str>) -> Vec<String> {
    let mut rendered: Vec<String> = Vec::with_capacity(args.len());
    for arg in args {
        if !arg.contains(MODEL_PLACEHOLDER) {
            rendered.push(arg.clone());
            continue;
        }
        match model {
            Some(model) => rendered.push(arg.replace(MODEL_PLACEHOLDER, model)),
            None => {
                if rendered.last().is_some_and(|prev| prev.starts_with('-')) {
                    rendered.pop();
                }
            }
        }
    }
    rendered
}

pub struct CliAgent {
    name: String,
    config: AgentConfig,
    model: Option<String>,
    working_dir: Option<PathBuf>,
}

impl CliAgent {
    /// `model` overrides the agent's configured default model.
    pub fn new(agent_name: &str, config: AgentConfig, model: Option<String>) -> Self {
        let model = model.or_else(|| config.default_model.clone());
        let name = match &model {
            Some(model) => format!("{}/{}", agent_name, model),
            None => agent_name.to_string(),
        };
        Self {
            name,
            config,
            model,
            working_dir: None,
        }
    }

    pub fn from_route(route: &ModelRoute, factory: &FactoryConfig) -> Result<Self> {
        let config = factory.get_agent(&route.agent).ok_or_else(|| {
            anyhow::anyhow!("Agent '{}' not found in agents configuration", route.agent)
        })?;
        Ok(Self::new(&route.agent, config.clone(), route.model.clone()))
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    pub fn model(&self) -> Option<&str> {
        self.model.as_deref()
    }

    /// The command to run and the text to write to its stdin.
    fn build_command(&self, request: &GenerationRequest) -> (Command, Option<String>) {
        let prepared = prepare_prompt(request, self.config.system_prompt_flag.is_some());

        let mut cmd = Command::new(&self.config.command);
        cmd.args(render_args(&self.config.args, self.model.as_deref()));

        if let (Some(flag), Some(system_prompt)) =
            (&self.config.system_prompt_flag, &prepared.system_prompt_arg)
        {
            cmd.arg(flag).arg(system_prompt);
        }

        match self.config.prompt_input {
            PromptInput::Argument => {
                cmd.arg(&prepared.prompt);
                (cmd, None)
            }
            PromptInput::Stdin => (cmd, Some(prepared.prompt)),
        }
    }

    fn runner_config(&self) -> RunnerConfig {
        let mut config = RunnerConfig::new(self.name.clone());
        if let Some(secs) = self.config.activity_timeout_secs {
            config = config.with_activity_timeout(Duration::from_secs(secs));
        }
        if let Some(secs) = self.config.overall_timeout_secs {
            config = config.with_overall_timeout(Duration::from_secs(secs));
        }
        if let Some(dir) = &self.working_dir {
            config = config.with_working_dir(dir.clone());
        }
        config
    }
}

#[async_trait]
impl GenerationService for CliAgent {
    fn name(&self) -> &str {
        &self.name
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        let (cmd, stdin_input) = self.build_command(request);
        let output = run_process(cmd, stdin_input, &self.runner_config())
            .await
            .map_err(|e| GenerationError::ServiceUnavailable(format!("{}: {:#}", self.name, e)))?;

        if !output.success {
            tracing::debug!(
                agent = %self.name,
                exit_code = ?output.exit_code,
                "agent exited unsuccessfully"
            );
            return Err(classify_failure(&self.name, &output.combined()));
        }

        let text = output.stdout.trim();
        if text.is_empty() {
            return Err(GenerationError::ServiceUnavailable(format!(
                "{}: empty response",
                self.name
            )));
        }
        Ok(text.to_string())
    }
}

#[cfg(test)]
#[path = "tests/cli_agent_tests.rs"]
mod tests;
