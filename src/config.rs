use crate::failure::FailurePolicy;
use crate::model_router::{ModelRoute, RoutingConfig, TaskKind};
use crate::revision::RevisionConfig;
use crate::validators::{CodeCheck, TargetLanguage};
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FactoryConfig {
    pub agents: HashMap<String, AgentConfig>,
    pub routing: RoutingConfig,
    #[serde(default)]
    pub revision: RevisionConfig,
    #[serde(default)]
    pub architect: ArchitectConfig,
    #[serde(default)]
    pub builder: BuilderConfig,
    /// Retry policy for transient generation failures.
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    #[serde(default)]
    pub storage: StorageConfig,
}

/// How the prompt reaches an agent CLI.
#[derive(Debug, Clone, Copy, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PromptInput {
    /// Appended as the last argument.
    #[default]
    Argument,
    /// Written to stdin.
    Stdin,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AgentConfig {
    pub command: String,
    /// Arguments; `{model}` is replaced with the routed model.
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub prompt_input: PromptInput,
    /// Flag that carries the system prompt (e.g. `--append-system-prompt`).
    /// Without one, the system prompt is merged into the prompt.
    #[serde(default)]
    pub system_prompt_flag: Option<String>,
    /// Model used when a route names none.
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default)]
    pub activity_timeout_secs: Option<u64>,
    #[serde(default)]
    pub overall_timeout_secs: Option<u64>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct ArchitectConfig {
    /// Extra attempts after a blueprint fails validation. Default: 2
    #[serde(default = "default_retries")]
    pub schema_retries: u32,
}

impl Default for ArchitectConfig {
    fn default() -> Self {
        Self {
            schema_retries: default_retries(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct BuilderConfig {
    /// Extra attempts after generated code fails validation. Default: 2
    #[serde(default = "default_retries")]
    pub validation_retries: u32,
    /// Name the generated module must bind at top level. Default: root_agent
    #[serde(default = "default_entry_point")]
    pub entry_point: String,
    #[serde(default)]
    pub language: TargetLanguage,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            validation_retries: default_retries(),
            entry_point: default_entry_point(),
            language: TargetLanguage::default(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct StorageConfig {
    /// Artifact directory. Defaults to `~/.agent-factory/artifacts`.
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    /// Also save each blueprint draft shown for approval.
    #[serde(default)]
    pub save_drafts: bool,
}

fn default_retries() -> u32 {
    2
}

fn default_entry_point() -> String {
    "root_agent".to_string()
}

impl FactoryConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse config file as YAML: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_config() -> Self {
        const DEFAULT_FACTORY_YAML: &str = include_str!("../factory.yaml");

        serde_yaml::from_str(DEFAULT_FACTORY_YAML)
            .expect("Failed to parse embedded factory.yaml - this is a bug in the factory.yaml file")
    }

    pub fn validate(&self) -> Result<()> {
        for task in [
            TaskKind::Consulting,
            TaskKind::Architecture,
            TaskKind::CodeGeneration,
        ] {
            let routes = self.routing.routes_for(task);
            if routes.is_empty() {
                anyhow::bail!("At least one route must be configured for task '{}'", task);
            }
            for route in routes {
                self.check_route(route, task.as_str())?;
            }
        }
        for (key, aliases) in &self.routing.aliases {
            for alias in aliases {
                self.check_route(alias, key)
                    .with_context(|| format!("Invalid alias for route '{}'", key))?;
            }
        }

        for (name, agent) in &self.agents {
            if agent.command.trim().is_empty() {
                anyhow::bail!("Agent '{}' has an empty command", name);
            }
        }

        if self.revision.max_revisions < 1 {
            anyhow::bail!("revision.max_revisions must be at least 1");
        }

        let identifier =
            Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("regex to match identifiers");
        if !identifier.is_match(&self.builder.entry_point) {
            anyhow::bail!(
                "builder.entry_point '{}' is not a valid identifier",
                self.builder.entry_point
            );
        }

        Ok(())
    }

    fn check_route(&self, route: &str, routed_for: &str) -> Result<()> {
        let parsed = ModelRoute::parse(route)?;
        if !self.agents.contains_key(&parsed.agent) {
            anyhow::bail!(
                "Agent '{}' routed for '{}' not found in agents configuration",
                parsed.agent,
                routed_for
            );
        }
        Ok(())
    }

    pub fn get_agent(&self, name: &str) -> Option<&AgentConfig> {
        self.agents.get(name)
    }

    pub fn code_check(&self) -> CodeCheck {
        CodeCheck::new(self.builder.language, self.builder.entry_point.clone())
    }

    /// Artifact directory, falling back to the home-based default.
    pub fn output_dir(&self) -> Result<PathBuf> {
        match &self.storage.output_dir {
            Some(dir) => Ok(dir.clone()),
            None => crate::factory_paths::artifacts_dir(),
        }
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod config_tests;
