//! Routing of generation tasks to priority-ordered backend chains.
//!
//! A route names a configured agent and, optionally, a model for it
//! (`claude/opus`, `gemini/gemini-2.5-pro`, `codex`). Each task kind maps to
//! a chain of routes; aliases expand a route into extra candidates (a second
//! API key, a mirror model) tried right after it.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;

/// What a generation request is for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    /// Strategy proposals and other cheap glue work.
    Consulting,
    /// Blueprint design and revision.
    Architecture,
    /// Source code generation.
    CodeGeneration,
}

/// Keyword table for free-form task descriptions, checked in order.
const TASK_KEYWORDS: &[(&str, TaskKind)] = &[
    ("orchestration", TaskKind::Consulting),
    ("handoff", TaskKind::Consulting),
    ("routing", TaskKind::Consulting),
    ("chat", TaskKind::Consulting),
    ("summary", TaskKind::Consulting),
    ("architecture", TaskKind::Architecture),
    ("design", TaskKind::Architecture),
    ("reasoning", TaskKind::Architecture),
    ("blueprint", TaskKind::Architecture),
    ("plan", TaskKind::Architecture),
    ("code", TaskKind::CodeGeneration),
    ("implement", TaskKind::CodeGeneration),
    ("debug", TaskKind::CodeGeneration),
    ("fix", TaskKind::CodeGeneration),
    ("refactor", TaskKind::CodeGeneration),
];

impl TaskKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKind::Consulting => "consulting",
            TaskKind::Architecture => "architecture",
            TaskKind::CodeGeneration => "code_generation",
        }
    }

    /// Classifies a description such as "architecture design" by keyword.
    /// Unmatched descriptions fall back to [`TaskKind::Consulting`].
    pub fn from_description(description: &str) -> Self {
        let lowered = description.to_lowercase();
        TASK_KEYWORDS
            .iter()
            .find(|(keyword, _)| lowered.contains(keyword))
            .map(|(_, kind)| *kind)
            .unwrap_or(TaskKind::Consulting)
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One candidate backend: an agent name plus an optional model.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ModelRoute {
    pub agent: String,
    pub model: Option<String>,
}

impl ModelRoute {
    /// Parses `agent` or `agent/model`. The model part may itself contain `/`.
    pub fn parse(route: &str) -> Result<Self> {
        let route = route.trim();
        let (agent, model) = match route.split_once('/') {
            Some((agent, model)) => (agent.trim(), Some(model.trim())),
            None => (route, None),
        };
        if agent.is_empty() {
            anyhow::bail!("Route '{}' has an empty agent name", route);
        }
        if model.is_some_and(str::is_empty) {
            anyhow::bail!("Route '{}' has an empty model name", route);
        }
        Ok(Self {
            agent: agent.to_string(),
            model: model.map(str::to_string),
        })
    }
}

impl fmt::Display for ModelRoute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.model {
            Some(model) => write!(f, "{}/{}", self.agent, model),
            None => f.write_str(&self.agent),
        }
    }
}

/// Route chains per task kind, as written in the config file.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct RoutingConfig {
    #[serde(default)]
    pub consulting: Vec<String>,
    #[serde(default)]
    pub architecture: Vec<String>,
    #[serde(default)]
    pub code_generation: Vec<String>,
    /// Extra routes tried right after the keyed route.
    #[serde(default)]
    pub aliases: HashMap<String, Vec<String>>,
}

impl RoutingConfig {
    pub fn routes_for(&self, task: TaskKind) -> &[String] {
        match task {
            TaskKind::Consulting => &self.consulting,
            TaskKind::Architecture => &self.architecture,
            TaskKind::CodeGeneration => &self.code_generation,
        }
    }
}

/// Resolved routing table.
#[derive(Debug, Clone)]
pub struct ModelRouter {
    chains: HashMap<TaskKind, Vec<ModelRoute>>,
}

impl ModelRouter {
    /// Parses every route and expands aliases once, up front.
    pub fn new(config: &RoutingConfig) -> Result<Self> {
        let mut chains = HashMap::new();
        for task in [
            TaskKind::Consulting,
            TaskKind::Architecture,
            TaskKind::CodeGeneration,
        ] {
            let mut expanded = Vec::new();
            for route in config.routes_for(task) {
                expanded.push(route.as_str());
                if let Some(aliases) = config.aliases.get(route.trim()) {
                    expanded.extend(aliases.iter().map(String::as_str));
                }
            }

            let mut seen = HashSet::new();
            let mut chain = Vec::new();
            for route in expanded {
                let parsed = ModelRoute::parse(route)
                    .with_context(|| format!("Invalid route for task '{}'", task))?;
                if seen.insert(parsed.clone()) {
                    chain.push(parsed);
                }
            }
            chains.insert(task, chain);
        }
        Ok(Self { chains })
    }

    /// Priority-ordered, de-duplicated routes for a task kind.
    pub fn chain(&self, task: TaskKind) -> &[ModelRoute] {
        self.chains.get(&task).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn chain_for_description(&self, description: &str) -> &[ModelRoute] {
        self.chain(TaskKind::from_description(description))
    }

    /// First route for a task, if any.
    pub fn primary(&self, task: TaskKind) -> Option<&ModelRoute> {
        self.chain(task).first()
    }
}
