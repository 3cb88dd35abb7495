//! Blueprint data model shared by the Architect and Builder phases.
//!
//! The JSON form of [`StructuredBlueprint`] is the exchange format between
//! design and code generation and is what gets written to storage.

use crate::validators::blueprint::{validate_blueprint, BlueprintViolation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Execution flow of the agents described by a blueprint.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum FlowType {
    Sequential,
    Parallel,
    Conditional,
}

impl FlowType {
    pub const ALL: [FlowType; 3] = [
        FlowType::Sequential,
        FlowType::Parallel,
        FlowType::Conditional,
    ];

    /// Case-insensitive lookup ("Sequential", "SEQUENTIAL" and "sequential" all match).
    pub fn parse(value: &str) -> Option<Self> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|flow| flow.as_str() == normalized)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FlowType::Sequential => "sequential",
            FlowType::Parallel => "parallel",
            FlowType::Conditional => "conditional",
        }
    }
}

impl fmt::Display for FlowType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One agent in a generated system.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AgentSpec {
    pub name: String,
    pub role: String,
    #[serde(default)]
    pub tools: BTreeSet<String>,
    #[serde(default)]
    pub dependencies: BTreeSet<String>,
}

/// Validated design document produced by the Architect.
///
/// Agent order is significant: it is the execution order for
/// [`FlowType::Sequential`] systems.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StructuredBlueprint {
    pub system_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub flow_type: FlowType,
    pub agents: Vec<AgentSpec>,
}

impl StructuredBlueprint {
    pub fn agent(&self, name: &str) -> Option<&AgentSpec> {
        self.agents.iter().find(|a| a.name == name)
    }

    pub fn agent_names(&self) -> Vec<&str> {
        self.agents.iter().map(|a| a.name.as_str()).collect()
    }

    /// Pretty JSON used for prompts and storage.
    pub fn to_json_pretty(&self) -> String {
        // Serializing plain strings, sets and vectors cannot fail.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// One-line summary for logs and terminal output.
    pub fn summary(&self) -> String {
        format!(
            "{} ({} flow, {} agent(s): {})",
            self.system_name,
            self.flow_type,
            self.agents.len(),
            self.agent_names().join(", ")
        )
    }
}

/// Architect output on either side of the validation boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum BlueprintDraft {
    /// Text as returned by the generation service.
    Raw(String),
    /// Output that passed [`validate_blueprint`].
    Structured(StructuredBlueprint),
}

impl BlueprintDraft {
    /// Crosses the parse/validate boundary. Structured drafts pass through.
    pub fn validate(self) -> Result<StructuredBlueprint, BlueprintViolation> {
        match self {
            BlueprintDraft::Raw(text) => validate_blueprint(&text),
            BlueprintDraft::Structured(blueprint) => Ok(blueprint),
        }
    }
}
