//! Blueprint validation: raw Architect text to [`StructuredBlueprint`].

use crate::blueprint::{AgentSpec, FlowType, StructuredBlueprint};
use crate::validators::extract::extract_json_object;
use serde_json::{Map, Value};
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

/// Why a blueprint was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BlueprintViolation {
    #[error("output is not a JSON object: {detail}")]
    Malformed { detail: String },

    #[error("field `{field}` is missing or has the wrong type (expected {expected})")]
    InvalidField {
        field: String,
        expected: &'static str,
    },

    #[error("`system_name` must not be empty")]
    EmptySystemName,

    #[error("unknown `flow_type` \"{value}\" (expected one of: sequential, parallel, conditional)")]
    UnknownFlowType { value: String },

    #[error("`agents` must contain at least one agent")]
    NoAgents,

    #[error("agent #{index} has an empty `name`")]
    EmptyAgentName { index: usize },

    #[error("agent \"{agent}\" has an empty `role`")]
    EmptyRole { agent: String },

    #[error("agent name \"{name}\" is used more than once; agent names must be unique")]
    DuplicateAgent { name: String },

    #[error("dependency violation: agent \"{agent}\" depends on \"{dependency}\", which is not an agent in this blueprint")]
    DanglingDependency { agent: String, dependency: String },

    #[error("dependency violation: agent \"{agent}\" depends on itself")]
    SelfDependency { agent: String },
}

impl BlueprintViolation {
    /// True for violations of the agent dependency graph.
    pub fn is_dependency_violation(&self) -> bool {
        matches!(
            self,
            BlueprintViolation::DanglingDependency { .. }
                | BlueprintViolation::SelfDependency { .. }
        )
    }
}

/// Parses and validates Architect output.
///
/// Fences and prose around the JSON object are ignored. The returned
/// blueprint has a normalized `flow_type` and trimmed names.
pub fn validate_blueprint(raw: &str) -> Result<StructuredBlueprint, BlueprintViolation> {
    let json = extract_json_object(raw).ok_or_else(|| BlueprintViolation::Malformed {
        detail: "no JSON object found in output".to_string(),
    })?;
    let value: Value =
        serde_json::from_str(&json).map_err(|e| BlueprintViolation::Malformed {
            detail: e.to_string(),
        })?;
    let object = value.as_object().ok_or_else(|| BlueprintViolation::Malformed {
        detail: "top-level value is not an object".to_string(),
    })?;

    let system_name = required_str(object, "system_name", "system_name")?;
    if system_name.is_empty() {
        return Err(BlueprintViolation::EmptySystemName);
    }

    let description = match object.get("description") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(Value::String(s)) => Some(s.trim().to_string()),
        Some(_) => {
            return Err(BlueprintViolation::InvalidField {
                field: "description".to_string(),
                expected: "string",
            })
        }
    };

    let flow_raw = required_str(object, "flow_type", "flow_type")?;
    let flow_type = FlowType::parse(&flow_raw)
        .ok_or(BlueprintViolation::UnknownFlowType { value: flow_raw })?;

    let agents_value = object
        .get("agents")
        .and_then(Value::as_array)
        .ok_or_else(|| BlueprintViolation::InvalidField {
            field: "agents".to_string(),
            expected: "array of agent objects",
        })?;
    if agents_value.is_empty() {
        return Err(BlueprintViolation::NoAgents);
    }

    let mut agents = Vec::with_capacity(agents_value.len());
    for (index, agent_value) in agents_value.iter().enumerate() {
        agents.push(parse_agent(index, agent_value)?);
    }

    check_agent_graph(&agents)?;

    Ok(StructuredBlueprint {
        system_name,
        description,
        flow_type,
        agents,
    })
}

fn parse_agent(index: usize, value: &Value) -> Result<AgentSpec, BlueprintViolation> {
    let object = value.as_object().ok_or_else(|| BlueprintViolation::InvalidField {
        field: format!("agents[{}]", index),
        expected: "object",
    })?;

    let name = required_str(object, "name", &format!("agents[{}].name", index))?;
    if name.is_empty() {
        return Err(BlueprintViolation::EmptyAgentName { index });
    }
    let role = required_str(object, "role", &format!("agents[{}].role", index))?;
    if role.is_empty() {
        return Err(BlueprintViolation::EmptyRole { agent: name });
    }

    let tools = string_set(object, "tools", index)?;
    let dependencies = string_set(object, "dependencies", index)?;

    Ok(AgentSpec {
        name,
        role,
        tools,
        dependencies,
    })
}

/// Names must be unique and every dependency must name another agent.
fn check_agent_graph(agents: &[AgentSpec]) -> Result<(), BlueprintViolation> {
    let mut names = HashSet::with_capacity(agents.len());
    for agent in agents {
        if !names.insert(agent.name.as_str()) {
            return Err(BlueprintViolation::DuplicateAgent {
                name: agent.name.clone(),
            });
        }
    }

    for agent in agents {
        for dependency in &agent.dependencies {
            if dependency == &agent.name {
                return Err(BlueprintViolation::SelfDependency {
                    agent: agent.name.clone(),
                });
            }
            if !names.contains(dependency.as_str()) {
                return Err(BlueprintViolation::DanglingDependency {
                    agent: agent.name.clone(),
                    dependency: dependency.clone(),
                });
            }
        }
    }
    Ok(())
}

fn required_str(
    object: &Map<String, Value>,
    key: &str,
    field: &str,
) -> Result<String, BlueprintViolation> {
    object
        .get(key)
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .ok_or_else(|| BlueprintViolation::InvalidField {
            field: field.to_string(),
            expected: "string",
        })
}

/// Reads an optional array of strings; missing or null means empty.
fn string_set(
    object: &Map<String, Value>,
    key: &str,
    index: usize,
) -> Result<BTreeSet<String>, BlueprintViolation> {
    let invalid = || BlueprintViolation::InvalidField {
        field: format!("agents[{}].{}", index, key),
        expected: "array of strings",
    };
    match object.get(key) {
        None | Some(Value::Null) => Ok(BTreeSet::new()),
        Some(Value::Array(items)) => items
            .iter()
            .map(|item| {
                item.as_str()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .ok_or_else(invalid)
            })
            .collect(),
        Some(_) => Err(invalid()),
    }
}

#[cfg(test)]
#[path = "tests/blueprint_tests.rs"]
mod tests;
