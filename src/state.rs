use crate::blueprint::StructuredBlueprint;
use crate::error::FactoryError;
use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Consulting,
    AwaitingStrategy,
    Designing,
    AwaitingApproval,
    Revising,
    Approved,
    Building,
    Done,
    Failed,
}

impl Phase {
    /// Done and Failed accept no further transitions.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Phase::Done | Phase::Failed)
    }

    /// Phases in which a validated blueprint must be present.
    pub fn requires_blueprint(&self) -> bool {
        matches!(
            self,
            Phase::AwaitingApproval
                | Phase::Revising
                | Phase::Approved
                | Phase::Building
                | Phase::Done
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Consulting => "consulting",
            Phase::AwaitingStrategy => "awaiting_strategy",
            Phase::Designing => "designing",
            Phase::AwaitingApproval => "awaiting_approval",
            Phase::Revising => "revising",
            Phase::Approved => "approved",
            Phase::Building => "building",
            Phase::Done => "done",
            Phase::Failed => "failed",
        }
    }

    /// Label for terminal output, with the revision number where it matters.
    pub fn label(&self, revision_count: u32) -> String {
        match self {
            Phase::Consulting => "Consulting".to_string(),
            Phase::AwaitingStrategy => "Awaiting strategy".to_string(),
            Phase::Designing => "Designing".to_string(),
            Phase::AwaitingApproval if revision_count > 0 => {
                format!("Awaiting approval (revision #{})", revision_count)
            }
            Phase::AwaitingApproval => "Awaiting approval".to_string(),
            Phase::Revising => format!("Revising #{}", revision_count),
            Phase::Approved => "Approved".to_string(),
            Phase::Building => "Building".to_string(),
            Phase::Done => "Done".to_string(),
            Phase::Failed => "Failed".to_string(),
        }
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The single source of truth for one factory run.
///
/// Fields are only writable inside the crate; the state machine is the sole
/// writer at runtime. Everyone else reads through the accessors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WorkflowState {
    pub(crate) workflow_id: String,
    pub(crate) initial_request: String,
    #[serde(default)]
    pub(crate) strategy_options: Option<String>,
    #[serde(default)]
    pub(crate) chosen_strategy: Option<String>,
    #[serde(default)]
    pub(crate) blueprint: Option<StructuredBlueprint>,
    #[serde(default)]
    pub(crate) pending_feedback: Option<String>,
    #[serde(default)]
    pub(crate) generated_code: Option<String>,
    pub(crate) phase: Phase,
    #[serde(default)]
    pub(crate) revision_count: u32,
    #[serde(default)]
    pub(crate) failure_reason: Option<String>,
    /// Non-fatal notices: forced approvals, failed artifact saves.
    #[serde(default)]
    pub(crate) warnings: Vec<String>,
    pub(crate) created_at: String,
    #[serde(default)]
    pub(crate) updated_at: String,
}

impl WorkflowState {
    /// Creates a fresh workflow in the Consulting phase.
    ///
    /// # Errors
    /// Returns `InvalidInput` if the request is empty or whitespace-only.
    pub fn new(initial_request: &str) -> Result<Self, FactoryError> {
        if initial_request.trim().is_empty() {
            return Err(FactoryError::invalid_input("request must not be empty"));
        }
        let now = Utc::now().to_rfc3339();
        Ok(Self {
            workflow_id: Uuid::new_v4().to_string(),
            initial_request: initial_request.trim().to_string(),
            strategy_options: None,
            chosen_strategy: None,
            blueprint: None,
            pending_feedback: None,
            generated_code: None,
            phase: Phase::Consulting,
            revision_count: 0,
            failure_reason: None,
            warnings: Vec::new(),
            created_at: now.clone(),
            updated_at: now,
        })
    }

    pub fn workflow_id(&self) -> &str {
        &self.workflow_id
    }

    pub fn initial_request(&self) -> &str {
        &self.initial_request
    }

    pub fn strategy_options(&self) -> Option<&str> {
        self.strategy_options.as_deref()
    }

    pub fn chosen_strategy(&self) -> Option<&str> {
        self.chosen_strategy.as_deref()
    }

    pub fn blueprint(&self) -> Option<&StructuredBlueprint> {
        self.blueprint.as_ref()
    }

    pub fn pending_feedback(&self) -> Option<&str> {
        self.pending_feedback.as_deref()
    }

    pub fn generated_code(&self) -> Option<&str> {
        self.generated_code.as_deref()
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn revision_count(&self) -> u32 {
        self.revision_count
    }

    pub fn failure_reason(&self) -> Option<&str> {
        self.failure_reason.as_deref()
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn created_at(&self) -> &str {
        &self.created_at
    }

    pub fn updated_at(&self) -> &str {
        &self.updated_at
    }

    pub fn is_terminal(&self) -> bool {
        self.phase.is_terminal()
    }

    /// Moves to `to` if the edge exists in the workflow graph.
    pub(crate) fn transition(&mut self, to: Phase) -> Result<(), FactoryError> {
        let valid = matches!(
            (self.phase, to),
            (Phase::Consulting, Phase::AwaitingStrategy)
                | (Phase::AwaitingStrategy, Phase::Designing)
                | (Phase::Designing, Phase::AwaitingApproval)
                | (Phase::AwaitingApproval, Phase::Approved)
                | (Phase::AwaitingApproval, Phase::Revising)
                | (Phase::Revising, Phase::AwaitingApproval)
                | (Phase::Approved, Phase::Building)
                | (Phase::Building, Phase::Done)
        ) || (to == Phase::Failed && !self.phase.is_terminal());

        if valid {
            self.phase = to;
            Ok(())
        } else {
            Err(FactoryError::invalid_input(format!(
                "invalid state transition from {} to {}",
                self.phase, to
            )))
        }
    }

    pub(crate) fn set_updated_at(&mut self) {
        self.updated_at = Utc::now().to_rfc3339();
    }

    /// Checks the data-model invariants that tie fields to the phase.
    pub fn check_invariants(&self) -> Result<(), String> {
        if self.phase.requires_blueprint() && self.blueprint.is_none() {
            return Err(format!("phase {} requires a blueprint", self.phase));
        }
        let code_allowed = matches!(self.phase, Phase::Done | Phase::Building);
        if self.generated_code.is_some() && !code_allowed {
            return Err(format!(
                "generated code present outside of done (phase {})",
                self.phase
            ));
        }
        if self.phase == Phase::Done && self.generated_code.is_none() {
            return Err("phase done requires generated code".to_string());
        }
        if self.failure_reason.is_some() != (self.phase == Phase::Failed) {
            return Err(format!(
                "failure reason must be set exactly when failed (phase {})",
                self.phase
            ));
        }
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file: {}", path.display()))?;
        let state: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file: {}", path.display()))?;
        Ok(state)
    }

    /// Writes the state as JSON through a temp file and rename.
    pub fn save_atomic(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| {
                    format!("Failed to create state directory: {}", parent.display())
                })?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize state")?;
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, content)
            .with_context(|| format!("Failed to write temp state file: {}", tmp_path.display()))?;
        fs::rename(&tmp_path, path)
            .with_context(|| format!("Failed to move state file into place: {}", path.display()))?;
        Ok(())
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
