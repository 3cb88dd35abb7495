//! Read-only view of workflow state for observers.

use crate::state::{Phase, WorkflowState};

/// Observers never mutate this; they receive new snapshots via the watch
/// channel after every committed command.
#[derive(Debug, Clone, PartialEq)]
pub struct StateSnapshot {
    pub workflow_id: String,
    pub phase: Phase,
    pub revision_count: u32,
    /// One-line blueprint summary, when a blueprint exists.
    pub blueprint_summary: Option<String>,
    pub has_pending_feedback: bool,
    pub has_code: bool,
    pub warning_count: usize,
    pub failure_reason: Option<String>,
}

impl StateSnapshot {
    /// Terminal-friendly phase label.
    pub fn label(&self) -> String {
        self.phase.label(self.revision_count)
    }
}

impl From<&WorkflowState> for StateSnapshot {
    fn from(state: &WorkflowState) -> Self {
        Self {
            workflow_id: state.workflow_id().to_string(),
            phase: state.phase(),
            revision_count: state.revision_count(),
            blueprint_summary: state.blueprint().map(|b| b.summary()),
            has_pending_feedback: state.pending_feedback().is_some(),
            has_code: state.generated_code().is_some(),
            warning_count: state.warnings().len(),
            failure_reason: state.failure_reason().map(str::to_string),
        }
    }
}
