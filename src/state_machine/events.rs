//! Events emitted by the state machine after committing a command.
//!
//! These are for logging and notification only; observers that need the
//! current state read the [`super::StateSnapshot`] watch channel.

use crate::state::Phase;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type")]
pub enum StateEvent {
    PhaseChanged { from: Phase, to: Phase },
    StrategyOptionsRecorded { length: usize },
    StrategyChosen { strategy_preview: String },
    BlueprintAccepted { system_name: String, agent_count: usize },
    /// Pending feedback was cleared by a successful Architect run.
    FeedbackConsumed,
    RevisionRequested { revision: u32, feedback_preview: String },
    /// Approval was forced because the revision cap was reached.
    RevisionCapReached { revisions: u32 },
    CodeGenerated { bytes: usize },
    WarningRecorded { message: String },
    WorkflowFailed { reason: String },
    WorkflowComplete { revisions: u32 },
}

/// First 50 characters, with an ellipsis when truncated.
pub(super) fn preview(text: &str) -> String {
    if text.chars().count() > 50 {
        format!("{}...", text.chars().take(50).collect::<String>())
    } else {
        text.to_string()
    }
}
