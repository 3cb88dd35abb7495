//! Commands that can mutate workflow state.
//!
//! All state changes go through [`super::WorkflowStateMachine::apply`].

use crate::blueprint::StructuredBlueprint;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum StateCommand {
    /// Consultant produced strategy options. CONSULTING -> AWAITING_STRATEGY
    CompleteConsulting { strategy_options: String },
    /// User picked a strategy. AWAITING_STRATEGY -> DESIGNING
    ChooseStrategy { strategy: String },
    /// Architect output passed validation. DESIGNING | REVISING -> AWAITING_APPROVAL
    AcceptBlueprint { blueprint: StructuredBlueprint },
    /// AWAITING_APPROVAL -> APPROVED
    Approve,
    /// Records feedback and bumps the revision count. AWAITING_APPROVAL -> REVISING
    RequestRevision { feedback: String },
    /// Approval forced by the revision cap. AWAITING_APPROVAL -> APPROVED
    ForceApprove { warning: String },
    /// Builder output passed validation. APPROVED -> BUILDING
    CompleteBuild { code: String },
    /// BUILDING -> DONE
    Finish,
    /// Any non-terminal phase -> FAILED
    Fail { reason: String },
    /// Non-fatal notice; phase is unchanged.
    RecordWarning { message: String },
}

impl StateCommand {
    /// Short name for logs and error messages.
    pub fn name(&self) -> &'static str {
        match self {
            StateCommand::CompleteConsulting { .. } => "complete consulting",
            StateCommand::ChooseStrategy { .. } => "choose a strategy",
            StateCommand::AcceptBlueprint { .. } => "accept a blueprint",
            StateCommand::Approve => "approve",
            StateCommand::RequestRevision { .. } => "request a revision",
            StateCommand::ForceApprove { .. } => "force approval",
            StateCommand::CompleteBuild { .. } => "complete the build",
            StateCommand::Finish => "finish",
            StateCommand::Fail { .. } => "fail",
            StateCommand::RecordWarning { .. } => "record a warning",
        }
    }
}
