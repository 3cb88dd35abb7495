//! Workflow orchestration.
//!
//! The orchestrator owns one [`WorkflowStateMachine`] and drives it through
//! Consultant -> strategy choice -> Architect/revision loop -> Builder. Each
//! step is also callable on its own and checks the current phase first.

use crate::agents::GenerationService;
use crate::blueprint::StructuredBlueprint;
use crate::cancel::CancelToken;
use crate::config::FactoryConfig;
use crate::error::FactoryError;
use crate::human::HumanInput;
use crate::phases::{run_architect_phase, run_builder_phase, run_consultant_phase, PhaseContext};
use crate::revision::{decide, ApprovalDecision, RevisionOutcome};
use crate::state::{Phase, WorkflowState};
use crate::state_machine::{StateCommand, StateEvent, WorkflowStateMachine};
use crate::storage::{artifact_name, ArtifactKind, ArtifactStore};
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub const REVISION_LIMIT_REASON: &str = "revision limit exceeded";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Executor {
    Consultant,
    Architect,
    Builder,
}

pub struct Orchestrator {
    machine: WorkflowStateMachine,
    config: FactoryConfig,
    generator: Arc<dyn GenerationService>,
    store: Arc<dyn ArtifactStore>,
    cancel: CancelToken,
    state_path: Option<PathBuf>,
    artifacts: Vec<(ArtifactKind, PathBuf)>,
}

impl Orchestrator {
    pub fn new(
        machine: WorkflowStateMachine,
        config: FactoryConfig,
        generator: Arc<dyn GenerationService>,
        store: Arc<dyn ArtifactStore>,
    ) -> Self {
        Self {
            machine,
            config,
            generator,
            store,
            cancel: CancelToken::never(),
            state_path: None,
            artifacts: Vec::new(),
        }
    }

    pub fn with_cancel(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Persist the state to `path` after every committed command.
    pub fn with_state_path(mut self, path: PathBuf) -> Self {
        self.state_path = Some(path);
        self
    }

    pub fn state(&self) -> &WorkflowState {
        self.machine.state()
    }

    pub fn machine(&self) -> &WorkflowStateMachine {
        &self.machine
    }

    /// Artifacts saved so far, in save order.
    pub fn artifacts(&self) -> &[(ArtifactKind, PathBuf)] {
        &self.artifacts
    }

    pub fn artifact_path(&self, kind: ArtifactKind) -> Option<&Path> {
        self.artifacts
            .iter()
            .rev()
            .find(|(k, _)| *k == kind)
            .map(|(_, path)| path.as_path())
    }

    /// CONSULTING -> AWAITING_STRATEGY.
    pub async fn consult(&mut self) -> Result<(), FactoryError> {
        self.require("consult", &[Phase::Consulting])?;
        self.execute(Executor::Consultant).await
    }

    /// AWAITING_STRATEGY -> DESIGNING.
    pub fn choose_strategy(&mut self, strategy: &str) -> Result<(), FactoryError> {
        self.require("choose a strategy", &[Phase::AwaitingStrategy])?;
        self.commit(StateCommand::ChooseStrategy {
            strategy: strategy.to_string(),
        })?;
        Ok(())
    }

    /// DESIGNING or REVISING -> AWAITING_APPROVAL.
    pub async fn design(&mut self) -> Result<(), FactoryError> {
        self.require("design", &[Phase::Designing, Phase::Revising])?;
        self.execute(Executor::Architect).await?;

        if self.config.storage.save_drafts {
            if let Some(blueprint) = self.machine.state().blueprint().cloned() {
                let name = self.workflow_artifact_name();
                self.save_artifact(
                    ArtifactKind::BlueprintDraft,
                    &name,
                    &blueprint.to_json_pretty(),
                );
            }
        }
        Ok(())
    }

    /// AWAITING_APPROVAL -> APPROVED, then saves the blueprint.
    pub fn approve(&mut self) -> Result<(), FactoryError> {
        self.require("approve", &[Phase::AwaitingApproval])?;
        self.commit(StateCommand::Approve)?;
        self.save_approved_blueprint();
        Ok(())
    }

    /// Requests a revision, applying the revision cap.
    ///
    /// Below the cap the Architect is re-invoked and the workflow lands in
    /// AWAITING_APPROVAL (or FAILED). At the cap the configured policy either
    /// force-approves the current blueprint with a warning, or fails the
    /// workflow and returns `RevisionLimitExceeded`.
    pub async fn revise(&mut self, feedback: &str) -> Result<(), FactoryError> {
        self.require("revise", &[Phase::AwaitingApproval])?;
        let decision = ApprovalDecision::Revise {
            feedback: feedback.to_string(),
        };
        self.apply_decision(decision).await
    }

    /// Dispatches a human approval decision.
    pub async fn apply_decision(&mut self, decision: ApprovalDecision) -> Result<(), FactoryError> {
        self.require("decide on the blueprint", &[Phase::AwaitingApproval])?;
        let outcome = decide(
            decision,
            self.machine.state().revision_count(),
            &self.config.revision,
        )?;

        match outcome {
            RevisionOutcome::Approve => self.approve(),
            RevisionOutcome::Revise { feedback } => {
                self.commit(StateCommand::RequestRevision { feedback })?;
                self.design().await
            }
            RevisionOutcome::ForceApprove { warning } => {
                tracing::warn!("{}", warning);
                self.commit(StateCommand::ForceApprove { warning })?;
                self.save_approved_blueprint();
                Ok(())
            }
            RevisionOutcome::LimitExceeded { revisions } => {
                tracing::error!("revision limit reached after {} revision(s)", revisions);
                self.commit(StateCommand::Fail {
                    reason: REVISION_LIMIT_REASON.to_string(),
                })?;
                Err(FactoryError::RevisionLimitExceeded { revisions })
            }
        }
    }

    /// APPROVED -> BUILDING -> DONE, saving the code in between.
    pub async fn build(&mut self) -> Result<(), FactoryError> {
        self.require("build", &[Phase::Approved])?;
        self.execute(Executor::Builder).await?;
        self.finish()
    }

    /// Saves the generated code and completes the workflow.
    fn finish(&mut self) -> Result<(), FactoryError> {
        if let Some(code) = self.machine.state().generated_code().map(str::to_string) {
            let name = self.workflow_artifact_name();
            self.save_artifact(ArtifactKind::Code, &name, &code);
        }
        self.commit(StateCommand::Finish)?;
        Ok(())
    }

    /// Drives the workflow to DONE, suspending on `human` for decisions.
    ///
    /// Resumes from whatever phase the state is in. A workflow that is
    /// already DONE or FAILED is left alone and `Ok(())` is returned for
    /// both; the caller reads the outcome from [`Orchestrator::state`]. A
    /// failure during this run is returned as the error that caused it.
    pub async fn run(&mut self, human: &mut dyn HumanInput) -> Result<(), FactoryError> {
        let phase = self.machine.state().phase();
        if phase.is_terminal() {
            tracing::info!("workflow already {}; nothing to run", phase);
            return Ok(());
        }
        let result = self.drive(human).await;
        let logger = self.machine.logger();
        match &result {
            Ok(()) => logger.log_workflow_complete("done"),
            Err(FactoryError::Cancelled) => logger.log_workflow_complete("cancelled"),
            Err(e) => logger.log_workflow_complete(&format!("failed: {}", e)),
        }
        result
    }

    async fn drive(&mut self, human: &mut dyn HumanInput) -> Result<(), FactoryError> {
        loop {
            match self.machine.state().phase() {
                Phase::Consulting => self.consult().await?,
                Phase::AwaitingStrategy => {
                    let options = self
                        .machine
                        .state()
                        .strategy_options()
                        .unwrap_or_default()
                        .to_string();
                    let mut cancel = self.cancel.clone();
                    let choice = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(FactoryError::Cancelled),
                        choice = human.await_choice(&options) => choice,
                    };
                    let choice = self.human_reply(choice)?;
                    self.machine.logger().log_human_input("choice", &choice);
                    self.choose_strategy(&choice)?;
                }
                Phase::Designing | Phase::Revising => self.design().await?,
                Phase::AwaitingApproval => {
                    let blueprint = self.current_blueprint()?;
                    let mut cancel = self.cancel.clone();
                    let decision = tokio::select! {
                        biased;
                        _ = cancel.cancelled() => return Err(FactoryError::Cancelled),
                        decision = human.await_approval(&blueprint) => decision,
                    };
                    let decision = self.human_reply(decision)?;
                    let summary = match &decision {
                        ApprovalDecision::Approve => "approve".to_string(),
                        ApprovalDecision::Revise { feedback } => format!("revise: {}", feedback),
                    };
                    self.machine.logger().log_human_input("approval", &summary);
                    self.apply_decision(decision).await?;
                }
                Phase::Approved => self.build().await?,
                Phase::Building => self.finish()?,
                Phase::Done => return Ok(()),
                Phase::Failed => {
                    let reason = self.machine.state().failure_reason().unwrap_or("unknown failure");
                    return Err(FactoryError::invalid_input(format!("workflow failed: {}", reason)));
                }
            }
        }
    }

    /// A closed human channel is treated like cancellation: nothing is committed.
    fn human_reply<T>(&self, reply: anyhow::Result<T>) -> Result<T, FactoryError> {
        if self.cancel.is_cancelled() {
            return Err(FactoryError::Cancelled);
        }
        reply.map_err(|e| {
            tracing::warn!("human input unavailable: {:#}", e);
            FactoryError::Cancelled
        })
    }

    fn current_blueprint(&self) -> Result<StructuredBlueprint, FactoryError> {
        self.machine
            .state()
            .blueprint()
            .cloned()
            .ok_or_else(|| FactoryError::invalid_input("no blueprint to approve"))
    }

    fn require(&self, operation: &str, expected: &[Phase]) -> Result<(), FactoryError> {
        let actual = self.machine.state().phase();
        if expected.contains(&actual) {
            Ok(())
        } else {
            Err(FactoryError::wrong_phase(operation, expected, actual))
        }
    }

    /// Runs a phase executor and commits its command.
    ///
    /// Precondition errors and cancellation leave the state untouched; any
    /// other executor error fails the workflow with the error as the reason.
    async fn execute(&mut self, executor: Executor) -> Result<(), FactoryError> {
        let state = self.machine.state().clone();
        let result = {
            let mut ctx =
                PhaseContext::new(self.generator.as_ref(), &self.config, self.cancel.clone());
            match executor {
                Executor::Consultant => run_consultant_phase(&state, &mut ctx).await,
                Executor::Architect => run_architect_phase(&state, &mut ctx).await,
                Executor::Builder => run_builder_phase(&state, &mut ctx).await,
            }
        };

        match result {
            Ok(command) => {
                self.commit(command)?;
                Ok(())
            }
            Err(FactoryError::Cancelled) => {
                tracing::info!("{:?} cancelled; state left unchanged", executor);
                Err(FactoryError::Cancelled)
            }
            Err(e @ FactoryError::InvalidInput { .. }) => Err(e),
            Err(e) => {
                tracing::error!("{:?} failed: {}", executor, e);
                self.commit(StateCommand::Fail {
                    reason: e.to_string(),
                })?;
                Err(e)
            }
        }
    }

    fn commit(&mut self, command: StateCommand) -> Result<Vec<StateEvent>, FactoryError> {
        let events = self.machine.apply(command)?;
        if let Some(path) = &self.state_path {
            if let Err(e) = self.machine.save(path) {
                tracing::warn!("failed to save workflow state to {}: {:#}", path.display(), e);
            }
        }
        Ok(events)
    }

    fn save_approved_blueprint(&mut self) {
        if let Some(blueprint) = self.machine.state().blueprint().cloned() {
            let name = self.workflow_artifact_name();
            self.save_artifact(ArtifactKind::Blueprint, &name, &blueprint.to_json_pretty());
        }
    }

    fn workflow_artifact_name(&self) -> String {
        let state = self.machine.state();
        match state.blueprint() {
            Some(blueprint) => artifact_name(&blueprint.system_name, state.workflow_id()),
            None => state.workflow_id().to_string(),
        }
    }

    /// Save failures never change the phase; they become warnings.
    fn save_artifact(&mut self, kind: ArtifactKind, name: &str, content: &str) {
        match self.store.save(kind, name, content) {
            Ok(path) => {
                self.machine.logger().log_artifact_saved(kind.as_str(), &path);
                self.artifacts.push((kind, path));
            }
            Err(e) => {
                let message = format!("failed to save {}: {:#}", kind, e);
                tracing::warn!("{}", message);
                if let Err(e) = self.commit(StateCommand::RecordWarning { message }) {
                    tracing::error!("could not record save warning: {}", e);
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/orchestrator_tests.rs"]
mod tests;
