//! Centralized state machine for workflow state management.
//!
//! This is the ONLY place where workflow state is mutated. The machine owns
//! the state, validates each command against the current phase, commits it
//! atomically, emits events and broadcasts snapshots via a watch channel.

mod commands;
mod events;
mod snapshot;

pub use commands::StateCommand;
pub use events::StateEvent;
pub use snapshot::StateSnapshot;

use crate::error::FactoryError;
use crate::state::{Phase, WorkflowState};
use crate::structured_logger::StructuredLogger;
use events::preview;
use std::path::Path;
use std::sync::Arc;
use tokio::sync::watch;

pub struct WorkflowStateMachine {
    state: WorkflowState,
    snapshot_tx: watch::Sender<StateSnapshot>,
    logger: Arc<StructuredLogger>,
    seq: u64,
}

impl WorkflowStateMachine {
    /// Creates a state machine and a receiver for its snapshots.
    pub fn new(
        initial_state: WorkflowState,
        logger: Arc<StructuredLogger>,
    ) -> (Self, watch::Receiver<StateSnapshot>) {
        let snapshot = StateSnapshot::from(&initial_state);
        let (snapshot_tx, snapshot_rx) = watch::channel(snapshot);

        let machine = Self {
            state: initial_state,
            snapshot_tx,
            logger,
            seq: 0,
        };

        (machine, snapshot_rx)
    }

    /// Rebuilds a state machine from a saved state file so an interrupted
    /// workflow can continue. `logger` should be the reopened session log.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be read or parsed, or if the saved state
    /// breaks the phase invariants.
    pub fn resume(
        state_path: &Path,
        logger: Arc<StructuredLogger>,
    ) -> anyhow::Result<(Self, watch::Receiver<StateSnapshot>)> {
        let state = WorkflowState::load(state_path)?;
        state.check_invariants().map_err(|violation| {
            anyhow::anyhow!(
                "Saved state is inconsistent: {}: {}",
                state_path.display(),
                violation
            )
        })?;
        logger.log_workflow_resumed(state.phase().as_str(), state.revision_count());
        Ok(Self::new(state, logger))
    }

    /// All mutations go through this single method.
    ///
    /// The command is applied to a copy of the state and committed only if
    /// it succeeds, so a rejected command leaves the state untouched.
    pub fn apply(&mut self, command: StateCommand) -> Result<Vec<StateEvent>, FactoryError> {
        self.seq += 1;
        self.logger.log_command(self.seq, &command);

        let mut next = self.state.clone();
        let events = match Self::apply_to(&mut next, &command) {
            Ok(events) => events,
            Err(e) => {
                self.logger
                    .log_rejected_command(self.seq, &command, &e.to_string());
                tracing::debug!("rejected command '{}': {}", command.name(), e);
                return Err(e);
            }
        };

        if let Err(violation) = next.check_invariants() {
            tracing::error!(
                "command '{}' would break state invariants: {}",
                command.name(),
                violation
            );
            let err = FactoryError::invalid_input(violation);
            self.logger
                .log_rejected_command(self.seq, &command, &err.to_string());
            return Err(err);
        }

        next.set_updated_at();
        self.state = next;

        for event in &events {
            self.logger.log_event(self.seq, event);
        }
        let _ = self.snapshot_tx.send(StateSnapshot::from(&self.state));

        Ok(events)
    }

    fn apply_to(
        state: &mut WorkflowState,
        command: &StateCommand,
    ) -> Result<Vec<StateEvent>, FactoryError> {
        use StateCommand::*;
        use StateEvent::*;

        let from = state.phase;
        if from.is_terminal() {
            return Err(FactoryError::invalid_input(format!(
                "cannot {}: workflow is already {}",
                command.name(),
                from
            )));
        }
        let require = |expected: &[Phase]| {
            if expected.contains(&from) {
                Ok(())
            } else {
                Err(FactoryError::wrong_phase(command.name(), expected, from))
            }
        };

        match command {
            CompleteConsulting { strategy_options } => {
                require(&[Phase::Consulting])?;
                if strategy_options.trim().is_empty() {
                    return Err(FactoryError::invalid_input(
                        "strategy options must not be empty",
                    ));
                }
                state.strategy_options = Some(strategy_options.trim().to_string());
                state.transition(Phase::AwaitingStrategy)?;
                Ok(vec![
                    StrategyOptionsRecorded {
                        length: strategy_options.trim().len(),
                    },
                    PhaseChanged {
                        from,
                        to: state.phase,
                    },
                ])
            }

            ChooseStrategy { strategy } => {
                require(&[Phase::AwaitingStrategy])?;
                let strategy = strategy.trim();
                if strategy.is_empty() {
                    return Err(FactoryError::invalid_input("strategy choice must not be empty"));
                }
                state.chosen_strategy = Some(strategy.to_string());
                state.transition(Phase::Designing)?;
                Ok(vec![
                    StrategyChosen {
                        strategy_preview: preview(strategy),
                    },
                    PhaseChanged {
                        from,
                        to: state.phase,
                    },
                ])
            }

            AcceptBlueprint { blueprint } => {
                require(&[Phase::Designing, Phase::Revising])?;
                state.blueprint = Some(blueprint.clone());
                let mut events = vec![BlueprintAccepted {
                    system_name: blueprint.system_name.clone(),
                    agent_count: blueprint.agents.len(),
                }];
                if state.pending_feedback.take().is_some() {
                    events.push(FeedbackConsumed);
                }
                state.transition(Phase::AwaitingApproval)?;
                events.push(PhaseChanged {
                    from,
                    to: state.phase,
                });
                Ok(events)
            }

            Approve => {
                require(&[Phase::AwaitingApproval])?;
                state.transition(Phase::Approved)?;
                Ok(vec![PhaseChanged {
                    from,
                    to: state.phase,
                }])
            }

            RequestRevision { feedback } => {
                require(&[Phase::AwaitingApproval])?;
                let feedback = feedback.trim();
                if feedback.is_empty() {
                    return Err(FactoryError::invalid_input(
                        "revision feedback must not be empty",
                    ));
                }
                state.pending_feedback = Some(feedback.to_string());
                state.revision_count += 1;
                state.transition(Phase::Revising)?;
                Ok(vec![
                    RevisionRequested {
                        revision: state.revision_count,
                        feedback_preview: preview(feedback),
                    },
                    PhaseChanged {
                        from,
                        to: state.phase,
                    },
                ])
            }

            ForceApprove { warning } => {
                require(&[Phase::AwaitingApproval])?;
                state.warnings.push(warning.clone());
                state.transition(Phase::Approved)?;
                Ok(vec![
                    RevisionCapReached {
                        revisions: state.revision_count,
                    },
                    WarningRecorded {
                        message: warning.clone(),
                    },
                    PhaseChanged {
                        from,
                        to: state.phase,
                    },
                ])
            }

            CompleteBuild { code } => {
                require(&[Phase::Approved])?;
                if code.trim().is_empty() {
                    return Err(FactoryError::invalid_input("generated code must not be empty"));
                }
                state.generated_code = Some(code.clone());
                state.transition(Phase::Building)?;
                Ok(vec![
                    CodeGenerated { bytes: code.len() },
                    PhaseChanged {
                        from,
                        to: state.phase,
                    },
                ])
            }

            Finish => {
                require(&[Phase::Building])?;
                state.transition(Phase::Done)?;
                Ok(vec![
                    PhaseChanged {
                        from,
                        to: state.phase,
                    },
                    WorkflowComplete {
                        revisions: state.revision_count,
                    },
                ])
            }

            Fail { reason } => {
                let reason = if reason.trim().is_empty() {
                    "unknown failure".to_string()
                } else {
                    reason.trim().to_string()
                };
                // Code only survives into DONE.
                state.generated_code = None;
                state.failure_reason = Some(reason.clone());
                state.transition(Phase::Failed)?;
                Ok(vec![
                    PhaseChanged {
                        from,
                        to: state.phase,
                    },
                    WorkflowFailed { reason },
                ])
            }

            RecordWarning { message } => {
                state.warnings.push(message.clone());
                Ok(vec![WarningRecorded {
                    message: message.clone(),
                }])
            }
        }
    }

    pub fn state(&self) -> &WorkflowState {
        &self.state
    }

    /// A fresh receiver for state snapshots.
    pub fn subscribe(&self) -> watch::Receiver<StateSnapshot> {
        self.snapshot_tx.subscribe()
    }

    pub fn logger(&self) -> &Arc<StructuredLogger> {
        &self.logger
    }

    /// Save state to disk atomically.
    pub fn save(&self, state_path: &Path) -> anyhow::Result<()> {
        self.state.save_atomic(state_path)
    }
}

#[cfg(test)]
#[path = "tests/state_machine_tests.rs"]
mod tests;
