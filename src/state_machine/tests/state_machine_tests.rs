//! Tests for the workflow state machine.

use super::*;
use crate::blueprint::{AgentSpec, FlowType, StructuredBlueprint};
use std::collections::BTreeSet;
use tempfile::TempDir;

fn create_test_machine() -> (WorkflowStateMachine, watch::Receiver<StateSnapshot>, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let logger = Arc::new(
        StructuredLogger::new("test-session", &temp_dir.path().join("logs"))
            .expect("Failed to create logger"),
    );
    let state = WorkflowState::new("Build me a shopping assistant").expect("valid request");
    let (machine, snapshot_rx) = WorkflowStateMachine::new(state, logger);
    (machine, snapshot_rx, temp_dir)
}

fn blueprint(name: &str) -> StructuredBlueprint {
    StructuredBlueprint {
        system_name: name.to_string(),
        description: None,
        flow_type: FlowType::Sequential,
        agents: vec![AgentSpec {
            name: "SearchAgent".to_string(),
            role: "Find products".to_string(),
            tools: BTreeSet::new(),
            dependencies: BTreeSet::new(),
        }],
    }
}

fn advance_to_approval(machine: &mut WorkflowStateMachine) {
    machine
        .apply(StateCommand::CompleteConsulting {
            strategy_options: "1. Single agent\n2. Team of agents".to_string(),
        })
        .unwrap();
    machine
        .apply(StateCommand::ChooseStrategy {
            strategy: "2".to_string(),
        })
        .unwrap();
    machine
        .apply(StateCommand::AcceptBlueprint {
            blueprint: blueprint("Shop"),
        })
        .unwrap();
}

#[test]
fn test_consulting_to_awaiting_strategy() {
    let (mut machine, snapshot_rx, _temp) = create_test_machine();
    assert_eq!(machine.state().phase(), Phase::Consulting);

    let events = machine
        .apply(StateCommand::CompleteConsulting {
            strategy_options: "  options  ".to_string(),
        })
        .unwrap();

    assert!(events.contains(&StateEvent::PhaseChanged {
        from: Phase::Consulting,
        to: Phase::AwaitingStrategy,
    }));
    assert_eq!(machine.state().strategy_options(), Some("options"));
    assert_eq!(snapshot_rx.borrow().phase, Phase::AwaitingStrategy);
}

#[test]
fn test_full_happy_path() {
    let (mut machine, snapshot_rx, _temp) = create_test_machine();
    advance_to_approval(&mut machine);
    assert_eq!(machine.state().phase(), Phase::AwaitingApproval);
    assert_eq!(machine.state().chosen_strategy(), Some("2"));

    machine.apply(StateCommand::Approve).unwrap();
    machine
        .apply(StateCommand::CompleteBuild {
            code: "root_agent = 1\n".to_string(),
        })
        .unwrap();
    assert_eq!(machine.state().phase(), Phase::Building);

    let events = machine.apply(StateCommand::Finish).unwrap();
    assert!(events.contains(&StateEvent::WorkflowComplete { revisions: 0 }));
    assert_eq!(machine.state().phase(), Phase::Done);
    assert_eq!(machine.state().generated_code(), Some("root_agent = 1\n"));
    assert!(machine.state().check_invariants().is_ok());

    let snapshot = snapshot_rx.borrow();
    assert_eq!(snapshot.phase, Phase::Done);
    assert!(snapshot.has_code);
    assert_eq!(snapshot.blueprint_summary.as_deref().map(|s| s.starts_with("Shop")), Some(true));
}

#[test]
fn test_wrong_phase_is_rejected_without_mutation() {
    let (mut machine, _rx, _temp) = create_test_machine();
    let before = machine.state().clone();

    let err = machine.apply(StateCommand::Approve).unwrap_err();
    assert!(matches!(err, FactoryError::InvalidInput { .. }));
    assert!(err.to_string().contains("awaiting_approval"));
    assert_eq!(machine.state(), &before);
}

#[test]
fn test_empty_inputs_are_rejected() {
    let (mut machine, _rx, _temp) = create_test_machine();
    assert!(machine
        .apply(StateCommand::CompleteConsulting {
            strategy_options: " ".to_string()
        })
        .is_err());

    machine
        .apply(StateCommand::CompleteConsulting {
            strategy_options: "options".to_string(),
        })
        .unwrap();
    let err = machine
        .apply(StateCommand::ChooseStrategy {
            strategy: "\n".to_string(),
        })
        .unwrap_err();
    assert!(matches!(err, FactoryError::InvalidInput { .. }));
    assert_eq!(machine.state().phase(), Phase::AwaitingStrategy);
}

#[test]
fn test_revision_records_feedback_and_counts() {
    let (mut machine, _rx, _temp) = create_test_machine();
    advance_to_approval(&mut machine);

    let events = machine
        .apply(StateCommand::RequestRevision {
            feedback: "add a payment agent".to_string(),
        })
        .unwrap();
    assert_eq!(machine.state().phase(), Phase::Revising);
    assert_eq!(machine.state().revision_count(), 1);
    assert_eq!(machine.state().pending_feedback(), Some("add a payment agent"));
    assert!(matches!(
        events[0],
        StateEvent::RevisionRequested { revision: 1, .. }
    ));

    let events = machine
        .apply(StateCommand::AcceptBlueprint {
            blueprint: blueprint("Shop v2"),
        })
        .unwrap();
    assert!(events.contains(&StateEvent::FeedbackConsumed));
    assert!(machine.state().pending_feedback().is_none());
    assert_eq!(machine.state().blueprint().unwrap().system_name, "Shop v2");
    assert_eq!(machine.state().revision_count(), 1);
}

#[test]
fn test_empty_feedback_is_rejected() {
    let (mut machine, _rx, _temp) = create_test_machine();
    advance_to_approval(&mut machine);
    assert!(machine
        .apply(StateCommand::RequestRevision {
            feedback: "   ".to_string()
        })
        .is_err());
    assert_eq!(machine.state().revision_count(), 0);
    assert_eq!(machine.state().phase(), Phase::AwaitingApproval);
}

#[test]
fn test_force_approve_records_warning() {
    let (mut machine, _rx, _temp) = create_test_machine();
    advance_to_approval(&mut machine);

    let events = machine
        .apply(StateCommand::ForceApprove {
            warning: "revision limit reached".to_string(),
        })
        .unwrap();
    assert!(matches!(events[0], StateEvent::RevisionCapReached { .. }));
    assert_eq!(machine.state().phase(), Phase::Approved);
    assert_eq!(machine.state().warnings(), ["revision limit reached".to_string()]);
}

#[test]
fn test_fail_sets_reason_and_is_terminal() {
    let (mut machine, snapshot_rx, _temp) = create_test_machine();
    machine
        .apply(StateCommand::Fail {
            reason: "service down".to_string(),
        })
        .unwrap();
    assert_eq!(machine.state().phase(), Phase::Failed);
    assert_eq!(machine.state().failure_reason(), Some("service down"));
    assert_eq!(
        snapshot_rx.borrow().failure_reason.as_deref(),
        Some("service down")
    );

    for command in [
        StateCommand::Approve,
        StateCommand::Fail {
            reason: "again".to_string(),
        },
        StateCommand::RecordWarning {
            message: "late".to_string(),
        },
    ] {
        let err = machine.apply(command).unwrap_err();
        assert!(matches!(err, FactoryError::InvalidInput { .. }));
    }
    assert_eq!(machine.state().failure_reason(), Some("service down"));
    assert!(machine.state().warnings().is_empty());
}

#[test]
fn test_done_is_terminal() {
    let (mut machine, _rx, _temp) = create_test_machine();
    advance_to_approval(&mut machine);
    machine.apply(StateCommand::Approve).unwrap();
    machine
        .apply(StateCommand::CompleteBuild {
            code: "root_agent = 1".to_string(),
        })
        .unwrap();
    machine.apply(StateCommand::Finish).unwrap();

    let err = machine
        .apply(StateCommand::RequestRevision {
            feedback: "one more thing".to_string(),
        })
        .unwrap_err();
    assert!(err.to_string().contains("already done"));
}

#[test]
fn test_fail_from_building_drops_code() {
    let (mut machine, _rx, _temp) = create_test_machine();
    advance_to_approval(&mut machine);
    machine.apply(StateCommand::Approve).unwrap();
    machine
        .apply(StateCommand::CompleteBuild {
            code: "root_agent = 1".to_string(),
        })
        .unwrap();
    machine
        .apply(StateCommand::Fail {
            reason: "interrupted".to_string(),
        })
        .unwrap();
    assert!(machine.state().generated_code().is_none());
    assert!(machine.state().check_invariants().is_ok());
}

#[test]
fn test_commands_and_events_are_logged() {
    let (mut machine, _rx, temp) = create_test_machine();
    machine
        .apply(StateCommand::CompleteConsulting {
            strategy_options: "options".to_string(),
        })
        .unwrap();
    let _ = machine.apply(StateCommand::Finish);

    let content = std::fs::read_to_string(temp.path().join("logs").join("events.jsonl")).unwrap();
    assert!(content.contains("\"Command\""));
    assert!(content.contains("\"PhaseChanged\""));
    assert!(content.contains("\"Rejected\""));
}

#[test]
fn test_subscribe_and_save() {
    let (mut machine, _rx, temp) = create_test_machine();
    let late_rx = machine.subscribe();
    machine
        .apply(StateCommand::CompleteConsulting {
            strategy_options: "options".to_string(),
        })
        .unwrap();
    assert_eq!(late_rx.borrow().phase, Phase::AwaitingStrategy);

    let path = temp.path().join("state.json");
    machine.save(&path).unwrap();
    let loaded = WorkflowState::load(&path).unwrap();
    assert_eq!(&loaded, machine.state());
}

#[test]
fn test_resume_restores_saved_state() {
    let (mut machine, _rx, temp) = create_test_machine();
    advance_to_approval(&mut machine);
    let path = temp.path().join("state.json");
    machine.save(&path).unwrap();

    let logger = Arc::new(StructuredLogger::reopen("test-session", &temp.path().join("logs")).unwrap());
    let (resumed, rx) = WorkflowStateMachine::resume(&path, logger).unwrap();
    assert_eq!(resumed.state(), machine.state());
    assert_eq!(rx.borrow().phase, Phase::AwaitingApproval);

    let content = std::fs::read_to_string(resumed.logger().path()).unwrap();
    assert!(content.contains("\"WorkflowResumed\""));
}

#[test]
fn test_resume_rejects_inconsistent_state() {
    let temp = TempDir::new().unwrap();
    let mut state = WorkflowState::new("Build me a shopping assistant").unwrap();
    state.phase = Phase::AwaitingApproval;
    let path = temp.path().join("state.json");
    state.save_atomic(&path).unwrap();

    let logger = Arc::new(StructuredLogger::new("test-session", temp.path()).unwrap());
    let Err(err) = WorkflowStateMachine::resume(&path, logger) else {
        panic!("inconsistent state should not resume");
    };
    assert!(err.to_string().contains("requires a blueprint"));
}
