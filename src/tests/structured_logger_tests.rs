use super::*;
use crate::state::Phase;
use tempfile::TempDir;

fn create_test_logger() -> (StructuredLogger, TempDir) {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");
    let logger =
        StructuredLogger::new("test-session", temp_dir.path()).expect("Failed to create logger");
    (logger, temp_dir)
}

fn read_entries(temp_dir: &TempDir) -> Vec<LogEntry> {
    let content = std::fs::read_to_string(temp_dir.path().join("events.jsonl"))
        .expect("Failed to read log file");
    content
        .lines()
        .map(|line| serde_json::from_str(line).expect("Failed to parse log entry"))
        .collect()
}

#[test]
fn test_log_entries_are_valid_json() {
    let (logger, temp_dir) = create_test_logger();

    logger.log("TestComponent", serde_json::json!({"key": "value1"}));
    logger.log("TestComponent", serde_json::json!({"key": "value2"}));

    let entries = read_entries(&temp_dir);
    assert_eq!(entries.len(), 2);
    for entry in entries {
        assert_eq!(entry.session_id, "test-session");
        assert_eq!(entry.component, "TestComponent");
    }
}

#[test]
fn test_sequence_numbers_monotonic() {
    let (logger, temp_dir) = create_test_logger();

    for i in 0..10 {
        logger.log("Test", serde_json::json!({"iteration": i}));
    }

    let mut prev_seq = 0u64;
    for entry in read_entries(&temp_dir) {
        assert!(
            entry.seq > prev_seq,
            "Sequence numbers should be monotonically increasing"
        );
        prev_seq = entry.seq;
    }
}

#[test]
fn test_run_id_increments() {
    let (logger, temp_dir) = create_test_logger();

    logger.log("Test", serde_json::json!({"msg": "first"}));
    logger.increment_run_id();
    logger.log("Test", serde_json::json!({"msg": "second"}));

    let entries = read_entries(&temp_dir);
    assert_eq!(entries[0].run_id, 1);
    assert_eq!(entries[1].run_id, 2);
}

#[test]
fn test_reopen_continues_session_log() {
    let (logger, temp_dir) = create_test_logger();
    logger.log("Test", serde_json::json!({"msg": "first run"}));
    logger.log("Test", serde_json::json!({"msg": "first run again"}));
    drop(logger);

    let reopened = StructuredLogger::reopen("test-session", temp_dir.path()).unwrap();
    assert_eq!(reopened.run_id(), 2);
    reopened.log_workflow_resumed("awaiting_approval", 1);
    drop(reopened);

    let third = StructuredLogger::reopen("test-session", temp_dir.path()).unwrap();
    assert_eq!(third.run_id(), 3);
    third.log("Test", serde_json::json!({"msg": "third run"}));

    let entries = read_entries(&temp_dir);
    let seqs: Vec<u64> = entries.iter().map(|e| e.seq).collect();
    let runs: Vec<u64> = entries.iter().map(|e| e.run_id).collect();
    assert_eq!(seqs, vec![1, 2, 3, 4]);
    assert_eq!(runs, vec![1, 1, 2, 3]);
    assert_eq!(entries[2].event["type"], "WorkflowResumed");
    assert_eq!(entries[2].event["phase"], "awaiting_approval");
}

#[test]
fn test_concurrent_logging() {
    use std::sync::Arc;
    use std::thread;

    let (logger, temp_dir) = create_test_logger();
    let logger = Arc::new(logger);

    let handles: Vec<_> = (0..5)
        .map(|t| {
            let logger = Arc::clone(&logger);
            thread::spawn(move || {
                for i in 0..20 {
                    logger.log("Thread", serde_json::json!({"thread": t, "iteration": i}));
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().expect("Thread panicked");
    }

    assert_eq!(read_entries(&temp_dir).len(), 100);
}

#[test]
fn test_timestamp_format() {
    let (logger, temp_dir) = create_test_logger();
    logger.log("Test", serde_json::json!({"msg": "test"}));

    let entry = read_entries(&temp_dir).remove(0);
    assert!(entry.ts.contains('T'));
    assert!(entry.ts.ends_with('Z'));
    let micros_part = entry.ts.split('.').nth(1).unwrap();
    assert_eq!(micros_part.len(), 7); // 6 digits + 'Z'
}

#[test]
fn test_state_machine_logging() {
    let (logger, temp_dir) = create_test_logger();

    logger.log_command(
        1,
        &StateCommand::RequestRevision {
            feedback: "add a payment agent".to_string(),
        },
    );
    logger.log_event(
        1,
        &StateEvent::PhaseChanged {
            from: Phase::AwaitingApproval,
            to: Phase::Revising,
        },
    );
    logger.log_rejected_command(2, &StateCommand::Approve, "wrong phase");

    let entries = read_entries(&temp_dir);
    assert_eq!(entries.len(), 3);
    assert_eq!(entries[0].component, "StateMachine");
    assert_eq!(entries[0].event["type"], "Command");
    assert_eq!(
        entries[0].event["command"]["RequestRevision"]["feedback"],
        "add a payment agent"
    );
    assert_eq!(entries[1].event["event"]["type"], "PhaseChanged");
    assert_eq!(entries[1].event["event"]["to"], "revising");
    assert_eq!(entries[2].event["type"], "Rejected");
    assert_eq!(entries[2].event["reason"], "wrong phase");
}

#[test]
fn test_agent_and_workflow_logging() {
    let (logger, temp_dir) = create_test_logger();

    logger.log_agent_invocation("claude/opus", "architecture");
    logger.log_agent_complete("claude/opus", false, Some("rate limited"));
    logger.log_human_input("approval", "revise");
    logger.log_workflow_complete("done");

    let entries = read_entries(&temp_dir);
    assert_eq!(entries[0].component, "Agent");
    assert_eq!(entries[0].event["task"], "architecture");
    assert_eq!(entries[1].event["success"], false);
    assert_eq!(entries[1].event["detail"], "rate limited");
    assert_eq!(entries[2].component, "Human");
    assert_eq!(entries[3].event["result"], "done");
}

#[test]
fn test_path_and_session_id() {
    let (logger, temp_dir) = create_test_logger();
    assert_eq!(logger.path(), &temp_dir.path().join("events.jsonl"));
    assert_eq!(logger.session_id(), "test-session");
}
