//! Structured JSONL logger for debugging and workflow reconstruction.
//!
//! Every line is one [`LogEntry`] with:
//! - Monotonic sequence numbers for ordering
//! - ISO 8601 timestamps with microsecond precision
//! - Session and run IDs for correlation
//! - Structured event data in JSON format

use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use crate::state_machine::{StateCommand, StateEvent};

pub struct StructuredLogger {
    session_id: String,
    run_id: AtomicU64,
    seq: AtomicU64,
    log_file: Mutex<File>,
    log_path: PathBuf,
}

/// A single log entry in JSONL format.
#[derive(Serialize, serde::Deserialize)]
pub struct LogEntry {
    /// Monotonic sequence number (unique across entire session)
    pub seq: u64,
    /// ISO 8601 timestamp with microseconds
    pub ts: String,
    pub session_id: String,
    /// Run ID (increments when a session is resumed)
    pub run_id: u64,
    /// Component that emitted the log
    pub component: String,
    pub event: Value,
}

impl StructuredLogger {
    /// Creates a logger writing to `<logs_dir>/events.jsonl`.
    ///
    /// # Errors
    ///
    /// Returns an error if the logs directory cannot be created or the log
    /// file cannot be opened.
    pub fn new(session_id: &str, logs_dir: &Path) -> anyhow::Result<Self> {
        std::fs::create_dir_all(logs_dir)?;
        let log_path = logs_dir.join("events.jsonl");
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&log_path)?;

        Ok(Self {
            session_id: session_id.to_string(),
            run_id: AtomicU64::new(1),
            seq: AtomicU64::new(0),
            log_file: Mutex::new(file),
            log_path,
        })
    }

    /// Reopens an existing session log and starts the next run in it.
    ///
    /// Sequence numbers continue after the highest one on disk; lines that do
    /// not parse are skipped.
    pub fn reopen(session_id: &str, logs_dir: &Path) -> anyhow::Result<Self> {
        let logger = Self::new(session_id, logs_dir)?;
        let content = std::fs::read_to_string(&logger.log_path)?;
        let (last_run, last_seq) = content
            .lines()
            .filter_map(|line| serde_json::from_str::<LogEntry>(line).ok())
            .fold((1, 0), |(run, seq), entry| {
                (run.max(entry.run_id), seq.max(entry.seq))
            });
        logger.run_id.store(last_run, Ordering::SeqCst);
        logger.seq.store(last_seq, Ordering::SeqCst);
        logger.increment_run_id();
        Ok(logger)
    }

    pub fn increment_run_id(&self) {
        self.run_id.fetch_add(1, Ordering::SeqCst);
    }

    pub fn run_id(&self) -> u64 {
        self.run_id.load(Ordering::SeqCst)
    }

    fn next_seq(&self) -> u64 {
        self.seq.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Logs a structured event as a single line. Thread-safe.
    pub fn log(&self, component: &str, event: impl Serialize) {
        let entry = LogEntry {
            seq: self.next_seq(),
            ts: Utc::now().format("%Y-%m-%dT%H:%M:%S%.6fZ").to_string(),
            session_id: self.session_id.clone(),
            run_id: self.run_id.load(Ordering::SeqCst),
            component: component.to_string(),
            event: serde_json::to_value(event).unwrap_or(Value::Null),
        };

        if let Ok(mut file) = self.log_file.lock() {
            if let Ok(line) = serde_json::to_string(&entry) {
                let _ = writeln!(file, "{}", line);
                let _ = file.flush();
            }
        }
    }

    /// Logs a command received by the state machine.
    pub fn log_command(&self, machine_seq: u64, command: &StateCommand) {
        self.log(
            "StateMachine",
            serde_json::json!({
                "type": "Command",
                "machine_seq": machine_seq,
                "command": command
            }),
        );
    }

    /// Logs an event emitted by the state machine.
    pub fn log_event(&self, machine_seq: u64, event: &StateEvent) {
        self.log(
            "StateMachine",
            serde_json::json!({
                "type": "Event",
                "machine_seq": machine_seq,
                "event": event
            }),
        );
    }

    /// Logs a command the state machine refused.
    pub fn log_rejected_command(&self, machine_seq: u64, command: &StateCommand, reason: &str) {
        self.log(
            "StateMachine",
            serde_json::json!({
                "type": "Rejected",
                "machine_seq": machine_seq,
                "command": command,
                "reason": reason
            }),
        );
    }

    pub fn log_agent_invocation(&self, agent: &str, task: &str) {
        self.log(
            "Agent",
            serde_json::json!({
                "type": "Invocation",
                "agent": agent,
                "task": task
            }),
        );
    }

    pub fn log_agent_complete(&self, agent: &str, success: bool, detail: Option<&str>) {
        self.log(
            "Agent",
            serde_json::json!({
                "type": "Complete",
                "agent": agent,
                "success": success,
                "detail": detail
            }),
        );
    }

    /// Logs a decision read from the human input channel.
    pub fn log_human_input(&self, kind: &str, summary: &str) {
        self.log(
            "Human",
            serde_json::json!({
                "type": "Input",
                "kind": kind,
                "summary": summary
            }),
        );
    }

    pub fn log_artifact_saved(&self, kind: &str, path: &Path) {
        self.log(
            "Storage",
            serde_json::json!({
                "type": "Saved",
                "kind": kind,
                "path": path.display().to_string()
            }),
        );
    }

    pub fn log_workflow_resumed(&self, phase: &str, revision_count: u32) {
        self.log(
            "Workflow",
            serde_json::json!({
                "type": "WorkflowResumed",
                "phase": phase,
                "revision_count": revision_count
            }),
        );
    }

    pub fn log_workflow_complete(&self, result: &str) {
        self.log(
            "Workflow",
            serde_json::json!({
                "type": "WorkflowComplete",
                "result": result
            }),
        );
    }

    pub fn path(&self) -> &PathBuf {
        &self.log_path
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }
}

#[cfg(test)]
#[path = "tests/structured_logger_tests.rs"]
mod tests;
