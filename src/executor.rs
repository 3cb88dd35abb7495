//! Dynamic execution of generated agents.
//!
//! Nothing in the workflow itself runs generated code; this is used by the
//! `run` command after an artifact has been saved.

use crate::agents::runner::{run_process, RunnerConfig};
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;
use tokio::process::Command;

const RESULT_MARKER: &str = "__AGENT_FACTORY_RESULT__";
const MISSING_MARKER: &str = "__AGENT_FACTORY_MISSING__";
const ERROR_MARKER: &str = "__AGENT_FACTORY_ERROR__";

pub const DEFAULT_EXECUTION_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExecutionError {
    #[error("entry point `{name}` is not defined by the loaded module")]
    EntryPointMissing { name: String },

    #[error("agent execution failed: {detail}")]
    RuntimeExecution { detail: String },
}

impl ExecutionError {
    fn runtime(detail: impl Into<String>) -> Self {
        Self::RuntimeExecution {
            detail: detail.into(),
        }
    }
}

/// Loads saved code, resolves its entry point and invokes it with a query.
#[async_trait]
pub trait DynamicExecutor: Send + Sync {
    async fn execute(
        &self,
        code_path: &Path,
        entry_point: &str,
        query: &str,
    ) -> Result<String, ExecutionError>;
}

/// Runs generated Python modules in a `python3` subprocess.
///
/// The entry point may be a function (sync or async), a class (instantiated
/// without arguments), or an object with a `run` or `invoke` method.
pub struct PythonExecutor {
    interpreter: String,
    timeout: Duration,
}

impl Default for PythonExecutor {
    fn default() -> Self {
        Self {
            interpreter: "python3".to_string(),
            timeout: DEFAULT_EXECUTION_TIMEOUT,
        }
    }
}

impl PythonExecutor {
    pub fn new(interpreter: impl Into<String>, timeout: Duration) -> Self {
        Self {
            interpreter: interpreter.into(),
            timeout,
        }
    }
}

/// Python harness: argv is `<module path> <entry point> <query>`.
const PYTHON_HARNESS: &str = r#"
import asyncio, importlib.util, inspect, json, sys

path, entry, query = sys.argv[1], sys.argv[2], sys.argv[3]

def report(marker, payload=None):
    line = marker if payload is None else marker + " " + json.dumps(payload)
    print(line, flush=True)

async def settle(value):
    return await value

try:
    spec = importlib.util.spec_from_file_location("generated_agent", path)
    module = importlib.util.module_from_spec(spec)
    spec.loader.exec_module(module)
except BaseException as exc:
    report("__AGENT_FACTORY_ERROR__", "failed to load module: %s: %s" % (type(exc).__name__, exc))
    sys.exit(0)

if not hasattr(module, entry):
    report("__AGENT_FACTORY_MISSING__")
    sys.exit(0)

try:
    target = getattr(module, entry)
    if inspect.isclass(target):
        target = target()
    if hasattr(target, "run"):
        call = target.run
    elif hasattr(target, "invoke"):
        call = target.invoke
    elif callable(target):
        call = target
    else:
        raise TypeError("%s is not callable and has no run or invoke method" % entry)
    result = call(query)
    if inspect.isawaitable(result):
        result = asyncio.run(settle(result))
    report("__AGENT_FACTORY_RESULT__", result if isinstance(result, str) else repr(result))
except BaseException as exc:
    report("__AGENT_FACTORY_ERROR__", "%s: %s" % (type(exc).__name__, exc))
"#;

/// Interprets harness stdout. The last marker line wins.
pub fn parse_harness_output(
    stdout: &str,
    entry_point: &str,
) -> Option<Result<String, ExecutionError>> {
    stdout.lines().rev().find_map(|line| {
        let line = line.trim_end();
        if line == MISSING_MARKER {
            return Some(Err(ExecutionError::EntryPointMissing {
                name: entry_point.to_string(),
            }));
        }
        if let Some(payload) = line.strip_prefix(RESULT_MARKER) {
            return Some(decode_payload(payload));
        }
        if let Some(payload) = line.strip_prefix(ERROR_MARKER) {
            return Some(match decode_payload(payload) {
                Ok(detail) => Err(ExecutionError::runtime(detail)),
                Err(e) => Err(e),
            });
        }
        None
    })
}

fn decode_payload(payload: &str) -> Result<String, ExecutionError> {
    serde_json::from_str::<String>(payload.trim())
        .map_err(|e| ExecutionError::runtime(format!("unreadable harness output: {}", e)))
}

#[async_trait]
impl DynamicExecutor for PythonExecutor {
    async fn execute(
        &self,
        code_path: &Path,
        entry_point: &str,
        query: &str,
    ) -> Result<String, ExecutionError> {
        which::which(&self.interpreter).map_err(|_| {
            ExecutionError::runtime(format!("'{}' not found on PATH", self.interpreter))
        })?;
        if !code_path.is_file() {
            return Err(ExecutionError::runtime(format!(
                "code file not found: {}",
                code_path.display()
            )));
        }

        let mut cmd = Command::new(&self.interpreter);
        cmd.arg("-c")
            .arg(PYTHON_HARNESS)
            .arg(code_path)
            .arg(entry_point)
            .arg(query);

        let config = RunnerConfig::new(self.interpreter.clone())
            .with_activity_timeout(self.timeout)
            .with_overall_timeout(self.timeout);

        tracing::info!(path = %code_path.display(), entry_point, "executing generated agent");
        let output = run_process(cmd, None, &config)
            .await
            .map_err(|e| ExecutionError::runtime(format!("{:#}", e)))?;

        match parse_harness_output(&output.stdout, entry_point) {
            Some(result) => result,
            None => Err(ExecutionError::runtime(format!(
                "interpreter exited with {:?}: {}",
                output.exit_code,
                output.stderr.trim()
            ))),
        }
    }
}

#[cfg(test)]
#[path = "tests/executor_tests.rs"]
mod tests;
