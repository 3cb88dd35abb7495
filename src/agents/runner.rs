//! Process spawning, I/O handling and timeout management for agent CLIs.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::time::Instant;

/// Default timeout for activity (no output) before killing the process.
pub const DEFAULT_ACTIVITY_TIMEOUT: Duration = Duration::from_secs(300);

/// Default overall timeout for one invocation.
pub const DEFAULT_OVERALL_TIMEOUT: Duration = Duration::from_secs(1800);

/// Timeout for waiting for the process to exit after streams close.
pub const PROCESS_WAIT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Agent name for logging
    pub agent_name: String,
    pub working_dir: Option<PathBuf>,
    pub activity_timeout: Duration,
    pub overall_timeout: Duration,
}

impl RunnerConfig {
    pub fn new(agent_name: impl Into<String>) -> Self {
        Self {
            agent_name: agent_name.into(),
            working_dir: None,
            activity_timeout: DEFAULT_ACTIVITY_TIMEOUT,
            overall_timeout: DEFAULT_OVERALL_TIMEOUT,
        }
    }

    pub fn with_working_dir(mut self, dir: PathBuf) -> Self {
        self.working_dir = Some(dir);
        self
    }

    pub fn with_activity_timeout(mut self, timeout: Duration) -> Self {
        self.activity_timeout = timeout;
        self
    }

    pub fn with_overall_timeout(mut self, timeout: Duration) -> Self {
        self.overall_timeout = timeout;
        self
    }
}

/// Captured result of a finished process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub success: bool,
}

impl ProcessOutput {
    /// Stdout followed by stderr, for failure classification.
    pub fn combined(&self) -> String {
        if self.stderr.is_empty() {
            self.stdout.clone()
        } else {
            format!("{}\n{}", self.stdout, self.stderr)
        }
    }
}

/// Runs a process to completion, optionally feeding `stdin_input`.
///
/// Stdout and stderr are read line by line. The process is killed when it
/// produces no output for `activity_timeout` or runs past `overall_timeout`.
pub async fn run_process(
    mut command: Command,
    stdin_input: Option<String>,
    config: &RunnerConfig,
) -> Result<ProcessOutput> {
    if let Some(dir) = &config.working_dir {
        command.current_dir(dir);
    }
    command
        .stdin(if stdin_input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    tracing::debug!(agent = %config.agent_name, "spawning agent process");
    let mut child = command
        .spawn()
        .with_context(|| format!("Failed to spawn {} process", config.agent_name))?;

    if let Some(input) = stdin_input {
        let mut stdin = child
            .stdin
            .take()
            .context("Failed to get stdin from process")?;
        let agent_name = config.agent_name.clone();
        tokio::spawn(async move {
            if let Err(e) = stdin.write_all(input.as_bytes()).await {
                tracing::debug!(agent = %agent_name, "failed to write prompt to stdin: {}", e);
            }
            // Dropping stdin closes the pipe so the process sees EOF.
        });
    }

    let stdout = child
        .stdout
        .take()
        .context("Failed to get stdout from process")?;
    let stderr = child
        .stderr
        .take()
        .context("Failed to get stderr from process")?;

    let mut stdout_reader = BufReader::new(stdout).lines();
    let mut stderr_reader = BufReader::new(stderr).lines();

    let mut stdout_buf = String::new();
    let mut stderr_buf = String::new();
    let mut stderr_open = true;

    let overall_deadline = Instant::now() + config.overall_timeout;
    let mut last_activity = Instant::now();

    loop {
        let activity_deadline = last_activity + config.activity_timeout;
        let deadline = activity_deadline.min(overall_deadline);

        tokio::select! {
            line = stdout_reader.next_line() => {
                last_activity = Instant::now();
                match line {
                    Ok(Some(line)) => {
                        stdout_buf.push_str(&line);
                        stdout_buf.push('\n');
                    }
                    Ok(None) => break,
                    Err(e) => {
                        tracing::warn!(agent = %config.agent_name, "failed to read stdout: {}", e);
                        break;
                    }
                }
            }
            line = stderr_reader.next_line(), if stderr_open => {
                last_activity = Instant::now();
                match line {
                    Ok(Some(line)) => {
                        tracing::trace!(agent = %config.agent_name, "[stderr] {}", line);
                        stderr_buf.push_str(&line);
                        stderr_buf.push('\n');
                    }
                    _ => stderr_open = false,
                }
            }
            _ = tokio::time::sleep_until(deadline) => {
                let _ = child.kill().await;
                if Instant::now() >= overall_deadline {
                    anyhow::bail!(
                        "{} invocation exceeded overall timeout of {:?}",
                        config.agent_name,
                        config.overall_timeout
                    );
                }
                anyhow::bail!(
                    "{} subprocess became unresponsive (no output for {:?})",
                    config.agent_name,
                    config.activity_timeout
                );
            }
        }
    }

    // Stdout is closed; collect what is left on stderr without blocking forever.
    if stderr_open {
        let drain = async {
            while let Ok(Some(line)) = stderr_reader.next_line().await {
                stderr_buf.push_str(&line);
                stderr_buf.push('\n');
            }
        };
        let _ = tokio::time::timeout(PROCESS_WAIT_TIMEOUT, drain).await;
    }

    let status = wait_for_process(config, &mut child).await?;
    tracing::debug!(agent = %config.agent_name, "agent process exited: {}", status);

    Ok(ProcessOutput {
        stdout: stdout_buf,
        stderr: stderr_buf,
        exit_code: status.code(),
        success: status.success(),
    })
}

async fn wait_for_process(
    config: &RunnerConfig,
    child: &mut Child,
) -> Result<std::process::ExitStatus> {
    match tokio::time::timeout(PROCESS_WAIT_TIMEOUT, child.wait()).await {
        Ok(Ok(status)) => Ok(status),
        Ok(Err(e)) => {
            anyhow::bail!("Failed to wait for {} process: {}", config.agent_name, e);
        }
        Err(_) => {
            tracing::warn!(
                agent = %config.agent_name,
                "process did not exit within {:?} after stream closed, force killing",
                PROCESS_WAIT_TIMEOUT
            );
            let _ = child.kill().await;
            anyhow::bail!(
                "{} process did not exit within {:?} after stream closed",
                config.agent_name,
                PROCESS_WAIT_TIMEOUT
            );
        }
    }
}

#[cfg(test)]
#[path = "tests/runner_tests.rs"]
mod tests;
