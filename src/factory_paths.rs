//! Home-based storage paths for agent-factory persistence.
//!
//! Everything lives under `~/.agent-factory/` (or `$AGENT_FACTORY_HOME`):
//! - `artifacts/` - Default output directory for blueprints and generated agents
//! - `sessions/<workflow-id>/state.json` - Workflow state snapshots
//! - `sessions/<workflow-id>/logs/` - Structured event logs

use anyhow::{Context, Result};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::PathBuf;

const FACTORY_DIR: &str = ".agent-factory";

/// Overrides the home-based directory when set.
pub const HOME_ENV_VAR: &str = "AGENT_FACTORY_HOME";

/// Returns the agent-factory directory, creating it if needed.
///
/// # Errors
///
/// Returns an error if the home directory cannot be determined or the
/// directory cannot be created.
pub fn factory_home_dir() -> Result<PathBuf> {
    let dir = match std::env::var_os(HOME_ENV_VAR) {
        Some(custom) if !custom.is_empty() => PathBuf::from(custom),
        _ => dirs::home_dir()
            .context("Could not determine home directory for agent-factory storage")?
            .join(FACTORY_DIR),
    };
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create agent-factory directory: {}", dir.display()))?;
    Ok(dir)
}

/// Default artifact directory: `~/.agent-factory/artifacts/`
pub fn artifacts_dir() -> Result<PathBuf> {
    let dir = factory_home_dir()?.join("artifacts");
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create artifacts directory: {}", dir.display()))?;
    Ok(dir)
}

pub fn session_dir(workflow_id: &str) -> Result<PathBuf> {
    let dir = factory_home_dir()?.join("sessions").join(workflow_id);
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create session directory: {}", dir.display()))?;
    Ok(dir)
}

pub fn session_state_path(workflow_id: &str) -> Result<PathBuf> {
    Ok(session_dir(workflow_id)?.join("state.json"))
}

pub fn session_logs_dir(workflow_id: &str) -> Result<PathBuf> {
    let dir = session_dir(workflow_id)?.join("logs");
    fs::create_dir_all(&dir)
        .with_context(|| format!("Failed to create session logs directory: {}", dir.display()))?;
    Ok(dir)
}

/// Lowercase hex SHA-256 of `content`.
pub fn sha256_hex(content: &[u8]) -> String {
    let digest = Sha256::digest(content);
    digest.iter().map(|b| format!("{:02x}", b)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::tempdir;

    #[test]
    fn test_sha256_hex() {
        assert_eq!(
            sha256_hex(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(sha256_hex(b"").len(), 64);
    }

    #[test]
    #[serial]
    fn test_home_override_and_session_layout() {
        let dir = tempdir().unwrap();
        std::env::set_var(HOME_ENV_VAR, dir.path());

        let home = factory_home_dir().unwrap();
        let artifacts = artifacts_dir().unwrap();
        let state = session_state_path("wf-1").unwrap();
        let logs = session_logs_dir("wf-1").unwrap();

        std::env::remove_var(HOME_ENV_VAR);

        assert_eq!(home, dir.path());
        assert_eq!(artifacts, dir.path().join("artifacts"));
        assert!(artifacts.is_dir());
        assert_eq!(state, dir.path().join("sessions/wf-1/state.json"));
        assert!(logs.is_dir());
        assert!(logs.ends_with("sessions/wf-1/logs"));
    }

    #[test]
    #[serial]
    fn test_default_home_uses_dot_dir() {
        std::env::remove_var(HOME_ENV_VAR);
        let home = factory_home_dir().unwrap();
        assert!(home.ends_with(".agent-factory"));
    }
}
