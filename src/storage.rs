//! Artifact storage for blueprints and generated code.
//!
//! [`FileStore`] lays artifacts out as:
//! - `blueprints/<name>.json`
//! - `agents/<name>.<ext>`
//!
//! The orchestrator names artifacts with [`artifact_name`], so each workflow
//! writes its own files.
//! - `manifest.jsonl` - one line per save with kind, path and SHA-256 digest

use crate::factory_paths::sha256_hex;
use crate::validators::TargetLanguage;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// A blueprint shown for approval but not yet approved.
    BlueprintDraft,
    Blueprint,
    Code,
}

impl ArtifactKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArtifactKind::BlueprintDraft => "blueprint_draft",
            ArtifactKind::Blueprint => "blueprint",
            ArtifactKind::Code => "code",
        }
    }
}

impl fmt::Display for ArtifactKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where approved blueprints and generated code are persisted.
pub trait ArtifactStore: Send + Sync {
    /// Saves `content` and returns where it was written.
    fn save(&self, kind: ArtifactKind, name: &str, content: &str) -> Result<PathBuf>;
}

/// One line of `manifest.jsonl`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManifestEntry {
    pub kind: ArtifactKind,
    pub name: String,
    pub path: PathBuf,
    pub sha256: String,
    pub bytes: usize,
    pub saved_at: String,
}

pub struct FileStore {
    root: PathBuf,
    language: TargetLanguage,
    manifest_lock: Mutex<()>,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>, language: TargetLanguage) -> Self {
        Self {
            root: root.into(),
            language,
            manifest_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.root.join("manifest.jsonl")
    }

    /// Relative location for an artifact of `kind` named `name`.
    pub fn relative_path(&self, kind: ArtifactKind, name: &str) -> PathBuf {
        let name = sanitize_name(name);
        match kind {
            ArtifactKind::BlueprintDraft => {
                PathBuf::from("blueprints").join(format!("{}.draft.json", name))
            }
            ArtifactKind::Blueprint => PathBuf::from("blueprints").join(format!("{}.json", name)),
            ArtifactKind::Code => {
                PathBuf::from("agents").join(format!("{}.{}", name, self.language.extension()))
            }
        }
    }

    /// Reads all manifest entries in save order.
    pub fn manifest(&self) -> Result<Vec<ManifestEntry>> {
        let path = self.manifest_path();
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| serde_json::from_str(line).context("Failed to parse manifest entry"))
            .collect()
    }

    fn append_manifest(&self, entry: &ManifestEntry) -> Result<()> {
        let _guard = self
            .manifest_lock
            .lock()
            .map_err(|_| anyhow::anyhow!("manifest lock poisoned"))?;
        let path = self.manifest_path();
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open manifest: {}", path.display()))?;
        let line = serde_json::to_string(entry).context("Failed to serialize manifest entry")?;
        writeln!(file, "{}", line)
            .with_context(|| format!("Failed to append to manifest: {}", path.display()))?;
        Ok(())
    }
}

impl ArtifactStore for FileStore {
    fn save(&self, kind: ArtifactKind, name: &str, content: &str) -> Result<PathBuf> {
        let path = self.root.join(self.relative_path(kind, name));
        write_atomic(&path, content)?;

        self.append_manifest(&ManifestEntry {
            kind,
            name: name.to_string(),
            path: path.clone(),
            sha256: sha256_hex(content.as_bytes()),
            bytes: content.len(),
            saved_at: chrono::Utc::now().to_rfc3339(),
        })?;

        tracing::info!(kind = %kind, path = %path.display(), "saved artifact");
        Ok(path)
    }
}

/// Writes through a temp file in the same directory, then renames.
pub fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
    }
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .context("Artifact path has no file name")?;
    let tmp_path = path.with_file_name(format!(".{}.tmp", file_name));
    fs::write(&tmp_path, content)
        .with_context(|| format!("Failed to write temp file: {}", tmp_path.display()))?;
    fs::rename(&tmp_path, path)
        .with_context(|| format!("Failed to move artifact into place: {}", path.display()))?;
    Ok(())
}

/// Artifact name for one workflow: the system name plus the first eight
/// characters of the workflow id, so runs that pick the same system name
/// keep separate files.
pub fn artifact_name(system_name: &str, workflow_id: &str) -> String {
    let short_id: String = workflow_id.chars().take(8).collect();
    format!("{}-{}", system_name, short_id)
}

/// Lowercase snake-case file stem: `"Shopping Assistant!"` -> `"shopping_assistant"`.
pub fn sanitize_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.trim().chars() {
        if c.is_ascii_alphanumeric() {
            out.push(c.to_ascii_lowercase());
        } else if !out.ends_with('_') {
            out.push('_');
        }
    }
    let trimmed = out.trim_matches('_');
    if trimmed.is_empty() {
        "artifact".to_string()
    } else {
        trimmed.to_string()
    }
}
