//! Test doubles for generation backends and artifact storage.

use crate::agents::{GenerationError, GenerationRequest, GenerationService};
use crate::storage::{ArtifactKind, ArtifactStore};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

/// One scripted backend response.
#[derive(Debug, Clone)]
pub enum Scripted {
    Reply(String),
    Fail(GenerationError),
    /// Replies after a delay.
    Delayed(Duration, String),
    /// Never returns.
    Hang,
}

/// Backend that replays a fixed script and records every request.
pub struct ScriptedGenerator {
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedGenerator {
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replies<'a>(replies: impl IntoIterator<Item = &'a str>) -> Self {
        Self::new(replies.into_iter().map(|r| Scripted::Reply(r.to_string())))
    }

    pub fn requests(&self) -> Vec<GenerationRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap().len()
    }
}

#[async_trait]
impl GenerationService for ScriptedGenerator {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn generate(&self, request: &GenerationRequest) -> Result<String, GenerationError> {
        self.requests.lock().unwrap().push(request.clone());
        let next = self.script.lock().unwrap().pop_front();
        match next {
            Some(Scripted::Reply(text)) => Ok(text),
            Some(Scripted::Fail(err)) => Err(err),
            Some(Scripted::Delayed(delay, text)) => {
                tokio::time::sleep(delay).await;
                Ok(text)
            }
            Some(Scripted::Hang) => std::future::pending().await,
            None => Err(GenerationError::ServiceUnavailable(
                "script exhausted".to_string(),
            )),
        }
    }
}

/// In-memory artifact store.
#[derive(Default)]
pub struct MemoryStore {
    saved: Mutex<Vec<(ArtifactKind, String, String)>>,
}

impl MemoryStore {
    pub fn saved(&self) -> Vec<(ArtifactKind, String, String)> {
        self.saved.lock().unwrap().clone()
    }

    pub fn kinds(&self) -> Vec<ArtifactKind> {
        self.saved().into_iter().map(|(kind, _, _)| kind).collect()
    }
}

impl ArtifactStore for MemoryStore {
    fn save(&self, kind: ArtifactKind, name: &str, content: &str) -> anyhow::Result<PathBuf> {
        self.saved
            .lock()
            .unwrap()
            .push((kind, name.to_string(), content.to_string()));
        Ok(PathBuf::from(format!("memory/{}/{}", kind, name)))
    }
}

/// Store whose every save fails.
pub struct FailingStore;

impl ArtifactStore for FailingStore {
    fn save(&self, kind: ArtifactKind, _name: &str, _content: &str) -> anyhow::Result<PathBuf> {
        anyhow::bail!("disk full while saving {}", kind)
    }
}

/// A blueprint JSON that passes validation.
pub fn blueprint_json(system_name: &str) -> String {
    serde_json::json!({
        "system_name": system_name,
        "flow_type": "sequential",
        "agents": [
            {"name": "SearchAgent", "role": "Find products", "tools": ["search"]},
            {"name": "CartAgent", "role": "Manage the cart", "dependencies": ["SearchAgent"]}
        ]
    })
    .to_string()
}

/// A Python module that defines `root_agent`.
pub const VALID_CODE: &str = "def root_agent(query):\n    return query\n";
