//! Persistence backends for the knowledge store.
//!
//! A backend only has to move the full knowledge snapshot in and out of
//! some durable medium. The store treats every backend as unreliable:
//! failures degrade to in-memory operation and are never surfaced to the
//! scheduling path.

use crate::error::Result;
use crate::knowledge::{AgentProfile, KnowledgeRecord};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Mutex;

/// The full persisted state of the knowledge store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct KnowledgeSnapshot {
    #[serde(default)]
    pub records: Vec<KnowledgeRecord>,
    #[serde(default)]
    pub profiles: Vec<AgentProfile>,
}

/// Storage medium for knowledge snapshots.
pub trait KnowledgeBackend: Send + Sync {
    /// Load the last saved snapshot, or `None` if nothing was ever saved.
    fn load(&self) -> Result<Option<KnowledgeSnapshot>>;

    /// Persist the snapshot.
    fn save(&self, snapshot: &KnowledgeSnapshot) -> Result<()>;

    /// Short human-readable description for log lines.
    fn describe(&self) -> String;
}

/// Keeps the snapshot in process memory. The default backend and the
/// degradation target when a durable backend fails.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    snapshot: Mutex<Option<KnowledgeSnapshot>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KnowledgeBackend for MemoryBackend {
    fn load(&self) -> Result<Option<KnowledgeSnapshot>> {
        Ok(self.snapshot.lock().expect("snapshot lock poisoned").clone())
    }

    fn save(&self, snapshot: &KnowledgeSnapshot) -> Result<()> {
        *self.snapshot.lock().expect("snapshot lock poisoned") = Some(snapshot.clone());
        Ok(())
    }

    fn describe(&self) -> String {
        "in-memory".to_string()
    }
}

/// Durable JSON-file backend.
#[derive(Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
}

impl JsonFileBackend {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &PathBuf {
        &self.path
    }
}

impl KnowledgeBackend for JsonFileBackend {
    fn load(&self) -> Result<Option<KnowledgeSnapshot>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let snapshot = serde_json::from_str(&std::fs::read_to_string(&self.path)?)?;
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &KnowledgeSnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, serde_json::to_string_pretty(snapshot)?)?;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("json file {}", self.path.display())
    }
}
