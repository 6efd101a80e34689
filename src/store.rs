use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::{io::ErrorKind, path::PathBuf};
use tokio::fs;

use crate::learn::LearningPath;

/// Fixed key the most recent learning path is kept under.
pub const STORE_KEY: &str = "response";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredPath {
    pub topic: String,
    pub saved_at: DateTime<Utc>,
    #[serde(flatten)]
    pub path: LearningPath,
}

impl StoredPath {
    pub fn new(topic: impl Into<String>, path: LearningPath) -> Self {
        Self { topic: topic.into(), saved_at: Utc::now(), path }
    }
}

/// Single slot. `set` replaces whatever was there.
#[async_trait]
pub trait PathStore: Send + Sync {
    async fn get(&self) -> Result<Option<StoredPath>>;
    async fn set(&self, path: StoredPath) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}

pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(state_dir: impl Into<PathBuf>) -> Self {
        Self { path: state_dir.into().join(format!("{STORE_KEY}.json")) }
    }

    pub fn path(&self) -> &PathBuf { &self.path }
}

#[async_trait]
impl PathStore for FileStore {
    async fn get(&self) -> Result<Option<StoredPath>> {
        let bytes = match fs::read(&self.path).await {
            Ok(b) => b,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e).with_context(|| format!("failed to read {}", self.path.display())),
        };
        let stored = serde_json::from_slice(&bytes)
            .with_context(|| format!("corrupt learning path in {}", self.path.display()))?;
        Ok(Some(stored))
    }

    async fn set(&self, path: StoredPath) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(&path)?;
        crate::io::write_atomic(&self.path, &bytes)
            .await
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        tracing::debug!(path = %self.path.display(), topic = %path.topic, "learning path stored");
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to remove {}", self.path.display())),
        }
    }
}

#[derive(Default)]
pub struct MemoryStore {
    slot: Mutex<Option<StoredPath>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl PathStore for MemoryStore {
    async fn get(&self) -> Result<Option<StoredPath>> {
        Ok(self.slot.lock().clone())
    }

    async fn set(&self, path: StoredPath) -> Result<()> {
        *self.slot.lock() = Some(path);
        Ok(())
    }

    async fn clear(&self) -> Result<()> {
        self.slot.lock().take();
        Ok(())
    }
}
