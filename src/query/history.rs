use std::path::PathBuf;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::errors::GuardError;
use crate::models::QaHistoryEntry;
use crate::utils::fs::atomic_write;

/// Rolling question/answer history persisted as a JSON array.
pub struct QaHistory {
    path: PathBuf,
    limit: usize,
    lock: Mutex<()>,
}

impl QaHistory {
    pub fn new(path: impl Into<PathBuf>, limit: usize) -> Self {
        Self {
            path: path.into(),
            limit: limit.max(1),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    async fn read(&self) -> Vec<QaHistoryEntry> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "History unreadable; starting empty");
                return Vec::new();
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(entries) => entries,
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "History corrupt; starting empty");
                Vec::new()
            }
        }
    }

    /// Oldest first.
    pub async fn entries(&self) -> Vec<QaHistoryEntry> {
        let _guard = self.lock.lock().await;
        self.read().await
    }

    pub async fn append(&self, entry: QaHistoryEntry) -> Result<(), GuardError> {
        let _guard = self.lock.lock().await;
        let mut entries = self.read().await;
        entries.push(entry);
        if entries.len() > self.limit {
            let excess = entries.len() - self.limit;
            entries.drain(..excess);
        }
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(&entries)?;
        atomic_write(&self.path, &json).await?;
        debug!(entries = entries.len(), "History saved");
        Ok(())
    }
}
