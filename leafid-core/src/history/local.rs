//! Local history stored as one JSON file.
//!
//! The whole history lives in memory behind an async lock and is rewritten
//! atomically (temp file + rename) on every change. A missing or unreadable
//! file opens as an empty history.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, warn};

use super::{HistoryRef, HistoryStore, RemoveOutcome};
use crate::error::Result;
use crate::model::{filter_records, Identification};

/// Name of the persisted entry (`<data dir>/plant-history.json`).
pub const HISTORY_ENTRY: &str = "plant-history";

pub struct LocalHistory {
    path: Option<PathBuf>,
    capacity: usize,
    records: RwLock<Vec<Identification>>,
}

impl LocalHistory {
    /// Open the history stored in `data_dir`, keeping at most `capacity`
    /// records.
    pub async fn open(data_dir: impl AsRef<Path>, capacity: usize) -> Self {
        let path = data_dir.as_ref().join(format!("{HISTORY_ENTRY}.json"));
        let capacity = capacity.max(1);

        let mut records = load(&path).await;
        records.truncate(capacity);
        debug!(path = %path.display(), count = records.len(), "Opened local history");

        Self {
            path: Some(path),
            capacity,
            records: RwLock::new(records),
        }
    }

    /// History that lives only as long as this value.
    pub fn in_memory(capacity: usize) -> Self {
        Self {
            path: None,
            capacity: capacity.max(1),
            records: RwLock::new(Vec::new()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    async fn persist(&self, records: &[Identification]) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let json = serde_json::to_vec_pretty(records)?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Apply `change` to a copy of the records, persist it, then publish it.
    async fn update<T>(&self, change: impl FnOnce(&mut Vec<Identification>) -> T) -> Result<T> {
        let mut guard = self.records.write().await;
        let mut next = guard.clone();
        let out = change(&mut next);
        self.persist(&next).await?;
        *guard = next;
        Ok(out)
    }
}

async fn load(path: &Path) -> Vec<Identification> {
    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Vec::new(),
        Err(e) => {
            warn!(error = %e, path = %path.display(), "Failed to read history, starting empty");
            return Vec::new();
        }
    };

    match serde_json::from_slice(&bytes) {
        Ok(records) => records,
        Err(e) => {
            warn!(error = %e, path = %path.display(), "Corrupt history file, starting empty");
            Vec::new()
        }
    }
}

#[async_trait]
impl HistoryStore for LocalHistory {
    async fn list(&self, filter: Option<&str>) -> Result<Vec<Identification>> {
        let records = self.records.read().await.clone();
        Ok(filter_records(records, filter))
    }

    async fn append(&self, record: Identification) -> Result<()> {
        let capacity = self.capacity;
        let evicted = self
            .update(|records| {
                records.insert(0, record);
                let evicted = records.len().saturating_sub(capacity);
                records.truncate(capacity);
                evicted
            })
            .await?;

        if evicted > 0 {
            debug!(evicted, "Evicted oldest history entries");
        }
        Ok(())
    }

    async fn remove(&self, target: HistoryRef) -> Result<RemoveOutcome> {
        let position = {
            let records = self.records.read().await;
            match &target {
                HistoryRef::Index(i) if *i < records.len() => Some(*i),
                HistoryRef::Index(_) => None,
                HistoryRef::Id(id) => records.iter().position(|r| &r.id == id),
            }
        };

        let Some(position) = position else {
            debug!(target = %target, "Nothing to remove");
            return Ok(RemoveOutcome::NotFound);
        };

        // Re-resolve under the write lock in case the list moved meanwhile
        self.update(|records| {
            let position = match &target {
                HistoryRef::Index(_) => Some(position).filter(|p| *p < records.len()),
                HistoryRef::Id(id) => records.iter().position(|r| &r.id == id),
            };
            match position {
                Some(p) => {
                    records.remove(p);
                    RemoveOutcome::Removed
                }
                None => RemoveOutcome::NotFound,
            }
        })
        .await
    }

    async fn clear(&self) -> Result<()> {
        self.update(|records| records.clear()).await
    }
}

impl std::fmt::Debug for LocalHistory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalHistory")
            .field("path", &self.path)
            .field("capacity", &self.capacity)
            .finish()
    }
}
