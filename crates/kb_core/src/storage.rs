use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::DEFAULT_STORE_TIMEOUT;
use crate::error::{KbError, Result};
use crate::model::{KnowledgeEntry, KnowledgePatch, NewKnowledge};

/// Read access to the knowledge base as needed by answer resolution.
#[async_trait]
pub trait KnowledgeRepository: Send + Sync {
    /// Active entries in the store's natural order, read at call time.
    async fn list_active(&self) -> Result<Vec<KnowledgeEntry>>;
}

#[async_trait]
impl<T: KnowledgeRepository + ?Sized> KnowledgeRepository for Arc<T> {
    async fn list_active(&self) -> Result<Vec<KnowledgeEntry>> {
        (**self).list_active().await
    }
}

pub fn parse_entries_jsonl(text: &str) -> Result<Vec<KnowledgeEntry>> {
    let mut entries = Vec::new();

    for line in text.lines() {
        if line.trim().is_empty() {
            continue;
        }
        let entry: KnowledgeEntry = serde_json::from_str(line)?;
        entries.push(entry);
    }

    Ok(entries)
}

pub fn render_entries_jsonl(entries: &[KnowledgeEntry]) -> Result<String> {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&serde_json::to_string(entry)?);
        out.push('\n');
    }
    Ok(out)
}

/// Fixed snapshot of entries, kept in insertion order.
#[derive(Debug, Clone, Default)]
pub struct MemoryKnowledgeStore {
    entries: Vec<KnowledgeEntry>,
}

impl MemoryKnowledgeStore {
    pub fn new(entries: Vec<KnowledgeEntry>) -> Self {
        Self { entries }
    }
}

#[async_trait]
impl KnowledgeRepository for MemoryKnowledgeStore {
    async fn list_active(&self) -> Result<Vec<KnowledgeEntry>> {
        Ok(self
            .entries
            .iter()
            .filter(|e| e.is_active)
            .cloned()
            .collect())
    }
}

/// Knowledge base persisted as one JSON entry per line.
///
/// Every read goes to disk so callers always see the latest committed file.
/// Writes are serialized and land through a temp file plus rename.
#[derive(Debug)]
pub struct JsonlKnowledgeStore {
    path: PathBuf,
    timeout: Duration,
    write_lock: Mutex<()>,
}

impl JsonlKnowledgeStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            timeout: DEFAULT_STORE_TIMEOUT,
            write_lock: Mutex::new(()),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Every entry, active or not. A missing file is an unavailable store.
    pub async fn list_all(&self) -> Result<Vec<KnowledgeEntry>> {
        let read = tokio::time::timeout(self.timeout, tokio::fs::read_to_string(&self.path));
        let text = match read.await {
            Ok(Ok(text)) => text,
            Ok(Err(err)) => {
                warn!(path = %self.path.display(), error = %err, "knowledge store read failed");
                return Err(KbError::store_unavailable(&self.path, err));
            }
            Err(_) => {
                warn!(path = %self.path.display(), timeout = ?self.timeout, "knowledge store read timed out");
                return Err(KbError::store_unavailable(
                    &self.path,
                    format!("read timed out after {:?}", self.timeout),
                ));
            }
        };

        parse_entries_jsonl(&text).map_err(|err| KbError::store_unavailable(&self.path, err))
    }

    pub async fn get(&self, id: u64) -> Result<KnowledgeEntry> {
        self.list_all()
            .await?
            .into_iter()
            .find(|e| e.id == id)
            .ok_or(KbError::NotFound(id))
    }

    pub async fn create(&self, new: NewKnowledge) -> Result<KnowledgeEntry> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load_for_write().await?;

        let next_id = entries.iter().map(|e| e.id).max().unwrap_or(0) + 1;
        let entry = new.into_entry(next_id, Utc::now())?;
        ensure_unique_active_intent(&entries, &entry)?;

        entries.push(entry.clone());
        self.persist(&entries).await?;
        info!(id = entry.id, intent = %entry.intent, "knowledge entry created");
        Ok(entry)
    }

    pub async fn update(&self, id: u64, patch: &KnowledgePatch) -> Result<KnowledgeEntry> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load_for_write().await?;

        let slot = entries
            .iter()
            .position(|e| e.id == id)
            .ok_or(KbError::NotFound(id))?;
        let patched = patch.apply(&entries[slot], Utc::now())?;
        ensure_unique_active_intent(&entries, &patched)?;

        entries[slot] = patched.clone();
        self.persist(&entries).await?;
        info!(id, fields = ?patch.changed_fields(), "knowledge entry updated");
        Ok(patched)
    }

    pub async fn delete(&self, id: u64) -> Result<KnowledgeEntry> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load_for_write().await?;

        let slot = entries
            .iter()
            .position(|e| e.id == id)
            .ok_or(KbError::NotFound(id))?;
        let removed = entries.remove(slot);

        self.persist(&entries).await?;
        info!(id, intent = %removed.intent, "knowledge entry deleted");
        Ok(removed)
    }

    // Writers start from an empty base when the file has not been created yet.
    async fn load_for_write(&self) -> Result<Vec<KnowledgeEntry>> {
        if tokio::fs::try_exists(&self.path).await? {
            self.list_all().await
        } else {
            debug!(path = %self.path.display(), "knowledge store file absent, starting empty");
            Ok(Vec::new())
        }
    }

    async fn persist(&self, entries: &[KnowledgeEntry]) -> Result<()> {
        let body = render_entries_jsonl(entries)?;
        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        tokio::fs::write(&tmp, body).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl KnowledgeRepository for JsonlKnowledgeStore {
    async fn list_active(&self) -> Result<Vec<KnowledgeEntry>> {
        let active: Vec<KnowledgeEntry> = self
            .list_all()
            .await?
            .into_iter()
            .filter(|e| e.is_active)
            .collect();
        debug!(path = %self.path.display(), active = active.len(), "loaded active knowledge");
        Ok(active)
    }
}

fn ensure_unique_active_intent(entries: &[KnowledgeEntry], candidate: &KnowledgeEntry) -> Result<()> {
    if !candidate.is_active {
        return Ok(());
    }
    let clash = entries
        .iter()
        .any(|e| e.id != candidate.id && e.is_active && e.intent == candidate.intent);
    if clash {
        return Err(KbError::DuplicateIntent(candidate.intent.clone()));
    }
    Ok(())
}
