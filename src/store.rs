//! # Content Store Module
//!
//! One storage interface for every piece of persisted bot state: slot
//! content, the append-only appeal log and the promoted admin ids. The
//! representation behind it (JSON files here, PostgreSQL in [`crate::db`])
//! is invisible to the handlers.

use std::collections::{BTreeMap, BTreeSet};
use std::fs::{self, OpenOptions};
use std::future::Future;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use teloxide::types::UserId;
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::content::{Appeal, PhotoRef, SlotContent, SlotId};
use crate::errors::StoreError;

pub const STATE_FILE: &str = "state.json";
pub const APPEALS_FILE: &str = "appeals.jsonl";

/// Durable get/set/append access to bot content
///
/// Writes are last-writer-wins; there are no transactions spanning slots.
pub trait ContentStore: Send + Sync {
    /// Read a slot, `None` when it was never set
    fn get(
        &self,
        slot: &SlotId,
    ) -> impl Future<Output = Result<Option<SlotContent>, StoreError>> + Send;

    /// Replace the whole content of a slot
    fn set(
        &self,
        slot: &SlotId,
        content: SlotContent,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Append a photo to a slot's sequence and return the new length
    fn append_photo(
        &self,
        slot: &SlotId,
        photo: PhotoRef,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;

    /// Append an entry to the appeal log
    fn append_appeal(&self, appeal: &Appeal) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// The last `limit` appeals, oldest first
    fn recent_appeals(
        &self,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<Appeal>, StoreError>> + Send;

    /// Promoted admin ids
    fn admins(&self) -> impl Future<Output = Result<BTreeSet<UserId>, StoreError>> + Send;

    /// Persist a promoted admin id, returns `false` if it was already present
    fn add_admin(&self, user_id: UserId) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct StoreDocument {
    #[serde(default)]
    slots: BTreeMap<String, SlotContent>,
    #[serde(default)]
    admins: BTreeSet<u64>,
}

/// Content store backed by a JSON document and a JSON-lines appeal log
///
/// `state.json` is rewritten through a temporary file in the same directory
/// and renamed into place, so readers never observe a half-written file. The
/// in-memory copy only changes after the write succeeded. File I/O runs on
/// tokio's blocking pool.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    files: Arc<StoreFiles>,
}

#[derive(Debug)]
struct StoreFiles {
    dir: PathBuf,
    document: Mutex<StoreDocument>,
    appeals_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (or create) a store in `dir`
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)?;

        let state_path = dir.join(STATE_FILE);
        let document = match fs::read(&state_path) {
            Ok(bytes) => serde_json::from_slice(&bytes)?,
            Err(e) if e.kind() == ErrorKind::NotFound => StoreDocument::default(),
            Err(e) => return Err(e.into()),
        };

        info!(
            path = %dir.display(),
            slots = document.slots.len(),
            admins = document.admins.len(),
            "Opened JSON content store"
        );

        Ok(Self {
            files: Arc::new(StoreFiles {
                dir,
                document: Mutex::new(document),
                appeals_lock: Mutex::new(()),
            }),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.files.dir
    }

    async fn blocking<T, F>(&self, work: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&StoreFiles) -> Result<T, StoreError> + Send + 'static,
    {
        let files = Arc::clone(&self.files);
        tokio::task::spawn_blocking(move || work(&files))
            .await
            .map_err(|e| StoreError::Io(format!("store task failed: {e}")))?
    }
}

impl StoreFiles {
    fn lock_document(&self) -> Result<MutexGuard<'_, StoreDocument>, StoreError> {
        self.document
            .lock()
            .map_err(|_| StoreError::Io("content store lock poisoned".to_string()))
    }

    fn write_document(&self, document: &StoreDocument) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec_pretty(document)?;
        let mut temp = NamedTempFile::new_in(&self.dir)?;
        temp.write_all(&bytes)?;
        temp.as_file().sync_all()?;
        temp.persist(self.dir.join(STATE_FILE))
            .map_err(|e| StoreError::Io(e.to_string()))?;
        Ok(())
    }

    /// Apply `change` to a copy of the document, persist it, then publish it
    fn update<T>(&self, change: impl FnOnce(&mut StoreDocument) -> T) -> Result<T, StoreError> {
        let mut guard = self.lock_document()?;
        let mut next = guard.clone();
        let result = change(&mut next);
        self.write_document(&next)?;
        *guard = next;
        Ok(result)
    }

    fn append_line(&self, line: &str) -> Result<(), StoreError> {
        let _guard = self
            .appeals_lock
            .lock()
            .map_err(|_| StoreError::Io("appeal log lock poisoned".to_string()))?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.dir.join(APPEALS_FILE))?;
        file.write_all(line.as_bytes())?;
        file.sync_data()?;
        Ok(())
    }

    fn read_appeals(&self) -> Result<Vec<Appeal>, StoreError> {
        let content = match fs::read_to_string(self.dir.join(APPEALS_FILE)) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut appeals = Vec::new();
        for (index, line) in content.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<Appeal>(line) {
                Ok(appeal) => appeals.push(appeal),
                Err(e) => warn!(line = index + 1, error = %e, "Skipping malformed appeal log line"),
            }
        }
        Ok(appeals)
    }
}

impl ContentStore for JsonFileStore {
    async fn get(&self, slot: &SlotId) -> Result<Option<SlotContent>, StoreError> {
        let guard = self.files.lock_document()?;
        Ok(guard.slots.get(&slot.storage_key()).cloned())
    }

    async fn set(&self, slot: &SlotId, content: SlotContent) -> Result<(), StoreError> {
        debug!(slot = %slot, photos = content.photos.len(), "Replacing slot content");
        let key = slot.storage_key();
        self.blocking(move |files| {
            files.update(|document| {
                document.slots.insert(key, content);
            })
        })
        .await
    }

    async fn append_photo(&self, slot: &SlotId, photo: PhotoRef) -> Result<usize, StoreError> {
        let key = slot.storage_key();
        self.blocking(move |files| {
            files.update(|document| {
                let content = document.slots.entry(key).or_default();
                content.photos.push(photo);
                content.photos.len()
            })
        })
        .await
    }

    async fn append_appeal(&self, appeal: &Appeal) -> Result<(), StoreError> {
        let mut line = serde_json::to_string(appeal)?;
        line.push('\n');
        self.blocking(move |files| files.append_line(&line)).await
    }

    async fn recent_appeals(&self, limit: usize) -> Result<Vec<Appeal>, StoreError> {
        let mut appeals = self.blocking(StoreFiles::read_appeals).await?;
        let skip = appeals.len().saturating_sub(limit);
        Ok(appeals.split_off(skip))
    }

    async fn admins(&self) -> Result<BTreeSet<UserId>, StoreError> {
        let guard = self.files.lock_document()?;
        Ok(guard.admins.iter().copied().map(UserId).collect())
    }

    async fn add_admin(&self, user_id: UserId) -> Result<bool, StoreError> {
        if self.files.lock_document()?.admins.contains(&user_id.0) {
            return Ok(false);
        }
        self.blocking(move |files| files.update(|document| document.admins.insert(user_id.0)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_missing_slot_is_absent() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        assert_eq!(store.get(&SlotId::Faq).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_state_file_written_atomically() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        store
            .set(&SlotId::Faq, SlotContent::text("Bring a flashlight."))
            .await
            .unwrap();

        let raw = fs::read_to_string(dir.path().join(STATE_FILE)).unwrap();
        assert!(raw.contains("Bring a flashlight."));

        // Only the state file is left behind, no temporary files
        let entries: Vec<_> = fs::read_dir(dir.path()).unwrap().collect();
        assert_eq!(entries.len(), 1);
    }

    #[tokio::test]
    async fn test_malformed_appeal_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();
        store
            .append_appeal(&Appeal::new(UserId(1), "Anna", "No hot water"))
            .await
            .unwrap();
        let mut file = OpenOptions::new()
            .append(true)
            .open(dir.path().join(APPEALS_FILE))
            .unwrap();
        file.write_all(b"{not json}\n").unwrap();

        let appeals = store.recent_appeals(10).await.unwrap();
        assert_eq!(appeals.len(), 1);
        assert_eq!(appeals[0].text, "No hot water");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_concurrent_appends_are_all_persisted() {
        let dir = TempDir::new().unwrap();
        let store = JsonFileStore::open(dir.path()).unwrap();

        let mut tasks = tokio::task::JoinSet::new();
        for index in 0..16 {
            let store = store.clone();
            tasks.spawn(async move {
                store
                    .append_photo(&SlotId::Directorate, PhotoRef::Telegram(format!("p{index}")))
                    .await
            });
        }
        while let Some(result) = tasks.join_next().await {
            result.unwrap().unwrap();
        }

        let reopened = JsonFileStore::open(dir.path()).unwrap();
        let content = reopened.get(&SlotId::Directorate).await.unwrap().unwrap();
        assert_eq!(content.photos.len(), 16);
    }

    #[test]
    fn test_open_rejects_corrupt_state() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(STATE_FILE), b"[1, 2").unwrap();
        let err = JsonFileStore::open(dir.path()).unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }
}
