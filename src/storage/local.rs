//! Local filesystem storage implementation.
//!
//! ## Storage Layout
//!
//! ```text
//! {root}/
//! ├── records/
//! │   ├── messages/
//! │   │   └── {identity}.json   # created once, never rewritten
//! │   ├── mentions/
//! │   └── ...
//! └── cursors/
//!     └── {key hash}.json       # replaced atomically after every page
//! ```
//!
//! Record files are the uniqueness constraint: a record is written to a
//! temporary file and hard-linked into place, which fails if the identity
//! already exists. Readers never observe a partially written record.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use serde::{Serialize, de::DeserializeOwned};
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{CursorKey, HarvestCursor, HarvestedRecord};
use crate::services::identity::identity;
use crate::storage::{CursorStore, RecordStore, UpsertOutcome};

/// Distinguishes temporary files of concurrent writers in one process.
static TMP_SEQ: AtomicU64 = AtomicU64::new(0);

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root_dir
    }

    fn record_path(&self, record: &HarvestedRecord) -> PathBuf {
        self.root_dir
            .join("records")
            .join(record.collection())
            .join(format!("{}.json", record.identity))
    }

    fn cursor_path(&self, key: &CursorKey) -> PathBuf {
        let name = identity(
            &key.criterion,
            &key.network,
            &key.territory,
            Some(key.action.as_str()),
        );
        self.root_dir.join("cursors").join(format!("{name}.json"))
    }

    fn tmp_path(path: &Path) -> PathBuf {
        let seq = TMP_SEQ.fetch_add(1, Ordering::Relaxed);
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        path.with_file_name(format!(".{name}.{}.{seq}.tmp", std::process::id()))
    }

    /// Ensure parent directory exists.
    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    async fn write_tmp(&self, path: &Path, bytes: &[u8]) -> Result<PathBuf> {
        self.ensure_dir(path).await?;

        let tmp = Self::tmp_path(path);
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.sync_all().await?;
        drop(file);
        Ok(tmp)
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, path: &Path, bytes: &[u8]) -> Result<()> {
        let tmp = self.write_tmp(path, bytes).await?;
        tokio::fs::rename(&tmp, path).await?;
        Ok(())
    }

    /// Write bytes only if `path` does not exist yet.
    async fn create_bytes(&self, path: &Path, bytes: &[u8]) -> Result<bool> {
        let tmp = self.write_tmp(path, bytes).await?;
        let linked = tokio::fs::hard_link(&tmp, path).await;
        let cleanup = tokio::fs::remove_file(&tmp).await;
        Self::link_outcome(linked, cleanup, &tmp)
    }

    /// Whether the link created the file. A leftover temp file is only logged.
    fn link_outcome(
        linked: std::io::Result<()>,
        cleanup: std::io::Result<()>,
        tmp: &Path,
    ) -> Result<bool> {
        if let Err(e) = cleanup {
            log::warn!("Failed to remove temporary file {}: {}", tmp.display(), e);
        }
        match linked {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => Ok(false),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, path: &Path) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }

    /// Read JSON data.
    async fn read_json<T: DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        match self.read_bytes(path).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec_pretty(value)?)
    }

    /// Load a stored record back, if present.
    pub async fn load_record(&self, record: &HarvestedRecord) -> Result<Option<HarvestedRecord>> {
        self.read_json(&self.record_path(record)).await
    }

    /// All cursors on disk, in no particular order.
    pub async fn list_cursors(&self) -> Result<Vec<HarvestCursor>> {
        let dir = self.root_dir.join("cursors");
        let mut entries = match tokio::fs::read_dir(&dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(AppError::Io(e)),
        };

        let mut cursors = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                if let Some(cursor) = self.read_json::<HarvestCursor>(&path).await? {
                    cursors.push(cursor);
                }
            }
        }
        Ok(cursors)
    }
}

#[async_trait]
impl RecordStore for LocalStorage {
    async fn upsert_if_absent(&self, record: &HarvestedRecord) -> Result<UpsertOutcome> {
        let path = self.record_path(record);
        let bytes = Self::to_json(record)?;
        if self.create_bytes(&path, &bytes).await? {
            Ok(UpsertOutcome::Inserted)
        } else {
            Ok(UpsertOutcome::Conflict)
        }
    }
}

#[async_trait]
impl CursorStore for LocalStorage {
    async fn get_cursor(&self, key: &CursorKey) -> Result<Option<HarvestCursor>> {
        self.read_json(&self.cursor_path(key)).await
    }

    async fn set_cursor(&self, cursor: &HarvestCursor) -> Result<()> {
        let path = self.cursor_path(&cursor.key());
        self.write_bytes(&path, &Self::to_json(cursor)?).await
    }
}
