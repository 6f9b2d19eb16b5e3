// Watermark store persisted as a single JSON document.
//
// Purpose
// - Keep watermarks across restarts without an external database.
//
// Responsibilities
// - Load the whole document on open and serve reads from memory.
// - Rewrite the document on every successful put through a temporary file and a rename, so a
//   crash leaves either the old or the new document on disk.
// - Finish a started write even when the caller gives up on it, so memory matches the file.

use crate::modules::commits_sync::adapters::outbound::watermark_store::{
    StoreError, Versioned, WatermarkStore, next_version,
};
use crate::modules::commits_sync::core::watermark::Watermark;
use crate::shared::core::primitives::RepositoryId;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

#[derive(Serialize, Deserialize)]
struct StoredWatermark {
    version: u64,
    watermark: Watermark,
}

pub struct JsonFileWatermarkStore {
    document: Arc<Document>,
}

struct Document {
    path: PathBuf,
    entries: Mutex<BTreeMap<RepositoryId, Versioned<Watermark>>>,
}

impl JsonFileWatermarkStore {
    pub async fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let entries = match tokio::fs::read(&path).await {
            Ok(bytes) => serde_json::from_slice::<Vec<StoredWatermark>>(&bytes).map_err(|e| {
                StoreError::Backend(format!("corrupt watermark file {}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(backend(&path, e)),
        };

        let entries = entries
            .into_iter()
            .map(|entry| {
                (
                    entry.watermark.repository.clone(),
                    Versioned {
                        value: entry.watermark,
                        version: entry.version,
                    },
                )
            })
            .collect::<BTreeMap<_, _>>();
        tracing::info!(path = %path.display(), watermarks = entries.len(), "watermark store opened");

        Ok(Self {
            document: Arc::new(Document {
                path,
                entries: Mutex::new(entries),
            }),
        })
    }
}

impl Document {
    async fn put(&self, watermark: Watermark, expected_version: Option<u64>) -> Result<u64, StoreError> {
        let mut guard = self.entries.lock().await;
        let key = &watermark.repository;
        let version = next_version(key, guard.get(key).map(|v| v.version), expected_version)?;

        let mut next = guard.clone();
        next.insert(
            key.clone(),
            Versioned {
                value: watermark.clone(),
                version,
            },
        );
        self.persist(&next).await?;
        *guard = next;
        Ok(version)
    }

    async fn persist(
        &self,
        snapshot: &BTreeMap<RepositoryId, Versioned<Watermark>>,
    ) -> Result<(), StoreError> {
        let entries: Vec<StoredWatermark> = snapshot
            .values()
            .map(|v| StoredWatermark {
                version: v.version,
                watermark: v.value.clone(),
            })
            .collect();
        let bytes = serde_json::to_vec_pretty(&entries)
            .map_err(|e| StoreError::Backend(format!("encode watermarks: {e}")))?;

        let temp = self.path.with_extension("json.tmp");
        tokio::fs::write(&temp, bytes)
            .await
            .map_err(|e| backend(&temp, e))?;
        tokio::fs::rename(&temp, &self.path)
            .await
            .map_err(|e| backend(&self.path, e))
    }
}

fn backend(path: &Path, error: std::io::Error) -> StoreError {
    StoreError::Backend(format!("{}: {error}", path.display()))
}

#[async_trait]
impl WatermarkStore for JsonFileWatermarkStore {
    async fn get(
        &self,
        repository: &RepositoryId,
    ) -> Result<Option<Versioned<Watermark>>, StoreError> {
        Ok(self.document.entries.lock().await.get(repository).cloned())
    }

    /// The write runs on its own task. A caller that stops waiting cannot interrupt it between
    /// the rename and the in-memory swap; the write still lands in both.
    async fn put(
        &self,
        watermark: &Watermark,
        expected_version: Option<u64>,
    ) -> Result<u64, StoreError> {
        let document = self.document.clone();
        let watermark = watermark.clone();
        tokio::spawn(async move { document.put(watermark, expected_version).await })
            .await
            .map_err(|e| StoreError::Backend(format!("watermark write aborted: {e}")))?
    }

    async fn keys(&self) -> Result<Vec<RepositoryId>, StoreError> {
        Ok(self.document.entries.lock().await.keys().cloned().collect())
    }
}
