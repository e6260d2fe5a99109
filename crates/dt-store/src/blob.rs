//! C1 — Blob Store Adapter.
//!
//! Uniform put/get/list/delete of artifacts keyed by `runs/{id}/{type}/{name}`.
//! Generalizes the teacher's content-addressed `CasStore` trait shape from
//! digest-keyed blobs to path-keyed ones, since the blob store here is an
//! opaque object store (spec §1) addressed by the artifact storage layout
//! (spec §6), not by content hash.

use async_trait::async_trait;

use crate::error::{StoreError, StoreResult};

#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store bytes under `key` (overwrites if already present).
    async fn put(&self, key: &str, data: &[u8]) -> StoreResult<()>;

    /// Retrieve bytes stored at `key`. `StoreError::BlobNotFound` if absent.
    async fn get(&self, key: &str) -> StoreResult<Vec<u8>>;

    /// List keys with the given prefix (e.g. `runs/{runId}/`).
    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>>;

    /// Delete the blob at `key`. No-op if absent.
    async fn delete(&self, key: &str) -> StoreResult<()>;

    async fn contains(&self, key: &str) -> StoreResult<bool> {
        match self.get(key).await {
            Ok(_) => Ok(true),
            Err(StoreError::BlobNotFound { .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }
}

/// Filesystem-backed blob store rooted at `artifacts.basePath`. Used both as
/// the local artifact staging area before upload (spec §6 env table) and, in
/// this implementation, as the adapter itself.
pub struct FsBlobStore {
    root: std::path::PathBuf,
}

impl FsBlobStore {
    pub fn new(root: impl Into<std::path::PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn path_for(&self, key: &str) -> std::path::PathBuf {
        self.root.join(key)
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, key: &str, data: &[u8]) -> StoreResult<()> {
        let path = self.path_for(key);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&path, data).await?;
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        let path = self.path_for(key);
        tokio::fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StoreError::BlobNotFound { key: key.into() }
            } else {
                StoreError::Io(e)
            }
        })
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let dir = self.path_for(prefix);
        let mut out = Vec::new();
        let mut stack = vec![dir.clone()];
        while let Some(current) = stack.pop() {
            let mut entries = match tokio::fs::read_dir(&current).await {
                Ok(rd) => rd,
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(StoreError::Io(e)),
            };
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if let Ok(rel) = path.strip_prefix(&self.root) {
                    out.push(rel.to_string_lossy().replace('\\', "/"));
                }
            }
        }
        out.sort();
        Ok(out)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        let path = self.path_for(key);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::Io(e)),
        }
    }
}

/// In-memory blob store for tests.
#[derive(Default)]
pub struct MemoryBlobStore {
    store: std::sync::Mutex<std::collections::HashMap<String, Vec<u8>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, key: &str, data: &[u8]) -> StoreResult<()> {
        self.store
            .lock()
            .unwrap()
            .insert(key.to_string(), data.to_vec());
        Ok(())
    }

    async fn get(&self, key: &str) -> StoreResult<Vec<u8>> {
        self.store
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::BlobNotFound { key: key.into() })
    }

    async fn list(&self, prefix: &str) -> StoreResult<Vec<String>> {
        let mut keys: Vec<String> = self
            .store
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn delete(&self, key: &str) -> StoreResult<()> {
        self.store.lock().unwrap().remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn fs_store_roundtrips_and_deletes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        store.put("runs/r1/log/out.log", b"hello").await.unwrap();
        assert_eq!(store.get("runs/r1/log/out.log").await.unwrap(), b"hello");
        assert!(store.contains("runs/r1/log/out.log").await.unwrap());
        store.delete("runs/r1/log/out.log").await.unwrap();
        assert!(!store.contains("runs/r1/log/out.log").await.unwrap());
    }

    #[tokio::test]
    async fn fs_store_lists_by_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsBlobStore::new(dir.path());
        store.put("runs/r1/log/a.log", b"1").await.unwrap();
        store.put("runs/r1/screenshot/b.png", b"2").await.unwrap();
        store.put("runs/r2/log/c.log", b"3").await.unwrap();
        let keys = store.list("runs/r1").await.unwrap();
        assert_eq!(keys.len(), 2);
    }

    #[tokio::test]
    async fn memory_store_missing_key_errors() {
        let store = MemoryBlobStore::new();
        let err = store.get("missing").await.unwrap_err();
        assert!(matches!(err, StoreError::BlobNotFound { .. }));
    }
}
