use async_trait::async_trait;
use dashmap::DashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::debug;

use crate::error::{AnalysisError, Result};

/// Durable blob storage addressed by caller-chosen keys.
///
/// `put` overwrites silently: the orchestrator derives keys deterministically
/// from the session id, so re-running an upload is idempotent. No versioning
/// and no consistency negotiation; read-after-write is assumed from the
/// backing store.
#[async_trait]
pub trait ObjectStoreGateway: Send + Sync {
    /// Stores `bytes` under `key` and returns a retrieval URL.
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String>;

    /// Removes the object. Deleting a missing key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;

    /// Returns a retrieval URL for `key` without touching the stored bytes.
    async fn presign(&self, key: &str) -> Result<String>;
}

/// Keys come from session ids and model-reported labels, so they are
/// validated before being used as relative paths.
fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.starts_with('/') {
        return Err(AnalysisError::ArtifactPersistence(format!(
            "invalid object key: {key:?}"
        )));
    }
    if key.split('/').any(|segment| segment.is_empty() || segment == "." || segment == "..") {
        return Err(AnalysisError::ArtifactPersistence(format!(
            "invalid object key: {key:?}"
        )));
    }
    Ok(())
}

/// Filesystem-backed store: objects live under a root directory and are
/// served from a public base URL.
pub struct FsObjectStore {
    root: PathBuf,
    public_base_url: String,
}

impl FsObjectStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        let mut base = public_base_url.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self {
            root: root.into(),
            public_base_url: base,
        }
    }

    fn object_url(&self, key: &str) -> String {
        let encoded: Vec<String> = key
            .split('/')
            .map(|segment| urlencoding::encode(segment).into_owned())
            .collect();
        format!("{}/{}", self.public_base_url, encoded.join("/"))
    }
}

#[async_trait]
impl ObjectStoreGateway for FsObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        validate_key(key)?;
        let path = self.root.join(key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                AnalysisError::ArtifactPersistence(format!(
                    "failed to create {}: {e}",
                    parent.display()
                ))
            })?;
        }

        tokio::fs::write(&path, &bytes).await.map_err(|e| {
            AnalysisError::ArtifactPersistence(format!("failed to write {}: {e}", path.display()))
        })?;

        debug!(
            "Stored object {} ({} bytes, {})",
            key,
            bytes.len(),
            content_type
        );
        Ok(self.object_url(key))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        let path = self.root.join(key);

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(AnalysisError::ArtifactPersistence(format!(
                "failed to delete {}: {e}",
                path.display()
            ))),
        }
    }

    async fn presign(&self, key: &str) -> Result<String> {
        validate_key(key)?;
        Ok(self.object_url(key))
    }
}

struct StoredObject {
    bytes: Vec<u8>,
    content_type: String,
}

/// In-memory implementation of ObjectStoreGateway
pub struct InMemoryObjectStore {
    objects: Arc<DashMap<String, StoredObject>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self {
            objects: Arc::new(DashMap::new()),
        }
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.objects.contains_key(key)
    }

    pub fn bytes(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.get(key).map(|entry| entry.bytes.clone())
    }

    pub fn content_type(&self, key: &str) -> Option<String> {
        self.objects.get(key).map(|entry| entry.content_type.clone())
    }
}

impl Default for InMemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStoreGateway for InMemoryObjectStore {
    async fn put(&self, key: &str, bytes: Vec<u8>, content_type: &str) -> Result<String> {
        validate_key(key)?;
        self.objects.insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.to_string(),
            },
        );
        Ok(format!("memory://{key}"))
    }

    async fn delete(&self, key: &str) -> Result<()> {
        validate_key(key)?;
        self.objects.remove(key);
        Ok(())
    }

    async fn presign(&self, key: &str) -> Result<String> {
        validate_key(key)?;
        Ok(format!("memory://{key}"))
    }
}
