//! Durable object storage for uploaded images
//!
//! Objects are addressed by a flat name inside one bucket. Names are generated
//! by the caller (`<uuid>.<ext>`); storing over an existing name is rejected.
//!
//! An object only appears under its name once it is complete: the payload is
//! written to a hidden partial file which is then hard-linked into place. A
//! `put` that is dropped before completion (for example by a timeout) cancels
//! the write and its partial file is removed.

use async_trait::async_trait;
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

/// Payload bytes written between cancellation checks
const WRITE_CHUNK_BYTES: usize = 1024 * 1024;

/// Blob store errors
#[derive(Debug, Error)]
pub enum BlobStoreError {
    #[error("object already exists: {0}")]
    AlreadyExists(String),

    #[error("invalid object name: {0:?}")]
    InvalidName(String),

    #[error("upload of {0} was cancelled")]
    Cancelled(String),

    #[error("storage I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Durable blob storage
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `payload` under `name` and return its public URL
    async fn put(&self, name: &str, payload: Vec<u8>) -> Result<String, BlobStoreError>;

    /// Public URL of an object (whether or not it exists)
    fn public_url(&self, name: &str) -> String;
}

/// Bucket kept as a directory on the local filesystem
///
/// The HTTP router serves the directory at `/storage/<bucket>/`, which is
/// what `public_url` points at.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    bucket_dir: PathBuf,
    bucket: String,
    public_base_url: String,
}

impl FsBlobStore {
    pub fn new(
        bucket_dir: impl Into<PathBuf>,
        bucket: impl Into<String>,
        public_base_url: impl Into<String>,
    ) -> Self {
        Self {
            bucket_dir: bucket_dir.into(),
            bucket: bucket.into(),
            public_base_url: public_base_url.into(),
        }
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    pub fn bucket_dir(&self) -> &Path {
        &self.bucket_dir
    }
}

#[async_trait]
impl BlobStore for FsBlobStore {
    async fn put(&self, name: &str, payload: Vec<u8>) -> Result<String, BlobStoreError> {
        if !is_valid_object_name(name) {
            return Err(BlobStoreError::InvalidName(name.to_string()));
        }

        let cancel = CancellationToken::new();
        // Dropping this future (timeout, aborted task) cancels the write
        let _cancel_on_drop = cancel.clone().drop_guard();

        let bucket_dir = self.bucket_dir.clone();
        let object_name = name.to_string();
        let bytes = payload.len();
        tokio::task::spawn_blocking(move || {
            write_object(&bucket_dir, &object_name, &payload, &cancel)
        })
        .await
        .map_err(|e| io::Error::new(io::ErrorKind::Other, e))??;

        debug!(object = %name, bytes, "Stored object");
        Ok(self.public_url(name))
    }

    fn public_url(&self, name: &str) -> String {
        format!(
            "{}/storage/{}/{}",
            self.public_base_url.trim_end_matches('/'),
            self.bucket,
            name
        )
    }
}

/// Hidden partial file, removed when dropped
struct PartialObject {
    path: PathBuf,
}

impl Drop for PartialObject {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Write `payload` and publish it under `name` without overwriting
fn write_object(
    bucket_dir: &Path,
    name: &str,
    payload: &[u8],
    cancel: &CancellationToken,
) -> Result<(), BlobStoreError> {
    fs::create_dir_all(bucket_dir)?;

    let target = bucket_dir.join(name);
    if target.exists() {
        return Err(BlobStoreError::AlreadyExists(name.to_string()));
    }

    let partial = PartialObject {
        path: bucket_dir.join(format!(".{}.{}.partial", name, Uuid::new_v4())),
    };
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&partial.path)?;

    for chunk in payload.chunks(WRITE_CHUNK_BYTES) {
        if cancel.is_cancelled() {
            return Err(BlobStoreError::Cancelled(name.to_string()));
        }
        file.write_all(chunk)?;
    }
    file.sync_all()?;
    drop(file);

    if cancel.is_cancelled() {
        return Err(BlobStoreError::Cancelled(name.to_string()));
    }

    // Unlike rename, a hard link never replaces an existing object
    match fs::hard_link(&partial.path, &target) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
            Err(BlobStoreError::AlreadyExists(name.to_string()))
        }
        Err(e) => Err(e.into()),
    }
}

/// Flat names only: no separators, no dot-segments
fn is_valid_object_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.starts_with('.')
}

/// Randomized object name keeping the original extension
pub fn generated_object_name(file_name: &str) -> String {
    let id = Uuid::new_v4();
    match file_name.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()) => {
            format!("{}.{}", id, ext.to_ascii_lowercase())
        }
        _ => id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(dir: &Path) -> FsBlobStore {
        FsBlobStore::new(dir.join("uploaded-images"), "uploaded-images", "http://localhost:5740/")
    }

    #[tokio::test]
    async fn test_put_writes_object_and_returns_public_url() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let url = store.put("a1.png", b"PNGDATA".to_vec()).await.unwrap();

        assert_eq!(url, "http://localhost:5740/storage/uploaded-images/a1.png");
        let written = std::fs::read(store.bucket_dir().join("a1.png")).unwrap();
        assert_eq!(written, b"PNGDATA");
    }

    #[tokio::test]
    async fn test_put_rejects_existing_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        store.put("a1.png", b"first".to_vec()).await.unwrap();
        let err = store.put("a1.png", b"second".to_vec()).await.unwrap_err();

        assert!(matches!(err, BlobStoreError::AlreadyExists(_)));
        // Original object untouched
        let written = std::fs::read(store.bucket_dir().join("a1.png")).unwrap();
        assert_eq!(written, b"first");
    }

    #[tokio::test]
    async fn test_put_rejects_path_traversal() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        for name in ["../escape.png", "nested/a.png", "", "..", ".hidden"] {
            let err = store.put(name, b"x".to_vec()).await.unwrap_err();
            assert!(matches!(err, BlobStoreError::InvalidName(_)), "accepted {:?}", name);
        }
    }

    fn bucket_entries(store: &FsBlobStore) -> Vec<String> {
        match fs::read_dir(store.bucket_dir()) {
            Ok(entries) => entries
                .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
                .collect(),
            Err(_) => Vec::new(),
        }
    }

    #[tokio::test]
    async fn test_put_leaves_only_the_object() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        store.put("a1.png", vec![7u8; 3 * WRITE_CHUNK_BYTES + 5]).await.unwrap();

        assert_eq!(bucket_entries(&store), vec!["a1.png".to_string()]);
    }

    #[test]
    fn test_cancelled_write_leaves_nothing_behind() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = write_object(store.bucket_dir(), "a1.png", &[1u8; 16], &cancel).unwrap_err();

        assert!(matches!(err, BlobStoreError::Cancelled(_)));
        assert!(bucket_entries(&store).is_empty());
    }

    #[tokio::test]
    async fn test_timed_out_put_leaves_empty_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(dir.path());

        let outcome = tokio::time::timeout(
            std::time::Duration::from_millis(1),
            store.put("big.png", vec![0u8; 64 * WRITE_CHUNK_BYTES]),
        )
        .await;
        assert!(outcome.is_err(), "64 MiB write should not finish within 1 ms");

        // The blocking writer notices the cancellation at its next chunk and
        // removes its partial file
        tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        for _ in 0..500 {
            if bucket_entries(&store).is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert!(bucket_entries(&store).is_empty(), "left {:?}", bucket_entries(&store));
    }

    #[test]
    fn test_generated_object_name_keeps_extension() {
        let name = generated_object_name("Harbor Scene.JPG");
        assert!(name.ends_with(".jpg"));
        assert_ne!(name, generated_object_name("Harbor Scene.JPG"));

        let bare = generated_object_name("no_extension");
        assert!(Uuid::parse_str(&bare).is_ok());
    }
}
