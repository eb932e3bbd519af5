//! Content-addressed file storage for uploaded PDFs
//!
//! A file's reference is the SHA-256 of its bytes. Files are organized in
//! a two-level directory structure, so "abcd1234..." lives at
//! "blobs/ab/cd/abcd1234...". Uploading the same bytes twice yields the
//! same reference and a single file on disk.
//!
//! Because documents can share a file, callers that pair a blob operation
//! with a database write hold the reference's lock across both.

use crate::error::{AppError, Result};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use uuid::Uuid;

type RefLocks = HashMap<String, Arc<AsyncMutex<()>>>;

/// Content-addressed blob store
#[derive(Clone)]
pub struct BlobStore {
    root: PathBuf,
    locks: Arc<Mutex<RefLocks>>,
}

impl BlobStore {
    /// Create a new blob store at the given root directory
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            locks: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Reference the given bytes would be stored under
    pub fn reference_for(data: &[u8]) -> String {
        calculate_hash(data)
    }

    /// Exclusive access to one file reference until the guard is dropped
    pub async fn lock(&self, file_ref: &str) -> OwnedMutexGuard<()> {
        let entry = {
            let mut locks = self
                .locks
                .lock()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            // Drop entries nobody is holding or waiting on
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks
                .entry(file_ref.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };
        entry.lock_owned().await
    }

    /// Initialize the blob store (create directory if needed)
    pub async fn initialize(&self) -> Result<()> {
        fs::create_dir_all(&self.root).await?;
        tracing::info!("Blob store initialized at: {:?}", self.root);
        Ok(())
    }

    /// Store bytes and return their file reference
    pub async fn write(&self, data: &[u8]) -> Result<String> {
        let file_ref = calculate_hash(data);
        let path = self.get_path(&file_ref)?;

        if fs::try_exists(&path).await? {
            tracing::debug!("Blob already exists: {}", file_ref);
            return Ok(file_ref);
        }

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Temp file then rename, so readers never see a partial PDF.
        // Each writer gets its own temp name; identical uploads may race here.
        let temp_path = path.with_file_name(format!("{}.{}.tmp", file_ref, Uuid::new_v4()));
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        fs::rename(temp_path, &path).await?;

        tracing::debug!("Wrote blob: {} ({} bytes)", file_ref, data.len());

        Ok(file_ref)
    }

    /// Read the bytes behind a file reference
    pub async fn read(&self, file_ref: &str) -> Result<Vec<u8>> {
        let path = self.get_path(file_ref)?;

        if !fs::try_exists(&path).await? {
            return Err(AppError::BlobStore(format!("Blob not found: {}", file_ref)));
        }

        let data = fs::read(&path).await?;
        tracing::debug!("Read blob: {} ({} bytes)", file_ref, data.len());

        Ok(data)
    }

    /// Check if a blob exists
    pub async fn exists(&self, file_ref: &str) -> Result<bool> {
        match self.get_path(file_ref) {
            Ok(path) => Ok(fs::try_exists(&path).await?),
            Err(_) => Ok(false),
        }
    }

    /// Delete a blob; deleting a missing blob is not an error
    pub async fn delete(&self, file_ref: &str) -> Result<()> {
        let path = self.get_path(file_ref)?;

        if !fs::try_exists(&path).await? {
            tracing::warn!("Blob already gone: {}", file_ref);
            return Ok(());
        }

        fs::remove_file(&path).await?;
        tracing::debug!("Deleted blob: {}", file_ref);

        Ok(())
    }

    /// Get file path for a reference, rejecting anything that is not a hash
    fn get_path(&self, file_ref: &str) -> Result<PathBuf> {
        if !is_valid_ref(file_ref) {
            return Err(AppError::BlobStore(format!("Invalid file reference: {}", file_ref)));
        }
        Ok(self
            .root
            .join(&file_ref[0..2])
            .join(&file_ref[2..4])
            .join(file_ref))
    }

    /// Get blob store root directory
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// SHA-256 as 64 lowercase hex characters
fn calculate_hash(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}

fn is_valid_ref(file_ref: &str) -> bool {
    file_ref.len() == 64 && file_ref.chars().all(|c| c.is_ascii_hexdigit())
}
