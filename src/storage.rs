//! Artifact storage behind a bucket abstraction.
//!
//! [`BucketCache`] remembers which buckets are known to exist so a long-running process
//! checks each one once. It is owned by the caller and injected, never global.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Context as _;

use crate::compile::CompiledInstruction;
use crate::foundation::error::{VestureError, VestureResult};

/// Append-only set of verified bucket names. Entries are never invalidated.
#[derive(Debug, Default)]
pub struct BucketCache {
    verified: Mutex<BTreeSet<String>>,
}

impl BucketCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, bucket: &str) -> bool {
        self.verified
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(bucket)
    }

    /// Returns `true` when the name was not cached before.
    pub fn insert(&self, bucket: &str) -> bool {
        self.verified
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(bucket.to_string())
    }

    pub fn len(&self) -> usize {
        self.verified
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Forget everything. Intended for tests that share one cache.
    pub fn reset(&self) {
        self.verified
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

pub trait BucketBackend: Send + Sync {
    fn bucket_exists(&self, bucket: &str) -> VestureResult<bool>;
    fn create_bucket(&self, bucket: &str) -> VestureResult<()>;
    /// Write `bytes` under `key` and return a locator for the stored object.
    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> VestureResult<String>;
}

/// Buckets are directories under `root`; objects are files.
#[derive(Clone, Debug)]
pub struct FsBucketBackend {
    root: PathBuf,
}

impl FsBucketBackend {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl BucketBackend for FsBucketBackend {
    fn bucket_exists(&self, bucket: &str) -> VestureResult<bool> {
        Ok(self.root.join(bucket).is_dir())
    }

    fn create_bucket(&self, bucket: &str) -> VestureResult<()> {
        let dir = self.root.join(bucket);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("create bucket dir '{}'", dir.display()))?;
        Ok(())
    }

    fn put(&self, bucket: &str, key: &str, bytes: &[u8]) -> VestureResult<String> {
        let path = self.root.join(bucket).join(key);
        std::fs::write(&path, bytes)
            .with_context(|| format!("write '{}'", path.display()))?;
        Ok(path.display().to_string())
    }
}

pub struct ArtifactStorage {
    backend: Box<dyn BucketBackend>,
    cache: Arc<BucketCache>,
}

impl ArtifactStorage {
    pub fn new(backend: Box<dyn BucketBackend>, cache: Arc<BucketCache>) -> Self {
        Self { backend, cache }
    }

    pub fn cache(&self) -> &Arc<BucketCache> {
        &self.cache
    }

    /// Make sure `bucket` exists, consulting the backend at most once per cache lifetime.
    pub fn ensure_bucket(&self, bucket: &str) -> VestureResult<()> {
        validate_name("bucket", bucket)?;
        if self.cache.contains(bucket) {
            return Ok(());
        }
        if !self.backend.bucket_exists(bucket)? {
            tracing::debug!(bucket, "creating bucket");
            self.backend.create_bucket(bucket)?;
        }
        self.cache.insert(bucket);
        Ok(())
    }

    pub fn store(&self, bucket: &str, key: &str, bytes: &[u8]) -> VestureResult<String> {
        validate_name("key", key)?;
        self.ensure_bucket(bucket)?;
        self.backend.put(bucket, key, bytes)
    }

    /// Store the instruction text and control JSON under its fingerprint.
    pub fn store_instruction(
        &self,
        bucket: &str,
        instruction: &CompiledInstruction,
    ) -> VestureResult<String> {
        let fp = instruction.fingerprint();
        let body = serde_json::to_vec_pretty(&serde_json::json!({
            "fingerprint": fp.to_string(),
            "mode": instruction.mode,
            "text": instruction.text(),
            "control": instruction.control,
        }))?;
        self.store(bucket, &format!("{fp}.json"), &body)
    }
}

fn validate_name(what: &str, name: &str) -> VestureResult<()> {
    let ok = !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if ok {
        Ok(())
    } else {
        let msg = format!("invalid {what} name '{name}'");
        Err(VestureError::validation(msg))
    }
}
