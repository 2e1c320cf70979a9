//! On-disk response cache
//!
//! Responses are stored as plain text, one file per key, under
//! `<root>/<namespace>/<sha256(key)>.cache`. Freshness is judged purely by
//! file modification time against the policy's TTL. The cache is
//! best-effort: read failures are misses and write failures are ignored.

mod policy;

pub use policy::{CachePolicy, ARCHIVE_TTL, DOCUMENT_TTL_CURRENT, LISTING_TTL_CURRENT};

pub(crate) use policy::current_year;

use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Disk-backed key to text store with per-namespace time-to-live
#[derive(Debug, Clone)]
pub struct ResponseCache {
    root: PathBuf,
}

impl ResponseCache {
    /// Creates a cache rooted at `root`; directories are created on first write
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Returns the cached text for `key`, or None when the entry is absent,
    /// unreadable or older than the policy allows
    pub fn read(&self, policy: &CachePolicy, key: &str) -> Option<String> {
        if policy.ttl.is_zero() {
            return None;
        }

        let path = self.entry_path(policy, key);
        let modified = fs::metadata(&path).and_then(|m| m.modified()).ok()?;

        // A timestamp in the future reads as age zero
        let age = SystemTime::now()
            .duration_since(modified)
            .unwrap_or_default();
        if age > policy.ttl {
            tracing::trace!("Cache entry for {} is stale ({:?} old)", key, age);
            return None;
        }

        match fs::read_to_string(&path) {
            Ok(text) => {
                tracing::debug!("Cache hit for {}", key);
                Some(text)
            }
            Err(e) => {
                tracing::debug!("Unreadable cache entry {}: {}", path.display(), e);
                None
            }
        }
    }

    /// Stores `text` under `key`, swallowing any filesystem error
    pub fn write(&self, policy: &CachePolicy, key: &str, text: &str) {
        let path = self.entry_path(policy, key);
        if let Err(e) = write_atomic(&path, text) {
            tracing::debug!("Failed to cache {} at {}: {}", key, path.display(), e);
        }
    }

    /// Location of the entry for `key` in the policy's namespace
    pub fn entry_path(&self, policy: &CachePolicy, key: &str) -> PathBuf {
        let digest = hex::encode(Sha256::digest(key.as_bytes()));
        self.root
            .join(&policy.namespace)
            .join(format!("{}.cache", digest))
    }
}

fn write_atomic(path: &Path, text: &str) -> std::io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("cache.tmp");
    fs::write(&tmp, text)?;
    fs::rename(&tmp, path).inspect_err(|_| {
        let _ = fs::remove_file(&tmp);
    })
}
