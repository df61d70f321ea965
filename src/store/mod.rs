//! Blob storage for coverage snapshots.
//!
//! The store is a flat key/value space addressed by `/`-separated keys
//! (see [`crate::key`]). Concurrent writers to one key simply overwrite
//! each other.

pub mod dir;
pub mod s3;

pub use dir::DirStore;
pub use s3::S3Store;

use crate::error::Result;

/// Every snapshot store implements this trait.
pub trait BlobStore: Send + Sync {
    /// Fetch the bytes stored under `key`.
    fn get(&self, key: &str) -> Result<Vec<u8>>;

    /// Store `body` under `key`, replacing any previous value.
    fn put(&self, key: &str, body: &[u8]) -> Result<()>;

    /// All keys starting with `prefix`, sorted.
    fn list(&self, prefix: &str) -> Result<Vec<String>>;

    /// Copy the value under `from` to `to`.
    fn copy(&self, from: &str, to: &str) -> Result<()>;

    /// Remove `key`. Removing a missing key succeeds.
    fn delete(&self, key: &str) -> Result<()>;

    /// Move a value: copy, then delete the source.
    fn rename(&self, from: &str, to: &str) -> Result<()> {
        self.copy(from, to)?;
        self.delete(from)
    }
}
