//! Storage backends: the coarse primitives the facade builds on.
//!
//! A backend knows nothing about sandboxing, events or POSIX rules. It is
//! handed already-confined, root-joined paths (`data/a/b.txt`, empty for
//! its own top level) and reports structured [`StorageError`]s.
//!
//! - **MemoryStorage**: In-memory ephemeral storage, for tests and embedding
//! - **LocalStorage**: A host directory through `tokio::fs`
//!
//! [`StorageError`]: sandfs_types::StorageError

mod local;
mod memory;
#[cfg(test)]
pub mod testing;

pub use local::LocalStorage;
pub use memory::MemoryStorage;

use async_trait::async_trait;
use sandfs_types::{StorageResult, StorageStat, Transport};

/// Abstract storage interface.
///
/// All paths are relative to the backend's own top level, `/`-separated,
/// without leading slash, and never contain `.` or `..` segments.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Create a directory. Without `recursive` the parent must exist.
    async fn mkdir(&self, path: &str, recursive: bool) -> StorageResult<()>;

    /// Remove a directory. Without `recursive` it must be empty.
    async fn rmdir(&self, path: &str, recursive: bool) -> StorageResult<()>;

    /// Names of the immediate children of a directory.
    async fn readdir(&self, path: &str) -> StorageResult<Vec<String>>;

    /// Read a whole file, rendered in `transport`.
    async fn read_file(&self, path: &str, transport: Transport) -> StorageResult<String>;

    /// Create or replace a file. With `recursive` missing parents are
    /// created.
    async fn write_file(
        &self,
        path: &str,
        data: &str,
        transport: Transport,
        recursive: bool,
    ) -> StorageResult<()>;

    /// Append to a file, creating it when missing.
    async fn append_file(&self, path: &str, data: &str, transport: Transport)
    -> StorageResult<()>;

    /// Delete a file (never a directory).
    async fn delete_file(&self, path: &str) -> StorageResult<()>;

    /// Move a file or directory, replacing a destination file.
    async fn rename(&self, from: &str, to: &str) -> StorageResult<()>;

    /// Copy a file or directory tree, replacing a destination file.
    async fn copy(&self, from: &str, to: &str) -> StorageResult<()>;

    /// Kind, size and timestamps of an entry.
    async fn stat(&self, path: &str) -> StorageResult<StorageStat>;

    /// A URI addressing the entry, e.g. `file:///srv/data/a.txt`.
    async fn get_uri(&self, path: &str) -> StorageResult<String>;
}

/// Milliseconds since the Unix epoch for a timestamp.
pub(crate) fn epoch_ms(time: std::time::SystemTime) -> u64 {
    time.duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}
