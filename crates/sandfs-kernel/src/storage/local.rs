//! Local filesystem backend.
//!
//! Stores everything under one host directory, with optional read-only mode.

use super::{Storage, epoch_ms};
use async_trait::async_trait;
use sandfs_types::{EntryKind, StorageError, StorageResult, StorageStat, Transport};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Local filesystem backend.
///
/// All operations are relative to `root`. For example, if `root` is
/// `/srv/sandfs`, then `read_file("data/a.txt", ..)` reads
/// `/srv/sandfs/data/a.txt`.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root: PathBuf,
    read_only: bool,
}

impl LocalStorage {
    /// Create a backend rooted at the given host directory.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            read_only: false,
        }
    }

    /// Create a backend that refuses every mutation.
    pub fn read_only(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            read_only: true,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a backend path to a host path within the root.
    ///
    /// Returns an error if the result escapes the root through a host
    /// symlink.
    fn resolve(&self, path: &str) -> StorageResult<PathBuf> {
        let full = self.root.join(path.trim_start_matches('/'));

        // Canonicalize to resolve host symlinks. For new entries canonicalize
        // the nearest existing ancestor and re-append the rest.
        let canonical = match full.ancestors().find(|a| a.exists()) {
            Some(existing) => {
                let rest = full.strip_prefix(existing).unwrap_or(Path::new(""));
                let base = existing.canonicalize()?;
                if rest.as_os_str().is_empty() {
                    base
                } else {
                    base.join(rest)
                }
            }
            None => full,
        };

        let canonical_root = self
            .root
            .canonicalize()
            .unwrap_or_else(|_| self.root.clone());
        if !canonical.starts_with(&canonical_root) {
            return Err(StorageError::PermissionDenied(format!(
                "path escapes root: {} is not under {}",
                canonical.display(),
                canonical_root.display()
            )));
        }

        Ok(canonical)
    }

    fn check_writable(&self) -> StorageResult<()> {
        if self.read_only {
            Err(StorageError::PermissionDenied(
                "storage is read-only".to_string(),
            ))
        } else {
            Ok(())
        }
    }

    async fn is_dir(path: &Path) -> bool {
        fs::metadata(path).await.map(|m| m.is_dir()).unwrap_or(false)
    }

    /// Rename and copy share their destination rules.
    async fn check_transfer(&self, from: &str, to: &str) -> StorageResult<(PathBuf, PathBuf)> {
        self.check_writable()?;
        if from.is_empty() || to.is_empty() {
            return Err(StorageError::PermissionDenied(
                "cannot transfer the storage root".to_string(),
            ));
        }
        let (src, dst) = (self.resolve(from)?, self.resolve(to)?);
        let source_is_dir = fs::metadata(&src).await?.is_dir();

        if source_is_dir && dst.starts_with(&src) && dst != src {
            return Err(StorageError::PermissionDenied(format!(
                "cannot move a directory into itself: {from} -> {to}"
            )));
        }
        match fs::metadata(&dst).await {
            Ok(meta) if meta.is_dir() => {
                return Err(if source_is_dir {
                    StorageError::AlreadyExists(to.to_string())
                } else {
                    StorageError::IsDirectory(to.to_string())
                });
            }
            // Directory onto file: drop the file first.
            Ok(_) if source_is_dir => fs::remove_file(&dst).await?,
            _ => {}
        }
        Ok((src, dst))
    }
}

/// Last status change in epoch milliseconds.
#[cfg(unix)]
fn status_change_ms(meta: &std::fs::Metadata) -> Option<u64> {
    use std::os::unix::fs::MetadataExt;

    let secs = u64::try_from(meta.ctime()).ok()?;
    let nanos = u64::try_from(meta.ctime_nsec()).ok()?;
    Some(secs * 1000 + nanos / 1_000_000)
}

/// Not tracked off unix; stat falls back to mtime.
#[cfg(not(unix))]
fn status_change_ms(_meta: &std::fs::Metadata) -> Option<u64> {
    None
}

/// Recursively copy a directory tree.
fn copy_tree<'a>(
    src: &'a Path,
    dst: &'a Path,
) -> std::pin::Pin<Box<dyn std::future::Future<Output = StorageResult<()>> + Send + 'a>> {
    Box::pin(async move {
        fs::create_dir(dst).await?;
        let mut dir = fs::read_dir(src).await?;
        while let Some(entry) = dir.next_entry().await? {
            let target = dst.join(entry.file_name());
            if entry.file_type().await?.is_dir() {
                copy_tree(&entry.path(), &target).await?;
            } else {
                fs::copy(entry.path(), &target).await?;
            }
        }
        Ok(())
    })
}

#[async_trait]
impl Storage for LocalStorage {
    async fn mkdir(&self, path: &str, recursive: bool) -> StorageResult<()> {
        self.check_writable()?;
        let full_path = self.resolve(path)?;

        if recursive {
            // create_dir_all tolerates an existing target; the contract doesn't.
            if fs::metadata(&full_path).await.is_ok() {
                return Err(StorageError::AlreadyExists(path.to_string()));
            }
            fs::create_dir_all(&full_path).await?;
        } else {
            fs::create_dir(&full_path).await?;
        }
        Ok(())
    }

    async fn rmdir(&self, path: &str, recursive: bool) -> StorageResult<()> {
        self.check_writable()?;
        if path.is_empty() {
            return Err(StorageError::PermissionDenied(
                "cannot remove the storage root".to_string(),
            ));
        }
        let full_path = self.resolve(path)?;
        if !fs::metadata(&full_path).await?.is_dir() {
            return Err(StorageError::NotDirectory(path.to_string()));
        }

        if recursive {
            fs::remove_dir_all(&full_path).await?;
        } else {
            fs::remove_dir(&full_path).await?;
        }
        Ok(())
    }

    async fn readdir(&self, path: &str) -> StorageResult<Vec<String>> {
        let full_path = self.resolve(path)?;
        if !fs::metadata(&full_path).await?.is_dir() {
            return Err(StorageError::NotDirectory(path.to_string()));
        }

        let mut names = Vec::new();
        let mut dir = fs::read_dir(&full_path).await?;
        while let Some(entry) = dir.next_entry().await? {
            names.push(entry.file_name().to_string_lossy().into_owned());
        }

        names.sort();
        Ok(names)
    }

    async fn read_file(&self, path: &str, transport: Transport) -> StorageResult<String> {
        let full_path = self.resolve(path)?;
        if Self::is_dir(&full_path).await {
            return Err(StorageError::IsDirectory(path.to_string()));
        }
        let bytes = fs::read(&full_path).await?;
        transport.from_bytes(&bytes)
    }

    async fn write_file(
        &self,
        path: &str,
        data: &str,
        transport: Transport,
        recursive: bool,
    ) -> StorageResult<()> {
        self.check_writable()?;
        let bytes = transport.to_bytes(data)?;
        let full_path = self.resolve(path)?;

        if recursive && let Some(parent) = full_path.parent() {
            fs::create_dir_all(parent).await?;
        }
        if Self::is_dir(&full_path).await {
            return Err(StorageError::IsDirectory(path.to_string()));
        }

        fs::write(&full_path, bytes).await?;
        Ok(())
    }

    async fn append_file(
        &self,
        path: &str,
        data: &str,
        transport: Transport,
    ) -> StorageResult<()> {
        self.check_writable()?;
        let bytes = transport.to_bytes(data)?;
        let full_path = self.resolve(path)?;
        if Self::is_dir(&full_path).await {
            return Err(StorageError::IsDirectory(path.to_string()));
        }

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&full_path)
            .await?;
        file.write_all(&bytes).await?;
        file.flush().await?;
        Ok(())
    }

    async fn delete_file(&self, path: &str) -> StorageResult<()> {
        self.check_writable()?;
        let full_path = self.resolve(path)?;
        if fs::metadata(&full_path).await?.is_dir() {
            return Err(StorageError::IsDirectory(path.to_string()));
        }
        fs::remove_file(&full_path).await?;
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> StorageResult<()> {
        let (src, dst) = self.check_transfer(from, to).await?;
        fs::rename(&src, &dst).await?;
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> StorageResult<()> {
        let (src, dst) = self.check_transfer(from, to).await?;
        if Self::is_dir(&src).await {
            copy_tree(&src, &dst).await
        } else {
            fs::copy(&src, &dst).await?;
            Ok(())
        }
    }

    async fn stat(&self, path: &str) -> StorageResult<StorageStat> {
        let full_path = self.resolve(path)?;
        let meta = fs::metadata(&full_path).await?;

        Ok(StorageStat {
            kind: if meta.is_dir() {
                EntryKind::Directory
            } else {
                EntryKind::File
            },
            size: if meta.is_dir() { 0 } else { meta.len() },
            mtime_ms: meta.modified().map(epoch_ms).unwrap_or(0),
            ctime_ms: status_change_ms(&meta),
        })
    }

    async fn get_uri(&self, path: &str) -> StorageResult<String> {
        let full_path = self.resolve(path)?;
        fs::metadata(&full_path).await?;
        url::Url::from_file_path(&full_path)
            .map(|u| u.to_string())
            .map_err(|()| {
                StorageError::InvalidData(format!("not an absolute path: {}", full_path.display()))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sandfs_types::TextEncoding;
    use std::env;
    use std::sync::atomic::{AtomicU64, Ordering};

    const UTF8: Transport = Transport::Text(TextEncoding::Utf8);

    static TEST_COUNTER: AtomicU64 = AtomicU64::new(0);

    fn temp_dir() -> PathBuf {
        let id = TEST_COUNTER.fetch_add(1, Ordering::SeqCst);
        env::temp_dir().join(format!("sandfs-test-{}-{}", std::process::id(), id))
    }

    async fn setup() -> (LocalStorage, PathBuf) {
        let dir = temp_dir();
        let _ = fs::remove_dir_all(&dir).await;
        fs::create_dir_all(&dir).await.unwrap();
        (LocalStorage::new(&dir), dir)
    }

    async fn cleanup(dir: &Path) {
        let _ = fs::remove_dir_all(dir).await;
    }

    #[tokio::test]
    async fn test_write_and_read() {
        let (store, dir) = setup().await;

        store.write_file("test.txt", "hello", UTF8, false).await.unwrap();
        assert_eq!(store.read_file("test.txt", UTF8).await.unwrap(), "hello");

        cleanup(&dir).await;
    }

    #[tokio::test]
    async fn test_nested_write_needs_recursive() {
        let (store, dir) = setup().await;

        let err = store.write_file("a/b/c.txt", "x", UTF8, false).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));

        store.write_file("a/b/c.txt", "nested", UTF8, true).await.unwrap();
        assert_eq!(store.read_file("a/b/c.txt", UTF8).await.unwrap(), "nested");

        cleanup(&dir).await;
    }

    #[tokio::test]
    async fn test_read_only() {
        let (_, dir) = setup().await;
        let store = LocalStorage::read_only(&dir);

        let err = store.write_file("test.txt", "data", UTF8, false).await.unwrap_err();
        assert!(matches!(err, StorageError::PermissionDenied(_)));

        cleanup(&dir).await;
    }

    #[tokio::test]
    async fn test_readdir_sorted() {
        let (store, dir) = setup().await;

        store.write_file("b.txt", "b", UTF8, false).await.unwrap();
        store.write_file("a.txt", "a", UTF8, false).await.unwrap();
        store.mkdir("subdir", false).await.unwrap();

        assert_eq!(store.readdir("").await.unwrap(), vec!["a.txt", "b.txt", "subdir"]);

        cleanup(&dir).await;
    }

    #[tokio::test]
    async fn test_mkdir_existing_fails_even_recursive() {
        let (store, dir) = setup().await;

        store.mkdir("d/e", true).await.unwrap();
        let err = store.mkdir("d/e", true).await.unwrap_err();
        assert!(matches!(err, StorageError::AlreadyExists(_)));

        cleanup(&dir).await;
    }

    #[tokio::test]
    async fn test_rmdir_not_empty() {
        let (store, dir) = setup().await;

        store.write_file("d/f", "x", UTF8, true).await.unwrap();
        let err = store.rmdir("d", false).await.unwrap_err();
        assert!(matches!(err, StorageError::NotEmpty(_)));
        store.rmdir("d", true).await.unwrap();
        assert!(store.stat("d").await.is_err());

        cleanup(&dir).await;
    }

    #[tokio::test]
    async fn test_stat() {
        let (store, dir) = setup().await;

        store.write_file("file.txt", "content", UTF8, false).await.unwrap();
        store.mkdir("dir", false).await.unwrap();

        let file_meta = store.stat("file.txt").await.unwrap();
        assert_eq!(file_meta.kind, EntryKind::File);
        assert_eq!(file_meta.size, 7);

        let dir_meta = store.stat("dir").await.unwrap();
        assert_eq!(dir_meta.kind, EntryKind::Directory);

        cleanup(&dir).await;
    }

    #[tokio::test]
    async fn test_append_and_delete() {
        let (store, dir) = setup().await;

        store.append_file("log", "a", UTF8).await.unwrap();
        store.append_file("log", "b", UTF8).await.unwrap();
        assert_eq!(store.read_file("log", UTF8).await.unwrap(), "ab");

        store.delete_file("log").await.unwrap();
        assert!(store.stat("log").await.is_err());

        cleanup(&dir).await;
    }

    #[tokio::test]
    async fn test_copy_tree() {
        let (store, dir) = setup().await;

        store.write_file("src/x/y.txt", "y", UTF8, true).await.unwrap();
        store.copy("src", "dst").await.unwrap();
        assert_eq!(store.read_file("dst/x/y.txt", UTF8).await.unwrap(), "y");
        assert_eq!(store.read_file("src/x/y.txt", UTF8).await.unwrap(), "y");

        cleanup(&dir).await;
    }

    #[tokio::test]
    async fn test_rename_file_onto_directory() {
        let (store, dir) = setup().await;

        store.write_file("f", "x", UTF8, false).await.unwrap();
        store.mkdir("d", false).await.unwrap();
        let err = store.rename("f", "d").await.unwrap_err();
        assert!(matches!(err, StorageError::IsDirectory(_)));

        cleanup(&dir).await;
    }

    #[tokio::test]
    async fn test_directory_replaces_file() {
        let (store, dir) = setup().await;

        store.write_file("moved/inner.txt", "m", UTF8, true).await.unwrap();
        store.write_file("target", "old", UTF8, false).await.unwrap();
        store.rename("moved", "target").await.unwrap();
        assert_eq!(store.stat("target").await.unwrap().kind, EntryKind::Directory);
        assert_eq!(store.read_file("target/inner.txt", UTF8).await.unwrap(), "m");
        assert!(store.stat("moved").await.is_err());

        store.write_file("copied", "old", UTF8, false).await.unwrap();
        store.copy("target", "copied").await.unwrap();
        assert_eq!(store.read_file("copied/inner.txt", UTF8).await.unwrap(), "m");
        assert_eq!(store.read_file("target/inner.txt", UTF8).await.unwrap(), "m");

        cleanup(&dir).await;
    }

    #[tokio::test]
    async fn test_facade_moves_directory_onto_file() {
        use crate::{FsConfig, SandFs};
        use sandfs_types::{MkdirOptions, WriteOptions};
        use std::sync::Arc;

        let (store, dir) = setup().await;
        let fs = SandFs::new(Arc::new(store), FsConfig::default());

        fs.mkdir("/old", MkdirOptions::default()).await.unwrap();
        fs.write_file("/new", "x", WriteOptions::default()).await.unwrap();
        fs.rename("/old", "/new").await.unwrap();
        assert!(fs.is_directory("/new").await);
        assert!(!fs.exists("/old").await);

        fs.write_file("/copy", "x", WriteOptions::default()).await.unwrap();
        fs.copy("/new", "/copy").await.unwrap();
        assert!(fs.is_directory("/copy").await);
        assert!(fs.is_directory("/new").await);

        cleanup(&dir).await;
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_ctime_is_status_change_time() {
        use std::os::unix::fs::MetadataExt;

        let (store, dir) = setup().await;

        store.write_file("f", "x", UTF8, false).await.unwrap();
        let meta = std::fs::metadata(dir.join("f")).unwrap();
        let expected = meta.ctime() as u64 * 1000 + meta.ctime_nsec() as u64 / 1_000_000;
        assert_eq!(store.stat("f").await.unwrap().ctime_ms, Some(expected));

        cleanup(&dir).await;
    }

    #[tokio::test]
    async fn test_get_uri_is_file_url() {
        let (store, dir) = setup().await;

        store.write_file("a b.txt", "x", UTF8, false).await.unwrap();
        let uri = store.get_uri("a b.txt").await.unwrap();
        assert!(uri.starts_with("file:///"));
        assert!(uri.ends_with("a%20b.txt"));

        cleanup(&dir).await;
    }
}
