//! In-memory storage backend.
//!
//! Used for tests and embedding. All data is ephemeral.

use super::{Storage, epoch_ms};
use async_trait::async_trait;
use sandfs_types::{EntryKind, StorageError, StorageResult, StorageStat, Transport};
use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

/// Entry in the memory store.
#[derive(Debug, Clone)]
enum Entry {
    File {
        data: Vec<u8>,
        modified: u64,
        changed: u64,
    },
    Directory {
        modified: u64,
    },
}

impl Entry {
    fn is_dir(&self) -> bool {
        matches!(self, Entry::Directory { .. })
    }
}

/// In-memory storage.
///
/// Thread-safe via internal `RwLock`; no lock is held across an await.
/// Keys are backend paths, with `""` as the always-present top level.
#[derive(Debug)]
pub struct MemoryStorage {
    entries: RwLock<HashMap<String, Entry>>,
}

impl Default for MemoryStorage {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStorage {
    /// Create an empty store.
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        entries.insert(String::new(), Entry::Directory { modified: now() });
        Self {
            entries: RwLock::new(entries),
        }
    }

    /// Number of entries, the top level included.
    pub fn len(&self) -> usize {
        self.read().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= 1
    }

    fn read(&self) -> StorageResult<RwLockReadGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .read()
            .map_err(|_| StorageError::Io("lock poisoned".to_string()))
    }

    fn write(&self) -> StorageResult<RwLockWriteGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .write()
            .map_err(|_| StorageError::Io("lock poisoned".to_string()))
    }
}

fn now() -> u64 {
    epoch_ms(SystemTime::now())
}

/// Parent key of `path`; `None` for the top level.
fn parent_of(path: &str) -> Option<&str> {
    if path.is_empty() {
        return None;
    }
    Some(path.rfind('/').map_or("", |idx| &path[..idx]))
}

fn is_descendant(candidate: &str, ancestor: &str) -> bool {
    if ancestor.is_empty() {
        return !candidate.is_empty();
    }
    candidate.len() > ancestor.len()
        && candidate.starts_with(ancestor)
        && candidate.as_bytes()[ancestor.len()] == b'/'
}

/// Make sure `path`'s parent is a directory, creating it when `recursive`.
fn ensure_parent(
    entries: &mut HashMap<String, Entry>,
    path: &str,
    recursive: bool,
) -> StorageResult<()> {
    let Some(parent) = parent_of(path) else {
        return Ok(());
    };
    match entries.get(parent) {
        Some(Entry::Directory { .. }) => Ok(()),
        Some(Entry::File { .. }) => Err(StorageError::NotDirectory(parent.to_string())),
        None if recursive => {
            ensure_parent(entries, parent, true)?;
            entries.insert(parent.to_string(), Entry::Directory { modified: now() });
            Ok(())
        }
        None => Err(StorageError::NotFound(format!(
            "parent directory must exist: {parent}"
        ))),
    }
}

/// Keys of `path` and everything below it.
fn subtree(entries: &HashMap<String, Entry>, path: &str) -> Vec<String> {
    entries
        .keys()
        .filter(|k| k.as_str() == path || is_descendant(k, path))
        .cloned()
        .collect()
}

/// Shared checks for rename and copy. Returns whether the source is a
/// directory.
fn prepare_transfer(
    entries: &mut HashMap<String, Entry>,
    from: &str,
    to: &str,
) -> StorageResult<bool> {
    if from.is_empty() || to.is_empty() {
        return Err(StorageError::PermissionDenied(
            "cannot transfer the storage root".to_string(),
        ));
    }
    let source_is_dir = entries
        .get(from)
        .map(Entry::is_dir)
        .ok_or_else(|| StorageError::NotFound(from.to_string()))?;

    if source_is_dir && is_descendant(to, from) {
        return Err(StorageError::PermissionDenied(format!(
            "cannot move a directory into itself: {from} -> {to}"
        )));
    }
    ensure_parent(entries, to, false)?;

    match entries.get(to) {
        Some(Entry::Directory { .. }) if source_is_dir => {
            Err(StorageError::AlreadyExists(to.to_string()))
        }
        Some(Entry::Directory { .. }) => Err(StorageError::IsDirectory(to.to_string())),
        Some(Entry::File { .. }) => {
            entries.remove(to);
            Ok(source_is_dir)
        }
        None => Ok(source_is_dir),
    }
}

fn retarget(key: &str, from: &str, to: &str) -> String {
    format!("{to}{}", &key[from.len()..])
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn mkdir(&self, path: &str, recursive: bool) -> StorageResult<()> {
        let mut entries = self.write()?;

        if let Some(existing) = entries.get(path) {
            return Err(StorageError::AlreadyExists(if existing.is_dir() {
                format!("directory exists: {path}")
            } else {
                format!("file exists: {path}")
            }));
        }

        ensure_parent(&mut entries, path, recursive)?;
        entries.insert(path.to_string(), Entry::Directory { modified: now() });
        Ok(())
    }

    async fn rmdir(&self, path: &str, recursive: bool) -> StorageResult<()> {
        let mut entries = self.write()?;

        match entries.get(path) {
            Some(Entry::Directory { .. }) => {}
            Some(Entry::File { .. }) => return Err(StorageError::NotDirectory(path.to_string())),
            None => return Err(StorageError::NotFound(path.to_string())),
        }
        if path.is_empty() {
            return Err(StorageError::PermissionDenied(
                "cannot remove the storage root".to_string(),
            ));
        }

        let has_children = entries.keys().any(|k| is_descendant(k, path));
        if has_children && !recursive {
            return Err(StorageError::NotEmpty(path.to_string()));
        }

        entries.retain(|k, _| k != path && !is_descendant(k, path));
        Ok(())
    }

    async fn readdir(&self, path: &str) -> StorageResult<Vec<String>> {
        let entries = self.read()?;

        match entries.get(path) {
            Some(Entry::Directory { .. }) => {}
            Some(Entry::File { .. }) => return Err(StorageError::NotDirectory(path.to_string())),
            None => return Err(StorageError::NotFound(path.to_string())),
        }

        let mut names: Vec<String> = entries
            .keys()
            .filter(|k| parent_of(k) == Some(path))
            .map(|k| k.rsplit('/').next().unwrap_or(k).to_string())
            .collect();

        // Sort for consistent ordering
        names.sort();
        Ok(names)
    }

    async fn read_file(&self, path: &str, transport: Transport) -> StorageResult<String> {
        let entries = self.read()?;
        match entries.get(path) {
            Some(Entry::File { data, .. }) => transport.from_bytes(data),
            Some(Entry::Directory { .. }) => Err(StorageError::IsDirectory(path.to_string())),
            None => Err(StorageError::NotFound(path.to_string())),
        }
    }

    async fn write_file(
        &self,
        path: &str,
        data: &str,
        transport: Transport,
        recursive: bool,
    ) -> StorageResult<()> {
        let bytes = transport.to_bytes(data)?;
        let mut entries = self.write()?;

        if let Some(Entry::Directory { .. }) = entries.get(path) {
            return Err(StorageError::IsDirectory(path.to_string()));
        }
        ensure_parent(&mut entries, path, recursive)?;

        let stamp = now();
        entries.insert(
            path.to_string(),
            Entry::File {
                data: bytes,
                modified: stamp,
                changed: stamp,
            },
        );
        Ok(())
    }

    async fn append_file(
        &self,
        path: &str,
        data: &str,
        transport: Transport,
    ) -> StorageResult<()> {
        let bytes = transport.to_bytes(data)?;
        let mut entries = self.write()?;
        let stamp = now();

        match entries.get_mut(path) {
            Some(Entry::File {
                data,
                modified,
                changed,
            }) => {
                data.extend_from_slice(&bytes);
                *modified = stamp;
                *changed = stamp;
                Ok(())
            }
            Some(Entry::Directory { .. }) => Err(StorageError::IsDirectory(path.to_string())),
            None => {
                ensure_parent(&mut entries, path, false)?;
                entries.insert(
                    path.to_string(),
                    Entry::File {
                        data: bytes,
                        modified: stamp,
                        changed: stamp,
                    },
                );
                Ok(())
            }
        }
    }

    async fn delete_file(&self, path: &str) -> StorageResult<()> {
        let mut entries = self.write()?;
        match entries.get(path) {
            Some(Entry::File { .. }) => {
                entries.remove(path);
                Ok(())
            }
            Some(Entry::Directory { .. }) => Err(StorageError::IsDirectory(path.to_string())),
            None => Err(StorageError::NotFound(path.to_string())),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> StorageResult<()> {
        let mut entries = self.write()?;
        if from == to {
            return match entries.contains_key(from) {
                true => Ok(()),
                false => Err(StorageError::NotFound(from.to_string())),
            };
        }
        prepare_transfer(&mut entries, from, to)?;

        for key in subtree(&entries, from) {
            if let Some(entry) = entries.remove(&key) {
                entries.insert(retarget(&key, from, to), entry);
            }
        }
        Ok(())
    }

    async fn copy(&self, from: &str, to: &str) -> StorageResult<()> {
        let mut entries = self.write()?;
        if from == to {
            return match entries.contains_key(from) {
                true => Ok(()),
                false => Err(StorageError::NotFound(from.to_string())),
            };
        }
        prepare_transfer(&mut entries, from, to)?;

        let stamp = now();
        for key in subtree(&entries, from) {
            let copied = match entries.get(&key) {
                Some(Entry::File { data, .. }) => Entry::File {
                    data: data.clone(),
                    modified: stamp,
                    changed: stamp,
                },
                Some(Entry::Directory { .. }) => Entry::Directory { modified: stamp },
                None => continue,
            };
            entries.insert(retarget(&key, from, to), copied);
        }
        Ok(())
    }

    async fn stat(&self, path: &str) -> StorageResult<StorageStat> {
        let entries = self.read()?;
        match entries.get(path) {
            Some(Entry::File {
                data,
                modified,
                changed,
            }) => Ok(StorageStat {
                kind: EntryKind::File,
                size: data.len() as u64,
                mtime_ms: *modified,
                ctime_ms: Some(*changed),
            }),
            Some(Entry::Directory { modified }) => Ok(StorageStat {
                kind: EntryKind::Directory,
                size: 0,
                mtime_ms: *modified,
                ctime_ms: None,
            }),
            None => Err(StorageError::NotFound(path.to_string())),
        }
    }

    async fn get_uri(&self, path: &str) -> StorageResult<String> {
        if !self.read()?.contains_key(path) {
            return Err(StorageError::NotFound(path.to_string()));
        }
        url::Url::parse(&format!("memory:///{path}"))
            .map(|u| u.to_string())
            .map_err(|e| StorageError::InvalidData(e.to_string()))
    }
}
