//! Test utilities for the storage module.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use sandfs_types::{StorageError, StorageResult, StorageStat, Transport};

use super::{MemoryStorage, Storage};

/// Memory storage that fails chosen primitives on demand.
/// Used to verify how the facade maps and swallows backend failures.
#[derive(Default)]
pub struct FaultyStorage {
    inner: MemoryStorage,
    faults: Mutex<HashMap<&'static str, StorageError>>,
    calls: Mutex<Vec<&'static str>>,
}

impl FaultyStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call to `op` (e.g. `"stat"`) fail with `err`.
    pub fn fail(&self, op: &'static str, err: StorageError) {
        self.faults.lock().unwrap().insert(op, err);
    }

    pub fn heal(&self, op: &'static str) {
        self.faults.lock().unwrap().remove(op);
    }

    /// Primitives called so far, in order.
    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    fn check(&self, op: &'static str) -> StorageResult<()> {
        self.calls.lock().unwrap().push(op);
        match self.faults.lock().unwrap().get(op) {
            Some(err) => Err(err.clone()),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl Storage for FaultyStorage {
    async fn mkdir(&self, path: &str, recursive: bool) -> StorageResult<()> {
        self.check("mkdir")?;
        self.inner.mkdir(path, recursive).await
    }

    async fn rmdir(&self, path: &str, recursive: bool) -> StorageResult<()> {
        self.check("rmdir")?;
        self.inner.rmdir(path, recursive).await
    }

    async fn readdir(&self, path: &str) -> StorageResult<Vec<String>> {
        self.check("readdir")?;
        self.inner.readdir(path).await
    }

    async fn read_file(&self, path: &str, transport: Transport) -> StorageResult<String> {
        self.check("read_file")?;
        self.inner.read_file(path, transport).await
    }

    async fn write_file(
        &self,
        path: &str,
        data: &str,
        transport: Transport,
        recursive: bool,
    ) -> StorageResult<()> {
        self.check("write_file")?;
        self.inner.write_file(path, data, transport, recursive).await
    }

    async fn append_file(
        &self,
        path: &str,
        data: &str,
        transport: Transport,
    ) -> StorageResult<()> {
        self.check("append_file")?;
        self.inner.append_file(path, data, transport).await
    }

    async fn delete_file(&self, path: &str) -> StorageResult<()> {
        self.check("delete_file")?;
        self.inner.delete_file(path).await
    }

    async fn rename(&self, from: &str, to: &str) -> StorageResult<()> {
        self.check("rename")?;
        self.inner.rename(from, to).await
    }

    async fn copy(&self, from: &str, to: &str) -> StorageResult<()> {
        self.check("copy")?;
        self.inner.copy(from, to).await
    }

    async fn stat(&self, path: &str) -> StorageResult<StorageStat> {
        self.check("stat")?;
        self.inner.stat(path).await
    }

    async fn get_uri(&self, path: &str) -> StorageResult<String> {
        self.check("get_uri")?;
        self.inner.get_uri(path).await
    }
}
