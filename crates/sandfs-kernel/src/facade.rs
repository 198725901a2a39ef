//! The filesystem facade.
//!
//! [`SandFs`] turns the coarse primitives of a [`Storage`] backend into a
//! POSIX-flavoured API. Every operation:
//!
//! 1. normalizes its paths through the [`PathSandbox`]
//! 2. checks preconditions with `stat` probes (the backend does not
//!    guarantee ENOTDIR/ENOTEMPTY/EEXIST/EISDIR/EPERM on its own)
//! 3. calls the backend primitive and maps its failure onto the taxonomy
//! 4. publishes the matching event on success
//!
//! Error paths are virtual paths as the caller sees them (`/a/b`), never
//! backend paths.

use std::sync::Arc;

use futures::future::join_all;
use percent_encoding::percent_decode_str;
use sandfs_glob::PatternMatcher;
use sandfs_types::{
    Encoding, EntryKind, Event, EventName, FileData, FsError, FsResult, MkdirOptions, ReadOptions,
    RmdirOptions, Stat, StorageError, StorageResult, StorageStat, TextEncoding, Transport,
    UnlinkOptions, WatchEvent, WriteOptions, base64_decode, base64_encode,
};
use tracing::{debug, warn};

use crate::config::{FsConfig, Swallowed, WarningSink};
use crate::events::{EventBus, Subscription};
use crate::remote::RemoteProbe;
use crate::sandbox::{PathSandbox, VirtualPath};
use crate::storage::{MemoryStorage, Storage};
use crate::watch::{WatchRequest, WatchRouter};

/// Reports swallowed failures to tracing and, when enabled, the sink.
#[derive(Clone)]
struct Warner {
    enabled: bool,
    sink: Option<WarningSink>,
}

impl Warner {
    fn swallow(&self, operation: &'static str, path: &str, error: StorageError) {
        warn!(operation, path, code = error.code(), %error, "ignoring backend failure");
        if self.enabled
            && let Some(sink) = &self.sink
        {
            sink(&Swallowed {
                operation,
                path: path.to_string(),
                error,
            });
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Transfer {
    Rename,
    Copy,
}

impl Transfer {
    fn as_str(self) -> &'static str {
        match self {
            Transfer::Rename => "rename",
            Transfer::Copy => "copy",
        }
    }
}

/// Everything the detached post-transfer stat needs.
#[derive(Clone)]
struct Announcer {
    storage: Arc<dyn Storage>,
    sandbox: PathSandbox,
    bus: EventBus,
    warner: Warner,
}

impl Announcer {
    async fn announce(self, transfer: Transfer, from: VirtualPath, to: VirtualPath) {
        let raw = match self.storage.stat(&self.sandbox.rooted(&to)).await {
            Ok(raw) => raw,
            Err(err) => {
                self.warner.swallow(transfer.as_str(), &to.to_string(), err);
                return;
            }
        };
        let (from, to) = (from.to_string(), to.to_string());
        let is_dir = raw.kind == EntryKind::Directory;

        if transfer == Transfer::Rename {
            self.bus.emit(&if is_dir {
                Event::RemoveDir { path: from.clone() }
            } else {
                Event::RemoveFile { path: from.clone() }
            });
        }
        self.bus.emit(&if is_dir {
            Event::CreateDir { path: to.clone() }
        } else {
            Event::WriteFile { path: to.clone() }
        });
        if transfer == Transfer::Rename {
            self.bus.emit(&if is_dir {
                Event::MoveDir { from, to }
            } else {
                Event::MoveFile { from, to }
            });
        }
    }
}

/// A sandboxed filesystem over one storage backend.
///
/// Each instance owns its configuration and event bus; any number of
/// facades can share a process or even a backend.
///
/// ```
/// # tokio_test_block(async {
/// use sandfs_kernel::SandFs;
/// use sandfs_types::{MkdirOptions, ReadOptions, WriteOptions};
///
/// let fs = SandFs::memory();
/// fs.mkdir("/notes", MkdirOptions::default()).await.unwrap();
/// fs.write_file("/notes/today.txt", "hello", WriteOptions::default()).await.unwrap();
/// let text = fs.read_file("/notes/today.txt", ReadOptions::utf8()).await.unwrap();
/// assert_eq!(text.as_text(), Some("hello"));
/// # });
/// # fn tokio_test_block<F: std::future::Future>(f: F) {
/// #     tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(f);
/// # }
/// ```
pub struct SandFs {
    storage: Arc<dyn Storage>,
    sandbox: PathSandbox,
    config: FsConfig,
    bus: Option<EventBus>,
    router: WatchRouter,
    warner: Warner,
    probe: Option<Arc<dyn RemoteProbe>>,
}

impl std::fmt::Debug for SandFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SandFs")
            .field("sandbox", &self.sandbox)
            .field("config", &self.config)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

impl SandFs {
    pub fn new(storage: Arc<dyn Storage>, config: FsConfig) -> Self {
        let sandbox = PathSandbox::new(&config.root).case_insensitive(config.case_insensitive);
        let bus = config.watcher.then(EventBus::new);
        Self {
            storage,
            router: WatchRouter::new(sandbox.clone(), bus.clone()),
            sandbox,
            bus,
            warner: Warner {
                enabled: config.warnings,
                sink: None,
            },
            config,
            probe: None,
        }
    }

    /// A facade over a fresh [`MemoryStorage`] with default configuration.
    pub fn memory() -> Self {
        Self::new(Arc::new(MemoryStorage::new()), FsConfig::default())
    }

    /// Receive failures that best-effort operations swallow. Only called
    /// when `warnings` is enabled in the configuration.
    pub fn with_warning_sink<F>(mut self, sink: F) -> Self
    where
        F: Fn(&Swallowed) + Send + Sync + 'static,
    {
        self.warner.sink = Some(Arc::new(sink));
        self
    }

    /// HEAD prober used by [`back_file`](Self::back_file).
    pub fn with_probe(mut self, probe: Arc<dyn RemoteProbe>) -> Self {
        self.probe = Some(probe);
        self
    }

    /// Pattern dialect for watch requests.
    pub fn with_matcher(mut self, matcher: impl PatternMatcher + 'static) -> Self {
        self.router = self.router.with_matcher(matcher);
        self
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    pub fn sandbox(&self) -> &PathSandbox {
        &self.sandbox
    }

    // ═══════════════════════════════════════════════════════════════════
    // Lifecycle
    // ═══════════════════════════════════════════════════════════════════

    /// Make sure the root exists as a directory. With `autofix`, a root
    /// that exists as a file is replaced. Failures are swallowed.
    pub async fn init(&self, autofix: bool) {
        let root = self.sandbox.rooted(&VirtualPath::root());
        match self.storage.stat(&root).await {
            Ok(raw) if raw.kind == EntryKind::Directory => {}
            Ok(_) if autofix => {
                debug!(root = %root, "replacing non-directory root");
                if let Err(err) = self.storage.delete_file(&root).await {
                    self.warner.swallow("init", "/", err);
                }
                if let Err(err) = self.storage.mkdir(&root, true).await {
                    self.warner.swallow("init", "/", err);
                }
            }
            Ok(_) => debug!(root = %root, "root is not a directory"),
            Err(_) => {
                if let Err(err) = self.storage.mkdir(&root, true).await {
                    self.warner.swallow("init", "/", err);
                }
            }
        }
    }

    /// Remove everything under the root. Failures are swallowed.
    pub async fn clear(&self) {
        let root = VirtualPath::root();
        let children = match self.storage.readdir(&self.sandbox.rooted(&root)).await {
            Ok(children) => children,
            Err(err) => {
                self.warner.swallow("clear", "/", err);
                return;
            }
        };

        join_all(children.iter().map(|name| {
            let child = root.join(name);
            async move {
                let backend = self.sandbox.rooted(&child);
                let removed = match self.storage.stat(&backend).await {
                    Ok(raw) if raw.kind == EntryKind::Directory => self
                        .storage
                        .rmdir(&backend, true)
                        .await
                        .map(|()| Event::RemoveDir { path: child.to_string() }),
                    Ok(_) => self
                        .storage
                        .delete_file(&backend)
                        .await
                        .map(|()| Event::RemoveFile { path: child.to_string() }),
                    Err(err) => Err(err),
                };
                match removed {
                    Ok(event) => self.emit(event),
                    Err(err) => self.warner.swallow("clear", &child.to_string(), err),
                }
            }
        }))
        .await;
    }

    // ═══════════════════════════════════════════════════════════════════
    // Directories
    // ═══════════════════════════════════════════════════════════════════

    #[tracing::instrument(level = "debug", skip(self, opts), fields(recursive = opts.recursive))]
    pub async fn mkdir(&self, path: &str, opts: MkdirOptions) -> FsResult<()> {
        let p = self.sandbox.normalize(path);

        match self.kind_of(&p).await {
            Some(EntryKind::Directory) if opts.recursive => return Ok(()),
            Some(_) => return Err(FsError::already_exists(p.to_string())),
            None => {}
        }
        if !opts.recursive && !p.is_root() {
            self.require_dir(&p.parent()).await?;
        }

        self.storage
            .mkdir(&self.sandbox.rooted(&p), opts.recursive)
            .await
            .map_err(|err| self.mapped(err, &p))?;
        self.emit(Event::CreateDir { path: p.to_string() });
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, opts), fields(recursive = opts.recursive))]
    pub async fn rmdir(&self, path: &str, opts: RmdirOptions) -> FsResult<()> {
        let p = self.sandbox.normalize(path);
        if p.is_root() {
            return Err(FsError::not_permitted(p.to_string()));
        }
        if self.kind_of(&p).await != Some(EntryKind::Directory) {
            return Err(FsError::not_found(p.to_string()));
        }

        let backend = self.sandbox.rooted(&p);
        if !opts.recursive {
            let children = self
                .storage
                .readdir(&backend)
                .await
                .map_err(|err| self.read_failure("rmdir", err, &p))?;
            if !children.is_empty() {
                return Err(FsError::not_empty(p.to_string()));
            }
        }

        self.storage
            .rmdir(&backend, opts.recursive)
            .await
            .map_err(|err| self.mapped(err, &p))?;
        self.emit(Event::RemoveDir { path: p.to_string() });
        Ok(())
    }

    /// Names of the immediate children of a directory.
    pub async fn readdir(&self, path: &str) -> FsResult<Vec<String>> {
        let p = self.sandbox.normalize(path);
        match self.kind_of(&p).await {
            Some(EntryKind::Directory) => {}
            Some(_) => return Err(FsError::not_a_directory(p.to_string())),
            None => return Err(FsError::not_found(p.to_string())),
        }

        self.storage
            .readdir(&self.sandbox.rooted(&p))
            .await
            .map_err(|err| self.read_failure("readdir", err, &p))
    }

    // ═══════════════════════════════════════════════════════════════════
    // Files
    // ═══════════════════════════════════════════════════════════════════

    #[tracing::instrument(level = "debug", skip(self, data, opts), fields(recursive = opts.recursive))]
    pub async fn write_file(
        &self,
        path: &str,
        data: impl Into<FileData>,
        opts: WriteOptions,
    ) -> FsResult<()> {
        let p = self.sandbox.normalize(path);
        self.prepare_file_target(&p, opts.recursive).await?;

        let (payload, transport) = self.encode(data.into(), opts.encoding);
        self.storage
            .write_file(&self.sandbox.rooted(&p), &payload, transport, opts.recursive)
            .await
            .map_err(|err| self.mapped(err, &p))?;
        self.emit(Event::WriteFile { path: p.to_string() });
        Ok(())
    }

    #[tracing::instrument(level = "debug", skip(self, data, opts))]
    pub async fn append_file(
        &self,
        path: &str,
        data: impl Into<FileData>,
        opts: WriteOptions,
    ) -> FsResult<()> {
        let p = self.sandbox.normalize(path);
        self.prepare_file_target(&p, opts.recursive).await?;

        let (payload, transport) = self.encode(data.into(), opts.encoding);
        self.storage
            .append_file(&self.sandbox.rooted(&p), &payload, transport)
            .await
            .map_err(|err| self.mapped(err, &p))?;
        self.emit(Event::WriteFile { path: p.to_string() });
        Ok(())
    }

    /// Read a whole file. [`Encoding::Buffer`] (the default) returns bytes,
    /// text encodings return text and [`Encoding::Base64`] returns base64
    /// text.
    pub async fn read_file(&self, path: &str, opts: ReadOptions) -> FsResult<FileData> {
        let p = self.sandbox.normalize(path);
        if p.is_root() {
            return Err(FsError::is_a_directory(p.to_string()));
        }
        match self.raw_stat(&p).await {
            Ok(raw) if raw.kind == EntryKind::Directory => {
                return Err(FsError::is_a_directory(p.to_string()));
            }
            Ok(_) => {}
            Err(err) => return Err(self.read_failure("read_file", err, &p)),
        }

        let backend = self.sandbox.rooted(&p);
        let read_err = |err| self.read_failure("read_file", err, &p);

        match opts.encoding.text() {
            Some(enc) if !self.config.base64_always => {
                let text = self
                    .storage
                    .read_file(&backend, Transport::Text(enc))
                    .await
                    .map_err(read_err)?;
                Ok(FileData::Text(text))
            }
            text => {
                let wire = self
                    .storage
                    .read_file(&backend, Transport::Base64)
                    .await
                    .map_err(read_err)?;
                if opts.encoding == Encoding::Base64 {
                    return Ok(FileData::Text(wire));
                }
                let bytes = base64_decode(&wire).map_err(|err| self.mapped(err, &p))?;
                match text {
                    Some(enc) => enc
                        .decode(&bytes)
                        .map(FileData::Text)
                        .map_err(|err| self.mapped(err, &p)),
                    None => Ok(FileData::Bytes(bytes)),
                }
            }
        }
    }

    /// Delete a file. Directories need `remove_all`, which also makes
    /// delete failures silent.
    #[tracing::instrument(level = "debug", skip(self, opts), fields(remove_all = opts.remove_all))]
    pub async fn unlink(&self, path: &str, opts: UnlinkOptions) -> FsResult<()> {
        let p = self.sandbox.normalize(path);
        if p.is_root() {
            return Err(FsError::not_permitted(p.to_string()));
        }

        let raw = self
            .raw_stat(&p)
            .await
            .map_err(|err| self.read_failure("unlink", err, &p))?;
        if raw.kind == EntryKind::Directory {
            if !opts.remove_all {
                return Err(FsError::not_permitted(p.to_string()));
            }
            return self.rmdir(path, RmdirOptions::recursive()).await;
        }

        match self.storage.delete_file(&self.sandbox.rooted(&p)).await {
            Ok(()) => {
                self.emit(Event::RemoveFile { path: p.to_string() });
                Ok(())
            }
            Err(err) if opts.remove_all => {
                self.warner.swallow("unlink", &p.to_string(), err);
                Ok(())
            }
            Err(err) => Err(self.read_failure("unlink", err, &p)),
        }
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn rename(&self, old_path: &str, new_path: &str) -> FsResult<()> {
        self.transfer(Transfer::Rename, old_path, new_path).await
    }

    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn copy(&self, old_path: &str, new_path: &str) -> FsResult<()> {
        self.transfer(Transfer::Copy, old_path, new_path).await
    }

    // ═══════════════════════════════════════════════════════════════════
    // Metadata
    // ═══════════════════════════════════════════════════════════════════

    pub async fn stat(&self, path: &str) -> FsResult<Stat> {
        let p = self.sandbox.normalize(path);
        match self.raw_stat(&p).await {
            Ok(raw) => Ok(Stat::from_storage(raw, self.sandbox.is_link_marker(&p))),
            Err(StorageError::TimedOut(_)) => Err(FsError::timed_out(p.to_string())),
            Err(err) => {
                self.note_unmapped("stat", &err, &p);
                Err(FsError::not_found(p.to_string()))
            }
        }
    }

    /// Same as [`stat`](Self::stat); links are never followed.
    pub async fn lstat(&self, path: &str) -> FsResult<Stat> {
        self.stat(path).await
    }

    pub async fn exists(&self, path: &str) -> bool {
        self.stat(path).await.is_ok()
    }

    pub async fn is_file(&self, path: &str) -> bool {
        self.stat(path).await.is_ok_and(|s| s.is_file())
    }

    pub async fn is_directory(&self, path: &str) -> bool {
        self.stat(path).await.is_ok_and(|s| s.is_directory())
    }

    pub async fn is_symbolic_link(&self, path: &str) -> bool {
        self.stat(path).await.is_ok_and(|s| s.is_symbolic_link())
    }

    /// Size in bytes; directories report the total of their files.
    pub async fn du(&self, path: &str) -> FsResult<u64> {
        let p = self.sandbox.normalize(path);
        let mut total = 0;
        let mut pending = vec![p.clone()];

        while let Some(next) = pending.pop() {
            let raw = match self.raw_stat(&next).await {
                Ok(raw) => raw,
                Err(_) if next != p => continue,
                Err(err) => return Err(self.read_failure("du", err, &p)),
            };
            if raw.kind != EntryKind::Directory {
                total += raw.size;
                continue;
            }
            let children = self
                .storage
                .readdir(&self.sandbox.rooted(&next))
                .await
                .map_err(|err| self.read_failure("du", err, &next))?;
            pending.extend(children.iter().map(|name| next.join(name)));
        }
        Ok(total)
    }

    /// Backend URI for a path, with the scheme removed and percent escapes
    /// decoded (`file:///srv/a%20b` → `/srv/a b`).
    pub async fn get_uri(&self, path: &str) -> FsResult<String> {
        let p = self.sandbox.normalize(path);
        let uri = self
            .storage
            .get_uri(&self.sandbox.rooted(&p))
            .await
            .map_err(|_| FsError::not_found(p.to_string()))?;

        let rest = uri.split_once("://").map_or(uri.as_str(), |(_, rest)| rest);
        percent_decode_str(rest)
            .decode_utf8()
            .map(|decoded| decoded.into_owned())
            .map_err(|_| FsError::not_found(p.to_string()))
    }

    /// Size of a remote resource, via a HEAD probe.
    pub async fn back_file(&self, url: &str) -> FsResult<u64> {
        let Some(probe) = &self.probe else {
            return Err(FsError::not_found(url));
        };
        match probe.head(url).await {
            Ok(response) if response.status == 200 => Ok(response.content_length.unwrap_or(0)),
            Ok(response) => {
                debug!(url, status = response.status, "probe rejected");
                Err(FsError::not_found(url))
            }
            Err(err) => {
                debug!(url, %err, "probe failed");
                Err(FsError::not_found(url))
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Links
    // ═══════════════════════════════════════════════════════════════════

    /// Create `<target>.lnk` holding `path` as its text.
    #[tracing::instrument(level = "debug", skip(self))]
    pub async fn symlink(&self, target: &str, path: &str) -> FsResult<()> {
        let marker = self.link_marker(target);
        self.write_file(&marker.to_string(), path, WriteOptions::default())
            .await
    }

    /// Text stored in a link marker. `path` may name the marker itself or
    /// the path it was created for.
    pub async fn readlink(&self, path: &str) -> FsResult<String> {
        let marker = self.link_marker(path);
        let data = self
            .read_file(&marker.to_string(), ReadOptions::utf8())
            .await?;
        match data {
            FileData::Text(text) => Ok(text),
            FileData::Bytes(bytes) => Ok(String::from_utf8_lossy(&bytes).into_owned()),
        }
    }

    fn link_marker(&self, path: &str) -> VirtualPath {
        let p = self.sandbox.normalize(path);
        if self.sandbox.is_link_marker(&p) {
            p
        } else {
            self.sandbox
                .normalize(&format!("{p}.{}", sandfs_types::LINK_MARKER_EXT))
        }
    }

    // ═══════════════════════════════════════════════════════════════════
    // Events
    // ═══════════════════════════════════════════════════════════════════

    /// Subscribe to one raw event channel. Without a watcher nothing is
    /// ever delivered.
    pub fn on<F>(&self, name: EventName, handler: F) -> Subscription
    where
        F: Fn(&Event) + Send + Sync + 'static,
    {
        match &self.bus {
            Some(bus) => bus.on(name, handler),
            None => Subscription::empty(),
        }
    }

    pub fn watch<F>(&self, request: WatchRequest, callback: F) -> Subscription
    where
        F: Fn(WatchEvent) + Send + Sync + 'static,
    {
        self.router.watch(request, callback)
    }

    // ═══════════════════════════════════════════════════════════════════
    // Path helpers
    // ═══════════════════════════════════════════════════════════════════

    /// Normalized virtual path, e.g. `a//b/../c/` → `/a/c`.
    pub fn normalize(&self, path: &str) -> String {
        self.sandbox.normalize(path).to_string()
    }

    /// Normalized path relative to the root, without the leading slash.
    pub fn relatively(&self, path: &str) -> String {
        self.sandbox.normalize(path).to_relative_string()
    }

    pub fn relative(&self, from: &str, to: &str) -> String {
        self.sandbox.relative(from, to)
    }

    pub fn is_equal(&self, a: &str, b: &str) -> bool {
        self.sandbox.equals(a, b)
    }

    pub fn is_parent_dir(&self, parent: &str, path: &str) -> bool {
        self.sandbox.is_ancestor(parent, path)
    }

    pub fn replace_parent_dir(&self, path: &str, from: &str, to: &str) -> String {
        self.sandbox.rebase(path, from, to).to_string()
    }

    // ═══════════════════════════════════════════════════════════════════
    // Internals
    // ═══════════════════════════════════════════════════════════════════

    async fn raw_stat(&self, p: &VirtualPath) -> StorageResult<StorageStat> {
        let backend = self.sandbox.rooted(p);
        debug!(path = %p, backend = %backend, "stat");
        self.storage.stat(&backend).await
    }

    async fn kind_of(&self, p: &VirtualPath) -> Option<EntryKind> {
        self.raw_stat(p).await.ok().map(|raw| raw.kind)
    }

    /// `p` must be an existing directory.
    async fn require_dir(&self, p: &VirtualPath) -> FsResult<()> {
        match self.kind_of(p).await {
            Some(EntryKind::Directory) => Ok(()),
            Some(_) => Err(FsError::not_a_directory(p.to_string())),
            None => Err(FsError::not_found(p.to_string())),
        }
    }

    /// Shared write/append preconditions: the target is not a directory
    /// and its parent is one, created first when `recursive`.
    async fn prepare_file_target(&self, p: &VirtualPath, recursive: bool) -> FsResult<()> {
        if p.is_root() || self.kind_of(p).await == Some(EntryKind::Directory) {
            return Err(FsError::is_a_directory(p.to_string()));
        }

        let parent = p.parent();
        match self.kind_of(&parent).await {
            Some(EntryKind::Directory) => Ok(()),
            Some(_) => Err(FsError::not_a_directory(parent.to_string())),
            None if recursive => {
                self.mkdir(&parent.to_string(), MkdirOptions::recursive())
                    .await
            }
            None => Err(FsError::not_found(parent.to_string())),
        }
    }

    /// Choose the wire form for a payload.
    fn encode(&self, data: FileData, encoding: Encoding) -> (String, Transport) {
        match data {
            FileData::Bytes(bytes) => (base64_encode(&bytes), Transport::Base64),
            FileData::Text(text) if encoding == Encoding::Base64 => (text, Transport::Base64),
            FileData::Text(text) => {
                let enc = encoding.text().unwrap_or(TextEncoding::Utf8);
                if self.config.base64_always {
                    (base64_encode(&enc.encode(&text)), Transport::Base64)
                } else {
                    (text, Transport::Text(enc))
                }
            }
        }
    }

    async fn transfer(&self, transfer: Transfer, old_path: &str, new_path: &str) -> FsResult<()> {
        let from = self.sandbox.normalize(old_path);
        let to = self.sandbox.normalize(new_path);

        // Order matters: later checks assume the earlier ones passed.
        let Some(source) = self.kind_of(&from).await else {
            return Err(FsError::not_found(from.to_string()));
        };
        self.require_dir(&to.parent()).await?;
        if self.kind_of(&to).await == Some(EntryKind::Directory) {
            return Err(if source == EntryKind::Directory {
                FsError::already_exists(to.to_string())
            } else {
                FsError::is_a_directory(to.to_string())
            });
        }

        let (src, dst) = (self.sandbox.rooted(&from), self.sandbox.rooted(&to));
        let result = match transfer {
            Transfer::Rename => self.storage.rename(&src, &dst).await,
            Transfer::Copy => self.storage.copy(&src, &dst).await,
        };
        result.map_err(|err| {
            let side = match err {
                StorageError::AlreadyExists(_)
                | StorageError::IsDirectory(_)
                | StorageError::NotDirectory(_) => &to,
                _ => &from,
            };
            self.mapped(err, side)
        })?;

        if let Some(bus) = &self.bus {
            let announcer = Announcer {
                storage: Arc::clone(&self.storage),
                sandbox: self.sandbox.clone(),
                bus: bus.clone(),
                warner: self.warner.clone(),
            };
            let announce = announcer.announce(transfer, from, to);
            match tokio::runtime::Handle::try_current() {
                Ok(handle) => {
                    handle.spawn(announce);
                }
                Err(_) => announce.await,
            }
        }
        Ok(())
    }

    fn emit(&self, event: Event) {
        if let Some(bus) = &self.bus {
            bus.emit(&event);
        }
    }

    /// Map a read failure. Ones with no taxonomy kind are reported as
    /// `ENOENT` after going to the log and the warning sink.
    fn read_failure(&self, operation: &'static str, err: StorageError, p: &VirtualPath) -> FsError {
        self.note_unmapped(operation, &err, p);
        FsError::from_storage_read(err, p.to_string())
    }

    fn note_unmapped(&self, operation: &'static str, err: &StorageError, p: &VirtualPath) {
        if err.kind().is_none() {
            self.warner.swallow(operation, &p.to_string(), err.clone());
        }
    }

    /// Map a mutation failure, logging the ones with no taxonomy kind.
    fn mapped(&self, err: StorageError, p: &VirtualPath) -> FsError {
        let mapped = FsError::from_storage(err, p.to_string());
        if let FsError::Storage(inner) = &mapped {
            warn!(path = %p, code = inner.code(), error = %inner, "unmapped backend failure");
        }
        mapped
    }
}
