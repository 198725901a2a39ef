//! Stat snapshots.
//!
//! The backend only knows an entry's kind, size and timestamps. Everything
//! else POSIX callers expect (inode, link count, owner, device, mode) is a
//! fixed sandbox-wide constant.

use serde::{Deserialize, Serialize};

/// Inode number reported for every entry.
pub const STAT_INO: u64 = 967;
/// Link count surrogate.
pub const STAT_NLINK: u64 = 1;
pub const STAT_UID: u32 = 1;
pub const STAT_GID: u32 = 1;
pub const STAT_DEV: u64 = 1;

/// Mode bits for regular files (`S_IFREG | 0o666`).
pub const MODE_FILE: u32 = 0o100_666;
/// Mode bits for directories and link markers (`S_IFDIR | 0o666`).
pub const MODE_DIR: u32 = 0o040_666;

/// File-name extension that marks a file as an emulated symbolic link.
pub const LINK_MARKER_EXT: &str = "lnk";

/// Kind of entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
    Symlink,
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EntryKind::File => "file",
            EntryKind::Directory => "directory",
            EntryKind::Symlink => "symlink",
        })
    }
}

/// What a storage backend reports for a path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageStat {
    pub kind: EntryKind,
    pub size: u64,
    /// Milliseconds since the Unix epoch.
    pub mtime_ms: u64,
    /// Omitted by backends that don't track status changes.
    pub ctime_ms: Option<u64>,
}

/// An immutable metadata snapshot, produced per `stat` call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stat {
    pub kind: EntryKind,
    pub mode: u32,
    pub size: u64,
    pub ino: u64,
    pub nlink: u64,
    pub uid: u32,
    pub gid: u32,
    pub dev: u64,
    pub mtime_ms: u64,
    pub ctime_ms: u64,
}

impl Stat {
    /// Build a snapshot from backend fields.
    ///
    /// `link_marker` reclassifies the entry as a symlink regardless of what
    /// the backend reported.
    pub fn from_storage(raw: StorageStat, link_marker: bool) -> Self {
        let kind = if link_marker {
            EntryKind::Symlink
        } else {
            raw.kind
        };
        Self {
            kind,
            mode: mode_for(kind),
            size: raw.size,
            ino: STAT_INO,
            nlink: STAT_NLINK,
            uid: STAT_UID,
            gid: STAT_GID,
            dev: STAT_DEV,
            mtime_ms: raw.mtime_ms,
            ctime_ms: raw.ctime_ms.unwrap_or(raw.mtime_ms),
        }
    }

    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    pub fn is_directory(&self) -> bool {
        self.kind == EntryKind::Directory
    }

    pub fn is_symbolic_link(&self) -> bool {
        self.kind == EntryKind::Symlink
    }
}

/// Permission bits depend on kind alone.
pub fn mode_for(kind: EntryKind) -> u32 {
    match kind {
        EntryKind::File => MODE_FILE,
        EntryKind::Directory | EntryKind::Symlink => MODE_DIR,
    }
}
