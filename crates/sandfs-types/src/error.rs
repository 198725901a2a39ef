//! Error taxonomy for sandfs operations and storage backends.
//!
//! Facade operations only ever fail with an [`ErrorKind`] from the closed
//! taxonomy, carrying the offending virtual path. The one escape hatch is
//! [`FsError::Storage`]: a backend failure with no taxonomy counterpart,
//! passed through verbatim.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for facade operations.
pub type FsResult<T> = Result<T, FsError>;

/// Result type for storage backend primitives.
pub type StorageResult<T> = Result<T, StorageError>;

/// The closed set of failure kinds a facade operation can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    AlreadyExists,
    NotFound,
    NotADirectory,
    NotEmpty,
    IsADirectory,
    OperationNotPermitted,
    TimedOut,
}

impl ErrorKind {
    /// POSIX-style code, used as the message prefix.
    pub fn code(self) -> &'static str {
        match self {
            ErrorKind::AlreadyExists => "EEXIST",
            ErrorKind::NotFound => "ENOENT",
            ErrorKind::NotADirectory => "ENOTDIR",
            ErrorKind::NotEmpty => "ENOTEMPTY",
            ErrorKind::IsADirectory => "EISDIR",
            ErrorKind::OperationNotPermitted => "EPERM",
            ErrorKind::TimedOut => "ETIMEDOUT",
        }
    }

    pub fn all() -> [ErrorKind; 7] {
        [
            ErrorKind::AlreadyExists,
            ErrorKind::NotFound,
            ErrorKind::NotADirectory,
            ErrorKind::NotEmpty,
            ErrorKind::IsADirectory,
            ErrorKind::OperationNotPermitted,
            ErrorKind::TimedOut,
        ]
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Errors returned by facade operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FsError {
    /// A violated filesystem invariant, e.g. `ENOTEMPTY: /a`.
    #[error("{}", render(.kind, .path))]
    Sandbox {
        kind: ErrorKind,
        path: Option<String>,
    },

    /// A backend failure with no taxonomy counterpart.
    #[error(transparent)]
    Storage(#[from] StorageError),
}

fn render(kind: &ErrorKind, path: &Option<String>) -> String {
    match path {
        Some(path) => format!("{}: {}", kind.code(), path),
        None => kind.code().to_string(),
    }
}

impl FsError {
    pub fn new(kind: ErrorKind, path: impl Into<String>) -> Self {
        FsError::Sandbox {
            kind,
            path: Some(path.into()),
        }
    }

    /// An error with no path context; the message is just the code.
    pub fn bare(kind: ErrorKind) -> Self {
        FsError::Sandbox { kind, path: None }
    }

    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::new(ErrorKind::AlreadyExists, path)
    }

    pub fn not_found(path: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, path)
    }

    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotADirectory, path)
    }

    pub fn not_empty(path: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotEmpty, path)
    }

    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::new(ErrorKind::IsADirectory, path)
    }

    pub fn not_permitted(path: impl Into<String>) -> Self {
        Self::new(ErrorKind::OperationNotPermitted, path)
    }

    pub fn timed_out(path: impl Into<String>) -> Self {
        Self::new(ErrorKind::TimedOut, path)
    }

    /// The taxonomy kind, or `None` for a passed-through backend failure.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            FsError::Sandbox { kind, .. } => Some(*kind),
            FsError::Storage(err) => err.kind(),
        }
    }

    pub fn path(&self) -> Option<&str> {
        match self {
            FsError::Sandbox { path, .. } => path.as_deref(),
            FsError::Storage(_) => None,
        }
    }

    pub fn is(&self, kind: ErrorKind) -> bool {
        matches!(self, FsError::Sandbox { kind: k, .. } if *k == kind)
    }

    /// Map a backend failure onto the taxonomy, attaching `path`.
    ///
    /// Failures without a counterpart come back as [`FsError::Storage`].
    pub fn from_storage(err: StorageError, path: impl Into<String>) -> Self {
        match err.kind() {
            Some(kind) => Self::new(kind, path),
            None => FsError::Storage(err),
        }
    }

    /// Like [`from_storage`](Self::from_storage), but unmapped failures on a
    /// read path surface as `ENOENT`.
    pub fn from_storage_read(err: StorageError, path: impl Into<String>) -> Self {
        let kind = err.kind().unwrap_or(ErrorKind::NotFound);
        Self::new(kind, path)
    }
}

/// Failures reported by a storage backend primitive.
///
/// The payload is the backend's own description and is never shown in
/// facade errors except through [`FsError::Storage`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    #[error("not found: {0}")]
    NotFound(String),
    #[error("already exists: {0}")]
    AlreadyExists(String),
    #[error("is a directory: {0}")]
    IsDirectory(String),
    #[error("not a directory: {0}")]
    NotDirectory(String),
    #[error("directory not empty: {0}")]
    NotEmpty(String),
    #[error("permission denied: {0}")]
    PermissionDenied(String),
    #[error("timed out: {0}")]
    TimedOut(String),
    #[error("invalid data: {0}")]
    InvalidData(String),
    #[error("io error: {0}")]
    Io(String),
}

impl StorageError {
    /// Stable identifier for the failure class.
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::NotFound(_) => "NOT_FOUND",
            StorageError::AlreadyExists(_) => "ALREADY_EXISTS",
            StorageError::IsDirectory(_) => "IS_DIRECTORY",
            StorageError::NotDirectory(_) => "NOT_DIRECTORY",
            StorageError::NotEmpty(_) => "NOT_EMPTY",
            StorageError::PermissionDenied(_) => "PERMISSION_DENIED",
            StorageError::TimedOut(_) => "TIMED_OUT",
            StorageError::InvalidData(_) => "INVALID_DATA",
            StorageError::Io(_) => "IO",
        }
    }

    /// The taxonomy kind this failure maps onto, if any.
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            StorageError::NotFound(_) => Some(ErrorKind::NotFound),
            StorageError::AlreadyExists(_) => Some(ErrorKind::AlreadyExists),
            StorageError::IsDirectory(_) => Some(ErrorKind::IsADirectory),
            StorageError::NotDirectory(_) => Some(ErrorKind::NotADirectory),
            StorageError::NotEmpty(_) => Some(ErrorKind::NotEmpty),
            StorageError::PermissionDenied(_) => Some(ErrorKind::OperationNotPermitted),
            StorageError::TimedOut(_) => Some(ErrorKind::TimedOut),
            StorageError::InvalidData(_) | StorageError::Io(_) => None,
        }
    }

    /// Classify a failure known only by its prose, for bindings without
    /// structured error codes. Anything unrecognised becomes
    /// [`StorageError::Io`].
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        let lower = message.to_lowercase();
        let has = |needle: &str| lower.contains(needle);

        if has("does not exist") || has("not found") || has("no such file") {
            StorageError::NotFound(message)
        } else if has("already exists") || has("directory exists") || has("file exists") {
            StorageError::AlreadyExists(message)
        } else if has("not empty") {
            StorageError::NotEmpty(message)
        } else if has("not a directory") || has("must be a directory") {
            StorageError::NotDirectory(message)
        } else if has("is a directory") {
            StorageError::IsDirectory(message)
        } else if has("permission") || has("not permitted") {
            StorageError::PermissionDenied(message)
        } else if has("timed out") || has("timeout") {
            StorageError::TimedOut(message)
        } else {
            StorageError::Io(message)
        }
    }
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        use std::io::ErrorKind as Io;
        let message = err.to_string();
        match err.kind() {
            Io::NotFound => StorageError::NotFound(message),
            Io::AlreadyExists => StorageError::AlreadyExists(message),
            Io::IsADirectory => StorageError::IsDirectory(message),
            Io::NotADirectory => StorageError::NotDirectory(message),
            Io::DirectoryNotEmpty => StorageError::NotEmpty(message),
            Io::PermissionDenied | Io::ReadOnlyFilesystem => StorageError::PermissionDenied(message),
            Io::TimedOut => StorageError::TimedOut(message),
            Io::InvalidData => StorageError::InvalidData(message),
            // Unclassified kinds (`Other`, `Uncategorized`) only carry prose.
            _ => StorageError::from_message(message),
        }
    }
}
