//! sandfs-kernel: a sandboxed, POSIX-flavoured filesystem facade.
//!
//! This crate provides:
//!
//! - **Sandbox**: Path confinement, normalization and comparison
//! - **Storage**: The coarse backend primitives, with memory and local
//!   directory backends
//! - **Events**: Typed synchronous pub/sub for mutation events
//! - **Watch**: Scoped, excluded, pattern- or ancestry-matched watch
//!   subscriptions
//! - **Facade**: [`SandFs`], which re-derives POSIX error semantics around
//!   each backend primitive and publishes events on success
//! - **Config**: TOML configuration loaded from the user config directory

pub mod config;
pub mod events;
pub mod facade;
pub mod remote;
pub mod sandbox;
pub mod storage;
pub mod watch;

pub use config::{FsConfig, Swallowed, WarningSink};
pub use events::{EventBus, Handler, Subscription, SubscriptionId};
pub use facade::SandFs;
pub use remote::{ProbeError, ProbeResponse, RemoteProbe};
pub use sandbox::{PathSandbox, VirtualPath};
pub use storage::{LocalStorage, MemoryStorage, Storage};
pub use watch::{
    MatchMode, PathSource, PatternSource, ScopeSource, WatchRequest, WatchRouter, WatchType,
};

// ═══════════════════════════════════════════════════════════════════════════
// Embedding Conveniences
// ═══════════════════════════════════════════════════════════════════════════

// Data types, so embedders need only one dependency
pub use sandfs_types as types;
pub use sandfs_types::{
    Encoding, ErrorKind, Event, EventName, FileData, FsError, FsResult, MkdirOptions, ReadOptions,
    RmdirOptions, Stat, StorageError, UnlinkOptions, WatchEvent, WriteOptions,
};
