//! Pure data types for sandfs: errors, stat snapshots, events, encodings.
//!
//! This crate is a leaf dependency with no async runtime and no I/O, so that
//! storage backends and embedders can speak sandfs types without pulling in
//! the kernel.

pub mod encoding;
pub mod error;
pub mod event;
pub mod options;
pub mod stat;

// Flat re-exports for convenience
pub use encoding::*;
pub use error::*;
pub use event::*;
pub use options::*;
pub use stat::*;
