//! sandfs-glob: pattern matching for sandbox paths.
//!
//! Provides:
//! - **segment_match**: Shell-style matching of a single path segment
//!   (`*`, `?`, `[a-z]`, `[!x]`, `\` escapes, `{a,b}` alternatives)
//! - **GlobPath**: `/`-separated patterns with globstar (`**`) support
//! - **PatternMatcher**: The `match(pattern, candidate)` capability the
//!   watch router consumes, with a default [`GlobMatcher`]
//!
//! Dot files are never special: `*` matches `.hidden` the same way it
//! matches `visible`.

mod matcher;
mod path;
pub mod segment;

pub use matcher::{GlobMatcher, PatternMatcher};
pub use path::{GlobPath, PathSegment, PatternError};
pub use segment::{contains_glob, expand_braces, segment_match};
