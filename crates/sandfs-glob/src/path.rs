//! `/`-separated glob patterns with globstar (`**`) support.
//!
//! - `/docs/*.md` matches `/docs/a.md` but not `/docs/x/a.md`
//! - `/docs/**` matches `/docs` and everything under it
//! - `/**/*.lnk` matches a link marker at any depth
//!
//! Patterns and candidates are compared segment by segment, so leading,
//! trailing and doubled slashes never affect the result.

use thiserror::Error;

use crate::segment::{contains_glob, segment_match};

/// Errors when parsing path patterns.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("empty pattern")]
    Empty,
}

/// A segment of a path pattern.
#[derive(Debug, Clone, PartialEq)]
pub enum PathSegment {
    /// Exact segment: "docs", "a.md"
    Literal(String),
    /// Segment with wildcards: "*.md", "img_?"
    Pattern(String),
    /// Zero or more whole segments
    Globstar,
}

/// A compiled path pattern.
///
/// ```
/// use sandfs_glob::GlobPath;
///
/// let pattern = GlobPath::new("/notes/**/*.txt").unwrap();
/// assert!(pattern.matches("/notes/today.txt"));
/// assert!(pattern.matches("/notes/2024/may/today.txt"));
/// assert!(!pattern.matches("/todo/today.txt"));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct GlobPath {
    segments: Vec<PathSegment>,
}

impl GlobPath {
    /// Compile a pattern. Only the empty string is rejected; `/` compiles
    /// to a pattern matching the root alone.
    pub fn new(pattern: &str) -> Result<Self, PatternError> {
        if pattern.is_empty() {
            return Err(PatternError::Empty);
        }

        let mut segments = Vec::new();
        for part in pattern.split('/').filter(|p| !p.is_empty()) {
            let segment = if part == "**" {
                PathSegment::Globstar
            } else if contains_glob(part) || part.contains('\\') {
                PathSegment::Pattern(part.to_string())
            } else {
                PathSegment::Literal(part.to_string())
            };
            if segment == PathSegment::Globstar && segments.last() == Some(&PathSegment::Globstar) {
                continue;
            }
            segments.push(segment);
        }

        Ok(Self { segments })
    }

    /// Check a `/`-separated candidate path against this pattern.
    pub fn matches(&self, candidate: &str) -> bool {
        let parts: Vec<&str> = candidate.split('/').filter(|p| !p.is_empty()).collect();
        self.matches_segments(&parts)
    }

    /// Check pre-split candidate segments against this pattern.
    pub fn matches_segments(&self, parts: &[&str]) -> bool {
        match_from(&self.segments, parts)
    }

    /// True if the pattern has no wildcards at all.
    pub fn is_literal(&self) -> bool {
        self.segments
            .iter()
            .all(|s| matches!(s, PathSegment::Literal(_)))
    }

    pub fn segments(&self) -> &[PathSegment] {
        &self.segments
    }
}

fn match_from(segments: &[PathSegment], parts: &[&str]) -> bool {
    let Some((first, rest)) = segments.split_first() else {
        return parts.is_empty();
    };

    match first {
        PathSegment::Globstar => (0..=parts.len()).any(|skip| match_from(rest, &parts[skip..])),
        PathSegment::Literal(lit) => {
            matches!(parts.first(), Some(part) if part == lit) && match_from(rest, &parts[1..])
        }
        PathSegment::Pattern(pat) => {
            matches!(parts.first(), Some(part) if segment_match(pat, part))
                && match_from(rest, &parts[1..])
        }
    }
}
