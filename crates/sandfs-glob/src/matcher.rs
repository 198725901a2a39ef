//! The pattern-matching capability consumed by watch filters.

use crate::path::GlobPath;

/// `match(pattern, candidate) -> bool`.
///
/// Implement this to plug a different pattern dialect into watch
/// subscriptions. Implementations must be pure: the same inputs always give
/// the same answer.
pub trait PatternMatcher: Send + Sync {
    fn is_match(&self, pattern: &str, candidate: &str) -> bool;
}

/// Default matcher backed by [`GlobPath`].
///
/// Invalid (empty) patterns match nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct GlobMatcher;

impl PatternMatcher for GlobMatcher {
    fn is_match(&self, pattern: &str, candidate: &str) -> bool {
        GlobPath::new(pattern)
            .map(|p| p.matches(candidate))
            .unwrap_or(false)
    }
}

impl<F> PatternMatcher for F
where
    F: Fn(&str, &str) -> bool + Send + Sync,
{
    fn is_match(&self, pattern: &str, candidate: &str) -> bool {
        self(pattern, candidate)
    }
}
