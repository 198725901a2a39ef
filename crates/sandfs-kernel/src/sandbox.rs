//! Path confinement and normalization.
//!
//! Every user-supplied path is interpreted relative to a virtual root and
//! reduced to a [`VirtualPath`]: a list of plain segments with `.`, `..`,
//! empty and trailing separators resolved. `..` never climbs above the
//! root, so the backend only ever sees paths under the configured root
//! directory.
//!
//! ```text
//! "/a/./b//c/"   → /a/b/c
//! "../../etc"    → /etc
//! "a/b/../../.." → /
//! ```

use std::fmt;

use sandfs_types::LINK_MARKER_EXT;

/// A normalized, root-relative path.
///
/// Displays as `/seg/seg`, with the root as `/`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct VirtualPath {
    segments: Vec<String>,
}

impl VirtualPath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Lexically resolve `path`. Only `/` separates segments.
    pub fn parse(path: &str) -> Self {
        let mut segments: Vec<String> = Vec::new();
        for part in path.split('/') {
            match part {
                "" | "." => {}
                ".." => {
                    segments.pop();
                }
                seg => segments.push(seg.to_string()),
            }
        }
        Self { segments }
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// The containing directory. The root is its own parent.
    pub fn parent(&self) -> Self {
        let mut segments = self.segments.clone();
        segments.pop();
        Self { segments }
    }

    pub fn file_name(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Extension of the last segment, without the dot. Dot files such as
    /// `.lnk` have no extension.
    pub fn extension(&self) -> Option<&str> {
        let name = self.file_name()?;
        let idx = name.rfind('.')?;
        if idx == 0 {
            return None;
        }
        Some(&name[idx + 1..])
    }

    /// Append a relative path, resolving it as [`parse`](Self::parse) does.
    pub fn join(&self, rest: &str) -> Self {
        let mut joined = self.to_string();
        joined.push('/');
        joined.push_str(rest);
        Self::parse(&joined)
    }

    fn with_tail(&self, tail: &[String]) -> Self {
        let mut segments = self.segments.clone();
        segments.extend_from_slice(tail);
        Self { segments }
    }

    /// Segments joined without a leading slash; empty for the root.
    pub fn to_relative_string(&self) -> String {
        self.segments.join("/")
    }
}

impl fmt::Display for VirtualPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "/{}", self.segments.join("/"))
    }
}

impl From<&str> for VirtualPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}

/// Confines, normalizes and compares paths for one configured root.
#[derive(Debug, Clone)]
pub struct PathSandbox {
    /// Backend-side location of the virtual root.
    root: VirtualPath,
    case_insensitive: bool,
}

impl Default for PathSandbox {
    fn default() -> Self {
        Self::new("/")
    }
}

impl PathSandbox {
    pub fn new(root: &str) -> Self {
        Self {
            root: VirtualPath::parse(root),
            case_insensitive: false,
        }
    }

    /// Compare segments ignoring ASCII case.
    pub fn case_insensitive(mut self, yes: bool) -> Self {
        self.case_insensitive = yes;
        self
    }

    /// The configured root as a backend-relative path.
    pub fn root(&self) -> &VirtualPath {
        &self.root
    }

    pub fn normalize(&self, path: &str) -> VirtualPath {
        VirtualPath::parse(path)
    }

    /// The backend-facing path: root joined with the virtual path, no
    /// leading slash. Empty when both are the root.
    pub fn rooted(&self, path: &VirtualPath) -> String {
        self.root.with_tail(path.segments()).to_relative_string()
    }

    pub fn folds_case(&self) -> bool {
        self.case_insensitive
    }

    pub fn equals(&self, a: &str, b: &str) -> bool {
        self.equals_path(&self.normalize(a), &self.normalize(b))
    }

    pub fn equals_path(&self, a: &VirtualPath, b: &VirtualPath) -> bool {
        self.same_segments(a.segments(), b.segments())
    }

    /// True iff `parent` is a strict prefix of `path`. A path is never its
    /// own ancestor; the root is an ancestor of every other path.
    pub fn is_ancestor(&self, parent: &str, path: &str) -> bool {
        self.is_ancestor_of(&self.normalize(parent), &self.normalize(path))
    }

    pub fn is_ancestor_of(&self, parent: &VirtualPath, path: &VirtualPath) -> bool {
        let (p, c) = (parent.segments(), path.segments());
        p.len() < c.len() && self.same_segments(p, &c[..p.len()])
    }

    /// Move `path` from under `from` to under `to`. Paths outside `from`
    /// come back normalized but otherwise unchanged.
    pub fn rebase(&self, path: &str, from: &str, to: &str) -> VirtualPath {
        let (path, from) = (self.normalize(path), self.normalize(from));
        if !self.is_ancestor_of(&from, &path) {
            return path;
        }
        self.normalize(to).with_tail(&path.segments()[from.segments().len()..])
    }

    /// Relative path from `from` to `to` (`..` where needed, empty when
    /// equal).
    pub fn relative(&self, from: &str, to: &str) -> String {
        let (from, to) = (self.normalize(from), self.normalize(to));
        let (f, t) = (from.segments(), to.segments());
        let common = f
            .iter()
            .zip(t.iter())
            .take_while(|(a, b)| self.same_segment(a, b))
            .count();

        let mut parts: Vec<&str> = std::iter::repeat_n("..", f.len() - common).collect();
        parts.extend(t[common..].iter().map(String::as_str));
        parts.join("/")
    }

    /// Whether the path names an emulated symlink.
    pub fn is_link_marker(&self, path: &VirtualPath) -> bool {
        path.extension() == Some(LINK_MARKER_EXT)
    }

    fn same_segments(&self, a: &[String], b: &[String]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.same_segment(x, y))
    }

    fn same_segment(&self, a: &str, b: &str) -> bool {
        if self.case_insensitive {
            a.eq_ignore_ascii_case(b)
        } else {
            a == b
        }
    }
}
