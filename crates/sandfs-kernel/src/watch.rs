//! Filtered watch subscriptions on top of the [`EventBus`].
//!
//! A [`WatchRequest`] picks the channels to listen on and describes which
//! paths are interesting. Every candidate event goes through three filters
//! in a fixed order:
//!
//! 1. **scope** (`dir`): the candidate must lie under the scope directory
//! 2. **exclude**: any matching exclude pattern drops the candidate
//! 3. **mode**: exact, descendant or pattern match against the watch paths
//!
//! Scope therefore wins over exclude, and exclude wins over a match.
//!
//! ```text
//! watch(path="/a", kind=File, mode=Relative)
//!   write:file /a/b.txt  → delivered
//!   write:file /c/d.txt  → dropped (not under /a)
//! ```

use std::str::FromStr;
use std::sync::Arc;

use sandfs_glob::{GlobMatcher, PatternMatcher};
use sandfs_types::{Event, EventName, WatchEvent};

use crate::events::{EventBus, Subscription};
use crate::sandbox::{PathSandbox, VirtualPath};

/// Produces watch paths or patterns at delivery time.
pub type PathProducer = Arc<dyn Fn() -> Vec<String> + Send + Sync>;

/// Produces the scope directory at delivery time. `None` suspends delivery.
pub type ScopeProducer = Arc<dyn Fn() -> Option<String> + Send + Sync>;

/// Watch callback.
pub type WatchCallback = Arc<dyn Fn(WatchEvent) + Send + Sync>;

/// Which channels a watch listens on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchType {
    /// `write:file` and `remove:file`.
    File,
    /// `create:dir` and `remove:dir`.
    Dir,
    /// All four primitive channels (`*`).
    #[default]
    All,
    /// One raw channel.
    Event(EventName),
}

impl FromStr for WatchType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(WatchType::File),
            "dir" => Ok(WatchType::Dir),
            "*" => Ok(WatchType::All),
            other => EventName::parse(other)
                .map(WatchType::Event)
                .ok_or_else(|| format!("unknown watch type: {other}")),
        }
    }
}

/// How watch paths are compared with candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchMode {
    /// The candidate equals a watch path.
    Absolute,
    /// The candidate is a strict descendant of a watch path.
    Relative,
    /// Either of the above.
    Abstract,
}

impl FromStr for MatchMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "absolute" => Ok(MatchMode::Absolute),
            "relative" => Ok(MatchMode::Relative),
            "abstract" => Ok(MatchMode::Abstract),
            other => Err(format!("unknown match mode: {other}")),
        }
    }
}

/// Watch paths: fixed or re-evaluated per event.
#[derive(Clone)]
pub enum PathSource {
    One(String),
    Many(Vec<String>),
    Dynamic(PathProducer),
}

impl PathSource {
    pub fn dynamic<F>(producer: F) -> Self
    where
        F: Fn() -> Vec<String> + Send + Sync + 'static,
    {
        PathSource::Dynamic(Arc::new(producer))
    }

    pub fn resolve(&self) -> Vec<String> {
        match self {
            PathSource::One(path) => vec![path.clone()],
            PathSource::Many(paths) => paths.clone(),
            PathSource::Dynamic(producer) => producer(),
        }
    }
}

impl std::fmt::Debug for PathSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSource::One(path) => f.debug_tuple("One").field(path).finish(),
            PathSource::Many(paths) => f.debug_tuple("Many").field(paths).finish(),
            PathSource::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<&str> for PathSource {
    fn from(path: &str) -> Self {
        PathSource::One(path.to_string())
    }
}

impl From<String> for PathSource {
    fn from(path: String) -> Self {
        PathSource::One(path)
    }
}

impl From<Vec<String>> for PathSource {
    fn from(paths: Vec<String>) -> Self {
        PathSource::Many(paths)
    }
}

impl From<&[&str]> for PathSource {
    fn from(paths: &[&str]) -> Self {
        PathSource::Many(paths.iter().map(|p| p.to_string()).collect())
    }
}

impl<const N: usize> From<[&str; N]> for PathSource {
    fn from(paths: [&str; N]) -> Self {
        PathSource::Many(paths.iter().map(|p| p.to_string()).collect())
    }
}

/// Exclude patterns: fixed or re-evaluated per event.
#[derive(Clone)]
pub enum PatternSource {
    Fixed(Vec<String>),
    Dynamic(PathProducer),
}

impl PatternSource {
    pub fn dynamic<F>(producer: F) -> Self
    where
        F: Fn() -> Vec<String> + Send + Sync + 'static,
    {
        PatternSource::Dynamic(Arc::new(producer))
    }

    pub fn resolve(&self) -> Vec<String> {
        match self {
            PatternSource::Fixed(patterns) => patterns.clone(),
            PatternSource::Dynamic(producer) => producer(),
        }
    }
}

impl std::fmt::Debug for PatternSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PatternSource::Fixed(patterns) => f.debug_tuple("Fixed").field(patterns).finish(),
            PatternSource::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl<T: Into<String>> FromIterator<T> for PatternSource {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        PatternSource::Fixed(iter.into_iter().map(Into::into).collect())
    }
}

/// Scope directory: fixed or re-evaluated per event.
#[derive(Clone)]
pub enum ScopeSource {
    Fixed(String),
    Dynamic(ScopeProducer),
}

impl ScopeSource {
    pub fn dynamic<F>(producer: F) -> Self
    where
        F: Fn() -> Option<String> + Send + Sync + 'static,
    {
        ScopeSource::Dynamic(Arc::new(producer))
    }

    pub fn resolve(&self) -> Option<String> {
        match self {
            ScopeSource::Fixed(dir) => Some(dir.clone()),
            ScopeSource::Dynamic(producer) => producer(),
        }
    }
}

impl std::fmt::Debug for ScopeSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScopeSource::Fixed(dir) => f.debug_tuple("Fixed").field(dir).finish(),
            ScopeSource::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

impl From<&str> for ScopeSource {
    fn from(dir: &str) -> Self {
        ScopeSource::Fixed(dir.to_string())
    }
}

/// A watch subscription request.
///
/// ```
/// use sandfs_kernel::{MatchMode, WatchRequest, WatchType};
///
/// let req = WatchRequest::new("/projects")
///     .kind(WatchType::File)
///     .mode(MatchMode::Relative)
///     .exclude(["/projects/**/*.tmp"])
///     .exists(true);
/// assert_eq!(req.kind, WatchType::File);
/// ```
#[derive(Debug, Clone)]
pub struct WatchRequest {
    pub paths: PathSource,
    pub kind: WatchType,
    /// `None` matches the watch paths as glob patterns.
    pub mode: Option<MatchMode>,
    /// `Some(true)`: created/written side only; `Some(false)`: removed
    /// side only; `None`: both.
    pub exists: Option<bool>,
    pub exclude: Option<PatternSource>,
    pub dir: Option<ScopeSource>,
    pub immediate: bool,
}

impl WatchRequest {
    pub fn new(paths: impl Into<PathSource>) -> Self {
        Self {
            paths: paths.into(),
            kind: WatchType::default(),
            mode: None,
            exists: None,
            exclude: None,
            dir: None,
            immediate: false,
        }
    }

    pub fn kind(mut self, kind: WatchType) -> Self {
        self.kind = kind;
        self
    }

    pub fn mode(mut self, mode: MatchMode) -> Self {
        self.mode = Some(mode);
        self
    }

    pub fn exists(mut self, exists: bool) -> Self {
        self.exists = Some(exists);
        self
    }

    pub fn exclude<I, T>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.exclude = Some(patterns.into_iter().collect());
        self
    }

    pub fn exclude_with(mut self, source: PatternSource) -> Self {
        self.exclude = Some(source);
        self
    }

    pub fn scope(mut self, dir: impl Into<ScopeSource>) -> Self {
        self.dir = Some(dir.into());
        self
    }

    pub fn immediate(mut self) -> Self {
        self.immediate = true;
        self
    }

    /// The bus channels this request listens on.
    pub fn channels(&self) -> Vec<EventName> {
        let pair: &[EventName] = match self.kind {
            WatchType::File => &[EventName::WriteFile, EventName::RemoveFile],
            WatchType::Dir => &[EventName::CreateDir, EventName::RemoveDir],
            WatchType::All => &EventName::PRIMITIVES,
            WatchType::Event(name) => return vec![name],
        };
        pair.iter()
            .copied()
            .filter(|name| self.exists.is_none_or(|side| name.is_creation() == side))
            .collect()
    }

    /// Action reported by the synthetic immediate delivery.
    fn immediate_action(&self) -> EventName {
        let created = self.exists != Some(false);
        match self.kind {
            WatchType::File | WatchType::All if created => EventName::WriteFile,
            WatchType::File | WatchType::All => EventName::RemoveFile,
            WatchType::Dir if created => EventName::CreateDir,
            WatchType::Dir => EventName::RemoveDir,
            WatchType::Event(name) => name,
        }
    }
}

/// The path a watch filter judges for an event. Moves are judged by their
/// destination.
fn candidate(event: &Event) -> &str {
    match event {
        Event::MoveFile { to, .. } | Event::MoveDir { to, .. } => to,
        other => other.path().unwrap_or("/"),
    }
}

/// Compiled filters of one watch.
struct WatchFilter {
    sandbox: PathSandbox,
    matcher: Arc<dyn PatternMatcher>,
    paths: PathSource,
    mode: Option<MatchMode>,
    exclude: Option<PatternSource>,
    scope: Option<ScopeSource>,
}

impl WatchFilter {
    fn accepts(&self, path: &str) -> bool {
        let candidate = self.sandbox.normalize(path);

        if let Some(scope) = &self.scope {
            let Some(dir) = scope.resolve() else {
                return false;
            };
            let dir = self.sandbox.normalize(&dir);
            if !dir.is_root() && !self.sandbox.is_ancestor_of(&dir, &candidate) {
                return false;
            }
        }

        if let Some(exclude) = &self.exclude
            && exclude
                .resolve()
                .iter()
                .any(|pattern| self.pattern_matches(pattern, &candidate))
        {
            return false;
        }

        let paths = self.paths.resolve();
        let watched = || paths.iter().map(|p| self.sandbox.normalize(p));
        match self.mode {
            Some(MatchMode::Absolute) => {
                watched().any(|p| self.sandbox.equals_path(&p, &candidate))
            }
            Some(MatchMode::Relative) => {
                watched().any(|p| self.sandbox.is_ancestor_of(&p, &candidate))
            }
            Some(MatchMode::Abstract) => watched().any(|p| {
                self.sandbox.equals_path(&p, &candidate)
                    || self.sandbox.is_ancestor_of(&p, &candidate)
            }),
            None => paths
                .iter()
                .all(|pattern| self.pattern_matches(pattern, &candidate)),
        }
    }

    /// Glob match against the candidate or any of its ancestors, so a
    /// pattern naming a directory covers everything below it.
    fn pattern_matches(&self, pattern: &str, candidate: &VirtualPath) -> bool {
        let fold = |s: String| {
            if self.sandbox.folds_case() {
                s.to_ascii_lowercase()
            } else {
                s
            }
        };
        let pattern = fold(self.sandbox.normalize(pattern).to_string());

        let mut current = candidate.clone();
        loop {
            if self.matcher.is_match(&pattern, &fold(current.to_string())) {
                return true;
            }
            if current.is_root() {
                return false;
            }
            current = current.parent();
        }
    }
}

/// Builds watch subscriptions for one facade.
#[derive(Clone)]
pub struct WatchRouter {
    sandbox: PathSandbox,
    bus: Option<EventBus>,
    matcher: Arc<dyn PatternMatcher>,
}

impl std::fmt::Debug for WatchRouter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatchRouter")
            .field("sandbox", &self.sandbox)
            .field("bus", &self.bus)
            .finish_non_exhaustive()
    }
}

impl WatchRouter {
    /// Without a bus only immediate deliveries ever fire.
    pub fn new(sandbox: PathSandbox, bus: Option<EventBus>) -> Self {
        Self {
            sandbox,
            bus,
            matcher: Arc::new(GlobMatcher),
        }
    }

    /// Replace the glob dialect used by pattern mode and excludes.
    pub fn with_matcher(mut self, matcher: impl PatternMatcher + 'static) -> Self {
        self.matcher = Arc::new(matcher);
        self
    }

    pub fn watch<F>(&self, request: WatchRequest, callback: F) -> Subscription
    where
        F: Fn(WatchEvent) + Send + Sync + 'static,
    {
        let callback: WatchCallback = Arc::new(callback);
        let channels = request.channels();
        let filter = Arc::new(WatchFilter {
            sandbox: self.sandbox.clone(),
            matcher: Arc::clone(&self.matcher),
            paths: request.paths.clone(),
            mode: request.mode,
            exclude: request.exclude.clone(),
            scope: request.dir.clone(),
        });

        let subscription = match &self.bus {
            Some(bus) => Subscription::merge(channels.iter().map(|&name| {
                let (filter, callback) = (Arc::clone(&filter), Arc::clone(&callback));
                bus.on(name, move |event| {
                    let path = candidate(event);
                    if filter.accepts(path) {
                        callback(WatchEvent {
                            path: path.to_string(),
                            action: event.name(),
                        });
                    }
                })
            })),
            None => Subscription::empty(),
        };
        tracing::debug!(?channels, paths = ?request.paths, "watch registered");

        if request.immediate
            && let Some(first) = request.paths.resolve().first()
        {
            callback(WatchEvent {
                path: self.sandbox.normalize(first).to_string(),
                action: request.immediate_action(),
            });
        }

        subscription
    }
}
