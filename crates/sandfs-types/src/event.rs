//! Mutation events published by the facade.

use serde::{Deserialize, Serialize};

/// Channel names. The dispatch table of the event bus is keyed by these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventName {
    #[serde(rename = "write:file")]
    WriteFile,
    #[serde(rename = "remove:file")]
    RemoveFile,
    #[serde(rename = "create:dir")]
    CreateDir,
    #[serde(rename = "remove:dir")]
    RemoveDir,
    #[serde(rename = "move:file")]
    MoveFile,
    #[serde(rename = "move:dir")]
    MoveDir,
}

impl EventName {
    /// The four primitive channels, in subscription order.
    pub const PRIMITIVES: [EventName; 4] = [
        EventName::WriteFile,
        EventName::RemoveFile,
        EventName::CreateDir,
        EventName::RemoveDir,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EventName::WriteFile => "write:file",
            EventName::RemoveFile => "remove:file",
            EventName::CreateDir => "create:dir",
            EventName::RemoveDir => "remove:dir",
            EventName::MoveFile => "move:file",
            EventName::MoveDir => "move:dir",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "write:file" => Some(EventName::WriteFile),
            "remove:file" => Some(EventName::RemoveFile),
            "create:dir" => Some(EventName::CreateDir),
            "remove:dir" => Some(EventName::RemoveDir),
            "move:file" => Some(EventName::MoveFile),
            "move:dir" => Some(EventName::MoveDir),
            _ => None,
        }
    }

    /// Primitive channels carry a single path; composite ones a move.
    pub fn is_primitive(self) -> bool {
        !matches!(self, EventName::MoveFile | EventName::MoveDir)
    }

    /// True for the "created/written" side of a channel pair.
    pub fn is_creation(self) -> bool {
        matches!(self, EventName::WriteFile | EventName::CreateDir)
    }
}

impl std::fmt::Display for EventName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A mutation notification. Paths are root-relative virtual paths
/// (`/a/b.txt`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum Event {
    WriteFile { path: String },
    RemoveFile { path: String },
    CreateDir { path: String },
    RemoveDir { path: String },
    MoveFile { from: String, to: String },
    MoveDir { from: String, to: String },
}

impl Event {
    pub fn name(&self) -> EventName {
        match self {
            Event::WriteFile { .. } => EventName::WriteFile,
            Event::RemoveFile { .. } => EventName::RemoveFile,
            Event::CreateDir { .. } => EventName::CreateDir,
            Event::RemoveDir { .. } => EventName::RemoveDir,
            Event::MoveFile { .. } => EventName::MoveFile,
            Event::MoveDir { .. } => EventName::MoveDir,
        }
    }

    /// The single path of a primitive event.
    pub fn path(&self) -> Option<&str> {
        match self {
            Event::WriteFile { path }
            | Event::RemoveFile { path }
            | Event::CreateDir { path }
            | Event::RemoveDir { path } => Some(path),
            Event::MoveFile { .. } | Event::MoveDir { .. } => None,
        }
    }

    /// Build a primitive event for `name`. Returns `None` for move channels.
    pub fn primitive(name: EventName, path: impl Into<String>) -> Option<Self> {
        let path = path.into();
        match name {
            EventName::WriteFile => Some(Event::WriteFile { path }),
            EventName::RemoveFile => Some(Event::RemoveFile { path }),
            EventName::CreateDir => Some(Event::CreateDir { path }),
            EventName::RemoveDir => Some(Event::RemoveDir { path }),
            EventName::MoveFile | EventName::MoveDir => None,
        }
    }
}

/// What a watch callback receives.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WatchEvent {
    pub path: String,
    pub action: EventName,
}
