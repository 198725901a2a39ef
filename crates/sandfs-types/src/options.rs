//! Per-operation options. Every recognised option is a field with a default.

use serde::{Deserialize, Serialize};

use crate::encoding::Encoding;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MkdirOptions {
    /// Create missing parents; succeed if the directory already exists.
    #[serde(default)]
    pub recursive: bool,
}

impl MkdirOptions {
    pub fn recursive() -> Self {
        Self { recursive: true }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RmdirOptions {
    /// Remove contents too.
    #[serde(default)]
    pub recursive: bool,
}

impl RmdirOptions {
    pub fn recursive() -> Self {
        Self { recursive: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteOptions {
    /// Create missing parent directories.
    #[serde(default)]
    pub recursive: bool,
    /// How a text payload should be stored. Byte payloads ignore this.
    #[serde(default = "default_write_encoding")]
    pub encoding: Encoding,
}

fn default_write_encoding() -> Encoding {
    Encoding::Utf8
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            recursive: false,
            encoding: default_write_encoding(),
        }
    }
}

impl WriteOptions {
    pub fn recursive() -> Self {
        Self {
            recursive: true,
            ..Self::default()
        }
    }

    pub fn encoding(encoding: Encoding) -> Self {
        Self {
            encoding,
            ..Self::default()
        }
    }

    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadOptions {
    /// Defaults to raw bytes.
    #[serde(default)]
    pub encoding: Encoding,
}

impl ReadOptions {
    pub fn encoding(encoding: Encoding) -> Self {
        Self { encoding }
    }

    pub fn utf8() -> Self {
        Self::encoding(Encoding::Utf8)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnlinkOptions {
    /// Allow removing directories (recursively) and ignore delete failures.
    #[serde(default)]
    pub remove_all: bool,
}

impl UnlinkOptions {
    pub fn remove_all() -> Self {
        Self { remove_all: true }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        assert!(!MkdirOptions::default().recursive);
        assert_eq!(WriteOptions::default().encoding, Encoding::Utf8);
        assert_eq!(ReadOptions::default().encoding, Encoding::Buffer);
        assert!(!UnlinkOptions::default().remove_all);
    }

    #[test]
    fn missing_fields_take_defaults() {
        let opts: WriteOptions = serde_json::from_str(r#"{"recursive":true}"#).unwrap();
        assert!(opts.recursive);
        assert_eq!(opts.encoding, Encoding::Utf8);
    }
}
