//! Encodings for file payloads and backend transport.
//!
//! Callers pick an [`Encoding`] per read or write. Backends only ever see a
//! [`Transport`]: text in a named character encoding, or base64 for
//! anything binary.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use crate::error::{StorageError, StorageResult};

/// Encoding requested by a caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Encoding {
    /// Raw bytes.
    #[default]
    Buffer,
    Utf8,
    Utf16,
    Ascii,
    /// Base64 text standing for raw bytes.
    Base64,
}

impl Encoding {
    /// The character encoding for text encodings, `None` for binary ones.
    pub fn text(self) -> Option<TextEncoding> {
        match self {
            Encoding::Utf8 => Some(TextEncoding::Utf8),
            Encoding::Utf16 => Some(TextEncoding::Utf16),
            Encoding::Ascii => Some(TextEncoding::Ascii),
            Encoding::Buffer | Encoding::Base64 => None,
        }
    }
}

impl std::str::FromStr for Encoding {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "buffer" | "binary" => Ok(Encoding::Buffer),
            "utf8" | "utf-8" => Ok(Encoding::Utf8),
            "utf16" | "utf-16" => Ok(Encoding::Utf16),
            "ascii" => Ok(Encoding::Ascii),
            "base64" => Ok(Encoding::Base64),
            other => Err(format!("unknown encoding: {other}")),
        }
    }
}

/// Character encodings a backend can store text in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TextEncoding {
    Utf8,
    /// Little-endian UTF-16.
    Utf16,
    /// 7-bit ASCII; other characters are stored as `?`.
    Ascii,
}

impl TextEncoding {
    pub fn encode(self, text: &str) -> Vec<u8> {
        match self {
            TextEncoding::Utf8 => text.as_bytes().to_vec(),
            TextEncoding::Utf16 => text.encode_utf16().flat_map(u16::to_le_bytes).collect(),
            TextEncoding::Ascii => text
                .chars()
                .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
                .collect(),
        }
    }

    pub fn decode(self, bytes: &[u8]) -> StorageResult<String> {
        match self {
            TextEncoding::Utf8 => String::from_utf8(bytes.to_vec())
                .map_err(|e| StorageError::InvalidData(e.to_string())),
            TextEncoding::Utf16 => {
                if bytes.len() % 2 != 0 {
                    return Err(StorageError::InvalidData(
                        "odd byte count for utf-16".to_string(),
                    ));
                }
                let units: Vec<u16> = bytes
                    .chunks_exact(2)
                    .map(|pair| u16::from_le_bytes([pair[0], pair[1]]))
                    .collect();
                String::from_utf16(&units).map_err(|e| StorageError::InvalidData(e.to_string()))
            }
            TextEncoding::Ascii => Ok(bytes.iter().map(|b| (b & 0x7f) as char).collect()),
        }
    }
}

/// How a payload travels between the facade and a backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Transport {
    /// Plain text in the given character encoding.
    Text(TextEncoding),
    /// Base64 text; binary safe.
    Base64,
}

impl Transport {
    /// Turn a payload string in this transport into stored bytes.
    pub fn to_bytes(self, data: &str) -> StorageResult<Vec<u8>> {
        match self {
            Transport::Text(enc) => Ok(enc.encode(data)),
            Transport::Base64 => base64_decode(data),
        }
    }

    /// Render stored bytes as a payload string in this transport.
    pub fn from_bytes(self, bytes: &[u8]) -> StorageResult<String> {
        match self {
            Transport::Text(enc) => enc.decode(bytes),
            Transport::Base64 => Ok(base64_encode(bytes)),
        }
    }
}

/// A file payload handed to or returned from the facade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileData {
    Bytes(Vec<u8>),
    Text(String),
}

impl FileData {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            FileData::Text(s) => Some(s),
            FileData::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            FileData::Bytes(b) => b,
            FileData::Text(s) => s.as_bytes(),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        match self {
            FileData::Bytes(b) => b,
            FileData::Text(s) => s.into_bytes(),
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<&str> for FileData {
    fn from(s: &str) -> Self {
        FileData::Text(s.to_string())
    }
}

impl From<String> for FileData {
    fn from(s: String) -> Self {
        FileData::Text(s)
    }
}

impl From<Vec<u8>> for FileData {
    fn from(b: Vec<u8>) -> Self {
        FileData::Bytes(b)
    }
}

impl From<&[u8]> for FileData {
    fn from(b: &[u8]) -> Self {
        FileData::Bytes(b.to_vec())
    }
}

pub fn base64_encode(bytes: &[u8]) -> String {
    STANDARD.encode(bytes)
}

pub fn base64_decode(data: &str) -> StorageResult<Vec<u8>> {
    STANDARD
        .decode(data.trim())
        .map_err(|e| StorageError::InvalidData(format!("invalid base64: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(TextEncoding::Utf8, "héllo wörld")]
    #[case(TextEncoding::Utf16, "héllo wörld ✓")]
    #[case(TextEncoding::Ascii, "plain ascii")]
    fn text_encodings_round_trip(#[case] enc: TextEncoding, #[case] text: &str) {
        let bytes = enc.encode(text);
        assert_eq!(enc.decode(&bytes).unwrap(), text);
    }

    #[test]
    fn ascii_replaces_wide_characters() {
        assert_eq!(TextEncoding::Ascii.encode("añb"), b"a?b");
    }

    #[test]
    fn utf16_is_little_endian() {
        assert_eq!(TextEncoding::Utf16.encode("A"), vec![0x41, 0x00]);
        assert!(TextEncoding::Utf16.decode(&[0x41]).is_err());
    }

    #[test]
    fn base64_transport_is_binary_safe() {
        let bytes = vec![0u8, 159, 146, 150, 255];
        let wire = Transport::Base64.from_bytes(&bytes).unwrap();
        assert_eq!(Transport::Base64.to_bytes(&wire).unwrap(), bytes);
        assert!(Transport::Base64.to_bytes("not base64!").is_err());
    }

    #[test]
    fn encodings_parse() {
        assert_eq!("UTF-8".parse::<Encoding>(), Ok(Encoding::Utf8));
        assert_eq!("buffer".parse::<Encoding>(), Ok(Encoding::Buffer));
        assert!("latin9".parse::<Encoding>().is_err());
        assert_eq!(Encoding::default(), Encoding::Buffer);
        assert_eq!(Encoding::Base64.text(), None);
    }
}
