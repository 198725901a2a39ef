//! Remote HEAD probing for [`SandFs::back_file`](crate::SandFs::back_file).
//!
//! The kernel carries no HTTP client. Embedders plug one in through
//! [`RemoteProbe`].

use async_trait::async_trait;
use thiserror::Error;

/// Result of a HEAD request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProbeResponse {
    pub status: u16,
    /// `Content-Length`, when the server sent one.
    pub content_length: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("unreachable: {0}")]
    Unreachable(String),
    #[error("invalid url: {0}")]
    InvalidUrl(String),
}

#[async_trait]
pub trait RemoteProbe: Send + Sync {
    async fn head(&self, url: &str) -> Result<ProbeResponse, ProbeError>;
}
