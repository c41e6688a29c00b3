//! Error types for the Seekers environment abstraction.

use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error)]
pub enum EnvError {
    /// Link send failed (buffer full, connection closed, etc.)
    #[error("Link error: {0}")]
    LinkError(String),
    
    /// Peer is unreachable (simulated partition or dropped connection)
    #[error("Peer unreachable: {0}")]
    PeerUnreachable(String),
    
    /// Frame serialization/deserialization failed
    #[error("Serialization error: {0}")]
    SerializationError(String),
    
    /// Operation timed out
    #[error("Timeout after {0}ms")]
    Timeout(u64),
}

impl EnvError {
    /// Creates a link error.
    pub fn link(msg: impl Into<String>) -> Self {
        Self::LinkError(msg.into())
    }
    
    /// Creates an unreachable error.
    pub fn unreachable(peer: impl std::fmt::Display) -> Self {
        Self::PeerUnreachable(peer.to_string())
    }
}
