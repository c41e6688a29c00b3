//! Common types for the Seekers environment abstraction.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identifier of a player seat in a match.
///
/// Assigned sequentially by the lobby in join order, so ordering by
/// `PlayerId` is the deterministic player order of the match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PlayerId(pub u32);

impl std::fmt::Display for PlayerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "player-{}", self.0)
    }
}

/// Secret handed to a remote player at join time.
///
/// Every `CommandRequest` must carry it; commands with a foreign token are
/// rejected before they touch the world.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionToken(pub Uuid);

impl SessionToken {
    /// Creates a new random token.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
    
    /// Creates a deterministic token from a seed (for simulation).
    pub fn from_seed(seed: u64) -> Self {
        let mut bytes = [0u8; 16];
        bytes[0..8].copy_from_slice(&seed.to_le_bytes());
        bytes[8..16].copy_from_slice(&seed.wrapping_mul(0x517cc1b727220a95).to_le_bytes());
        Self(Uuid::from_bytes(bytes))
    }
    
    /// Returns the inner UUID.
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for SessionToken {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Show first 8 chars for readability
        write!(f, "{}", &self.0.to_string()[..8])
    }
}

/// A single framed message on a player link.
///
/// The payload is opaque bytes; the protocol layer in `seekers_core`
/// decides how to encode it. `tick` lets either side discard frames that
/// belong to an exchange that has already been abandoned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Frame {
    /// Tick this frame belongs to (0 during the handshake)
    pub tick: u64,
    
    /// The encoded message
    pub payload: Vec<u8>,
}

impl Frame {
    /// Creates a new frame.
    pub fn new(tick: u64, payload: Vec<u8>) -> Self {
        Self { tick, payload }
    }
    
    /// Returns the payload size in bytes.
    pub fn size(&self) -> usize {
        self.payload.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_token_from_seed_is_deterministic() {
        assert_eq!(SessionToken::from_seed(7), SessionToken::from_seed(7));
        assert_ne!(SessionToken::from_seed(7), SessionToken::from_seed(8));
    }
    
    #[test]
    fn test_player_id_ordering() {
        let mut ids = vec![PlayerId(3), PlayerId(1), PlayerId(2)];
        ids.sort();
        assert_eq!(ids, vec![PlayerId(1), PlayerId(2), PlayerId(3)]);
        assert_eq!(PlayerId(4).to_string(), "player-4");
    }
}
