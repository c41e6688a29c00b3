//! Per-player link abstraction between the arena and remote AIs.

use async_trait::async_trait;
use crate::error::EnvError;
use crate::types::{Frame, PlayerId};

/// A bidirectional, framed connection to one remote player.
///
/// # Implementations
///
/// - **Production**: Wraps a socket or RPC stream (external collaborator)
/// - **Simulation**: Channel-based with configurable latency/partitions
///
/// # Frame Flow
///
/// ```text
/// Arena                        Link                       Player
///   |                           |                           |
///   |-- send(StatusResponse) -->|                           |
///   |                           |-- [latency/jitter] ------>|
///   |                           |<-- send(CommandRequest) --|
///   |<-- recv() -> frame -------|                           |
/// ```
#[async_trait]
pub trait PlayerLink: Send + Sync + 'static {
    /// Sends a frame to the other end.
    ///
    /// # Returns
    /// * `Ok(())` - Frame queued for delivery
    /// * `Err(EnvError::LinkError)` - The link is closed
    ///
    /// # Note
    /// Success does not guarantee delivery - frames may be delayed or lost in simulation.
    async fn send(&self, frame: Frame) -> Result<(), EnvError>;
    
    /// Receives the next frame from the other end.
    ///
    /// # Returns
    /// * `Some(frame)` - A frame was received
    /// * `None` - The link was closed (disconnect)
    async fn recv(&self) -> Option<Frame>;
}

/// Marker trait for link controllers in simulation.
///
/// Allows injecting faults like partitions and latency.
pub trait LinkController: Send + Sync {
    /// Cuts a player off: frames in either direction are dropped.
    fn partition(&self, player: PlayerId);
    
    /// Heals all partitions.
    fn heal_all(&self);
    
    /// Sets one-way latency for a player's link.
    fn set_latency(&self, player: PlayerId, latency_ms: u64);
}
