//! Core environment context trait for the Seekers game loop.

use async_trait::async_trait;
use std::future::Future;
use std::time::Duration;

/// The central interface for Environment Interaction.
///
/// This trait abstracts the "real world" so that the game loop can run
/// in both production (tokio) and simulation (virtual clock) environments.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `tokio::time`, seed from config or OS entropy
/// - **Simulation**: `SimContext` - virtual clock, fixed master seed
///
/// # Determinism
///
/// The game loop reads wall-clock time only to pace ticks. Simulated time
/// is a fixed timestep per tick and never depends on `now()`.
#[async_trait]
pub trait ArenaContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// Used for tick pacing and overrun measurement.
    /// In simulation, this is the virtual clock time.
    fn now(&self) -> Duration;
    
    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances virtual clock
    async fn sleep(&self, duration: Duration);
    
    /// Spawns a background task.
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: Future<Output = ()> + Send + 'static;
    
    /// Returns the context's master seed.
    fn seed(&self) -> u64;
    
    /// Derives a reproducible sub-seed for an independent subsystem.
    ///
    /// Subsystems seeded separately keep their streams stable when another
    /// subsystem consumes more or fewer random numbers.
    fn derive_seed(&self, extension: u64) -> u64 {
        self.seed().wrapping_mul(0x9e3779b97f4a7c15) ^ extension.wrapping_mul(0x517cc1b727220a95)
    }
}
