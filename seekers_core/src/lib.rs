//! Seekers Core - deterministic arena physics and per-tick command synchronization.
//!
//! This library runs matches between independently written AIs:
//! 1. **World & Physics**: a toroidal 2D arena stepped at a fixed timestep,
//!    with elastic collisions and magnets, resolved in a stable order
//! 2. **Scoring**: goals held in a camp long enough score and respawn
//! 3. **Decision Gateway**: local functions and remote players behind one
//!    interface, with timeouts and stale-command fallback
//! 4. **Protocol & Game Loop**: one status/command exchange per player per tick

pub mod geometry;
pub mod config;
pub mod colors;
pub mod world;
pub mod physics;
pub mod scoring;
pub mod protocol;
pub mod gateway;
pub mod client;
pub mod lobby;
pub mod metrics;
pub mod scheduler;

// Re-export key types for convenience
pub use config::{ConfigError, GameConfig};
pub use geometry::{Torus, Vec2};
pub use world::{CampId, Command, EntityId, GoalId, MagnetState, SeekerId, World};
pub use protocol::{CommandRequest, SeekerCommand, StatusResponse};
pub use gateway::{decide_fn, AiInput, DecideFn, DecisionError, DecisionSource};
pub use client::{ClientError, SeekersClient};
pub use lobby::JoinError;
pub use scoring::{FinishReason, MatchOutcome};
pub use scheduler::{GameLoop, LoopState, MatchReport, ScheduleError};
