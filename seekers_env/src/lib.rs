//! Seekers Environment Abstraction Layer
//!
//! This crate provides the "Sans-IO" abstraction allowing the Seekers arena
//! to run in both **Production** (tokio) and **Simulation** (virtual clock)
//! environments.
//!
//! # Core Concept: The Reactor Pattern
//!
//! For deterministic replays, the game loop never touches I/O directly:
//! - Time (`now()`, `sleep()`)
//! - Player connections (`send()`, `recv()`)
//! - Randomness (`seed()`, `derive_seed()`)
//!
//! By deriving all entropy from a single 64-bit seed, any match becomes
//! reproducible via its seed number.
//!
//! # Example
//!
//! ```ignore
//! use seekers_env::{ArenaContext, PlayerLink};
//!
//! async fn serve<Ctx: ArenaContext, L: PlayerLink>(ctx: &Ctx, link: &L) {
//!     loop {
//!         tokio::select! {
//!             frame = link.recv() => handle_frame(frame),
//!             _ = ctx.sleep(Duration::from_millis(16)) => tick(),
//!         }
//!     }
//! }
//! ```

mod context;
mod network;
mod types;
mod error;
mod tokio_impl;

pub use context::ArenaContext;
pub use network::{PlayerLink, LinkController};
pub use types::{PlayerId, SessionToken, Frame};
pub use error::EnvError;
pub use tokio_impl::TokioContext;
