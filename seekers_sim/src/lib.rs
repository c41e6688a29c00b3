//! Seekers Deterministic Simulation Harness
//!
//! This crate runs whole matches of the seekers arena inside a controlled
//! environment, so the game loop, the decision gateway and the wire
//! protocol can be tested end to end without real sockets or wall-clock
//! pacing.
//!
//! # Core Principle
//!
//! Sources of non-determinism are intercepted where the engine allows it:
//! - **Time**: the tick cadence runs on a virtual clock (`SimContext`)
//! - **Network**: remote players talk over in-memory links with
//!   configurable latency, jitter and partitions (`SimLink`)
//! - **Randomness**: goal spawns, session tokens and link jitter all
//!   derive from one 64-bit seed
//!
//! Decision timeouts still use real time, so scenarios that exercise them
//! keep `command_timeout_ms` small.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                      SimWorld                        │
//! │  ┌────────────────────────────────────────────────┐  │
//! │  │ GameLoop<SimContext>  (authoritative world)    │  │
//! │  └────────────────────────────────────────────────┘  │
//! │       │ local call               │ SimLink           │
//! │  ┌────▼────┐                ┌────▼──────────┐        │
//! │  │  bot    │                │ SeekersClient │ ...    │
//! │  └─────────┘                │   + bot       │        │
//! │                             └───────────────┘        │
//! │  recorder ◄── broadcast<StatusResponse> per tick     │
//! └──────────────────────────────────────────────────────┘
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use seekers_sim::{bots, SimConfig, SimWorld};
//!
//! let mut sim = SimWorld::new(SimConfig::default())?;
//! sim.add_local("carrier", None, bots::carrier())?;
//! sim.add_remote("chaser", None, bots::chaser()).await?;
//! let run = sim.run().await?;
//! println!("{:?}", run.report.outcome);
//! ```

mod context;
mod world;
mod network;
mod exporter;
mod runner;
pub mod bots;
pub mod scenarios;

pub use context::SimContext;
pub use world::{SimConfig, SimError, SimRun, SimWorld};
pub use network::{SimLink, SimLinkController};
pub use exporter::{CampInfo, ExportFrame, GoalFrame, MatchExport, PlayerInfo, SeekerFrame};
pub use runner::{ScenarioResult, ScenarioRunner};
