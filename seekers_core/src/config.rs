//! Match configuration.
//!
//! Parsing a particular file format is left to the host; this module only
//! defines the values the core consumes, their defaults and their
//! validation. JSON is supported out of the box through serde.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Invalid configuration values.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("Camps would overlap: camp height {camp_height} exceeds map height / players ({limit})")]
    CampsOverlap { camp_height: f64, limit: f64 },

    #[error("Parse error: {0}")]
    Parse(String),
}

impl ConfigError {
    fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue { field, reason: reason.into() }
    }
}

/// Seeker physical parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeekerConfig {
    /// Acceleration applied towards the target per unit timestep
    pub thrust: f64,
    /// Thrust multiplier while the magnet is on
    pub magnet_slowdown: f64,
    /// Ticks a seeker stays disabled after a magnet collision
    pub disabled_time: u32,
    pub radius: f64,
    pub mass: f64,
    /// Fraction of velocity lost per unit timestep
    pub friction: f64,
    pub max_speed: f64,
}

impl Default for SeekerConfig {
    fn default() -> Self {
        Self {
            thrust: 0.1,
            magnet_slowdown: 0.2,
            disabled_time: 250,
            radius: 10.0,
            mass: 1.0,
            friction: 0.02,
            max_speed: 5.0,
        }
    }
}

/// Goal physical and scoring parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoalConfig {
    /// Ticks a goal must stay inside one camp to score
    pub scoring_time: u64,
    pub radius: f64,
    pub mass: f64,
    pub friction: f64,
    pub max_speed: f64,
}

impl Default for GoalConfig {
    fn default() -> Self {
        Self {
            scoring_time: 100,
            radius: 6.0,
            mass: 0.5,
            friction: 0.02,
            max_speed: 5.0,
        }
    }
}

/// Magnet force field parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MagnetConfig {
    /// Force constant `k` in `k / d^2`
    pub strength: f64,
    /// Entities further away than this feel nothing
    pub range: f64,
    /// Cap on the force magnitude
    pub max_force: f64,
    /// Multiplier applied when the magnet is repulsive
    pub repulsive_factor: f64,
}

impl Default for MagnetConfig {
    fn default() -> Self {
        Self {
            strength: 250.0,
            range: 120.0,
            max_force: 0.5,
            repulsive_factor: 8.0,
        }
    }
}

/// Configuration for a match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    /// Number of player seats
    pub players: usize,
    pub seekers_per_player: usize,
    pub goals: usize,

    pub map_width: f64,
    pub map_height: f64,
    pub camp_width: f64,
    pub camp_height: f64,

    /// First player to reach this score wins (None = no threshold)
    pub score_threshold: Option<u32>,
    /// Match ends after this many ticks (None = unlimited)
    pub tick_budget: Option<u64>,

    /// Wall-clock interval between tick starts, in milliseconds
    pub tick_interval_ms: u64,
    /// Per-tick decision timeout, in milliseconds
    pub command_timeout_ms: u64,
    /// Drop players that time out instead of reusing their last commands
    pub careful_mode: bool,

    /// Master seed
    pub seed: u64,
    /// Minimum RGB distance between player colours
    pub color_threshold: f64,
    /// Simulated seconds per tick
    pub timestep: f64,

    pub seeker: SeekerConfig,
    pub goal: GoalConfig,
    pub magnet: MagnetConfig,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            players: 2,
            seekers_per_player: 5,
            goals: 6,
            map_width: 768.0,
            map_height: 768.0,
            camp_width: 55.0,
            camp_height: 55.0,
            score_threshold: None,
            tick_budget: Some(3000),
            tick_interval_ms: 16,
            command_timeout_ms: 500,
            careful_mode: false,
            seed: 42,
            color_threshold: 96.0,
            timestep: 1.0,
            seeker: SeekerConfig::default(),
            goal: GoalConfig::default(),
            magnet: MagnetConfig::default(),
        }
    }
}

impl GameConfig {
    /// Parses a JSON document; missing fields take their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_millis(self.command_timeout_ms)
    }

    /// Total number of seekers in a full match.
    pub fn total_seekers(&self) -> usize {
        self.players * self.seekers_per_player
    }

    /// Checks the values the simulation relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.players == 0 {
            return Err(ConfigError::invalid("players", "must be at least 1"));
        }
        if !(self.map_width > 0.0 && self.map_width.is_finite()) {
            return Err(ConfigError::invalid("map_width", "must be positive"));
        }
        if !(self.map_height > 0.0 && self.map_height.is_finite()) {
            return Err(ConfigError::invalid("map_height", "must be positive"));
        }
        if self.tick_interval_ms == 0 {
            return Err(ConfigError::invalid("tick_interval_ms", "must be positive"));
        }
        if self.command_timeout_ms == 0 {
            return Err(ConfigError::invalid("command_timeout_ms", "must be positive"));
        }
        if !(self.timestep > 0.0 && self.timestep.is_finite()) {
            return Err(ConfigError::invalid("timestep", "must be positive"));
        }
        if !(0.0..1.0).contains(&self.seeker.friction) || !(0.0..1.0).contains(&self.goal.friction) {
            return Err(ConfigError::invalid("friction", "must be in [0, 1)"));
        }
        if self.seeker.mass <= 0.0 || self.goal.mass <= 0.0 {
            return Err(ConfigError::invalid("mass", "must be positive"));
        }
        if self.seeker.radius <= 0.0 || self.goal.radius <= 0.0 {
            return Err(ConfigError::invalid("radius", "must be positive"));
        }
        let limit = self.map_height / self.players as f64;
        if self.camp_height > limit {
            return Err(ConfigError::CampsOverlap {
                camp_height: self.camp_height,
                limit,
            });
        }
        Ok(())
    }
}
