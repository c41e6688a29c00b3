//! Match statistics
//! ================
//!
//! Counters collected by the game loop:
//! - **Loop**: ticks run, ticks that overran the wall-clock interval
//! - **Per player**: commands applied and rejected, timeouts, failed
//!   decisions, connection failures
//!
//! Reported in the final `MatchReport`; nothing here affects the simulation.

use crate::gateway::DecisionError;

use seekers_env::PlayerId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-player counters.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayerStats {
    /// Commands that reached the world
    pub commands_applied: u64,
    /// Commands refused at ingestion
    pub commands_rejected: u64,
    /// Ticks without an answer in time
    pub timeouts: u64,
    /// Ticks where the decide function failed
    pub invalid_outputs: u64,
    /// Ticks lost to a closed link or protocol violation
    pub disconnects: u64,
    /// Ticks that reused the previous commands
    pub stale_ticks: u64,
}

impl PlayerStats {
    /// Fraction of ticks answered usefully, in `[0, 1]`.
    pub fn responsiveness(&self, ticks: u64) -> f64 {
        if ticks == 0 {
            return 1.0;
        }
        1.0 - (self.stale_ticks.min(ticks) as f64 / ticks as f64)
    }
}

/// Counters for a whole match.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchStats {
    pub ticks: u64,
    /// Ticks whose work took longer than the tick interval
    pub overruns: u64,
    pub players: BTreeMap<PlayerId, PlayerStats>,
}

impl MatchStats {
    pub fn player_mut(&mut self, player: PlayerId) -> &mut PlayerStats {
        self.players.entry(player).or_default()
    }

    pub fn record_commands(&mut self, player: PlayerId, applied: usize, rejected: usize) {
        let stats = self.player_mut(player);
        stats.commands_applied += applied as u64;
        stats.commands_rejected += rejected as u64;
    }

    pub fn record_failure(&mut self, player: PlayerId, error: &DecisionError) {
        let stats = self.player_mut(player);
        stats.stale_ticks += 1;
        match error {
            DecisionError::Timeout(_) => stats.timeouts += 1,
            DecisionError::InvalidOutput(_) => stats.invalid_outputs += 1,
            DecisionError::Disconnected(_) | DecisionError::Protocol(_) => stats.disconnects += 1,
        }
    }

    /// Sum of rejected commands over all players.
    pub fn total_rejected(&self) -> u64 {
        self.players.values().map(|p| p.commands_rejected).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_failures_are_classified() {
        let mut stats = MatchStats::default();
        let p = PlayerId(0);
        stats.record_failure(p, &DecisionError::Timeout(Duration::from_millis(5)));
        stats.record_failure(p, &DecisionError::InvalidOutput("x".into()));
        stats.record_failure(p, &DecisionError::Disconnected("gone".into()));

        let player = &stats.players[&p];
        assert_eq!((player.timeouts, player.invalid_outputs, player.disconnects), (1, 1, 1));
        assert_eq!(player.stale_ticks, 3);
    }

    #[test]
    fn test_responsiveness() {
        let mut stats = PlayerStats::default();
        assert_eq!(stats.responsiveness(0), 1.0);
        stats.stale_ticks = 25;
        assert!((stats.responsiveness(100) - 0.75).abs() < 1e-12);
    }

    #[test]
    fn test_command_counters_accumulate() {
        let mut stats = MatchStats::default();
        stats.record_commands(PlayerId(1), 5, 1);
        stats.record_commands(PlayerId(1), 4, 0);
        stats.record_commands(PlayerId(2), 0, 2);
        assert_eq!(stats.players[&PlayerId(1)].commands_applied, 9);
        assert_eq!(stats.total_rejected(), 3);
    }
}
