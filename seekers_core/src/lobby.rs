//! Join handshake and seat assignment.
//!
//! The lobby runs before the world exists. Each accepted player gets the
//! next `PlayerId`, a unique name, a distinguishable colour, its camp and
//! the ids of the seekers it will own once the match starts.

use crate::colors::{pick_color, Color};
use crate::config::GameConfig;
use crate::protocol::{JoinRequest, JoinResponse, ProtocolError};
use crate::world::{planned_camp_id, planned_seeker_ids, CampId, PlayerSpec, SeekerId};

use seekers_env::{EnvError, PlayerId, SessionToken};
use thiserror::Error;
use tracing::{debug, info};

const MAX_NAME_LEN: usize = 64;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum JoinError {
    #[error("Game is full ({capacity} players)")]
    GameFull { capacity: usize },

    #[error("Invalid name: {0}")]
    InvalidName(String),

    #[error("Match already started")]
    AlreadyStarted,

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    #[error("Link error: {0}")]
    Disconnected(String),
}

impl From<EnvError> for JoinError {
    fn from(e: EnvError) -> Self {
        JoinError::Disconnected(e.to_string())
    }
}

/// An accepted player.
#[derive(Debug, Clone, PartialEq)]
pub struct Seat {
    pub id: PlayerId,
    pub name: String,
    pub color: Color,
    pub token: SessionToken,
    pub camp: CampId,
    pub seekers: Vec<SeekerId>,
}

impl Seat {
    pub fn spec(&self) -> PlayerSpec {
        PlayerSpec {
            id: self.id,
            name: self.name.clone(),
            color: self.color,
        }
    }

    pub fn response(&self, config: &GameConfig) -> JoinResponse {
        JoinResponse {
            player_id: self.id,
            token: self.token,
            name: self.name.clone(),
            color: self.color,
            camp_id: self.camp,
            seeker_ids: self.seekers.clone(),
            config: config.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Lobby {
    config: GameConfig,
    seats: Vec<Seat>,
    closed: bool,
}

impl Lobby {
    pub fn new(config: GameConfig) -> Self {
        Self {
            config,
            seats: Vec::new(),
            closed: false,
        }
    }

    /// Admits a player, or explains why not.
    pub fn register(&mut self, request: &JoinRequest, token: SessionToken) -> Result<Seat, JoinError> {
        if self.closed {
            return Err(JoinError::AlreadyStarted);
        }
        if self.is_full() {
            return Err(JoinError::GameFull {
                capacity: self.config.players,
            });
        }

        let base = request.name.trim();
        if base.is_empty() {
            return Err(JoinError::InvalidName("name is empty".to_string()));
        }
        if base.chars().count() > MAX_NAME_LEN {
            return Err(JoinError::InvalidName(format!("longer than {} characters", MAX_NAME_LEN)));
        }
        if base.chars().any(char::is_control) {
            return Err(JoinError::InvalidName("contains control characters".to_string()));
        }
        let name = self.unique_name(base);

        let preferred = request.color.unwrap_or_else(|| Color::from_name(&name));
        let taken: Vec<Color> = self.seats.iter().map(|s| s.color).collect();
        let color = pick_color(&taken, preferred, self.config.color_threshold);
        if color != preferred {
            debug!("Colour {} of '{}' too close to a taken one, using {}", preferred, name, color);
        }

        if let Some(wanted) = request.seekers.filter(|n| *n != self.config.seekers_per_player) {
            debug!(
                "'{}' asked for {} seekers, match uses {}",
                name, wanted, self.config.seekers_per_player
            );
        }

        let index = self.seats.len();
        let seat = Seat {
            id: PlayerId(index as u32),
            name,
            color,
            token,
            camp: planned_camp_id(index),
            seekers: planned_seeker_ids(&self.config, index),
        };
        info!("{} joined as '{}' ({})", seat.id, seat.name, seat.color);
        self.seats.push(seat.clone());
        Ok(seat)
    }

    fn unique_name(&self, base: &str) -> String {
        let taken = |candidate: &str| self.seats.iter().any(|s| s.name == candidate);
        if !taken(base) {
            return base.to_string();
        }
        (2..)
            .map(|n| format!("{} ({})", base, n))
            .find(|candidate| !taken(candidate))
            .unwrap_or_else(|| base.to_string())
    }

    /// Stops accepting players.
    pub fn close(&mut self) {
        self.closed = true;
    }

    pub fn is_full(&self) -> bool {
        self.seats.len() >= self.config.players
    }

    pub fn seats(&self) -> &[Seat] {
        &self.seats
    }

    pub fn specs(&self) -> Vec<PlayerSpec> {
        self.seats.iter().map(Seat::spec).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request(name: &str, color: Option<Color>) -> JoinRequest {
        JoinRequest {
            name: name.to_string(),
            color,
            seekers: None,
        }
    }

    fn lobby(players: usize) -> Lobby {
        Lobby::new(GameConfig {
            players,
            ..GameConfig::default()
        })
    }

    #[test]
    fn test_names_are_trimmed_and_deduplicated() {
        let mut lobby = lobby(3);
        let a = lobby.register(&request("  bot ", None), SessionToken::from_seed(0)).unwrap();
        let b = lobby.register(&request("bot", None), SessionToken::from_seed(1)).unwrap();
        let c = lobby.register(&request("bot", None), SessionToken::from_seed(2)).unwrap();
        assert_eq!((a.name.as_str(), b.name.as_str(), c.name.as_str()), ("bot", "bot (2)", "bot (3)"));
        assert_eq!((a.id, b.id, c.id), (PlayerId(0), PlayerId(1), PlayerId(2)));
    }

    #[test]
    fn test_invalid_names_rejected() {
        let mut lobby = lobby(2);
        assert!(matches!(
            lobby.register(&request("   ", None), SessionToken::from_seed(0)),
            Err(JoinError::InvalidName(_))
        ));
        assert!(matches!(
            lobby.register(&request(&"x".repeat(65), None), SessionToken::from_seed(0)),
            Err(JoinError::InvalidName(_))
        ));
        assert!(lobby.seats().is_empty());
    }

    #[test]
    fn test_full_and_closed_lobby() {
        let mut lobby = lobby(1);
        lobby.register(&request("a", None), SessionToken::from_seed(0)).unwrap();
        assert_eq!(
            lobby.register(&request("b", None), SessionToken::from_seed(1)),
            Err(JoinError::GameFull { capacity: 1 })
        );

        let mut lobby = self::lobby(2);
        lobby.close();
        assert_eq!(
            lobby.register(&request("a", None), SessionToken::from_seed(0)),
            Err(JoinError::AlreadyStarted)
        );
    }

    #[test]
    fn test_colour_clash_is_adjusted_deterministically() {
        let red = Color::new(250, 5, 5);
        let mut first = lobby(2);
        first.register(&request("a", Some(red)), SessionToken::from_seed(0)).unwrap();
        let adjusted = first.register(&request("b", Some(red)), SessionToken::from_seed(1)).unwrap();
        assert_ne!(adjusted.color, red);
        assert!(adjusted.color.distance(&red) >= 96.0);

        let mut second = lobby(2);
        second.register(&request("a", Some(red)), SessionToken::from_seed(0)).unwrap();
        let again = second.register(&request("b", Some(red)), SessionToken::from_seed(1)).unwrap();
        assert_eq!(adjusted.color, again.color);
    }

    #[test]
    fn test_seat_assignment_matches_world_layout() {
        let mut lobby = lobby(2);
        lobby.register(&request("a", None), SessionToken::from_seed(0)).unwrap();
        let seat = lobby.register(&request("b", None), SessionToken::from_seed(1)).unwrap();
        assert_eq!(seat.camp, CampId(1));
        assert_eq!(seat.seekers.first(), Some(&crate::world::EntityId(11)));
        assert!(lobby.is_full());
    }
}
