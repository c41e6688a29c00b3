//! Synchronization protocol: the wire contract between the engine and a player.
//!
//! One exchange per player per tick:
//!
//! ```text
//!   engine                                player
//!     │  ── Status(StatusResponse, tick) ──▶  │
//!     │  ◀── Command(CommandRequest, tick) ─  │
//! ```
//!
//! The connection starts with a `Join` / `Joined` handshake and ends with
//! `MatchOver`. Messages travel as JSON inside [`Frame`]s; the transport
//! underneath is whatever implements `PlayerLink`.
//!
//! `StatusResponse` is also the only view of the world a decision maker
//! ever gets, local or remote.

use crate::colors::Color;
use crate::config::GameConfig;
use crate::geometry::{is_finite, Torus, Vec2};
use crate::scoring::MatchOutcome;
use crate::world::{CampId, Command, GoalId, MagnetState, SeekerId, World};

use seekers_env::{Frame, PlayerId, SessionToken};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Wire-level failures.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    #[error("Failed to encode message: {0}")]
    Encode(String),

    #[error("Failed to decode frame: {0}")]
    Decode(String),

    #[error("Unexpected message: expected {expected}, got {got}")]
    Unexpected { expected: &'static str, got: &'static str },

    #[error("Session token does not match")]
    Unauthorized,
}

// ============================================================================
// Messages
// ============================================================================

/// Player -> engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    Join(JoinRequest),
    Command(CommandRequest),
}

impl ClientMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ClientMessage::Join(_) => "join",
            ClientMessage::Command(_) => "command",
        }
    }
}

/// Engine -> player.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    Joined(JoinResponse),
    JoinRejected { reason: String },
    Status(StatusResponse),
    MatchOver(MatchOutcome),
}

impl ServerMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            ServerMessage::Joined(_) => "joined",
            ServerMessage::JoinRejected { .. } => "join_rejected",
            ServerMessage::Status(_) => "status",
            ServerMessage::MatchOver(_) => "match_over",
        }
    }
}

/// Handshake request: the player's name and preferences.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinRequest {
    pub name: String,
    /// Preferred colour; derived from the name when absent
    pub color: Option<Color>,
    /// Intended seeker count (advisory; the engine decides)
    pub seekers: Option<usize>,
}

/// Handshake answer: what the engine assigned.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JoinResponse {
    pub player_id: PlayerId,
    pub token: SessionToken,
    /// Final (possibly de-duplicated) name
    pub name: String,
    /// Final (possibly adjusted) colour
    pub color: Color,
    pub camp_id: CampId,
    pub seeker_ids: Vec<SeekerId>,
    pub config: GameConfig,
}

/// One seeker's command as sent over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeekerCommand {
    pub seeker_id: SeekerId,
    pub target: Vec2,
    pub magnet: MagnetState,
}

/// A player's commands for one tick.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandRequest {
    pub token: SessionToken,
    /// Tick of the status this answers
    pub tick: u64,
    pub commands: Vec<SeekerCommand>,
}

// ============================================================================
// Status snapshot
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SeekerStatus {
    pub id: SeekerId,
    pub owner: PlayerId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f64,
    pub magnet: MagnetState,
    pub is_disabled: bool,
    /// Only filled in for the recipient's own seekers
    pub target: Option<Vec2>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GoalStatus {
    pub id: GoalId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f64,
    pub captured_by: Option<CampId>,
    /// Ticks spent in the current camp
    pub time_in_camp: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CampStatus {
    pub id: CampId,
    pub owner: PlayerId,
    pub position: Vec2,
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerStatus {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
    pub color: Color,
    pub camp: CampId,
    pub seekers: Vec<SeekerId>,
    pub active: bool,
}

/// What is left before the match ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Budget {
    pub ticks_remaining: Option<u64>,
    pub score_to_win: Option<u32>,
}

/// Why a command was rejected.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectReason {
    #[error("seeker does not exist")]
    UnknownSeeker,

    #[error("seeker belongs to another player")]
    NotOwned,

    #[error("target is not a finite position")]
    InvalidTarget,

    #[error("seeker commanded twice in one tick")]
    Duplicate,
}

/// A command the engine refused, reported to its sender only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandRejection {
    pub seeker_id: SeekerId,
    pub reason: RejectReason,
}

/// Read-only view of the world after a tick.
///
/// Carries exactly the externally visible state. Seeker targets are the
/// one piece of decision state in the world, and each player only ever
/// sees its own.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub tick: u64,
    pub arena: Torus,
    /// Player this view was built for (`None` for the public stream)
    pub recipient: Option<PlayerId>,
    pub seekers: Vec<SeekerStatus>,
    pub goals: Vec<GoalStatus>,
    pub camps: Vec<CampStatus>,
    pub players: Vec<PlayerStatus>,
    pub budget: Budget,
    /// Commands of the recipient rejected on the previous tick
    pub rejected: Vec<CommandRejection>,
}

impl StatusResponse {
    /// Public view: no targets, no rejections.
    pub fn snapshot(world: &World) -> Self {
        Self::build(world, None, Vec::new())
    }

    /// View for one player, including its own targets and rejections.
    pub fn for_player(world: &World, player: PlayerId, rejected: Vec<CommandRejection>) -> Self {
        Self::build(world, Some(player), rejected)
    }

    fn build(world: &World, recipient: Option<PlayerId>, rejected: Vec<CommandRejection>) -> Self {
        let now = world.tick();
        let config = world.config();

        let seekers = world
            .seekers()
            .map(|s| SeekerStatus {
                id: s.id,
                owner: s.owner,
                position: s.position,
                velocity: s.velocity,
                radius: s.radius,
                magnet: s.magnet,
                is_disabled: s.is_disabled(),
                target: (Some(s.owner) == recipient).then_some(s.target),
            })
            .collect();

        let goals = world
            .goals()
            .map(|g| GoalStatus {
                id: g.id,
                position: g.position,
                velocity: g.velocity,
                radius: g.radius,
                captured_by: g.captured_by(),
                time_in_camp: g.time_in_camp(now),
            })
            .collect();

        let camps = world
            .camps()
            .map(|c| CampStatus {
                id: c.id,
                owner: c.owner,
                position: c.position(),
                width: c.region.width,
                height: c.region.height,
            })
            .collect();

        let players = world
            .players()
            .map(|p| PlayerStatus {
                id: p.id,
                name: p.name.clone(),
                score: p.score,
                color: p.color,
                camp: p.camp,
                seekers: p.seekers.clone(),
                active: p.active,
            })
            .collect();

        let best = world.players().map(|p| p.score).max().unwrap_or(0);
        let budget = Budget {
            ticks_remaining: config.tick_budget.map(|b| b.saturating_sub(now)),
            score_to_win: config.score_threshold.map(|t| t.saturating_sub(best)),
        };

        Self {
            tick: now,
            arena: *world.torus(),
            recipient,
            seekers,
            goals,
            camps,
            players,
            budget,
            rejected,
        }
    }

    pub fn player(&self, id: PlayerId) -> Option<&PlayerStatus> {
        self.players.iter().find(|p| p.id == id)
    }

    pub fn seekers_of(&self, owner: PlayerId) -> impl Iterator<Item = &SeekerStatus> {
        self.seekers.iter().filter(move |s| s.owner == owner)
    }
}

// ============================================================================
// Command ingestion
// ============================================================================

/// Checks one player's commands against the world.
///
/// Accepted commands come back keyed by seeker id so they can be applied
/// in id order. Integrity violations (unknown, foreign or duplicate
/// seekers) are dropped whole. A non-finite target drops only the target:
/// the seeker keeps its previous destination but the magnet setting is
/// still applied. Finite targets are wrapped onto the torus.
pub fn validate_commands(
    world: &World,
    player: PlayerId,
    commands: &[SeekerCommand],
) -> (BTreeMap<SeekerId, Command>, Vec<CommandRejection>) {
    let mut accepted = BTreeMap::new();
    let mut rejected = Vec::new();
    let mut reject = |seeker_id, reason| rejected.push(CommandRejection { seeker_id, reason });

    for cmd in commands {
        let Some(seeker) = world.seeker(cmd.seeker_id) else {
            reject(cmd.seeker_id, RejectReason::UnknownSeeker);
            continue;
        };
        if seeker.owner != player {
            reject(cmd.seeker_id, RejectReason::NotOwned);
            continue;
        }
        if accepted.contains_key(&cmd.seeker_id) {
            reject(cmd.seeker_id, RejectReason::Duplicate);
            continue;
        }

        let target = if is_finite(&cmd.target) {
            world.torus().wrap(&cmd.target)
        } else {
            reject(cmd.seeker_id, RejectReason::InvalidTarget);
            seeker.target
        };
        accepted.insert(cmd.seeker_id, Command { target, magnet: cmd.magnet });
    }

    (accepted, rejected)
}

// ============================================================================
// Framing
// ============================================================================

/// Serializes a message into a frame stamped with `tick`.
pub fn encode<T: Serialize>(tick: u64, message: &T) -> Result<Frame, ProtocolError> {
    let payload = serde_json::to_vec(message).map_err(|e| ProtocolError::Encode(e.to_string()))?;
    Ok(Frame::new(tick, payload))
}

pub fn decode<T: DeserializeOwned>(frame: &Frame) -> Result<T, ProtocolError> {
    serde_json::from_slice(&frame.payload).map_err(|e| ProtocolError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::world::tests::specs;
    use crate::world::EntityId;

    fn world() -> World {
        World::new(&GameConfig::default(), &specs(2), 5).unwrap()
    }

    fn own_seeker(world: &World, player: u32) -> SeekerId {
        world.player(PlayerId(player)).unwrap().seekers[0]
    }

    #[test]
    fn test_foreign_and_unknown_seekers_rejected() {
        let world = world();
        let foreign = own_seeker(&world, 1);
        let commands = [
            SeekerCommand { seeker_id: foreign, target: Vec2::new(1.0, 1.0), magnet: MagnetState::Off },
            SeekerCommand { seeker_id: EntityId(9999), target: Vec2::new(1.0, 1.0), magnet: MagnetState::Off },
        ];
        let (accepted, rejected) = validate_commands(&world, PlayerId(0), &commands);
        assert!(accepted.is_empty());
        assert_eq!(rejected[0].reason, RejectReason::NotOwned);
        assert_eq!(rejected[1].reason, RejectReason::UnknownSeeker);
    }

    #[test]
    fn test_non_finite_target_keeps_previous_target() {
        let world = world();
        let mine = own_seeker(&world, 0);
        let previous = world.seeker(mine).unwrap().target;
        let commands = [SeekerCommand {
            seeker_id: mine,
            target: Vec2::new(f64::NAN, 3.0),
            magnet: MagnetState::Attractive,
        }];
        let (accepted, rejected) = validate_commands(&world, PlayerId(0), &commands);
        assert_eq!(accepted[&mine].target, previous);
        assert_eq!(accepted[&mine].magnet, MagnetState::Attractive);
        assert_eq!(rejected, vec![CommandRejection { seeker_id: mine, reason: RejectReason::InvalidTarget }]);
    }

    #[test]
    fn test_targets_are_wrapped_and_duplicates_dropped() {
        let world = world();
        let mine = own_seeker(&world, 0);
        let commands = [
            SeekerCommand { seeker_id: mine, target: Vec2::new(-10.0, 800.0), magnet: MagnetState::Off },
            SeekerCommand { seeker_id: mine, target: Vec2::new(5.0, 5.0), magnet: MagnetState::Repulsive },
        ];
        let (accepted, rejected) = validate_commands(&world, PlayerId(0), &commands);
        assert_eq!(accepted[&mine].target, Vec2::new(758.0, 32.0));
        assert_eq!(accepted[&mine].magnet, MagnetState::Off);
        assert_eq!(rejected[0].reason, RejectReason::Duplicate);
    }

    #[test]
    fn test_status_hides_other_players_targets() {
        let world = world();
        let status = StatusResponse::for_player(&world, PlayerId(0), Vec::new());
        for seeker in &status.seekers {
            assert_eq!(seeker.target.is_some(), seeker.owner == PlayerId(0));
        }
        let public = StatusResponse::snapshot(&world);
        assert!(public.seekers.iter().all(|s| s.target.is_none()));
        assert_eq!(public.seekers.len(), world.seeker_count());
        assert_eq!(public.budget.ticks_remaining, Some(3000));
    }

    #[test]
    fn test_messages_survive_framing() {
        let world = world();
        let status = StatusResponse::for_player(&world, PlayerId(1), Vec::new());
        let frame = encode(world.tick(), &ServerMessage::Status(status.clone())).unwrap();
        match decode::<ServerMessage>(&frame).unwrap() {
            ServerMessage::Status(decoded) => {
                assert_eq!(decoded.tick, status.tick);
                assert_eq!(decoded.recipient, Some(PlayerId(1)));
                assert_eq!(decoded.players, status.players);
                assert_eq!(decoded.seekers.len(), status.seekers.len());
                assert_eq!(decoded.budget, status.budget);
            }
            other => panic!("unexpected {}", other.kind()),
        }
    }

    #[test]
    fn test_decode_garbage_is_an_error() {
        let frame = Frame::new(0, b"not json".to_vec());
        assert!(matches!(decode::<ClientMessage>(&frame), Err(ProtocolError::Decode(_))));
    }
}
