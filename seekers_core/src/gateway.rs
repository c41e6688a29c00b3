//! AI decision gateway.
//!
//! The game loop only ever talks to a [`DecisionSource`]. Two backends
//! implement it:
//!
//! - [`LocalDecision`]: calls an in-process decide function on a blocking
//!   worker thread. Errors and panics become [`DecisionError::InvalidOutput`].
//! - [`RemoteDecision`]: runs one status/command exchange over a
//!   [`PlayerLink`].
//!
//! Both backends see the same [`StatusResponse`] built for their player,
//! and the local function receives the same [`AiInput`] a remote client
//! builds from that status. The per-tick timeout is enforced by the caller.

use crate::geometry::Torus;
use crate::protocol::{
    decode, encode, Budget, CampStatus, ClientMessage, CommandRejection, GoalStatus, PlayerStatus,
    ProtocolError, SeekerCommand, SeekerStatus, ServerMessage, StatusResponse,
};
use crate::scoring::MatchOutcome;

use async_trait::async_trait;
use seekers_env::{PlayerId, PlayerLink, SessionToken};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::debug;

/// Why a player produced no usable commands this tick.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DecisionError {
    #[error("No commands within {0:?}")]
    Timeout(Duration),

    #[error("Player disconnected: {0}")]
    Disconnected(String),

    #[error("Decision failed: {0}")]
    InvalidOutput(String),

    #[error("Protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

impl DecisionError {
    /// Connection-level failures (treated like a persistent timeout).
    pub fn is_connection_failure(&self) -> bool {
        !matches!(self, DecisionError::InvalidOutput(_))
    }
}

pub type DecideError = Box<dyn std::error::Error + Send + Sync>;

/// User-supplied decide function.
pub type DecideFn = Arc<dyn Fn(&AiInput) -> Result<Vec<SeekerCommand>, DecideError> + Send + Sync>;

/// Wraps a closure as a [`DecideFn`].
pub fn decide_fn<F>(f: F) -> DecideFn
where
    F: Fn(&AiInput) -> Result<Vec<SeekerCommand>, DecideError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// What a decide function gets to see: one player's view of a status.
#[derive(Debug, Clone)]
pub struct AiInput {
    pub me: PlayerStatus,
    pub own_seekers: Vec<SeekerStatus>,
    pub other_seekers: Vec<SeekerStatus>,
    pub goals: Vec<GoalStatus>,
    pub other_players: Vec<PlayerStatus>,
    pub own_camp: Option<CampStatus>,
    pub camps: Vec<CampStatus>,
    pub arena: Torus,
    pub tick: u64,
    pub budget: Budget,
    /// Own commands rejected last tick
    pub rejected: Vec<CommandRejection>,
}

impl AiInput {
    /// Splits a status into own and foreign parts. `None` if `me` is not
    /// a player of the match.
    pub fn from_status(status: &StatusResponse, me: PlayerId) -> Option<Self> {
        let player = status.player(me)?.clone();
        let (own_seekers, other_seekers) = status.seekers.iter().cloned().partition(|s| s.owner == me);
        let other_players = status.players.iter().filter(|p| p.id != me).cloned().collect();
        let own_camp = status.camps.iter().find(|c| c.id == player.camp).cloned();

        Some(Self {
            me: player,
            own_seekers,
            other_seekers,
            goals: status.goals.clone(),
            other_players,
            own_camp,
            camps: status.camps.clone(),
            arena: status.arena,
            tick: status.tick,
            budget: status.budget,
            rejected: status.rejected.clone(),
        })
    }
}

/// Capability interface over a player's decision maker.
#[async_trait]
pub trait DecisionSource: Send + 'static {
    /// Backend name for logs.
    fn kind(&self) -> &'static str;

    /// Produces this tick's commands from the player's view of the world.
    async fn request_commands(&mut self, status: Arc<StatusResponse>) -> Result<Vec<SeekerCommand>, DecisionError>;

    /// Called once when the match is over.
    async fn finish(&mut self, _outcome: &MatchOutcome) {}
}

// ============================================================================
// Local backend
// ============================================================================

type PendingDecision = JoinHandle<Result<Vec<SeekerCommand>, DecideError>>;

/// In-process backend.
///
/// At most one decide call is in flight per player. While a call from an
/// earlier tick is still running, the player times out immediately, so a
/// hung function costs one blocking thread and never more.
pub struct LocalDecision {
    player: PlayerId,
    decide: DecideFn,
    /// Running call and when it started
    pending: Option<(PendingDecision, Instant)>,
}

impl LocalDecision {
    pub fn new(player: PlayerId, decide: DecideFn) -> Self {
        Self {
            player,
            decide,
            pending: None,
        }
    }

    /// Whether a decide call from an earlier request is still running.
    pub fn is_busy(&self) -> bool {
        self.pending.as_ref().map(|(handle, _)| !handle.is_finished()).unwrap_or(false)
    }
}

#[async_trait]
impl DecisionSource for LocalDecision {
    fn kind(&self) -> &'static str {
        "local"
    }

    async fn request_commands(&mut self, status: Arc<StatusResponse>) -> Result<Vec<SeekerCommand>, DecisionError> {
        if let Some((handle, started)) = &self.pending {
            if !handle.is_finished() {
                return Err(DecisionError::Timeout(started.elapsed()));
            }
            // Answer to an abandoned tick
            debug!("{} finished a late decide call, discarding it", self.player);
            self.pending = None;
        }

        let input = AiInput::from_status(&status, self.player)
            .ok_or_else(|| DecisionError::Disconnected(format!("{} is not in the match", self.player)))?;
        let decide = Arc::clone(&self.decide);

        // A blocking worker keeps a slow or looping function off the loop's
        // threads; a panic surfaces as a join error. The handle stays in
        // `pending` if the caller's timeout cancels this future.
        let (handle, _) = self
            .pending
            .insert((tokio::task::spawn_blocking(move || decide(&input)), Instant::now()));
        let joined = handle.await;
        self.pending = None;

        match joined {
            Ok(Ok(commands)) => Ok(commands),
            Ok(Err(e)) => Err(DecisionError::InvalidOutput(e.to_string())),
            Err(e) if e.is_panic() => Err(DecisionError::InvalidOutput("decide function panicked".to_string())),
            Err(e) => Err(DecisionError::InvalidOutput(e.to_string())),
        }
    }
}

// ============================================================================
// Remote backend
// ============================================================================

/// Engine side of a remote player's link.
pub struct RemoteDecision<L: PlayerLink> {
    player: PlayerId,
    token: SessionToken,
    link: Arc<L>,
}

impl<L: PlayerLink> RemoteDecision<L> {
    pub fn new(player: PlayerId, token: SessionToken, link: Arc<L>) -> Self {
        Self { player, token, link }
    }
}

#[async_trait]
impl<L: PlayerLink> DecisionSource for RemoteDecision<L> {
    fn kind(&self) -> &'static str {
        "remote"
    }

    async fn request_commands(&mut self, status: Arc<StatusResponse>) -> Result<Vec<SeekerCommand>, DecisionError> {
        let tick = status.tick;
        let frame = encode(tick, &ServerMessage::Status(status.as_ref().clone()))?;
        self.link
            .send(frame)
            .await
            .map_err(|e| DecisionError::Disconnected(e.to_string()))?;

        loop {
            let Some(frame) = self.link.recv().await else {
                return Err(DecisionError::Disconnected("link closed".to_string()));
            };
            match decode::<ClientMessage>(&frame)? {
                ClientMessage::Command(request) => {
                    if request.token != self.token {
                        return Err(ProtocolError::Unauthorized.into());
                    }
                    if request.tick != tick {
                        // Late answer to an earlier, timed-out tick
                        debug!("{} sent commands for tick {} during tick {}, discarding", self.player, request.tick, tick);
                        continue;
                    }
                    return Ok(request.commands);
                }
                other => {
                    return Err(ProtocolError::Unexpected {
                        expected: "command",
                        got: other.kind(),
                    }
                    .into())
                }
            }
        }
    }

    async fn finish(&mut self, outcome: &MatchOutcome) {
        let sent = match encode(outcome.final_tick, &ServerMessage::MatchOver(outcome.clone())) {
            Ok(frame) => self.link.send(frame).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(e) = sent {
            debug!("Could not notify {} of match end: {}", self.player, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GameConfig;
    use crate::protocol::CommandRequest;
    use crate::world::tests::specs;
    use crate::world::{MagnetState, World};
    use crate::geometry::Vec2;
    use seekers_env::{EnvError, Frame};
    use tokio::sync::{mpsc, Mutex};

    /// Loopback link: frames sent are captured, frames to receive are queued.
    struct TestLink {
        sent: mpsc::UnboundedSender<Frame>,
        inbox: Mutex<mpsc::UnboundedReceiver<Frame>>,
    }

    #[async_trait]
    impl PlayerLink for TestLink {
        async fn send(&self, frame: Frame) -> Result<(), EnvError> {
            self.sent.send(frame).map_err(|_| EnvError::link("closed"))
        }

        async fn recv(&self) -> Option<Frame> {
            self.inbox.lock().await.recv().await
        }
    }

    fn test_link() -> (Arc<TestLink>, mpsc::UnboundedReceiver<Frame>, mpsc::UnboundedSender<Frame>) {
        let (sent_tx, sent_rx) = mpsc::unbounded_channel();
        let (inbox_tx, inbox_rx) = mpsc::unbounded_channel();
        let link = TestLink {
            sent: sent_tx,
            inbox: Mutex::new(inbox_rx),
        };
        (Arc::new(link), sent_rx, inbox_tx)
    }

    fn status() -> Arc<StatusResponse> {
        let world = World::new(&GameConfig::default(), &specs(2), 3).unwrap();
        Arc::new(StatusResponse::for_player(&world, PlayerId(0), Vec::new()))
    }

    fn command_frame(token: SessionToken, tick: u64) -> Frame {
        let request = CommandRequest {
            token,
            tick,
            commands: vec![SeekerCommand {
                seeker_id: crate::world::EntityId(6),
                target: Vec2::new(1.0, 2.0),
                magnet: MagnetState::Attractive,
            }],
        };
        encode(tick, &ClientMessage::Command(request)).unwrap()
    }

    #[test]
    fn test_ai_input_splits_own_and_foreign() {
        let status = status();
        let input = AiInput::from_status(&status, PlayerId(0)).unwrap();
        assert_eq!(input.me.id, PlayerId(0));
        assert_eq!(input.own_seekers.len(), 5);
        assert_eq!(input.other_seekers.len(), 5);
        assert!(input.own_seekers.iter().all(|s| s.target.is_some()));
        assert!(input.other_seekers.iter().all(|s| s.target.is_none()));
        assert_eq!(input.other_players.len(), 1);
        assert_eq!(input.own_camp.unwrap().owner, PlayerId(0));
        assert!(AiInput::from_status(&status, PlayerId(7)).is_none());
    }

    #[tokio::test]
    async fn test_local_errors_and_panics_are_contained() {
        let failing = decide_fn(|_| Err("no idea".into()));
        let mut source = LocalDecision::new(PlayerId(0), failing);
        let err = source.request_commands(status()).await.unwrap_err();
        assert_eq!(err, DecisionError::InvalidOutput("no idea".to_string()));
        assert!(!err.is_connection_failure());

        let panicking = decide_fn(|_| panic!("bot bug"));
        let mut source = LocalDecision::new(PlayerId(0), panicking);
        assert!(matches!(
            source.request_commands(status()).await,
            Err(DecisionError::InvalidOutput(_))
        ));
    }

    #[tokio::test]
    async fn test_local_keeps_one_call_in_flight() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let decide = decide_fn(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                std::thread::sleep(Duration::from_millis(300));
            }
            Ok(Vec::new())
        });
        let mut source = LocalDecision::new(PlayerId(0), decide);

        let first = tokio::time::timeout(Duration::from_millis(20), source.request_commands(status())).await;
        assert!(first.is_err());
        assert!(source.is_busy());

        // Still running: no second call is started
        assert!(matches!(
            source.request_commands(status()).await,
            Err(DecisionError::Timeout(_))
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(400)).await;
        assert!(!source.is_busy());
        assert_eq!(source.request_commands(status()).await.unwrap(), Vec::new());
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_local_returns_commands() {
        let decide = decide_fn(|input| {
            Ok(input
                .own_seekers
                .iter()
                .map(|s| SeekerCommand { seeker_id: s.id, target: s.position, magnet: MagnetState::Off })
                .collect())
        });
        let mut source = LocalDecision::new(PlayerId(0), decide);
        let commands = source.request_commands(status()).await.unwrap();
        assert_eq!(commands.len(), 5);
    }

    #[tokio::test]
    async fn test_remote_exchange_skips_stale_answers() {
        let (link, mut sent, inbox) = test_link();
        let token = SessionToken::from_seed(1);
        let mut source = RemoteDecision::new(PlayerId(0), token, link);

        inbox.send(command_frame(token, 99)).unwrap();
        inbox.send(command_frame(token, 0)).unwrap();

        let commands = source.request_commands(status()).await.unwrap();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].magnet, MagnetState::Attractive);

        let out = sent.recv().await.unwrap();
        assert!(matches!(decode::<ServerMessage>(&out).unwrap(), ServerMessage::Status(_)));
    }

    #[tokio::test]
    async fn test_remote_rejects_wrong_token_and_closed_link() {
        let (link, _sent, inbox) = test_link();
        let mut source = RemoteDecision::new(PlayerId(0), SessionToken::from_seed(1), link);

        inbox.send(command_frame(SessionToken::from_seed(2), 0)).unwrap();
        assert_eq!(
            source.request_commands(status()).await,
            Err(DecisionError::Protocol(ProtocolError::Unauthorized))
        );

        drop(inbox);
        assert!(matches!(
            source.request_commands(status()).await,
            Err(DecisionError::Disconnected(_))
        ));
    }
}
