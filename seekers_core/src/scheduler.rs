//! Tick scheduler (game loop).
//!
//! # Lifecycle
//!
//! ```text
//!   Setup ──start()──▶ Running ──win / budget / shutdown──▶ Finished
//! ```
//!
//! # One tick
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │ 1. gather   one task per active player, each bounded by the  │
//! │             command timeout (JoinSet, concurrent)            │
//! │ 2. apply    validated commands, player then seeker id order  │
//! │ 3. physics  fixed timestep                                   │
//! │ 4. scoring  containment timers, captures, respawns           │
//! │ 5. publish  Arc<StatusResponse> on the broadcast stream      │
//! │ 6. outcome  threshold / tick budget                          │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! The world is only touched by this loop, and only between gathers.
//! Decision tasks get immutable snapshots, so no lock guards it.
//! Wall-clock pacing goes through the [`ArenaContext`]: if a tick
//! overruns its interval the next one starts immediately, while the
//! simulated timestep stays fixed.

use crate::colors::Color;
use crate::config::{ConfigError, GameConfig};
use crate::gateway::{DecideFn, DecisionError, DecisionSource, LocalDecision, RemoteDecision};
use crate::lobby::{JoinError, Lobby, Seat};
use crate::metrics::MatchStats;
use crate::protocol::{
    decode, encode, validate_commands, ClientMessage, CommandRejection, JoinRequest, JoinResponse, ProtocolError,
    SeekerCommand, ServerMessage, StatusResponse,
};
use crate::scoring::{self, FinishReason, MatchOutcome};
use crate::world::World;

use seekers_env::{ArenaContext, PlayerId, PlayerLink, SessionToken};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

/// Capacity of the per-tick status stream. Slow subscribers lag.
const STREAM_CAPACITY: usize = 1024;

#[derive(Debug, Error)]
pub enum ScheduleError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Not enough players: {joined} of {required}")]
    NotEnoughPlayers { joined: usize, required: usize },

    #[error("Match already finished")]
    Finished,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Setup,
    Running,
    Finished,
}

/// Everything a finished match leaves behind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    pub outcome: MatchOutcome,
    pub stats: MatchStats,
    pub final_tick: u64,
}

/// The authoritative game loop.
pub struct GameLoop<Ctx: ArenaContext> {
    ctx: Arc<Ctx>,
    config: GameConfig,
    lobby: Lobby,
    state: LoopState,
    world: Option<World>,
    sources: BTreeMap<PlayerId, Box<dyn DecisionSource>>,
    /// Rejections to echo in each player's next status
    rejected: BTreeMap<PlayerId, Vec<CommandRejection>>,
    /// Players whose last exchange failed (logs once per streak)
    failing: BTreeSet<PlayerId>,
    stats: MatchStats,
    stream: broadcast::Sender<Arc<StatusResponse>>,
}

impl<Ctx: ArenaContext> GameLoop<Ctx> {
    pub fn new(ctx: Arc<Ctx>, config: GameConfig) -> Result<Self, ScheduleError> {
        config.validate()?;
        let (stream, _) = broadcast::channel(STREAM_CAPACITY);
        Ok(Self {
            ctx,
            lobby: Lobby::new(config.clone()),
            config,
            state: LoopState::Setup,
            world: None,
            sources: BTreeMap::new(),
            rejected: BTreeMap::new(),
            failing: BTreeSet::new(),
            stats: MatchStats::default(),
            stream,
        })
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn seats(&self) -> &[Seat] {
        self.lobby.seats()
    }

    /// The world, once the match has started.
    pub fn world(&self) -> Option<&World> {
        self.world.as_ref()
    }

    pub fn stats(&self) -> &MatchStats {
        &self.stats
    }

    /// Per-tick public snapshots, starting with the next published tick.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<StatusResponse>> {
        self.stream.subscribe()
    }

    // ---------------------------------------------------------------------
    // Setup
    // ---------------------------------------------------------------------

    fn admit(&mut self, request: &JoinRequest) -> Result<Seat, JoinError> {
        if self.state != LoopState::Setup {
            return Err(JoinError::AlreadyStarted);
        }
        let index = self.lobby.seats().len() as u64;
        let token = SessionToken::from_seed(self.ctx.derive_seed(index));
        self.lobby.register(request, token)
    }

    /// Seats a player backed by any decision source.
    pub fn join_with<F>(&mut self, request: JoinRequest, make_source: F) -> Result<JoinResponse, JoinError>
    where
        F: FnOnce(&Seat) -> Box<dyn DecisionSource>,
    {
        let seat = self.admit(&request)?;
        let source = make_source(&seat);
        debug!("{} decides via {} backend", seat.id, source.kind());
        self.sources.insert(seat.id, source);
        Ok(seat.response(&self.config))
    }

    /// Seats an in-process player.
    pub fn join_local(&mut self, name: &str, color: Option<Color>, decide: DecideFn) -> Result<JoinResponse, JoinError> {
        let request = JoinRequest {
            name: name.to_string(),
            color,
            seekers: None,
        };
        self.join_with(request, |seat| Box::new(LocalDecision::new(seat.id, decide)))
    }

    /// Runs the join handshake on a freshly connected link.
    ///
    /// The rejection reason is sent back before the error is returned.
    pub async fn accept_remote<L: PlayerLink>(&mut self, link: Arc<L>) -> Result<JoinResponse, JoinError> {
        let frame = link
            .recv()
            .await
            .ok_or_else(|| JoinError::Disconnected("link closed before join".to_string()))?;

        let request = match decode::<ClientMessage>(&frame)? {
            ClientMessage::Join(request) => request,
            other => {
                let err = JoinError::Protocol(ProtocolError::Unexpected {
                    expected: "join",
                    got: other.kind(),
                });
                self.send_rejection(link.as_ref(), &err).await;
                return Err(err);
            }
        };

        let remote = Arc::clone(&link);
        match self.join_with(request, |seat| Box::new(RemoteDecision::new(seat.id, seat.token, remote))) {
            Ok(response) => {
                link.send(encode(0, &ServerMessage::Joined(response.clone()))?).await?;
                Ok(response)
            }
            Err(err) => {
                self.send_rejection(link.as_ref(), &err).await;
                Err(err)
            }
        }
    }

    async fn send_rejection<L: PlayerLink>(&self, link: &L, err: &JoinError) {
        warn!("Join rejected: {}", err);
        let message = ServerMessage::JoinRejected { reason: err.to_string() };
        let sent = match encode(0, &message) {
            Ok(frame) => link.send(frame).await.map_err(|e| e.to_string()),
            Err(e) => Err(e.to_string()),
        };
        if let Err(e) = sent {
            debug!("Could not deliver join rejection: {}", e);
        }
    }

    /// Closes the lobby and creates the world.
    pub fn start(&mut self) -> Result<(), ScheduleError> {
        match self.state {
            LoopState::Running => return Ok(()),
            LoopState::Finished => return Err(ScheduleError::Finished),
            LoopState::Setup => {}
        }
        if !self.lobby.is_full() {
            return Err(ScheduleError::NotEnoughPlayers {
                joined: self.lobby.seats().len(),
                required: self.config.players,
            });
        }

        self.lobby.close();
        let world = World::new(&self.config, &self.lobby.specs(), self.config.seed)?;
        info!(
            "Match started: {} players, {} seekers, {} goals (seed={})",
            world.players().count(),
            world.seeker_count(),
            world.goal_count(),
            self.config.seed
        );
        self.world = Some(world);
        self.state = LoopState::Running;
        Ok(())
    }

    /// Adjusts the world before the first tick (scenario setup).
    ///
    /// Returns false once the match has started ticking.
    pub fn arrange<F: FnOnce(&mut World)>(&mut self, f: F) -> bool {
        match self.world.as_mut() {
            Some(world) if world.tick() == 0 => {
                f(world);
                true
            }
            _ => false,
        }
    }

    // ---------------------------------------------------------------------
    // Running
    // ---------------------------------------------------------------------

    /// Runs the match to completion.
    ///
    /// Only setup problems are errors; player failures never stop the loop.
    pub async fn run(&mut self, shutdown: watch::Receiver<bool>) -> Result<MatchReport, ScheduleError> {
        self.start()?;

        let outcome = loop {
            if *shutdown.borrow() {
                info!("Shutdown requested");
                break self.outcome(FinishReason::Shutdown);
            }

            let started = self.ctx.now();
            if let Some(outcome) = self.tick().await {
                break outcome;
            }

            let elapsed = self.ctx.now().saturating_sub(started);
            let interval = self.config.tick_interval();
            if elapsed < interval {
                self.ctx.sleep(interval - elapsed).await;
            } else {
                self.stats.overruns += 1;
                debug!("Tick {} overran its interval ({:?})", self.stats.ticks, elapsed);
            }
        };

        Ok(self.finish(outcome).await)
    }

    /// Runs one full tick. Returns the outcome if the match ended.
    pub async fn tick(&mut self) -> Option<MatchOutcome> {
        if self.state != LoopState::Running {
            return None;
        }

        // 1. gather
        let answers = self.gather().await;

        let world = self.world.as_mut()?;
        world.begin_tick();

        // 2. apply
        for (player, answer) in answers {
            match answer {
                Ok(commands) => {
                    if self.failing.remove(&player) {
                        info!("{} is responding again", player);
                    }
                    apply(world, &mut self.stats, &mut self.rejected, player, &commands);
                }
                Err(err) => {
                    self.stats.record_failure(player, &err);
                    if err.is_connection_failure() && self.config.careful_mode {
                        warn!("{} dropped at tick {}: {}", player, world.tick(), err);
                        world.drop_player(player);
                        self.sources.remove(&player);
                    } else if self.failing.insert(player) {
                        warn!("{} keeps its previous commands: {}", player, err);
                    } else {
                        debug!("{} still failing: {}", player, err);
                    }
                }
            }
        }

        // 3. physics
        let collisions = world.step_physics();
        for event in collisions.iter().filter(|e| !e.disabled.is_empty()) {
            debug!("Collision {} / {} disabled {:?}", event.a, event.b, event.disabled);
        }

        // 4. scoring
        world.resolve_scoring();

        // 5. publish
        self.stats.ticks = world.tick();
        let _ = self.stream.send(Arc::new(StatusResponse::snapshot(world)));

        // 6. outcome
        scoring::check_outcome(world)
    }

    /// Requests commands from every active player concurrently.
    async fn gather(&mut self) -> BTreeMap<PlayerId, Result<Vec<SeekerCommand>, DecisionError>> {
        let mut answers = BTreeMap::new();
        let Some(world) = self.world.as_ref() else {
            return answers;
        };

        let timeout = self.config.command_timeout();
        let active: Vec<PlayerId> = world.players().filter(|p| p.active).map(|p| p.id).collect();
        let mut tasks = JoinSet::new();

        for &player in &active {
            let Some(mut source) = self.sources.remove(&player) else {
                continue;
            };
            let rejected = self.rejected.remove(&player).unwrap_or_default();
            let status = Arc::new(StatusResponse::for_player(world, player, rejected));

            tasks.spawn(async move {
                let answer = match tokio::time::timeout(timeout, source.request_commands(status)).await {
                    Ok(answer) => answer,
                    Err(_) => Err(DecisionError::Timeout(timeout)),
                };
                (player, source, answer)
            });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((player, source, answer)) => {
                    self.sources.insert(player, source);
                    answers.insert(player, answer);
                }
                Err(e) => error!("Decision task aborted: {}", e),
            }
        }

        // A player whose task died lost its source with it
        for player in active {
            answers
                .entry(player)
                .or_insert_with(|| Err(DecisionError::Disconnected("no decision source".to_string())));
        }

        answers
    }

    fn outcome(&self, reason: FinishReason) -> MatchOutcome {
        match &self.world {
            Some(world) => scoring::outcome(world, reason),
            None => MatchOutcome {
                reason,
                winner: None,
                final_tick: 0,
                scoreboard: Vec::new(),
            },
        }
    }

    async fn finish(&mut self, outcome: MatchOutcome) -> MatchReport {
        self.state = LoopState::Finished;
        info!(
            "Match finished at tick {} ({:?}), winner: {}",
            outcome.final_tick,
            outcome.reason,
            outcome.winner.map(|p| p.to_string()).unwrap_or_else(|| "draw".to_string())
        );
        for line in &outcome.scoreboard {
            info!("  {:<24} {:>4}{}", line.name, line.score, if line.active { "" } else { "  (dropped)" });
        }

        for source in self.sources.values_mut() {
            source.finish(&outcome).await;
        }

        MatchReport {
            final_tick: outcome.final_tick,
            stats: self.stats.clone(),
            outcome,
        }
    }
}

fn apply(
    world: &mut World,
    stats: &mut MatchStats,
    pending_rejections: &mut BTreeMap<PlayerId, Vec<CommandRejection>>,
    player: PlayerId,
    commands: &[SeekerCommand],
) {
    let (accepted, rejected) = validate_commands(world, player, commands);
    let applied = world.apply_commands(player, &accepted);
    stats.record_commands(player, applied, rejected.len());
    if !rejected.is_empty() {
        warn!("{} sent {} rejected commands at tick {}", player, rejected.len(), world.tick());
        pending_rejections.insert(player, rejected);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::SeekersClient;
    use crate::gateway::decide_fn;
    use crate::geometry::Vec2;
    use crate::world::{EntityId, MagnetState};
    use async_trait::async_trait;
    use seekers_env::{EnvError, Frame, TokioContext};
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::sync::{mpsc, Mutex as AsyncMutex};

    fn config(players: usize) -> GameConfig {
        GameConfig {
            players,
            seekers_per_player: 2,
            goals: 3,
            tick_budget: Some(30),
            tick_interval_ms: 1,
            command_timeout_ms: 5_000,
            ..GameConfig::default()
        }
    }

    fn game(config: GameConfig) -> GameLoop<TokioContext> {
        GameLoop::new(TokioContext::shared(config.seed), config).unwrap()
    }

    fn no_shutdown() -> watch::Receiver<bool> {
        // The last value stays readable after the sender is gone
        watch::channel(false).1
    }

    /// Drives every own seeker to the nearest goal, magnet on when close.
    fn chaser() -> DecideFn {
        decide_fn(|input| {
            let goals: Vec<Vec2> = input.goals.iter().map(|g| g.position).collect();
            Ok(input
                .own_seekers
                .iter()
                .map(|s| {
                    let target = input
                        .arena
                        .index_of_nearest(&s.position, &goals)
                        .map(|i| goals[i])
                        .unwrap_or(s.position);
                    let close = input.arena.distance(&s.position, &target) < 40.0;
                    SeekerCommand {
                        seeker_id: s.id,
                        target,
                        magnet: if close { MagnetState::Attractive } else { MagnetState::Off },
                    }
                })
                .collect())
        })
    }

    fn idle() -> DecideFn {
        decide_fn(|_| Ok(Vec::new()))
    }

    /// Answers `answers` times with a fixed command, then hangs.
    struct Scripted {
        command: SeekerCommand,
        answers: usize,
        seen: Arc<Mutex<Vec<Arc<StatusResponse>>>>,
    }

    #[async_trait]
    impl DecisionSource for Scripted {
        fn kind(&self) -> &'static str {
            "scripted"
        }

        async fn request_commands(&mut self, status: Arc<StatusResponse>) -> Result<Vec<SeekerCommand>, DecisionError> {
            self.seen.lock().unwrap().push(status);
            if self.answers == 0 {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.answers -= 1;
            Ok(vec![self.command])
        }
    }

    fn scripted(command: SeekerCommand, answers: usize) -> (Scripted, Arc<Mutex<Vec<Arc<StatusResponse>>>>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let source = Scripted {
            command,
            answers,
            seen: Arc::clone(&seen),
        };
        (source, seen)
    }

    fn request(name: &str) -> JoinRequest {
        JoinRequest {
            name: name.to_string(),
            color: None,
            seekers: None,
        }
    }

    #[tokio::test]
    async fn test_start_requires_full_lobby() {
        let mut game = game(config(2));
        game.join_local("solo", None, idle()).unwrap();
        assert!(matches!(
            game.start(),
            Err(ScheduleError::NotEnoughPlayers { joined: 1, required: 2 })
        ));

        game.join_local("second", None, idle()).unwrap();
        game.start().unwrap();
        assert_eq!(game.state(), LoopState::Running);
        assert_eq!(game.join_local("late", None, idle()), Err(JoinError::AlreadyStarted));
    }

    #[tokio::test]
    async fn test_match_runs_to_tick_budget() {
        let mut game = game(config(2));
        game.join_local("a", None, chaser()).unwrap();
        game.join_local("b", None, chaser()).unwrap();
        let mut stream = game.subscribe();

        let report = game.run(no_shutdown()).await.unwrap();
        assert_eq!(report.outcome.reason, FinishReason::TickBudget);
        assert_eq!(report.final_tick, 30);
        assert_eq!(report.stats.ticks, 30);
        assert_eq!(game.state(), LoopState::Finished);

        let mut expected_tick = 1;
        while let Ok(status) = stream.try_recv() {
            assert_eq!(status.tick, expected_tick);
            assert_eq!(status.seekers.len(), 4);
            expected_tick += 1;
        }
        assert_eq!(expected_tick, 31);
    }

    #[tokio::test]
    async fn test_same_seed_same_snapshots() {
        async fn record() -> Vec<String> {
            let mut game = game(config(2));
            game.join_local("a", None, chaser()).unwrap();
            game.join_local("b", None, chaser()).unwrap();
            let mut stream = game.subscribe();
            game.run(no_shutdown()).await.unwrap();

            let mut frames = Vec::new();
            while let Ok(status) = stream.try_recv() {
                frames.push(serde_json::to_string(status.as_ref()).unwrap());
            }
            frames
        }

        let first = record().await;
        let second = record().await;
        assert_eq!(first.len(), 30);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_timeout_keeps_previous_commands() {
        let mut config = config(2);
        config.command_timeout_ms = 30;
        config.tick_budget = Some(3);
        let mut game = game(config);

        let seeker = crate::world::planned_seeker_ids(game.config(), 0)[0];
        let command = SeekerCommand {
            seeker_id: seeker,
            target: Vec2::new(100.0, 100.0),
            magnet: MagnetState::Attractive,
        };
        let (source, _) = scripted(command, 1);
        game.join_with(request("flaky"), |_| Box::new(source)).unwrap();
        game.join_local("steady", None, idle()).unwrap();

        let report = game.run(no_shutdown()).await.unwrap();
        let world = game.world().unwrap();
        let kept = world.seeker(seeker).unwrap();
        assert_eq!(kept.target, Vec2::new(100.0, 100.0));
        assert!(world.player(PlayerId(0)).unwrap().active);

        let stats = &report.stats.players[&PlayerId(0)];
        assert_eq!(stats.commands_applied, 1);
        assert_eq!(stats.timeouts, 2);
        assert_eq!(report.outcome.reason, FinishReason::TickBudget);
    }

    #[test]
    fn test_hung_local_bot_does_not_starve_others() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .max_blocking_threads(2)
            .enable_all()
            .build()
            .unwrap();

        let mut config = config(2);
        config.command_timeout_ms = 100;
        config.tick_budget = Some(12);
        let seeker = crate::world::planned_seeker_ids(&config, 0)[0];
        let target = Vec2::new(100.0, 100.0);

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&calls);
        let hung = decide_fn(move |_| {
            if counter.fetch_add(1, Ordering::SeqCst) > 0 {
                std::thread::sleep(Duration::from_secs(5));
            }
            Ok(vec![SeekerCommand { seeker_id: seeker, target, magnet: MagnetState::Attractive }])
        });

        let (report, kept) = runtime.block_on(async move {
            let mut game = game(config);
            game.join_local("hung", None, hung).unwrap();
            game.join_local("instant", None, idle()).unwrap();
            let report = game.run(no_shutdown()).await.unwrap();
            let kept = game.world().unwrap().seeker(seeker).unwrap().clone();
            (report, kept)
        });
        runtime.shutdown_background();

        let instant = &report.stats.players[&PlayerId(1)];
        assert_eq!(instant.timeouts, 0);
        assert_eq!(instant.stale_ticks, 0);

        let hung = &report.stats.players[&PlayerId(0)];
        assert_eq!(hung.commands_applied, 1);
        assert_eq!(hung.timeouts, 11);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(kept.target, target);
        assert_eq!(kept.magnet, MagnetState::Attractive);
    }

    #[tokio::test]
    async fn test_careful_mode_drops_unresponsive_player() {
        let mut config = config(2);
        config.command_timeout_ms = 30;
        config.tick_budget = Some(4);
        config.careful_mode = true;
        let mut game = game(config);

        let seeker = crate::world::planned_seeker_ids(game.config(), 0)[0];
        let command = SeekerCommand {
            seeker_id: seeker,
            target: Vec2::new(100.0, 100.0),
            magnet: MagnetState::Attractive,
        };
        let (source, seen) = scripted(command, 1);
        game.join_with(request("flaky"), |_| Box::new(source)).unwrap();
        game.join_local("steady", None, chaser()).unwrap();

        let report = game.run(no_shutdown()).await.unwrap();
        let world = game.world().unwrap();
        assert!(!world.player(PlayerId(0)).unwrap().active);
        for s in world.seekers().filter(|s| s.owner == PlayerId(0)) {
            assert!(s.is_disabled());
            assert_eq!(s.magnet, MagnetState::Off);
        }
        // Asked on tick 1 and 2 only: dropped after the first timeout
        assert_eq!(seen.lock().unwrap().len(), 2);
        assert_eq!(report.stats.players[&PlayerId(0)].timeouts, 1);
        assert!(!report.outcome.scoreboard.iter().find(|l| l.player == PlayerId(0)).unwrap().active);
    }

    #[tokio::test]
    async fn test_rejections_reach_only_the_sender() {
        let mut config = config(2);
        config.tick_budget = Some(2);
        let mut game = game(config);

        let foreign = crate::world::planned_seeker_ids(game.config(), 1)[0];
        let cheat = SeekerCommand {
            seeker_id: foreign,
            target: Vec2::new(1.0, 1.0),
            magnet: MagnetState::Attractive,
        };
        let (cheater, cheater_seen) = scripted(cheat, 2);
        let (honest, honest_seen) = scripted(
            SeekerCommand {
                seeker_id: crate::world::planned_seeker_ids(game.config(), 1)[1],
                target: Vec2::new(2.0, 2.0),
                magnet: MagnetState::Off,
            },
            2,
        );
        game.join_with(request("cheater"), |_| Box::new(cheater)).unwrap();
        game.join_with(request("honest"), |_| Box::new(honest)).unwrap();

        let report = game.run(no_shutdown()).await.unwrap();
        let world = game.world().unwrap();
        assert_ne!(world.seeker(foreign).unwrap().magnet, MagnetState::Attractive);

        let cheater_seen = cheater_seen.lock().unwrap();
        assert!(cheater_seen[0].rejected.is_empty());
        assert_eq!(cheater_seen[1].rejected.len(), 1);
        assert!(honest_seen.lock().unwrap().iter().all(|s| s.rejected.is_empty()));
        assert_eq!(report.stats.players[&PlayerId(0)].commands_rejected, 2);
    }

    #[tokio::test]
    async fn test_shutdown_before_first_tick() {
        let mut game = game(config(1));
        game.join_local("a", None, idle()).unwrap();
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let report = game.run(rx).await.unwrap();
        assert_eq!(report.outcome.reason, FinishReason::Shutdown);
        assert_eq!(report.final_tick, 0);
    }

    #[tokio::test]
    async fn test_arrange_only_before_first_tick() {
        let mut game = game(config(1));
        game.join_local("a", None, idle()).unwrap();
        game.start().unwrap();
        let goal = EntityId(0);
        assert!(game.arrange(|world| {
            if let Some(g) = world.goal_mut(goal) {
                g.position = Vec2::new(5.0, 5.0);
            }
        }));
        assert_eq!(game.world().unwrap().goal(goal).unwrap().position, Vec2::new(5.0, 5.0));

        game.tick().await;
        assert!(!game.arrange(|_| {}));
    }

    /// In-memory duplex link.
    struct ChannelLink {
        tx: mpsc::UnboundedSender<Frame>,
        rx: AsyncMutex<mpsc::UnboundedReceiver<Frame>>,
    }

    #[async_trait]
    impl PlayerLink for ChannelLink {
        async fn send(&self, frame: Frame) -> Result<(), EnvError> {
            self.tx.send(frame).map_err(|_| EnvError::link("peer gone"))
        }

        async fn recv(&self) -> Option<Frame> {
            self.rx.lock().await.recv().await
        }
    }

    fn link_pair() -> (Arc<ChannelLink>, Arc<ChannelLink>) {
        let (a_tx, a_rx) = mpsc::unbounded_channel();
        let (b_tx, b_rx) = mpsc::unbounded_channel();
        let a = ChannelLink { tx: a_tx, rx: AsyncMutex::new(b_rx) };
        let b = ChannelLink { tx: b_tx, rx: AsyncMutex::new(a_rx) };
        (Arc::new(a), Arc::new(b))
    }

    #[tokio::test]
    async fn test_remote_client_plays_a_match() {
        let mut config = config(2);
        config.tick_budget = Some(10);
        let mut game = game(config);

        let (engine_side, client_side) = link_pair();
        let client = tokio::spawn(async move {
            let mut client = SeekersClient::new(client_side, chaser());
            let joined = client.join("remote", None).await.unwrap();
            let outcome = client.run().await.unwrap();
            (joined, outcome)
        });

        let response = game.accept_remote(engine_side).await.unwrap();
        assert_eq!(response.player_id, PlayerId(0));
        game.join_local("local", None, chaser()).unwrap();

        let report = game.run(no_shutdown()).await.unwrap();
        let (joined, outcome) = client.await.unwrap();
        assert_eq!(joined.token, response.token);
        assert_eq!(outcome, Some(report.outcome.clone()));

        let stats = &report.stats.players[&PlayerId(0)];
        assert_eq!(stats.stale_ticks, 0);
        assert_eq!(stats.commands_applied, 20);
    }

    #[tokio::test]
    async fn test_remote_join_rejected_when_full() {
        let mut game = game(config(1));
        game.join_local("a", None, idle()).unwrap();

        let (engine_side, client_side) = link_pair();
        let client = tokio::spawn(async move {
            let mut client = SeekersClient::new(client_side, idle());
            client.join("late", None).await
        });

        assert!(matches!(
            game.accept_remote(engine_side).await,
            Err(JoinError::GameFull { capacity: 1 })
        ));
        assert!(matches!(client.await.unwrap(), Err(crate::client::ClientError::Rejected(_))));
    }
}
