//! Scenario runner - executes simulation test scenarios.

use crate::bots;
use crate::exporter::MatchExport;
use crate::scenarios::ScenarioId;
use crate::world::{SimConfig, SimError, SimRun, SimWorld};

use seekers_core::colors::Color;
use seekers_core::config::{MagnetConfig, SeekerConfig};
use seekers_core::{EntityId, GameConfig, MagnetState, MatchReport, Vec2};
use seekers_env::{LinkController, PlayerId};
use serde::Serialize;
use tracing::{debug, info, warn};

/// Results from running a scenario.
#[derive(Debug, Clone, Serialize)]
pub struct ScenarioResult {
    /// Scenario that was run
    pub scenario: String,
    
    /// Seed used
    pub seed: u64,
    
    /// Whether scenario passed all assertions
    pub passed: bool,
    
    /// Total ticks executed
    pub total_ticks: u64,
    
    /// Virtual time the match took, in seconds
    pub final_time_secs: f64,
    
    /// Failure message if any
    pub failure_reason: Option<String>,
    
    /// Report of the (last) match played
    pub report: Option<MatchReport>,
    
    /// Recorded frames, when export was requested
    #[serde(skip)]
    pub export: Option<MatchExport>,
}

/// Collects failed expectations of one scenario.
#[derive(Debug, Default)]
struct Checks {
    failures: Vec<String>,
}

impl Checks {
    fn check(&mut self, condition: bool, what: impl Into<String>) {
        if !condition {
            let what = what.into();
            debug!("Check failed: {}", what);
            self.failures.push(what);
        }
    }
}

/// Runs scenarios.
pub struct ScenarioRunner {
    /// Configuration seed
    seed: u64,
    
    /// Base match configuration for the match-length scenarios
    config: GameConfig,
    
    /// Keep recorded frames in the result
    record: bool,
}

impl ScenarioRunner {
    /// Creates a new scenario runner.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            config: GameConfig::default(),
            record: false,
        }
    }
    
    /// Sets the base match configuration.
    pub fn with_config(mut self, config: GameConfig) -> Self {
        self.config = config;
        self
    }
    
    /// Overrides the tick budget of the base configuration.
    pub fn with_ticks(mut self, ticks: u64) -> Self {
        self.config.tick_budget = Some(ticks);
        self
    }
    
    /// Keeps the frames of the scenario's match for export.
    pub fn with_export(mut self, record: bool) -> Self {
        self.record = record;
        self
    }
    
    /// Runs a scenario and returns the result.
    pub async fn run(&self, scenario: ScenarioId) -> ScenarioResult {
        info!("Starting scenario: {} (seed={})", scenario.name(), self.seed);
        
        let mut checks = Checks::default();
        let outcome = match scenario {
            ScenarioId::HeadOn => self.run_head_on(&mut checks, false).await,
            ScenarioId::MagnetDuel => self.run_head_on(&mut checks, true).await,
            ScenarioId::Timeout => self.run_timeout(&mut checks).await,
            ScenarioId::CarefulDrop => self.run_careful_drop(&mut checks).await,
            ScenarioId::Misbehaving => self.run_misbehaving(&mut checks).await,
            ScenarioId::RemoteMatch => self.run_remote_match(&mut checks).await,
            ScenarioId::Determinism => self.run_determinism(&mut checks).await,
            ScenarioId::FullMatch => self.run_full_match(&mut checks).await,
            ScenarioId::ColorClash => self.run_color_clash(&mut checks).await,
        };
        
        let run = match outcome {
            Ok(run) => Some(run),
            Err(e) => {
                checks.check(false, format!("simulation error: {}", e));
                None
            }
        };
        
        let passed = checks.failures.is_empty();
        if passed {
            info!("✓ {} passed", scenario.name());
        } else {
            warn!("✗ {} failed: {}", scenario.name(), checks.failures.join("; "));
        }
        
        let export = run.as_ref().filter(|_| self.record).map(|run| {
            let mut export = MatchExport::new(scenario.name(), self.seed);
            for frame in &run.frames {
                export.add_frame(frame);
            }
            export.finalize(passed, Some(run.report.outcome.clone()));
            export
        });
        
        ScenarioResult {
            scenario: scenario.name().to_string(),
            seed: self.seed,
            passed,
            total_ticks: run.as_ref().map(|r| r.report.final_tick).unwrap_or(0),
            final_time_secs: run.as_ref().map(|r| r.elapsed.as_secs_f64()).unwrap_or(0.0),
            failure_reason: (!passed).then(|| checks.failures.join("; ")),
            report: run.map(|r| r.report),
            export,
        }
    }
    
    fn sim(&self, game: GameConfig) -> SimConfig {
        SimConfig {
            seed: self.seed,
            game,
            ..SimConfig::default()
        }
    }
    
    /// Two seekers, no goals, no thrust, friction or magnet reach.
    fn duel_config() -> GameConfig {
        GameConfig {
            players: 2,
            seekers_per_player: 1,
            goals: 0,
            tick_budget: Some(1),
            seeker: SeekerConfig {
                thrust: 0.0,
                friction: 0.0,
                ..SeekerConfig::default()
            },
            magnet: MagnetConfig {
                range: 0.0,
                ..MagnetConfig::default()
            },
            ..GameConfig::default()
        }
    }
    
    /// SIM-001 / SIM-002: head-on collision on tick 1.
    ///
    /// Seekers at x=99 and x=121 (radius 10) move one unit towards each
    /// other and touch exactly. Velocities must swap; the magnet rule
    /// decides who gets disabled.
    async fn run_head_on(&self, checks: &mut Checks, both_magnets: bool) -> Result<SimRun, SimError> {
        let mut sim = SimWorld::new(self.sim(Self::duel_config()))?;
        sim.add_local("left", None, bots::idle())?;
        sim.add_local("right", None, bots::idle())?;
        
        let (a, b) = (EntityId(0), EntityId(1));
        sim.arrange(|world| {
            let magnet_b = if both_magnets { MagnetState::Attractive } else { MagnetState::Off };
            for (id, x, vx, magnet) in [(a, 99.0, 1.0, MagnetState::Attractive), (b, 121.0, -1.0, magnet_b)] {
                if let Some(s) = world.seeker_mut(id) {
                    s.position = Vec2::new(x, 384.0);
                    s.velocity = Vec2::new(vx, 0.0);
                    s.magnet = magnet;
                }
            }
        })?;
        
        let run = sim.run().await?;
        let Some(frame) = run.frames.first() else {
            checks.check(false, "no frame published");
            return Ok(run);
        };
        checks.check(frame.tick == 1, "first frame is tick 1");
        
        let velocity = |id| frame.seekers.iter().find(|s| s.id == id).map(|s| s.velocity);
        let disabled = |id| frame.seekers.iter().find(|s| s.id == id).map(|s| s.is_disabled);
        let close = |v: Option<Vec2>, expected: Vec2| v.map(|v| (v - expected).norm() < 1e-9).unwrap_or(false);
        
        checks.check(close(velocity(a), Vec2::new(-1.0, 0.0)), "left seeker bounced back");
        checks.check(close(velocity(b), Vec2::new(1.0, 0.0)), "right seeker bounced back");
        checks.check(disabled(a) == Some(true), "lower id magnet holder disabled");
        checks.check(disabled(b) == Some(false), "other seeker stays enabled");
        Ok(run)
    }
    
    /// SIM-003: a remote player is partitioned at tick 5 and its seekers
    /// keep their last commands.
    async fn run_timeout(&self, checks: &mut Checks) -> Result<SimRun, SimError> {
        let game = GameConfig {
            tick_budget: Some(12),
            command_timeout_ms: 50,
            ..self.config.clone()
        };
        let mut sim = SimWorld::new(self.sim(game))?;
        sim.add_remote("silent", None, bots::homing()).await?;
        sim.add_local("steady", None, bots::chaser())?;
        sim.fault_at(5, |links| links.partition(PlayerId(0)));
        
        let run = sim.run().await?;
        let stats = run.report.stats.players.get(&PlayerId(0)).cloned().unwrap_or_default();
        checks.check(run.report.final_tick == 12, "match ran to its budget");
        checks.check(stats.timeouts >= 1, "partitioned player timed out");
        checks.check(stats.commands_applied > 0, "commands applied before the partition");
        
        if let Some(world) = &run.world {
            let camp = world
                .player(PlayerId(0))
                .and_then(|p| world.camp(p.camp))
                .map(|c| c.position());
            checks.check(world.player(PlayerId(0)).map(|p| p.active) == Some(true), "player stays in the match");
            for seeker in world.seekers().filter(|s| s.owner == PlayerId(0)) {
                checks.check(Some(seeker.target) == camp, format!("seeker {} kept its target", seeker.id));
                checks.check(seeker.magnet == MagnetState::Attractive, format!("seeker {} kept its magnet", seeker.id));
            }
        }
        Ok(run)
    }
    
    /// SIM-004: careful mode drops a player that misses the timeout.
    async fn run_careful_drop(&self, checks: &mut Checks) -> Result<SimRun, SimError> {
        let game = GameConfig {
            tick_budget: Some(10),
            command_timeout_ms: 50,
            careful_mode: true,
            ..self.config.clone()
        };
        let mut sim = SimWorld::new(self.sim(game))?;
        sim.add_local("sleepy", None, bots::sleepy(std::time::Duration::from_millis(200)))?;
        sim.add_local("carrier", None, bots::carrier())?;
        
        let run = sim.run().await?;
        let stats = run.report.stats.players.get(&PlayerId(0)).cloned().unwrap_or_default();
        checks.check(run.report.final_tick == 10, "match continued after the drop");
        checks.check(stats.timeouts == 1, "dropped after exactly one timeout");
        
        if let Some(last) = run.frames.last() {
            let player = last.player(PlayerId(0));
            checks.check(player.map(|p| p.active) == Some(false), "player marked inactive");
            checks.check(
                last.seekers_of(PlayerId(0)).all(|s| s.is_disabled && s.magnet == MagnetState::Off),
                "dropped player's seekers idle",
            );
            checks.check(player.map(|p| p.score) == Some(0), "dropped camp never scores");
        }
        Ok(run)
    }
    
    /// SIM-005: every kind of bad decision maker at once.
    async fn run_misbehaving(&self, checks: &mut Checks) -> Result<SimRun, SimError> {
        let game = GameConfig {
            players: 4,
            tick_budget: Some(20),
            ..self.config.clone()
        };
        let per_player = game.seekers_per_player as u64;
        let mut sim = SimWorld::new(self.sim(game))?;
        sim.add_local("panicking", None, bots::panicking())?;
        sim.add_local("broken", None, bots::broken())?;
        sim.add_local("hijacker", None, bots::hijacker())?;
        sim.add_local("garbage", None, bots::garbage())?;
        
        let run = sim.run().await?;
        let stats = |p| run.report.stats.players.get(&PlayerId(p)).cloned().unwrap_or_default();
        checks.check(run.report.final_tick == 20, "loop survived every tick");
        checks.check(stats(0).invalid_outputs == 20, "panics contained every tick");
        checks.check(stats(1).invalid_outputs == 20, "errors contained every tick");
        checks.check(stats(2).commands_applied == 0, "foreign seekers never commanded");
        checks.check(stats(2).commands_rejected == 20 * 3 * per_player, "every hijack rejected");
        checks.check(stats(3).commands_rejected == 20 * per_player, "every NaN target rejected");
        checks.check(stats(3).commands_applied == 20 * per_player, "magnet part of NaN commands applied");
        
        if let Some(world) = &run.world {
            let torus = world.torus();
            checks.check(
                world
                    .seekers()
                    .all(|s| s.position.x >= 0.0 && s.position.x < torus.width && s.position.y >= 0.0 && s.position.y < torus.height),
                "positions stay finite and in bounds",
            );
            checks.check(
                world.seekers().filter(|s| s.owner == PlayerId(3)).all(|s| s.magnet == MagnetState::Repulsive),
                "magnet of NaN commands applied",
            );
        }
        Ok(run)
    }
    
    /// SIM-006: two remote clients over links with latency and jitter.
    async fn run_remote_match(&self, checks: &mut Checks) -> Result<SimRun, SimError> {
        let game = GameConfig {
            tick_budget: Some(30),
            ..self.config.clone()
        };
        let mut sim = SimWorld::new(SimConfig {
            link_jitter_ms: 2.0,
            ..self.sim(game)
        })?;
        sim.links.set_latency(PlayerId(0), 5);
        sim.links.set_latency(PlayerId(1), 3);
        sim.add_remote("alpha", None, bots::carrier()).await?;
        sim.add_remote("beta", None, bots::chaser()).await?;
        
        let run = sim.run().await?;
        checks.check(run.report.final_tick == 30, "match ran to its budget");
        checks.check(run.client_outcomes.len() == 2, "both clients finished");
        checks.check(
            run.client_outcomes.iter().all(|o| o.as_ref() == Some(&run.report.outcome)),
            "both clients received the final outcome",
        );
        for p in 0..2 {
            let applied = run.report.stats.players.get(&PlayerId(p)).map(|s| s.commands_applied).unwrap_or(0);
            checks.check(applied > 0, format!("player {} commands reached the world", p));
        }
        Ok(run)
    }
    
    async fn play_full_match(&self) -> Result<SimRun, SimError> {
        let mut sim = SimWorld::new(self.sim(self.config.clone()))?;
        sim.add_local("carrier", None, bots::carrier())?;
        for i in 1..self.config.players {
            sim.add_local(&format!("chaser {}", i), None, bots::chaser())?;
        }
        sim.run().await
    }
    
    /// SIM-007: same seed, same bots, byte-identical snapshots.
    async fn run_determinism(&self, checks: &mut Checks) -> Result<SimRun, SimError> {
        let first = self.play_full_match().await?;
        let second = self.play_full_match().await?;
        
        let json = |run: &SimRun| {
            run.frames
                .iter()
                .map(|f| serde_json::to_string(f.as_ref()).unwrap_or_default())
                .collect::<Vec<_>>()
        };
        let (a, b) = (json(&first), json(&second));
        checks.check(!a.is_empty(), "frames recorded");
        checks.check(a.len() == b.len(), "same number of ticks");
        if let Some(tick) = a.iter().zip(&b).position(|(x, y)| x != y) {
            checks.check(false, format!("runs diverge at tick {}", tick + 1));
        }
        checks.check(first.report.outcome == second.report.outcome, "same outcome");
        Ok(second)
    }
    
    /// SIM-008: a whole match, checking the world invariants every tick.
    async fn run_full_match(&self, checks: &mut Checks) -> Result<SimRun, SimError> {
        let run = self.play_full_match().await?;
        let total = self.config.total_seekers();
        
        let mut expected_tick = 1;
        for frame in &run.frames {
            let (w, h) = (frame.arena.width, frame.arena.height);
            checks.check(frame.tick == expected_tick, format!("tick {} follows {}", frame.tick, expected_tick - 1));
            checks.check(frame.seekers.len() == total, format!("seeker count at tick {}", frame.tick));
            checks.check(frame.goals.len() == self.config.goals, format!("goal count at tick {}", frame.tick));
            checks.check(
                frame
                    .seekers
                    .iter()
                    .map(|s| s.position)
                    .chain(frame.goals.iter().map(|g| g.position))
                    .all(|p| (0.0..w).contains(&p.x) && (0.0..h).contains(&p.y)),
                format!("positions in bounds at tick {}", frame.tick),
            );
            expected_tick = frame.tick + 1;
            if checks.failures.len() > 10 {
                break;
            }
        }
        
        let finished = match (self.config.tick_budget, self.config.score_threshold) {
            (Some(budget), _) if run.report.final_tick == budget => true,
            (_, Some(threshold)) => run.report.outcome.scoreboard.first().map(|l| l.score >= threshold).unwrap_or(false),
            _ => false,
        };
        checks.check(finished, "match ended by its win condition");
        info!(
            "Full match: {} ticks, scores {:?}",
            run.report.final_tick,
            run.report.outcome.scoreboard.iter().map(|l| (l.name.as_str(), l.score)).collect::<Vec<_>>()
        );
        Ok(run)
    }
    
    /// SIM-009: colour requests that clash are adjusted the same way every time.
    async fn run_color_clash(&self, checks: &mut Checks) -> Result<SimRun, SimError> {
        let red = Color::new(230, 20, 20);
        let game = GameConfig {
            tick_budget: Some(1),
            ..self.config.clone()
        };
        let threshold = game.color_threshold;
        
        let mut colors = Vec::new();
        let mut last = None;
        for _ in 0..2 {
            let mut sim = SimWorld::new(self.sim(game.clone()))?;
            let first = sim.add_local("first", Some(red), bots::idle())?;
            let second = sim.add_local("second", Some(red), bots::idle())?;
            checks.check(first.color == red, "first player keeps its colour");
            checks.check(second.color.distance(&red) >= threshold, "second colour moved far enough");
            colors.push(second.color);
            last = Some(sim.run().await?);
        }
        checks.check(colors[0] == colors[1], "adjustment is deterministic");
        
        last.ok_or_else(|| SimError::Client("no run".to_string()))
    }
}
