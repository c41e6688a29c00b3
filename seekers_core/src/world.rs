//! The canonical world state of a match.
//!
//! `World` is the single source of truth. It is owned by the game loop,
//! mutated only through `apply_commands`, `step_physics` and
//! `resolve_scoring`, and exposed to decision makers exclusively through
//! immutable `StatusResponse` snapshots.
//!
//! Entities never hold references to each other: seekers name their owner
//! by `PlayerId`, goals name the camp they sit in by `CampId`, and all
//! lookups go through the ordered maps below. `BTreeMap` iteration order
//! is what makes every pass over the world deterministic.

use crate::colors::Color;
use crate::config::{ConfigError, GameConfig};
use crate::geometry::{Rect, Torus, Vec2};
use crate::physics::{self, CollisionEvent};
use crate::scoring::{self, ScoreEvent};

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use seekers_env::PlayerId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Identifier shared by all moving entities (seekers and goals).
///
/// A single id space gives collision pairs a total order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u32);

pub type SeekerId = EntityId;
pub type GoalId = EntityId;

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct CampId(pub u32);

/// Magnet setting of a seeker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MagnetState {
    #[default]
    Off,
    Attractive,
    Repulsive,
}

impl MagnetState {
    pub fn is_on(&self) -> bool {
        !matches!(self, MagnetState::Off)
    }
}

/// A validated command for one seeker.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Command {
    pub target: Vec2,
    pub magnet: MagnetState,
}

/// A player-controlled circular agent.
#[derive(Debug, Clone, PartialEq)]
pub struct Seeker {
    pub id: SeekerId,
    pub owner: PlayerId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f64,
    pub mass: f64,
    /// Last commanded destination
    pub target: Vec2,
    pub magnet: MagnetState,
    /// Remaining disabled ticks
    pub disabled_counter: u32,
    /// Permanently idle (owner dropped from the match)
    pub idle: bool,
}

impl Seeker {
    pub fn is_disabled(&self) -> bool {
        self.idle || self.disabled_counter > 0
    }

    /// Magnet is on and the seeker can actually use it.
    pub fn magnet_effective(&self) -> bool {
        self.magnet.is_on() && !self.is_disabled()
    }
}

/// Lifecycle of a goal with respect to the camps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GoalState {
    #[default]
    Free,
    Contained { camp: CampId, since_tick: u64 },
}

/// A collectible object that scores when held in a camp long enough.
#[derive(Debug, Clone, PartialEq)]
pub struct Goal {
    pub id: GoalId,
    pub position: Vec2,
    pub velocity: Vec2,
    pub radius: f64,
    pub mass: f64,
    pub state: GoalState,
    /// Ticks of continuous containment needed to score
    pub time_to_score: u64,
}

impl Goal {
    /// Camp currently holding the goal, if any.
    pub fn captured_by(&self) -> Option<CampId> {
        match self.state {
            GoalState::Free => None,
            GoalState::Contained { camp, .. } => Some(camp),
        }
    }

    /// Ticks the goal has spent in its current camp as of `now`.
    pub fn time_in_camp(&self, now: u64) -> u64 {
        match self.state {
            GoalState::Free => 0,
            GoalState::Contained { since_tick, .. } => now.saturating_sub(since_tick),
        }
    }
}

/// A static, player-owned scoring region.
#[derive(Debug, Clone, PartialEq)]
pub struct Camp {
    pub id: CampId,
    pub owner: PlayerId,
    pub region: Rect,
}

impl Camp {
    pub fn position(&self) -> Vec2 {
        self.region.center
    }

    pub fn contains(&self, pos: &Vec2) -> bool {
        self.region.contains(pos)
    }
}

/// A participant in the match.
#[derive(Debug, Clone, PartialEq)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    pub score: u32,
    pub color: Color,
    pub camp: CampId,
    /// Owned seekers, in id order
    pub seekers: Vec<SeekerId>,
    /// False once the player has been dropped
    pub active: bool,
}

/// What the world needs to know about a seat to create its player.
#[derive(Debug, Clone)]
pub struct PlayerSpec {
    pub id: PlayerId,
    pub name: String,
    pub color: Color,
}

/// Events produced by one tick of simulation.
#[derive(Debug, Clone, Default)]
pub struct TickEvents {
    pub collisions: Vec<CollisionEvent>,
    pub scores: Vec<ScoreEvent>,
}

/// Aggregate of all entities and players in a match.
#[derive(Debug, Clone)]
pub struct World {
    pub(crate) torus: Torus,
    pub(crate) config: GameConfig,
    pub(crate) seekers: BTreeMap<SeekerId, Seeker>,
    pub(crate) goals: BTreeMap<GoalId, Goal>,
    pub(crate) camps: BTreeMap<CampId, Camp>,
    pub(crate) players: BTreeMap<PlayerId, Player>,
    pub(crate) tick: u64,
    pub(crate) seed: u64,
    pub(crate) rng: ChaCha8Rng,
    next_entity_id: u32,
}

/// Id layout of a freshly created world.
///
/// Goals take ids `0..goals`, then each player (in seat order) takes a
/// contiguous block of `seekers_per_player` ids. The lobby uses this to
/// tell a joining player which seekers it will own before the world exists.
pub fn planned_seeker_ids(config: &GameConfig, seat_index: usize) -> Vec<SeekerId> {
    let start = config.goals + seat_index * config.seekers_per_player;
    (start..start + config.seekers_per_player)
        .map(|i| EntityId(i as u32))
        .collect()
}

pub fn planned_camp_id(seat_index: usize) -> CampId {
    CampId(seat_index as u32)
}

impl World {
    /// Creates the world for a match.
    ///
    /// `players` must be in seat order; camps are laid out top to bottom
    /// along the vertical center line in that order.
    pub fn new(config: &GameConfig, players: &[PlayerSpec], seed: u64) -> Result<Self, ConfigError> {
        let mut layout = config.clone();
        layout.players = players.len().max(1);
        layout.validate()?;

        let torus = Torus::new(config.map_width, config.map_height);
        let mut world = Self {
            torus,
            config: config.clone(),
            seekers: BTreeMap::new(),
            goals: BTreeMap::new(),
            camps: BTreeMap::new(),
            players: BTreeMap::new(),
            tick: 0,
            seed,
            rng: ChaCha8Rng::seed_from_u64(seed),
            next_entity_id: 0,
        };

        for _ in 0..config.goals {
            let position = torus.random_position(&mut world.rng);
            world.insert_goal(position);
        }

        let delta = config.map_height / players.len().max(1) as f64;
        for (index, spec) in players.iter().enumerate() {
            let camp_id = planned_camp_id(index);
            world.camps.insert(
                camp_id,
                Camp {
                    id: camp_id,
                    owner: spec.id,
                    region: Rect::new(
                        Vec2::new(config.map_width / 2.0, delta * (index as f64 + 0.5)),
                        config.camp_width,
                        config.camp_height,
                    ),
                },
            );

            let mut owned = Vec::with_capacity(config.seekers_per_player);
            for _ in 0..config.seekers_per_player {
                let position = torus.random_position(&mut world.rng);
                owned.push(world.insert_seeker(spec.id, position));
            }

            world.players.insert(
                spec.id,
                Player {
                    id: spec.id,
                    name: spec.name.clone(),
                    score: 0,
                    color: spec.color,
                    camp: camp_id,
                    seekers: owned,
                    active: true,
                },
            );
        }

        debug!(
            "World created: {} players, {} seekers, {} goals (seed={})",
            world.players.len(),
            world.seekers.len(),
            world.goals.len(),
            seed
        );

        Ok(world)
    }

    fn allocate_id(&mut self) -> EntityId {
        let id = EntityId(self.next_entity_id);
        self.next_entity_id += 1;
        id
    }

    fn insert_seeker(&mut self, owner: PlayerId, position: Vec2) -> SeekerId {
        let id = self.allocate_id();
        let seeker = Seeker {
            id,
            owner,
            position,
            velocity: Vec2::zeros(),
            radius: self.config.seeker.radius,
            mass: self.config.seeker.mass,
            target: position,
            magnet: MagnetState::Off,
            disabled_counter: 0,
            idle: false,
        };
        self.seekers.insert(id, seeker);
        id
    }

    pub(crate) fn insert_goal(&mut self, position: Vec2) -> GoalId {
        let id = self.allocate_id();
        let goal = Goal {
            id,
            position,
            velocity: Vec2::zeros(),
            radius: self.config.goal.radius,
            mass: self.config.goal.mass,
            state: GoalState::Free,
            time_to_score: self.config.goal.scoring_time,
        };
        self.goals.insert(id, goal);
        id
    }

    /// Pseudorandom position not overlapping any seeker, goal or camp.
    ///
    /// Draws from the world RNG, so the result depends only on the seed and
    /// on how many draws happened before. Falls back to the last draw when
    /// the arena is too crowded.
    pub(crate) fn free_position(&mut self, radius: f64) -> Vec2 {
        const MAX_ATTEMPTS: usize = 32;
        let mut candidate = self.torus.random_position(&mut self.rng);
        for _ in 0..MAX_ATTEMPTS {
            if self.is_free(&candidate, radius) {
                return candidate;
            }
            candidate = self.torus.random_position(&mut self.rng);
        }
        candidate
    }

    fn is_free(&self, pos: &Vec2, radius: f64) -> bool {
        let torus = self.torus;
        let clear_of_seekers = self
            .seekers
            .values()
            .all(|s| torus.distance(pos, &s.position) > s.radius + radius);
        let clear_of_goals = self
            .goals
            .values()
            .all(|g| torus.distance(pos, &g.position) > g.radius + radius);
        let clear_of_camps = self.camps.values().all(|c| !c.contains(pos));
        clear_of_seekers && clear_of_goals && clear_of_camps
    }

    // ---------------------------------------------------------------------
    // Mutation entry points (game loop only)
    // ---------------------------------------------------------------------

    /// Starts the next tick. The counter never skips or repeats.
    pub fn begin_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Applies validated commands of one player, in seeker id order.
    ///
    /// Returns how many commands were applied. Seekers of dropped players
    /// ignore commands.
    pub fn apply_commands(&mut self, player: PlayerId, commands: &BTreeMap<SeekerId, Command>) -> usize {
        let mut applied = 0;
        for (id, command) in commands {
            if let Some(seeker) = self.seekers.get_mut(id) {
                if seeker.owner != player || seeker.idle {
                    continue;
                }
                seeker.target = command.target;
                seeker.magnet = command.magnet;
                applied += 1;
            }
        }
        applied
    }

    /// Advances all positions by one fixed timestep and resolves collisions.
    pub fn step_physics(&mut self) -> Vec<CollisionEvent> {
        physics::step(self)
    }

    /// Runs goal containment and captures for the current tick.
    pub fn resolve_scoring(&mut self) -> Vec<ScoreEvent> {
        scoring::resolve(self)
    }

    /// Removes a player from play: its seekers become permanently idle and
    /// its camp stops scoring.
    pub fn drop_player(&mut self, player: PlayerId) {
        if let Some(p) = self.players.get_mut(&player) {
            p.active = false;
        }
        for seeker in self.seekers.values_mut().filter(|s| s.owner == player) {
            seeker.idle = true;
            seeker.magnet = MagnetState::Off;
            seeker.target = seeker.position;
        }
    }

    /// Setup-time access for arranging scenarios before the first tick.
    pub fn seeker_mut(&mut self, id: SeekerId) -> Option<&mut Seeker> {
        self.seekers.get_mut(&id)
    }

    /// Setup-time access for arranging scenarios before the first tick.
    pub fn goal_mut(&mut self, id: GoalId) -> Option<&mut Goal> {
        self.goals.get_mut(&id)
    }

    // ---------------------------------------------------------------------
    // Read access
    // ---------------------------------------------------------------------

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Total simulated time.
    pub fn elapsed(&self) -> f64 {
        self.tick as f64 * self.config.timestep
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn torus(&self) -> &Torus {
        &self.torus
    }

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn seekers(&self) -> impl Iterator<Item = &Seeker> {
        self.seekers.values()
    }

    pub fn goals(&self) -> impl Iterator<Item = &Goal> {
        self.goals.values()
    }

    pub fn camps(&self) -> impl Iterator<Item = &Camp> {
        self.camps.values()
    }

    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    pub fn seeker(&self, id: SeekerId) -> Option<&Seeker> {
        self.seekers.get(&id)
    }

    pub fn goal(&self, id: GoalId) -> Option<&Goal> {
        self.goals.get(&id)
    }

    pub fn camp(&self, id: CampId) -> Option<&Camp> {
        self.camps.get(&id)
    }

    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    pub fn seeker_count(&self) -> usize {
        self.seekers.len()
    }

    pub fn goal_count(&self) -> usize {
        self.goals.len()
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn specs(n: u32) -> Vec<PlayerSpec> {
        (0..n)
            .map(|i| PlayerSpec {
                id: PlayerId(i),
                name: format!("p{}", i),
                color: Color::new(200, 10 * i as u8, 0),
            })
            .collect()
    }

    #[test]
    fn test_world_creation_layout() {
        let config = GameConfig::default();
        let world = World::new(&config, &specs(2), 7).unwrap();

        assert_eq!(world.seeker_count(), config.total_seekers());
        assert_eq!(world.goal_count(), config.goals);
        assert_eq!(world.camps().count(), 2);

        for (index, player) in world.players().enumerate() {
            assert_eq!(player.seekers, planned_seeker_ids(&config, index));
            assert_eq!(player.camp, planned_camp_id(index));
            for id in &player.seekers {
                assert_eq!(world.seeker(*id).unwrap().owner, player.id);
            }
        }

        let camp0 = world.camp(CampId(0)).unwrap();
        assert_eq!(camp0.position(), Vec2::new(384.0, 192.0));
    }

    #[test]
    fn test_world_creation_is_seeded() {
        let config = GameConfig::default();
        let a = World::new(&config, &specs(2), 99).unwrap();
        let b = World::new(&config, &specs(2), 99).unwrap();
        let c = World::new(&config, &specs(2), 100).unwrap();

        let positions = |w: &World| w.seekers().map(|s| s.position).collect::<Vec<_>>();
        assert_eq!(positions(&a), positions(&b));
        assert_ne!(positions(&a), positions(&c));
    }

    #[test]
    fn test_apply_commands_only_touches_owned_seekers() {
        let config = GameConfig::default();
        let mut world = World::new(&config, &specs(2), 1).unwrap();
        let mine = world.player(PlayerId(0)).unwrap().seekers[0];
        let theirs = world.player(PlayerId(1)).unwrap().seekers[0];

        let command = Command {
            target: Vec2::new(1.0, 2.0),
            magnet: MagnetState::Attractive,
        };
        let mut commands = BTreeMap::new();
        commands.insert(mine, command);
        commands.insert(theirs, command);

        assert_eq!(world.apply_commands(PlayerId(0), &commands), 1);
        assert_eq!(world.seeker(mine).unwrap().target, Vec2::new(1.0, 2.0));
        assert_ne!(world.seeker(theirs).unwrap().magnet, MagnetState::Attractive);
    }

    #[test]
    fn test_drop_player_idles_seekers() {
        let config = GameConfig::default();
        let mut world = World::new(&config, &specs(2), 1).unwrap();
        world.drop_player(PlayerId(1));

        assert!(!world.player(PlayerId(1)).unwrap().active);
        for seeker in world.seekers().filter(|s| s.owner == PlayerId(1)) {
            assert!(seeker.is_disabled());
            assert!(!seeker.magnet_effective());
        }
        // Seekers are idled, never removed
        assert_eq!(world.seeker_count(), config.total_seekers());
    }

    #[test]
    fn test_tick_counter_is_monotonic() {
        let mut world = World::new(&GameConfig::default(), &specs(1), 1).unwrap();
        assert_eq!(world.tick(), 0);
        assert_eq!(world.begin_tick(), 1);
        assert_eq!(world.begin_tick(), 2);
        assert_eq!(world.elapsed(), 2.0);
    }

    #[test]
    fn test_free_position_avoids_camps() {
        let config = GameConfig::default();
        let mut world = World::new(&config, &specs(2), 3).unwrap();
        for _ in 0..20 {
            let p = world.free_position(config.goal.radius);
            assert!(world.camps().all(|c| !c.contains(&p)));
        }
    }
}
