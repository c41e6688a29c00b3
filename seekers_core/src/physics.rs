//! Physics & collision resolver.
//!
//! One call to [`step`] advances the world by one fixed timestep:
//!
//! 1. magnet accelerations from every effective magnet (inverse square, capped)
//! 2. seekers: friction, thrust towards target, speed cap, semi-implicit Euler
//! 3. goals: friction, magnet acceleration, speed cap, semi-implicit Euler
//! 4. pairwise collision detection, resolved in ascending `(id, id)` order
//!
//! Positions are wrapped onto the torus after every move, so no entity can
//! leave `[0, W) x [0, H)`. Iteration always follows `BTreeMap` order and
//! the pair list is sorted before resolution, so the outcome never depends
//! on insertion order or thread scheduling.

use crate::geometry::{clamp_length, normalized_or_zero, Torus, Vec2};
use crate::world::{EntityId, MagnetState, SeekerId, World};

use std::collections::BTreeMap;
use tracing::debug;

/// Kinds of contact between two bodies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollisionKind {
    SeekerSeeker,
    SeekerGoal,
    GoalGoal,
}

/// A resolved contact.
#[derive(Debug, Clone, PartialEq)]
pub struct CollisionEvent {
    /// Lower id of the pair
    pub a: EntityId,
    /// Higher id of the pair
    pub b: EntityId,
    pub kind: CollisionKind,
    /// Seekers disabled by this collision
    pub disabled: Vec<SeekerId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Body {
    Seeker,
    Goal,
}

/// Mutable physical state of one body during collision resolution.
#[derive(Debug, Clone, Copy)]
struct Kinematics {
    position: Vec2,
    velocity: Vec2,
    radius: f64,
    mass: f64,
}

/// Force a single magnet exerts on a body at `target`.
///
/// Returns zero when the source is disabled or its magnet is off, so a
/// disabled seeker never pulls anything regardless of its stored flag.
pub fn magnet_force(
    world: &World,
    source: SeekerId,
    target: &Vec2,
) -> Vec2 {
    let Some(seeker) = world.seekers.get(&source) else {
        return Vec2::zeros();
    };
    if !seeker.magnet_effective() {
        return Vec2::zeros();
    }

    let magnet = &world.config.magnet;
    // Points from the body towards the magnet
    let towards = world.torus.difference(target, &seeker.position);
    let distance = towards.norm();
    if distance <= 0.0 || distance > magnet.range {
        return Vec2::zeros();
    }

    let magnitude = (magnet.strength / (distance * distance)).min(magnet.max_force);
    let polarity = match seeker.magnet {
        MagnetState::Attractive => 1.0,
        MagnetState::Repulsive => -magnet.repulsive_factor,
        MagnetState::Off => 0.0,
    };
    normalized_or_zero(&towards) * (magnitude * polarity)
}

/// Net magnet acceleration on every seeker and goal, keyed by entity id.
fn magnet_accelerations(world: &World) -> BTreeMap<EntityId, Vec2> {
    let sources: Vec<SeekerId> = world
        .seekers
        .values()
        .filter(|s| s.magnet_effective())
        .map(|s| s.id)
        .collect();

    let mut accelerations = BTreeMap::new();
    if sources.is_empty() {
        return accelerations;
    }

    for seeker in world.seekers.values() {
        let mut force = Vec2::zeros();
        for source in sources.iter().filter(|id| **id != seeker.id) {
            force += magnet_force(world, *source, &seeker.position);
        }
        accelerations.insert(seeker.id, force / seeker.mass);
    }
    for goal in world.goals.values() {
        let mut force = Vec2::zeros();
        for source in &sources {
            force += magnet_force(world, *source, &goal.position);
        }
        accelerations.insert(goal.id, force / goal.mass);
    }

    accelerations
}

/// Advances the world by one timestep.
pub fn step(world: &mut World) -> Vec<CollisionEvent> {
    let dt = world.config.timestep;
    let torus = world.torus;
    let magnets = magnet_accelerations(world);

    let seeker_cfg = world.config.seeker.clone();
    let seeker_damping = (1.0 - seeker_cfg.friction).powf(dt);
    for seeker in world.seekers.values_mut() {
        let thrust = if seeker.is_disabled() {
            Vec2::zeros()
        } else {
            let slowdown = if seeker.magnet.is_on() { seeker_cfg.magnet_slowdown } else { 1.0 };
            torus.direction(&seeker.position, &seeker.target) * (seeker_cfg.thrust * slowdown)
        };
        let magnet = magnets.get(&seeker.id).copied().unwrap_or_else(Vec2::zeros);

        let velocity = seeker.velocity * seeker_damping + (thrust + magnet) * dt;
        seeker.velocity = clamp_length(&velocity, seeker_cfg.max_speed);
        seeker.position = torus.wrap(&(seeker.position + seeker.velocity * dt));

        if seeker.disabled_counter > 0 {
            seeker.disabled_counter -= 1;
        }
    }

    let goal_cfg = world.config.goal.clone();
    let goal_damping = (1.0 - goal_cfg.friction).powf(dt);
    for goal in world.goals.values_mut() {
        let magnet = magnets.get(&goal.id).copied().unwrap_or_else(Vec2::zeros);
        let velocity = goal.velocity * goal_damping + magnet * dt;
        goal.velocity = clamp_length(&velocity, goal_cfg.max_speed);
        goal.position = torus.wrap(&(goal.position + goal.velocity * dt));
    }

    resolve_collisions(world)
}

/// Every pair of bodies touching this tick, sorted by `(lower id, higher id)`.
fn detect_pairs(world: &World) -> Vec<(EntityId, EntityId)> {
    let bodies: Vec<(EntityId, Vec2, f64)> = world
        .seekers
        .values()
        .map(|s| (s.id, s.position, s.radius))
        .chain(world.goals.values().map(|g| (g.id, g.position, g.radius)))
        .collect();

    let mut pairs = Vec::new();
    for (i, (id_a, pos_a, r_a)) in bodies.iter().enumerate() {
        for (id_b, pos_b, r_b) in &bodies[i + 1..] {
            if world.torus.distance(pos_a, pos_b) <= r_a + r_b {
                pairs.push(((*id_a).min(*id_b), (*id_a).max(*id_b)));
            }
        }
    }
    pairs.sort();
    pairs
}

fn body_of(world: &World, id: EntityId) -> Option<(Body, Kinematics)> {
    if let Some(s) = world.seekers.get(&id) {
        return Some((
            Body::Seeker,
            Kinematics { position: s.position, velocity: s.velocity, radius: s.radius, mass: s.mass },
        ));
    }
    world.goals.get(&id).map(|g| {
        (
            Body::Goal,
            Kinematics { position: g.position, velocity: g.velocity, radius: g.radius, mass: g.mass },
        )
    })
}

fn store_body(world: &mut World, id: EntityId, k: &Kinematics) {
    if let Some(s) = world.seekers.get_mut(&id) {
        s.position = k.position;
        s.velocity = k.velocity;
    } else if let Some(g) = world.goals.get_mut(&id) {
        g.position = k.position;
        g.velocity = k.velocity;
    }
}

fn resolve_collisions(world: &mut World) -> Vec<CollisionEvent> {
    let pairs = detect_pairs(world);
    let mut events = Vec::with_capacity(pairs.len());

    for (a, b) in pairs {
        let (Some((body_a, mut kin_a)), Some((body_b, mut kin_b))) = (body_of(world, a), body_of(world, b)) else {
            continue;
        };

        let kind = match (body_a, body_b) {
            (Body::Seeker, Body::Seeker) => CollisionKind::SeekerSeeker,
            (Body::Goal, Body::Goal) => CollisionKind::GoalGoal,
            _ => CollisionKind::SeekerGoal,
        };

        let disabled = if kind == CollisionKind::SeekerSeeker {
            disable_on_magnet_contact(world, a, b)
        } else {
            Vec::new()
        };

        bounce(&world.torus, &mut kin_a, &mut kin_b);
        store_body(world, a, &kin_a);
        store_body(world, b, &kin_b);

        if !disabled.is_empty() {
            debug!("Seekers {:?} disabled by magnet collision {} <-> {}", disabled, a, b);
        }
        events.push(CollisionEvent { a, b, kind, disabled });
    }

    events
}

/// Applies the magnet-collision disable rule to a seeker pair (`a < b`).
///
/// Only magnets that are on *and* belong to a seeker that is not already
/// disabled count. If exactly one side has such a magnet, that side is
/// disabled. If both do, only the lower id is disabled. Without any
/// effective magnet the seekers just bounce.
fn disable_on_magnet_contact(world: &mut World, a: SeekerId, b: SeekerId) -> Vec<SeekerId> {
    let effective = |id: SeekerId| world.seekers.get(&id).map(|s| s.magnet_effective()).unwrap_or(false);
    let victim = match (effective(a), effective(b)) {
        (true, _) => Some(a),
        (false, true) => Some(b),
        (false, false) => None,
    };

    let disabled_time = world.config.seeker.disabled_time;
    match victim.and_then(|id| world.seekers.get_mut(&id)) {
        Some(seeker) if disabled_time > 0 => {
            seeker.disabled_counter = disabled_time;
            vec![seeker.id]
        }
        _ => Vec::new(),
    }
}

/// Elastic collision response plus positional separation.
///
/// Velocities only change when the bodies approach each other along the
/// contact normal. Overlapping bodies are pushed apart so they just touch.
fn bounce(torus: &Torus, a: &mut Kinematics, b: &mut Kinematics) {
    let d = torus.difference(&a.position, &b.position);
    let normal = normalized_or_zero(&d);
    if normal == Vec2::zeros() {
        return;
    }

    let dv = b.velocity - a.velocity;
    let m = 2.0 / (a.mass + b.mass);
    let approach = dv.dot(&normal);
    if approach < 0.0 {
        a.velocity += normal * (m * b.mass * approach);
        b.velocity -= normal * (m * a.mass * approach);
    }

    let separation = d.dot(&normal);
    let min_distance = a.radius + b.radius;
    if separation < min_distance {
        let push = normal * ((separation - min_distance) / 2.0);
        a.position = torus.wrap(&(a.position + push));
        b.position = torus.wrap(&(b.position - push));
    }
}
