//! Built-in decide functions used by scenarios and the CLI.

use seekers_core::geometry::Vec2;
use seekers_core::{decide_fn, DecideFn, MagnetState, SeekerCommand};
use std::time::Duration;

/// Distance at which a carrier switches its magnet on and heads home.
const CARRY_DISTANCE: f64 = 40.0;

/// Seeker `i` hunts goal `i`; once close it turns the magnet on and drags
/// the goal back to its own camp.
pub fn carrier() -> DecideFn {
    decide_fn(|input| {
        if input.goals.is_empty() {
            return Ok(Vec::new());
        }
        let home = input.own_camp.as_ref().map(|c| c.position);
        Ok(input
            .own_seekers
            .iter()
            .enumerate()
            .map(|(i, seeker)| {
                let goal = &input.goals[i % input.goals.len()];
                let close = input.arena.distance(&goal.position, &seeker.position) < CARRY_DISTANCE;
                match (close, home) {
                    (true, Some(camp)) => SeekerCommand {
                        seeker_id: seeker.id,
                        target: camp,
                        magnet: MagnetState::Attractive,
                    },
                    _ => SeekerCommand {
                        seeker_id: seeker.id,
                        target: goal.position,
                        magnet: MagnetState::Off,
                    },
                }
            })
            .collect())
    })
}

/// Every seeker heads for the nearest goal with its magnet off.
pub fn chaser() -> DecideFn {
    decide_fn(|input| {
        let goals: Vec<Vec2> = input.goals.iter().map(|g| g.position).collect();
        Ok(input
            .own_seekers
            .iter()
            .map(|seeker| {
                let target = input
                    .arena
                    .index_of_nearest(&seeker.position, &goals)
                    .map(|i| goals[i])
                    .unwrap_or(seeker.position);
                SeekerCommand {
                    seeker_id: seeker.id,
                    target,
                    magnet: MagnetState::Off,
                }
            })
            .collect())
    })
}

/// Every seeker heads home with its magnet attracting.
pub fn homing() -> DecideFn {
    decide_fn(|input| {
        let Some(camp) = input.own_camp.as_ref() else {
            return Ok(Vec::new());
        };
        Ok(input
            .own_seekers
            .iter()
            .map(|seeker| SeekerCommand {
                seeker_id: seeker.id,
                target: camp.position,
                magnet: MagnetState::Attractive,
            })
            .collect())
    })
}

/// Never commands anything.
pub fn idle() -> DecideFn {
    decide_fn(|_| Ok(Vec::new()))
}

/// Fails on every tick.
pub fn broken() -> DecideFn {
    decide_fn(|input| Err(format!("no strategy for tick {}", input.tick).into()))
}

/// Panics on every tick.
pub fn panicking() -> DecideFn {
    decide_fn(|input| panic!("bot crashed at tick {}", input.tick))
}

/// Sleeps longer than any sane command timeout, then idles.
pub fn sleepy(nap: Duration) -> DecideFn {
    decide_fn(move |_| {
        std::thread::sleep(nap);
        Ok(Vec::new())
    })
}

/// Commands the other players' seekers (every command gets rejected).
pub fn hijacker() -> DecideFn {
    decide_fn(|input| {
        Ok(input
            .other_seekers
            .iter()
            .map(|seeker| SeekerCommand {
                seeker_id: seeker.id,
                target: seeker.position,
                magnet: MagnetState::Attractive,
            })
            .collect())
    })
}

/// Sends a NaN target for every own seeker while asking for a magnet.
pub fn garbage() -> DecideFn {
    decide_fn(|input| {
        Ok(input
            .own_seekers
            .iter()
            .map(|seeker| SeekerCommand {
                seeker_id: seeker.id,
                target: Vec2::new(f64::NAN, f64::INFINITY),
                magnet: MagnetState::Repulsive,
            })
            .collect())
    })
}

/// Looks up a bot by name (CLI).
pub fn by_name(name: &str) -> Option<DecideFn> {
    match name {
        "carrier" => Some(carrier()),
        "chaser" => Some(chaser()),
        "homing" => Some(homing()),
        "idle" => Some(idle()),
        "broken" => Some(broken()),
        "panicking" => Some(panicking()),
        "hijacker" => Some(hijacker()),
        "garbage" => Some(garbage()),
        _ => None,
    }
}
