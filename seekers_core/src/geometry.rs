//! Spatial math on the toroidal arena.
//!
//! Positions and velocities are plain `nalgebra::Vector2<f64>` values. The
//! arena wraps on both axes, so every distance or direction between two
//! points must go through [`Torus`] instead of raw subtraction.

use nalgebra::Vector2;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// 2D vector used for positions, velocities and forces.
pub type Vec2 = Vector2<f64>;

/// Returns the unit vector of `v`, or zero for a zero-length (or non-finite) input.
pub fn normalized_or_zero(v: &Vec2) -> Vec2 {
    let norm = v.norm();
    if norm > 0.0 && norm.is_finite() {
        v / norm
    } else {
        Vec2::zeros()
    }
}

/// Scales `v` down so its length does not exceed `max_len`.
pub fn clamp_length(v: &Vec2, max_len: f64) -> Vec2 {
    let norm = v.norm();
    if norm > max_len && norm > 0.0 {
        v * (max_len / norm)
    } else {
        *v
    }
}

/// Returns true when both components are finite.
pub fn is_finite(v: &Vec2) -> bool {
    v.x.is_finite() && v.y.is_finite()
}

/// Axis-aligned rectangle, used for camp regions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Center point
    pub center: Vec2,
    /// Full width
    pub width: f64,
    /// Full height
    pub height: f64,
}

impl Rect {
    pub fn new(center: Vec2, width: f64, height: f64) -> Self {
        Self { center, width, height }
    }

    /// Strict containment test (points on the border are outside).
    pub fn contains(&self, pos: &Vec2) -> bool {
        let delta = self.center - pos;
        2.0 * delta.x.abs() < self.width && 2.0 * delta.y.abs() < self.height
    }

    pub fn top_left(&self) -> Vec2 {
        self.center - Vec2::new(self.width, self.height) / 2.0
    }

    pub fn bottom_right(&self) -> Vec2 {
        self.center + Vec2::new(self.width, self.height) / 2.0
    }
}

/// The toroidal arena `[0, W) x [0, H)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Torus {
    pub width: f64,
    pub height: f64,
}

impl Torus {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Wraps a position into `[0, W) x [0, H)`.
    ///
    /// Holds for arbitrarily large displacements. Non-finite input maps to
    /// the origin so it can never leak out of bounds.
    pub fn wrap(&self, pos: &Vec2) -> Vec2 {
        Vec2::new(wrap_axis(pos.x, self.width), wrap_axis(pos.y, self.height))
    }

    /// Shortest displacement vector from `from` to `to` across the wrap.
    pub fn difference(&self, from: &Vec2, to: &Vec2) -> Vec2 {
        Vec2::new(
            diff_axis(self.width, from.x, to.x),
            diff_axis(self.height, from.y, to.y),
        )
    }

    pub fn distance(&self, a: &Vec2, b: &Vec2) -> f64 {
        self.difference(a, b).norm()
    }

    /// Unit vector pointing from `from` towards `to` along the shortest path.
    pub fn direction(&self, from: &Vec2, to: &Vec2) -> Vec2 {
        normalized_or_zero(&self.difference(from, to))
    }

    /// Length of the arena diagonal.
    pub fn diameter(&self) -> f64 {
        Vec2::new(self.width, self.height).norm()
    }

    pub fn middle(&self) -> Vec2 {
        Vec2::new(self.width / 2.0, self.height / 2.0)
    }

    /// Index of the position in `candidates` closest to `pos`, first one on ties.
    pub fn index_of_nearest(&self, pos: &Vec2, candidates: &[Vec2]) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, candidate) in candidates.iter().enumerate() {
            let d = self.distance(pos, candidate);
            match best {
                Some((_, best_d)) if d >= best_d => {}
                _ => best = Some((i, d)),
            }
        }
        best.map(|(i, _)| i)
    }

    /// Uniformly random position inside the arena.
    pub fn random_position<R: Rng>(&self, rng: &mut R) -> Vec2 {
        Vec2::new(rng.gen_range(0.0..self.width), rng.gen_range(0.0..self.height))
    }
}

fn wrap_axis(value: f64, length: f64) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let wrapped = value.rem_euclid(length);
    // rem_euclid can round up to `length` for tiny negative inputs
    if wrapped >= length {
        0.0
    } else {
        wrapped
    }
}

fn diff_axis(length: f64, a: f64, b: f64) -> f64 {
    let raw = b - a;
    let delta = raw.abs();
    if delta <= length - delta {
        raw
    } else if raw > 0.0 {
        raw - length
    } else {
        raw + length
    }
}
