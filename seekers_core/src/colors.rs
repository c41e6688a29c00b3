//! Player colours.
//!
//! Every player gets an RGB colour. A name always hashes to the same hue,
//! and a colour too close to one already taken is nudged around the hue
//! circle until it is distinguishable.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Color {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Deterministic colour derived from a player name (FNV-1a hash -> hue).
    pub fn from_name(name: &str) -> Self {
        let mut hash: u64 = 0xcbf29ce484222325;
        for byte in name.as_bytes() {
            hash ^= *byte as u64;
            hash = hash.wrapping_mul(0x100000001b3);
        }
        let hue = (hash % 360) as f64 / 360.0;
        Self::from_hsv(hue, 0.8, 0.95)
    }

    /// `h`, `s`, `v` in `[0, 1]`; hue wraps.
    pub fn from_hsv(h: f64, s: f64, v: f64) -> Self {
        let h = h.rem_euclid(1.0) * 6.0;
        let sector = h.floor();
        let f = h - sector;
        let p = v * (1.0 - s);
        let q = v * (1.0 - s * f);
        let t = v * (1.0 - s * (1.0 - f));
        let (r, g, b) = match sector as u8 {
            0 => (v, t, p),
            1 => (q, v, p),
            2 => (p, v, t),
            3 => (p, q, v),
            4 => (t, p, v),
            _ => (v, p, q),
        };
        let to_u8 = |x: f64| (x.clamp(0.0, 1.0) * 255.0).round() as u8;
        Self::new(to_u8(r), to_u8(g), to_u8(b))
    }

    /// `(h, s, v)` with every component in `[0, 1]`.
    pub fn to_hsv(&self) -> (f64, f64, f64) {
        let r = self.r as f64 / 255.0;
        let g = self.g as f64 / 255.0;
        let b = self.b as f64 / 255.0;
        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        let delta = max - min;

        let h = if delta == 0.0 {
            0.0
        } else if max == r {
            ((g - b) / delta).rem_euclid(6.0)
        } else if max == g {
            (b - r) / delta + 2.0
        } else {
            (r - g) / delta + 4.0
        };
        let s = if max == 0.0 { 0.0 } else { delta / max };
        (h / 6.0, s, max)
    }

    /// Euclidean distance in RGB space.
    pub fn distance(&self, other: &Color) -> f64 {
        let dr = self.r as f64 - other.r as f64;
        let dg = self.g as f64 - other.g as f64;
        let db = self.b as f64 - other.b as f64;
        (dr * dr + dg * dg + db * db).sqrt()
    }

    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Parses `#rrggbb` (leading `#` optional).
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        if digits.len() != 6 || !digits.is_ascii() {
            return None;
        }
        let channel = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
        Some(Self::new(channel(0)?, channel(2)?, channel(4)?))
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

fn min_distance(color: &Color, taken: &[Color]) -> f64 {
    taken
        .iter()
        .map(|other| color.distance(other))
        .fold(f64::INFINITY, f64::min)
}

/// Picks a colour distinguishable from every colour in `taken`.
///
/// Keeps `preferred` when it is at least `threshold` away from all of them.
/// Otherwise walks the hue circle in 5 degree steps alternating both
/// directions and takes the first candidate that clears the threshold,
/// or the best one seen when none does.
pub fn pick_color(taken: &[Color], preferred: Color, threshold: f64) -> Color {
    if min_distance(&preferred, taken) >= threshold {
        return preferred;
    }

    let (hue, saturation, value) = preferred.to_hsv();
    // Greys have no hue to rotate
    let saturation = saturation.max(0.6);
    let value = value.max(0.6);

    let mut best = preferred;
    let mut best_distance = min_distance(&preferred, taken);
    for step in 1..=36 {
        for sign in [1.0, -1.0] {
            let candidate = Color::from_hsv(hue + sign * step as f64 / 72.0, saturation, value);
            let d = min_distance(&candidate, taken);
            if d >= threshold {
                return candidate;
            }
            if d > best_distance {
                best = candidate;
                best_distance = d;
            }
        }
    }
    best
}
