//! Simulated player links with fault injection.
//!
//! A link is a pair of in-memory channel endpoints, one held by the engine
//! and one by the player. Every frame passes through the shared
//! [`SimLinkController`], which can delay it (latency plus seeded normal
//! jitter) or drop it (partition).

use async_trait::async_trait;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use seekers_env::{EnvError, Frame, LinkController, PlayerId, PlayerLink};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::trace;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One endpoint of a simulated link.
pub struct SimLink {
    /// Player this link belongs to (both endpoints carry it)
    player: PlayerId,
    
    /// Sender towards the other endpoint; `None` once disconnected
    tx: Mutex<Option<mpsc::UnboundedSender<Frame>>>,
    
    /// Receiver for incoming frames (behind tokio mutex for async)
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Frame>>,
    
    controller: Arc<SimLinkController>,
}

impl SimLink {
    /// Creates a connected `(engine_side, player_side)` pair.
    pub fn pair(player: PlayerId, controller: Arc<SimLinkController>) -> (Arc<SimLink>, Arc<SimLink>) {
        let (to_player, from_engine) = mpsc::unbounded_channel();
        let (to_engine, from_player) = mpsc::unbounded_channel();
        
        let engine_side = SimLink {
            player,
            tx: Mutex::new(Some(to_player)),
            rx: tokio::sync::Mutex::new(from_player),
            controller: Arc::clone(&controller),
        };
        let player_side = SimLink {
            player,
            tx: Mutex::new(Some(to_engine)),
            rx: tokio::sync::Mutex::new(from_engine),
            controller,
        };
        (Arc::new(engine_side), Arc::new(player_side))
    }
    
    /// Closes this endpoint's sending half. The peer sees `None` once
    /// the frames already in flight are drained.
    pub fn disconnect(&self) {
        lock(&self.tx).take();
    }
    
    pub fn player(&self) -> PlayerId {
        self.player
    }
}

#[async_trait]
impl PlayerLink for SimLink {
    async fn send(&self, frame: Frame) -> Result<(), EnvError> {
        let tx = lock(&self.tx)
            .clone()
            .ok_or_else(|| EnvError::link(format!("{} link closed", self.player)))?;
        
        if !self.controller.can_deliver(self.player) {
            trace!("Dropping frame for partitioned {}", self.player);
            return Ok(());
        }
        
        let delay = self.controller.delay_for(self.player);
        if delay.is_zero() {
            return tx.send(frame).map_err(|_| EnvError::link("peer dropped"));
        }
        
        // Delayed delivery must not block the sender
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = tx.send(frame);
        });
        Ok(())
    }
    
    async fn recv(&self) -> Option<Frame> {
        let mut rx = self.rx.lock().await;
        rx.recv().await
    }
}

/// Link controller for fault injection.
pub struct SimLinkController {
    /// Per-player one-way latency in milliseconds
    latency: Mutex<HashMap<PlayerId, u64>>,
    
    /// Standard deviation of the latency jitter in milliseconds
    jitter_ms: Mutex<f64>,
    
    /// Players currently cut off
    partitioned: Mutex<HashSet<PlayerId>>,
    
    /// Seeded RNG for jitter
    rng: Mutex<ChaCha8Rng>,
}

impl SimLinkController {
    /// Creates a new controller with a seeded jitter stream.
    pub fn new(seed: u64) -> Self {
        Self {
            latency: Mutex::new(HashMap::new()),
            jitter_ms: Mutex::new(0.0),
            partitioned: Mutex::new(HashSet::new()),
            rng: Mutex::new(ChaCha8Rng::seed_from_u64(seed)),
        }
    }
    
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }
    
    /// Sets the jitter applied on top of every link's latency.
    pub fn set_jitter(&self, jitter_ms: f64) {
        *lock(&self.jitter_ms) = jitter_ms.max(0.0);
    }
    
    /// Checks if frames for a player get through.
    pub fn can_deliver(&self, player: PlayerId) -> bool {
        !lock(&self.partitioned).contains(&player)
    }
    
    /// Gets the configured latency for a player (default 0).
    pub fn get_latency(&self, player: PlayerId) -> u64 {
        *lock(&self.latency).get(&player).unwrap_or(&0)
    }
    
    /// Latency plus a jitter sample, never negative.
    pub fn delay_for(&self, player: PlayerId) -> Duration {
        let base = self.get_latency(player) as f64;
        let jitter = *lock(&self.jitter_ms);
        let sample = match Normal::new(0.0, jitter) {
            Ok(normal) if jitter > 0.0 => normal.sample(&mut *lock(&self.rng)),
            _ => 0.0,
        };
        Duration::from_secs_f64((base + sample).max(0.0) / 1000.0)
    }
}

impl LinkController for SimLinkController {
    fn partition(&self, player: PlayerId) {
        lock(&self.partitioned).insert(player);
    }
    
    fn heal_all(&self) {
        lock(&self.partitioned).clear();
    }
    
    fn set_latency(&self, player: PlayerId, latency_ms: u64) {
        lock(&self.latency).insert(player, latency_ms);
    }
}
