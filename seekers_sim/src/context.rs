//! Simulation context implementing ArenaContext for deterministic testing.

use async_trait::async_trait;
use seekers_env::ArenaContext;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Simulation context backed by a virtual clock.
///
/// This implements `ArenaContext` using:
/// - A virtual clock that only moves when advanced or slept on
/// - A fixed master seed
///
/// Tick pacing sleeps advance the clock instantly, so a 3000 tick match
/// runs as fast as the decisions allow while `now()` still reports the
/// time the match would have taken.
pub struct SimContext {
    /// Master seed for this simulation
    seed: u64,
    
    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<AtomicU64>,
}

impl SimContext {
    /// Creates a new SimContext with the given seed.
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            virtual_time_ns: Arc::new(AtomicU64::new(0)),
        }
    }
    
    /// Creates an Arc-wrapped context for sharing.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::new(seed))
    }
    
    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        self.virtual_time_ns.fetch_add(duration.as_nanos() as u64, Ordering::SeqCst);
    }
    
    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        self.virtual_time_ns.load(Ordering::SeqCst)
    }
}

impl Clone for SimContext {
    fn clone(&self) -> Self {
        Self {
            seed: self.seed,
            virtual_time_ns: Arc::clone(&self.virtual_time_ns),
        }
    }
}

#[async_trait]
impl ArenaContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }
    
    async fn sleep(&self, duration: Duration) {
        // Sleeping advances virtual time; yield so other tasks make progress
        self.advance_time(duration);
        tokio::task::yield_now().await;
    }
    
    fn spawn<F>(&self, name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        let name = name.to_string();
        tokio::spawn(async move {
            future.await;
            tracing::trace!("Sim task '{}' finished", name);
        });
    }
    
    fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[test]
    fn test_sim_context_time() {
        let ctx = SimContext::new(42);
        assert_eq!(ctx.now(), Duration::ZERO);
        
        ctx.advance_time(Duration::from_secs(1));
        assert_eq!(ctx.now(), Duration::from_secs(1));
        
        ctx.advance_time(Duration::from_millis(500));
        assert_eq!(ctx.now(), Duration::from_millis(1500));
    }
    
    #[tokio::test]
    async fn test_sleep_advances_virtual_clock() {
        let ctx = SimContext::new(1);
        ctx.sleep(Duration::from_millis(16)).await;
        ctx.sleep(Duration::from_millis(16)).await;
        assert_eq!(ctx.now(), Duration::from_millis(32));
    }
    
    #[test]
    fn test_derived_seeds_are_stable() {
        let a = SimContext::new(42);
        let b = SimContext::new(42);
        assert_eq!(a.derive_seed(1), b.derive_seed(1));
        assert_ne!(a.derive_seed(1), a.derive_seed(2));
        assert_eq!(a.seed(), 42);
    }
    
    #[test]
    fn test_sim_context_clone_shares_time() {
        let ctx1 = SimContext::new(42);
        let ctx2 = ctx1.clone();
        
        ctx1.advance_time(Duration::from_secs(5));
        
        // Both should see the same time
        assert_eq!(ctx1.now(), ctx2.now());
    }
}
