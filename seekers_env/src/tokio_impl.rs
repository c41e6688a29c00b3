//! Production implementation of ArenaContext using Tokio.

use crate::ArenaContext;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Production context backed by Tokio.
///
/// Time comes from the system clock. The seed is either supplied by the
/// match configuration or drawn from OS entropy.
pub struct TokioContext {
    /// Start time for monotonic duration calculations
    start: Instant,
    
    /// Master seed for goal spawning and colour scatter
    seed: u64,
}

impl TokioContext {
    /// Creates a new TokioContext with a random seed.
    pub fn new() -> Self {
        Self::with_seed(rand::random())
    }
    
    /// Creates a new TokioContext with a fixed seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            start: Instant::now(),
            seed,
        }
    }
    
    /// Creates an Arc-wrapped context for sharing across tasks.
    pub fn shared(seed: u64) -> Arc<Self> {
        Arc::new(Self::with_seed(seed))
    }
}

impl Default for TokioContext {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ArenaContext for TokioContext {
    fn now(&self) -> Duration {
        self.start.elapsed()
    }
    
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
    
    fn spawn<F>(&self, _name: &str, future: F)
    where
        F: std::future::Future<Output = ()> + Send + 'static,
    {
        tokio::spawn(future);
    }
    
    fn seed(&self) -> u64 {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    
    #[tokio::test]
    async fn test_tokio_context_time() {
        let ctx = TokioContext::new();
        let t1 = ctx.now();
        ctx.sleep(Duration::from_millis(10)).await;
        let t2 = ctx.now();
        
        assert!(t2 > t1);
        assert!(t2 - t1 >= Duration::from_millis(10));
    }
    
    #[test]
    fn test_tokio_context_seed() {
        let ctx = TokioContext::with_seed(12345);
        assert_eq!(ctx.seed(), 12345);
    }
    
    #[test]
    fn test_derived_seeds_differ_per_extension() {
        let ctx = TokioContext::with_seed(42);
        assert_eq!(ctx.derive_seed(1), ctx.derive_seed(1));
        assert_ne!(ctx.derive_seed(1), ctx.derive_seed(2));
    }
}
