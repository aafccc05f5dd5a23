//! Simulation context implementing ReplayContext for deterministic testing.

use async_trait::async_trait;
use jointscope_env::ReplayContext;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// Simulation context backed by a virtual clock.
///
/// Time only moves through `advance_time`, `set_time` or `sleep`, so a
/// scenario replays identically on every run. Clones share the clock.
#[derive(Clone, Default)]
pub struct SimContext {
    /// Current virtual time (nanoseconds since simulation start)
    virtual_time_ns: Arc<Mutex<u64>>,
}

impl SimContext {
    /// Creates a context at virtual time zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an Arc-wrapped context for sharing with the playback clock.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    /// Advances virtual time by the given duration.
    pub fn advance_time(&self, duration: Duration) {
        *self.time() += duration.as_nanos() as u64;
    }

    /// Sets the virtual time to a specific value. Moving backwards is
    /// allowed and shows up as a clock regression to consumers.
    pub fn set_time(&self, time_ns: u64) {
        *self.time() = time_ns;
    }

    /// Returns the current virtual time in nanoseconds.
    pub fn time_ns(&self) -> u64 {
        *self.time()
    }

    fn time(&self) -> MutexGuard<'_, u64> {
        // A u64 cannot be left half-written; recover from poisoning
        self.virtual_time_ns
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl ReplayContext for SimContext {
    fn now(&self) -> Duration {
        Duration::from_nanos(self.time_ns())
    }

    async fn sleep(&self, duration: Duration) {
        // In simulation, sleep advances virtual time
        self.advance_time(duration);
    }
}
