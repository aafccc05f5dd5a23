//! Core environment context trait for the JointScope playback engine.

use async_trait::async_trait;
use std::time::Duration;

use crate::error::EnvError;

/// The central interface for reading time.
///
/// This trait abstracts the "real world" clock so that the playback engine
/// can run in production (tokio) and in deterministic simulation.
///
/// # Implementations
///
/// - **Production**: `TokioContext` - wraps `std::time::Instant` and `tokio::time`
/// - **Simulation**: `SimContext` - a manually advanced virtual clock
#[async_trait]
pub trait ReplayContext: Send + Sync + 'static {
    /// Returns the current monotonic time since context creation.
    ///
    /// The playback clock anchors its origin to this value.
    /// In simulation, this is the virtual clock time.
    fn now(&self) -> Duration;

    /// Suspends execution for the given duration.
    ///
    /// In production: wraps `tokio::time::sleep`
    /// In simulation: advances virtual time
    async fn sleep(&self, duration: Duration);

    /// Returns the time elapsed since `origin`.
    ///
    /// A virtual clock can be rewound below a previously observed instant;
    /// that case is reported as `EnvError::ClockRegression` instead of
    /// wrapping around.
    fn elapsed_since(&self, origin: Duration) -> Result<Duration, EnvError> {
        let now = self.now();
        now.checked_sub(origin)
            .ok_or(EnvError::ClockRegression { origin, now })
    }
}
