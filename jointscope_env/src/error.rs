//! Error types for the JointScope environment abstraction.

use std::time::Duration;
use thiserror::Error;

/// Errors that can occur in the environment abstraction layer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum EnvError {
    /// The clock reads earlier than an instant it reported before
    #[error("Clock regression: now {now:?} is before origin {origin:?}")]
    ClockRegression { origin: Duration, now: Duration },

    /// A robot identifier could not be parsed
    #[error("Invalid robot id: {0}")]
    InvalidRobotId(String),
}

impl EnvError {
    /// Creates an invalid robot id error.
    pub fn invalid_robot(raw: impl std::fmt::Display) -> Self {
        Self::InvalidRobotId(raw.to_string())
    }
}
