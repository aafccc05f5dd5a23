//! Common types for the JointScope environment abstraction.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::EnvError;

/// Identifier of a robot in a replay session.
///
/// Small sequential integers, assigned when the robot's controls are
/// created. Unique for the lifetime of the session; never reused after
/// deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RobotId(pub u32);

impl RobotId {
    /// Creates a RobotId from its raw number.
    pub fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Returns the raw number.
    pub fn get(&self) -> u32 {
        self.0
    }

    /// Returns the id that follows this one.
    pub fn next(&self) -> Self {
        Self(self.0 + 1)
    }

    /// Label used for chart traces and heatmap selection ("Robot 3").
    pub fn label(&self) -> String {
        format!("Robot {}", self.0)
    }
}

impl std::fmt::Display for RobotId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for RobotId {
    type Err = EnvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let digits = trimmed
            .strip_prefix("Robot ")
            .or_else(|| trimmed.strip_prefix("robot"))
            .unwrap_or(trimmed)
            .trim();
        digits
            .parse::<u32>()
            .map(RobotId)
            .map_err(|_| EnvError::invalid_robot(s))
    }
}
