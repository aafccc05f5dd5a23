use jointscope_env::RobotId;
use thiserror::Error;

use crate::config::ConfigError;
use crate::ingest::IngestError;
use crate::store::StoreError;

/// Errors surfaced by `ReplaySession`.
#[derive(Debug, Error)]
pub enum ReplayError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Ingest(#[from] IngestError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Unknown robot {0}")]
    UnknownRobot(RobotId),

    #[error("A robot is still loading; wait for its model before adding another")]
    RobotCreationPending,
}
