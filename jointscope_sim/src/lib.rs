//! JointScope Deterministic Replay Harness
//!
//! Runs `ReplaySession`s against a virtual clock so every frame index,
//! chart window and heatmap cell of a scenario is reproducible from one
//! 64-bit seed.
//!
//! # Pieces
//!
//! - **Time**: `SimContext` advances only when told to
//! - **Data**: `MotionGenerator` synthesizes seeded joint recordings,
//!   optionally with unparseable cells
//! - **Scenarios**: `ScenarioRunner` drives a session through each
//!   `ScenarioId` and checks the playback invariants along the way
//! - **Player**: `play_to_end` is the real-time host loop used by the CLI
//!
//! # Usage
//!
//! ```ignore
//! use jointscope_sim::{ScenarioRunner, scenarios::ScenarioId};
//!
//! let result = ScenarioRunner::new(42).run(ScenarioId::EndOfData);
//! assert!(result.passed);
//! ```

mod context;
mod motion;
mod player;
mod runner;
pub mod scenarios;

pub use context::SimContext;
pub use motion::{write_csv, MotionGenerator, DEFAULT_JOINTS, DROPOUT_TOKEN};
pub use player::{load_recordings, play_to_end, PlaySummary};
pub use runner::{ScenarioMetrics, ScenarioResult, ScenarioRunner};
