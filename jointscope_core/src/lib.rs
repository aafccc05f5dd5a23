//! JointScope Core - Synchronized Multi-Robot Motion Replay
//!
//! This library keeps several independently-lengthed consumers of recorded
//! joint-motion logs frame-consistent:
//! 1. **One Clock**: `PlaybackClock` maps wall time to a single frame index
//! 2. **One Store**: `MovementStore` owns one series per robot and the
//!    cross-robot minimum length that bounds playback
//! 3. **Many Views**: `WindowedSeriesView` slices a sliding window for line
//!    charts, `HeatmapAggregator` bins a whole series for the overview
//!
//! `ReplaySession` wires them to pose/chart/heatmap sinks and to the
//! level-triggered `AnimationControl`.

pub mod series;
pub mod store;
pub mod clock;
pub mod control;
pub mod view;
pub mod heatmap;
pub mod ingest;
pub mod config;
pub mod subscription;
pub mod robot;
pub mod pose;
pub mod render;
pub mod session;
pub mod error;

#[cfg(feature = "visualization")]
pub mod visualization;

#[cfg(feature = "dashboard")]
pub mod dashboard;

#[cfg(test)]
pub(crate) mod test_support;

// Re-export key types for convenience
pub use series::{Frame, Series};
pub use store::{MovementStore, StoreError};
pub use clock::{ClockState, PlaybackClock};
pub use control::AnimationControl;
pub use view::{ChartGeometry, TraceSource, WindowPoints, WindowedSeriesView};
pub use heatmap::{DivergingColorScale, HeatmapAggregator, HeatmapGrid};
pub use config::ReplayConfig;
pub use pose::PoseSink;
pub use render::{ChartKey, ChartSink, HeatmapSink, RecordingSink};
pub use session::{ChartGrouping, ReplaySession};
pub use error::ReplayError;
pub use jointscope_env::RobotId;
