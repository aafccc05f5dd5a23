//! Deterministic replay scenarios.

/// Scenario identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScenarioId {
    /// RPL-001: robots of different lengths halt on the last common frame
    EndOfData,

    /// RPL-002: pausing loses no frames, however long the pause
    PauseResume,

    /// RPL-003: seeks clamp and re-anchor without time jumps
    Seek,

    /// RPL-004: deleting robots mid-playback
    RobotDelete,

    /// RPL-005: brush-to-zoom pins a chart until cleared
    BrushZoom,

    /// RPL-006: heatmap buckets against a direct computation
    Heatmap,

    /// RPL-007: unparseable cells stay live as zeros / held values
    LossyFrames,

    /// RPL-008: switching chart grouping keeps charts consistent
    Grouping,
}

impl ScenarioId {
    /// Returns a list of all scenarios.
    pub fn all() -> Vec<ScenarioId> {
        vec![
            ScenarioId::EndOfData,
            ScenarioId::PauseResume,
            ScenarioId::Seek,
            ScenarioId::RobotDelete,
            ScenarioId::BrushZoom,
            ScenarioId::Heatmap,
            ScenarioId::LossyFrames,
            ScenarioId::Grouping,
        ]
    }

    /// Returns the scenario name.
    pub fn name(&self) -> &'static str {
        match self {
            ScenarioId::EndOfData => "end_of_data",
            ScenarioId::PauseResume => "pause_resume",
            ScenarioId::Seek => "seek",
            ScenarioId::RobotDelete => "robot_delete",
            ScenarioId::BrushZoom => "brush_zoom",
            ScenarioId::Heatmap => "heatmap",
            ScenarioId::LossyFrames => "lossy_frames",
            ScenarioId::Grouping => "grouping",
        }
    }

    /// Returns a description of the scenario.
    pub fn description(&self) -> &'static str {
        match self {
            ScenarioId::EndOfData => "Robots of different lengths; playback halts at min length - 1",
            ScenarioId::PauseResume => "Random pauses; resumed frame equals paused frame",
            ScenarioId::Seek => "Random seeks while running and idle; clamped, no time jump",
            ScenarioId::RobotDelete => "Delete robots mid-playback; bounds widen, heatmap re-selects",
            ScenarioId::BrushZoom => "Brush selections pin a chart; degenerate ones are ignored",
            ScenarioId::Heatmap => "Bucket means match a direct computation over random lengths",
            ScenarioId::LossyFrames => "10% dropped cells; pose and charts never see NaN",
            ScenarioId::Grouping => "Switch by-robot / by-channel grouping with toggles in between",
        }
    }
}

impl std::fmt::Display for ScenarioId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for ScenarioId {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "end_of_data" | "endofdata" | "rpl-001" => Ok(ScenarioId::EndOfData),
            "pause_resume" | "pauseresume" | "rpl-002" => Ok(ScenarioId::PauseResume),
            "seek" | "rpl-003" => Ok(ScenarioId::Seek),
            "robot_delete" | "robotdelete" | "rpl-004" => Ok(ScenarioId::RobotDelete),
            "brush_zoom" | "brushzoom" | "rpl-005" => Ok(ScenarioId::BrushZoom),
            "heatmap" | "rpl-006" => Ok(ScenarioId::Heatmap),
            "lossy_frames" | "lossyframes" | "rpl-007" => Ok(ScenarioId::LossyFrames),
            "grouping" | "rpl-008" => Ok(ScenarioId::Grouping),
            _ => Err(format!("Unknown scenario: {}", s)),
        }
    }
}
