//! Chart and heatmap sinks.
//!
//! Rendering is out of the engine's hands: it produces `WindowPoints` and
//! `HeatmapGrid`s and hands them to whatever sink the host wires in.

use std::collections::BTreeMap;
use std::fmt;

use jointscope_env::RobotId;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::heatmap::{DivergingColorScale, HeatmapGrid};
use crate::pose::PoseSink;
use crate::view::WindowPoints;

/// Identifies one line chart.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ChartKey {
    /// One chart per robot, one trace per joint
    Robot(RobotId),
    /// One chart per joint, one trace per robot
    Channel(String),
}

impl fmt::Display for ChartKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartKey::Robot(robot) => write!(f, "{}", robot.label()),
            ChartKey::Channel(name) => write!(f, "{}", name),
        }
    }
}

/// Consumer of projected line-chart windows.
pub trait ChartSink {
    /// `highlighted` lists trace labels drawn emphasised.
    fn draw_chart(&mut self, key: &ChartKey, points: &WindowPoints, highlighted: &[String]);

    fn clear_chart(&mut self, key: &ChartKey);
}

/// Consumer of heatmap overviews.
pub trait HeatmapSink {
    fn draw_heatmap(&mut self, robot: RobotId, grid: &HeatmapGrid, scale: &DivergingColorScale);

    fn clear_heatmap(&mut self);
}

/// One recorded pose update.
#[derive(Debug, Clone, PartialEq)]
pub enum PoseEvent {
    Joint { robot: RobotId, joint: String, value: f64 },
    Position { robot: RobotId, position: Vector3<f64> },
    Rotation { robot: RobotId, rotation: Vector3<f64> },
    Visibility { robot: RobotId, visible: bool },
    Highlight { robot: RobotId, highlight: bool },
    StandStill { robot: RobotId, stand_still: bool },
    InitPosition { robot: RobotId, axis: usize, value: f64 },
}

/// In-memory sink for every output channel; used by tests and the
/// simulation harness to assert on what would have been rendered.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub pose_events: Vec<PoseEvent>,
    /// Frame of every display pump, in order
    pub pose_frames: Vec<usize>,
    /// Latest joint value per robot and joint
    pub joints: BTreeMap<(RobotId, String), f64>,
    /// Latest window per chart
    pub charts: BTreeMap<ChartKey, (WindowPoints, Vec<String>)>,
    pub chart_draws: usize,
    pub heatmap: Option<(RobotId, HeatmapGrid)>,
    pub heatmap_draws: usize,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn joint(&self, robot: RobotId, joint: &str) -> Option<f64> {
        self.joints.get(&(robot, joint.to_string())).copied()
    }

    pub fn chart(&self, key: &ChartKey) -> Option<&WindowPoints> {
        self.charts.get(key).map(|(points, _)| points)
    }

    pub fn highlighted(&self, key: &ChartKey) -> &[String] {
        self.charts
            .get(key)
            .map(|(_, highlighted)| highlighted.as_slice())
            .unwrap_or(&[])
    }

    /// Most recent position pushed for `robot`.
    pub fn last_position(&self, robot: RobotId) -> Option<Vector3<f64>> {
        self.pose_events.iter().rev().find_map(|event| match event {
            PoseEvent::Position { robot: r, position } if *r == robot => Some(*position),
            _ => None,
        })
    }

    pub fn clear_events(&mut self) {
        self.pose_events.clear();
    }
}

impl PoseSink for RecordingSink {
    fn begin_frame(&mut self, frame: usize) {
        self.pose_frames.push(frame);
    }

    fn set_joint_value(&mut self, robot: RobotId, joint: &str, value: f64) {
        self.joints.insert((robot, joint.to_string()), value);
        self.pose_events.push(PoseEvent::Joint {
            robot,
            joint: joint.to_string(),
            value,
        });
    }

    fn set_robot_position(&mut self, robot: RobotId, position: Vector3<f64>) {
        self.pose_events.push(PoseEvent::Position { robot, position });
    }

    fn set_robot_rotation(&mut self, robot: RobotId, rotation: Vector3<f64>) {
        self.pose_events.push(PoseEvent::Rotation { robot, rotation });
    }

    fn set_robot_visibility(&mut self, robot: RobotId, visible: bool) {
        self.pose_events.push(PoseEvent::Visibility { robot, visible });
    }

    fn set_robot_highlight(&mut self, robot: RobotId, highlight: bool) {
        self.pose_events.push(PoseEvent::Highlight { robot, highlight });
    }

    fn set_robot_stand_still(&mut self, robot: RobotId, stand_still: bool) {
        self.pose_events.push(PoseEvent::StandStill { robot, stand_still });
    }

    fn set_robot_init_position(&mut self, robot: RobotId, axis: usize, value: f64) {
        self.pose_events.push(PoseEvent::InitPosition { robot, axis, value });
    }
}

impl ChartSink for RecordingSink {
    fn draw_chart(&mut self, key: &ChartKey, points: &WindowPoints, highlighted: &[String]) {
        self.chart_draws += 1;
        self.charts
            .insert(key.clone(), (points.clone(), highlighted.to_vec()));
    }

    fn clear_chart(&mut self, key: &ChartKey) {
        self.charts.remove(key);
    }
}

impl HeatmapSink for RecordingSink {
    fn draw_heatmap(&mut self, robot: RobotId, grid: &HeatmapGrid, _scale: &DivergingColorScale) {
        self.heatmap_draws += 1;
        self.heatmap = Some((robot, grid.clone()));
    }

    fn clear_heatmap(&mut self) {
        self.heatmap = None;
    }
}
