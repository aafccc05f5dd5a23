//! Per-robot panel state.
//!
//! Each added robot gets a controller holding its display toggles. The
//! toggles are pushed to the pose sink when they change, and all at once
//! when the robot model reports ready.

use std::collections::BTreeMap;

use jointscope_env::RobotId;
use nalgebra::Vector3;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::pose::PoseSink;

/// Display toggles of one robot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobotController {
    pub id: RobotId,
    pub visible: bool,
    pub highlight: bool,
    /// When false the robot stands still at `init_position`
    pub follow_position: bool,
    pub init_position: Vector3<f64>,
    /// File the movement was loaded from, if any
    pub source_name: Option<String>,
}

impl RobotController {
    /// Robots are laid out along the Y axis by id.
    pub fn new(id: RobotId) -> Self {
        Self {
            id,
            visible: true,
            highlight: false,
            follow_position: false,
            init_position: Vector3::new(0.0, id.get() as f64, 0.0),
            source_name: None,
        }
    }

    /// Pushes every toggle to the sink.
    pub fn apply(&self, sink: &mut dyn PoseSink) {
        sink.set_robot_visibility(self.id, self.visible);
        sink.set_robot_highlight(self.id, self.highlight);
        sink.set_robot_stand_still(self.id, !self.follow_position);
        for axis in 0..3 {
            sink.set_robot_init_position(self.id, axis, self.init_position[axis]);
        }
    }
}

/// All added robots plus the add-gate.
///
/// Adding is disabled between `add_robot` and the model-ready event so
/// robot models never load concurrently.
#[derive(Debug)]
pub struct RobotRoster {
    robots: BTreeMap<RobotId, RobotController>,
    next_id: RobotId,
    add_enabled: bool,
}

impl Default for RobotRoster {
    fn default() -> Self {
        Self {
            robots: BTreeMap::new(),
            next_id: RobotId(0),
            add_enabled: true,
        }
    }
}

impl RobotRoster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocates the next sequential id; returns `None` while a previous
    /// add is still pending.
    pub fn add(&mut self) -> Option<RobotId> {
        if !self.add_enabled {
            return None;
        }
        let id = self.next_id;
        self.next_id = id.next();
        self.robots.insert(id, RobotController::new(id));
        self.add_enabled = false;
        debug!("Added {}", id.label());
        Some(id)
    }

    pub fn remove(&mut self, robot: RobotId) -> Option<RobotController> {
        self.robots.remove(&robot)
    }

    pub fn get(&self, robot: RobotId) -> Option<&RobotController> {
        self.robots.get(&robot)
    }

    pub fn get_mut(&mut self, robot: RobotId) -> Option<&mut RobotController> {
        self.robots.get_mut(&robot)
    }

    pub fn contains(&self, robot: RobotId) -> bool {
        self.robots.contains_key(&robot)
    }

    pub fn ids(&self) -> impl Iterator<Item = RobotId> + '_ {
        self.robots.keys().copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RobotController> + '_ {
        self.robots.values()
    }

    pub fn len(&self) -> usize {
        self.robots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.robots.is_empty()
    }

    pub fn add_enabled(&self) -> bool {
        self.add_enabled
    }

    pub fn enable_add(&mut self) {
        self.add_enabled = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::render::{PoseEvent, RecordingSink};

    #[test]
    fn test_sequential_ids_and_add_gate() {
        let mut roster = RobotRoster::new();
        assert_eq!(roster.add(), Some(RobotId(0)));
        assert_eq!(roster.add(), None);
        roster.enable_add();
        assert_eq!(roster.add(), Some(RobotId(1)));
        roster.enable_add();
        roster.remove(RobotId(0));
        // Ids are never reused
        assert_eq!(roster.add(), Some(RobotId(2)));
    }

    #[test]
    fn test_controller_defaults() {
        let controller = RobotController::new(RobotId(3));
        assert!(controller.visible);
        assert!(!controller.highlight);
        assert!(!controller.follow_position);
        assert_eq!(controller.init_position, Vector3::new(0.0, 3.0, 0.0));
    }

    #[test]
    fn test_apply_pushes_all_toggles() {
        let mut sink = RecordingSink::new();
        RobotController::new(RobotId(1)).apply(&mut sink);
        assert!(sink.pose_events.contains(&PoseEvent::StandStill {
            robot: RobotId(1),
            stand_still: true
        }));
        assert!(sink.pose_events.contains(&PoseEvent::InitPosition {
            robot: RobotId(1),
            axis: 1,
            value: 1.0
        }));
        assert_eq!(sink.pose_events.len(), 6);
    }
}
