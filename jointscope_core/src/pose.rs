//! Pose sinks - where per-frame robot state goes.
//!
//! The replay engine does not own a 3D scene. Every display frame it pushes
//! joint angles, a root position and a root rotation (Euler XYZ, radians)
//! for each robot into a `PoseSink`, and forwards the robot-panel toggles.

use jointscope_env::RobotId;
use nalgebra::Vector3;
use tracing::debug;

/// Consumer of robot pose updates.
pub trait PoseSink {
    /// Called once per display frame before that frame's updates.
    fn begin_frame(&mut self, _frame: usize) {}

    fn set_joint_value(&mut self, robot: RobotId, joint: &str, value: f64);

    fn set_robot_position(&mut self, robot: RobotId, position: Vector3<f64>);

    /// Euler angles in XYZ order.
    fn set_robot_rotation(&mut self, robot: RobotId, rotation: Vector3<f64>);

    fn set_robot_visibility(&mut self, _robot: RobotId, _visible: bool) {}

    fn set_robot_highlight(&mut self, _robot: RobotId, _highlight: bool) {}

    /// When set, the robot ignores recorded position and stays at its
    /// initial placement.
    fn set_robot_stand_still(&mut self, _robot: RobotId, _stand_still: bool) {}

    /// Moves one axis (0..3) of the robot's initial placement.
    fn set_robot_init_position(&mut self, _robot: RobotId, _axis: usize, _value: f64) {}
}

/// Pose sink that only logs, for headless runs.
#[derive(Debug, Default)]
pub struct TracingPoseSink;

impl TracingPoseSink {
    pub fn new() -> Self {
        Self
    }
}

impl PoseSink for TracingPoseSink {
    fn set_joint_value(&mut self, _robot: RobotId, _joint: &str, _value: f64) {}

    fn set_robot_position(&mut self, robot: RobotId, position: Vector3<f64>) {
        debug!(
            "{} at ({:.3}, {:.3}, {:.3})",
            robot.label(),
            position.x,
            position.y,
            position.z
        );
    }

    fn set_robot_rotation(&mut self, _robot: RobotId, _rotation: Vector3<f64>) {}

    fn set_robot_visibility(&mut self, robot: RobotId, visible: bool) {
        debug!("{} visible={}", robot.label(), visible);
    }

    fn set_robot_highlight(&mut self, robot: RobotId, highlight: bool) {
        debug!("{} highlight={}", robot.label(), highlight);
    }

    fn set_robot_stand_still(&mut self, robot: RobotId, stand_still: bool) {
        debug!("{} stand_still={}", robot.label(), stand_still);
    }

    fn set_robot_init_position(&mut self, robot: RobotId, axis: usize, value: f64) {
        debug!("{} init_position[{}]={:.3}", robot.label(), axis, value);
    }
}
