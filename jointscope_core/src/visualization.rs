//! Rerun.io pose sink
//!
//! Streams the replay into a Rerun recording:
//! - joint angles as scalar time series under `robots/<id>/joints/<name>`
//! - robot root transforms under `world/robots/<id>`
//! - panel toggles as text logs
//!
//! Enable with the `visualization` feature flag.

use std::collections::HashMap;

use jointscope_env::RobotId;
use nalgebra::{UnitQuaternion, Vector3};
use rerun::{RecordingStream, RecordingStreamBuilder};
use tracing::warn;

use crate::pose::PoseSink;

/// Pose sink backed by a Rerun recording stream.
pub struct RerunPoseSink {
    rec: RecordingStream,
    /// Position waiting for the matching rotation
    positions: HashMap<RobotId, Vector3<f64>>,
}

impl RerunPoseSink {
    /// Spawns a Rerun viewer and connects to it.
    pub fn new(app_id: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let rec = RecordingStreamBuilder::new(app_id).spawn()?;
        rec.log_static("world", &rerun::ViewCoordinates::RIGHT_HAND_Z_UP())?;
        Ok(Self {
            rec,
            positions: HashMap::new(),
        })
    }

    /// Writes the recording to an `.rrd` file instead.
    pub fn new_to_file(
        app_id: &str,
        path: impl AsRef<std::path::Path>,
    ) -> Result<Self, Box<dyn std::error::Error>> {
        let rec = RecordingStreamBuilder::new(app_id).save(path.as_ref())?;
        rec.log_static("world", &rerun::ViewCoordinates::RIGHT_HAND_Z_UP())?;
        Ok(Self {
            rec,
            positions: HashMap::new(),
        })
    }

    fn log_text(&self, robot: RobotId, text: String) {
        if let Err(err) = self.rec.log(
            format!("logs/robots/{}", robot.get()),
            &rerun::TextLog::new(text),
        ) {
            warn!("Rerun log failed: {}", err);
        }
    }
}

impl PoseSink for RerunPoseSink {
    fn begin_frame(&mut self, frame: usize) {
        self.rec.set_time_sequence("frame", frame as i64);
    }

    fn set_joint_value(&mut self, robot: RobotId, joint: &str, value: f64) {
        if let Err(err) = self.rec.log(
            format!("robots/{}/joints/{}", robot.get(), joint),
            &rerun::Scalars::new([value]),
        ) {
            warn!("Rerun log failed: {}", err);
        }
    }

    fn set_robot_position(&mut self, robot: RobotId, position: Vector3<f64>) {
        self.positions.insert(robot, position);
    }

    fn set_robot_rotation(&mut self, robot: RobotId, rotation: Vector3<f64>) {
        let position = self
            .positions
            .remove(&robot)
            .unwrap_or_else(Vector3::zeros);
        let quat = UnitQuaternion::from_euler_angles(rotation.x, rotation.y, rotation.z);
        let q = quat.as_ref();
        let transform = rerun::Transform3D::from_translation([
            position.x as f32,
            position.y as f32,
            position.z as f32,
        ])
        .with_quaternion(rerun::Quaternion::from_xyzw([
            q.i as f32, q.j as f32, q.k as f32, q.w as f32,
        ]));
        if let Err(err) = self
            .rec
            .log(format!("world/robots/{}", robot.get()), &transform)
        {
            warn!("Rerun log failed: {}", err);
        }
    }

    fn set_robot_visibility(&mut self, robot: RobotId, visible: bool) {
        self.log_text(robot, format!("{} visible={}", robot.label(), visible));
    }

    fn set_robot_highlight(&mut self, robot: RobotId, highlight: bool) {
        self.log_text(robot, format!("{} highlight={}", robot.label(), highlight));
    }

    fn set_robot_stand_still(&mut self, robot: RobotId, stand_still: bool) {
        self.log_text(robot, format!("{} stand_still={}", robot.label(), stand_still));
    }

    fn set_robot_init_position(&mut self, robot: RobotId, axis: usize, value: f64) {
        self.log_text(
            robot,
            format!("{} init_position[{}]={:.3}", robot.label(), axis, value),
        );
    }
}
