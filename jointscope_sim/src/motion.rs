//! Synthetic joint-motion recordings.
//!
//! The generator plays the role of a recorded robot: each joint follows a
//! seeded sinusoid with Gaussian noise, the root walks forward along X with
//! a slight sway, and an optional dropout rate punches holes into the data
//! the way flaky loggers do.

use std::f64::consts::{PI, TAU};
use std::io::Write;

use jointscope_core::series::{POSITION_CHANNELS, ROTATION_CHANNELS};
use jointscope_core::Series;
use nalgebra::Vector3;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

/// Token written for dropped cells; deliberately not a number.
pub const DROPOUT_TOKEN: &str = "#N/A";

/// Default joint set of a small legged robot.
pub const DEFAULT_JOINTS: [&str; 6] = [
    "lf_hip", "lf_knee", "rf_hip", "rf_knee", "lh_hip", "lh_knee",
];

#[derive(Debug, Clone, Copy)]
struct JointWave {
    amplitude: f64,
    frequency_hz: f64,
    phase: f64,
}

/// Seeded movement generator.
pub struct MotionGenerator {
    rng: ChaCha8Rng,
    joints: Vec<String>,
    sample_interval_secs: f64,
    noise_std: f64,
    dropout_rate: f64,
    walk_velocity: Vector3<f64>,
}

impl MotionGenerator {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
            joints: DEFAULT_JOINTS.iter().map(|j| j.to_string()).collect(),
            sample_interval_secs: 1.0 / 30.0,
            noise_std: 0.02,
            dropout_rate: 0.0,
            walk_velocity: Vector3::new(0.4, 0.0, 0.0),
        }
    }

    pub fn with_joints<S: Into<String>>(mut self, joints: impl IntoIterator<Item = S>) -> Self {
        self.joints = joints.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sample_interval(mut self, secs: f64) -> Self {
        self.sample_interval_secs = secs;
        self
    }

    /// Gaussian noise on joint angles (radians). Invalid values disable
    /// noise.
    pub fn with_noise(mut self, std_dev: f64) -> Self {
        self.noise_std = if std_dev.is_finite() && std_dev >= 0.0 { std_dev } else { 0.0 };
        self
    }

    /// Probability that any single cell is lost.
    pub fn with_dropout(mut self, rate: f64) -> Self {
        self.dropout_rate = rate.clamp(0.0, 1.0);
        self
    }

    pub fn joints(&self) -> &[String] {
        &self.joints
    }

    /// Channel header: joints first, then root position and rotation.
    pub fn channels(&self) -> Vec<String> {
        self.joints
            .iter()
            .cloned()
            .chain(POSITION_CHANNELS.iter().map(|c| c.to_string()))
            .chain(ROTATION_CHANNELS.iter().map(|c| c.to_string()))
            .collect()
    }

    /// Generates `len` frames. Dropped cells are NaN.
    pub fn generate(&mut self, len: usize) -> Series {
        let waves: Vec<JointWave> = self
            .joints
            .iter()
            .map(|_| JointWave {
                amplitude: self.rng.gen_range(0.3..1.5),
                frequency_hz: self.rng.gen_range(0.2..1.5),
                phase: self.rng.gen_range(0.0..TAU),
            })
            .collect();
        let noise = Normal::new(0.0, self.noise_std).ok();
        let sway = self.rng.gen_range(0.01..0.05);

        let mut rows = Vec::with_capacity(len);
        for frame in 0..len {
            let t = frame as f64 * self.sample_interval_secs;
            let mut row = Vec::with_capacity(self.joints.len() + 6);

            for wave in &waves {
                let clean = wave.amplitude * (TAU * wave.frequency_hz * t + wave.phase).sin();
                let jitter = noise.map_or(0.0, |n| n.sample(&mut self.rng));
                row.push((clean + jitter).clamp(-PI, PI));
            }

            let position = self.walk_velocity * t + Vector3::new(0.0, sway * (TAU * t).sin(), 0.0);
            row.extend(position.iter().copied());
            row.extend([0.0, 0.0, 0.1 * (0.5 * t).sin()]);

            if self.dropout_rate > 0.0 {
                for cell in row.iter_mut() {
                    if self.rng.gen_bool(self.dropout_rate) {
                        *cell = f64::NAN;
                    }
                }
            }
            rows.push(row);
        }
        Series::from_rows(self.channels(), rows)
    }
}

/// Writes a series as CSV with a header row. NaN cells are written as
/// `DROPOUT_TOKEN` so they fail to parse on the way back in.
pub fn write_csv<W: Write>(series: &Series, writer: W) -> Result<(), csv::Error> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(series.channels())?;
    for frame in series.frames() {
        let cells: Vec<String> = (0..series.channels().len())
            .map(|idx| {
                let value = frame.raw(idx);
                if value.is_nan() {
                    DROPOUT_TOKEN.to_string()
                } else {
                    value.to_string()
                }
            })
            .collect();
        wtr.write_record(&cells)?;
    }
    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use jointscope_core::ingest::parse_movement;

    #[test]
    fn test_same_seed_same_motion() {
        let a = MotionGenerator::new(7).generate(50);
        let b = MotionGenerator::new(7).generate(50);
        assert_eq!(a, b);
        let c = MotionGenerator::new(8).generate(50);
        assert_ne!(a, c);
    }

    #[test]
    fn test_channels_and_bounds() {
        let series = MotionGenerator::new(1)
            .with_joints(["a", "b"])
            .generate(100);
        assert_eq!(series.joint_channels(), vec!["a", "b"]);
        assert_eq!(series.channels().len(), 8);
        for frame in series.frames() {
            for idx in 0..2 {
                assert!(frame.raw(idx).abs() <= PI);
            }
        }
        // Walks forward
        assert!(series.raw(99, "pos_0") > series.raw(0, "pos_0"));
    }

    #[test]
    fn test_dropout_survives_csv_round_trip_as_unparseable() {
        let series = MotionGenerator::new(3).with_dropout(0.2).generate(40);
        let dropped = series.missing_samples();
        assert!(dropped > 0);

        let mut buf = Vec::new();
        write_csv(&series, &mut buf).unwrap();
        let (parsed, report) = parse_movement(buf.as_slice()).unwrap();
        assert_eq!(report.unparseable_cells, dropped);
        assert_eq!(parsed.len(), 40);
    }
}
