//! Data model: frames, channels and per-robot series.
//!
//! A `Series` is immutable once built. Values are stored positionally
//! against the series' channel list; a missing or unparseable sample is
//! stored as NaN and resolved by the consumer (pose: zero, chart: hold
//! last, heatmap: zero).

use serde::{Deserialize, Serialize};

/// Channels carrying the robot base position, in x/y/z order.
pub const POSITION_CHANNELS: [&str; 3] = ["pos_0", "pos_1", "pos_2"];

/// Channels carrying the robot base rotation (Euler, radians), in x/y/z order.
pub const ROTATION_CHANNELS: [&str; 3] = ["rot_0", "rot_1", "rot_2"];

/// Returns true for `pos_*` / `rot_*` channels.
pub fn is_pose_channel(name: &str) -> bool {
    POSITION_CHANNELS.contains(&name) || ROTATION_CHANNELS.contains(&name)
}

/// One sampled instant: a value per channel, in channel order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    values: Vec<f64>,
}

impl Frame {
    /// Creates a frame from raw values (NaN marks a missing sample).
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    /// Number of channel slots in this frame.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Raw value at a channel index; NaN if missing or out of range.
    pub fn raw(&self, channel: usize) -> f64 {
        self.values.get(channel).copied().unwrap_or(f64::NAN)
    }

    /// Parsed value at a channel index, `None` when missing.
    pub fn value(&self, channel: usize) -> Option<f64> {
        let v = self.raw(channel);
        v.is_finite().then_some(v)
    }

    /// Value with the lossy-but-live policy: missing reads as zero.
    pub fn value_or_zero(&self, channel: usize) -> f64 {
        self.value_or(channel, 0.0)
    }

    /// Value, or `fallback` when missing (hold-last for charts).
    pub fn value_or(&self, channel: usize, fallback: f64) -> f64 {
        self.value(channel).unwrap_or(fallback)
    }

    /// Count of missing samples in this frame.
    pub fn missing(&self) -> usize {
        self.values.iter().filter(|v| !v.is_finite()).count()
    }
}

/// A robot's full recording: fixed channels, frames indexed `0..len`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    channels: Vec<String>,
    frames: Vec<Frame>,
}

impl Series {
    /// Builds a series. Frames are padded with NaN or truncated so that
    /// every frame has exactly one slot per channel.
    pub fn new(channels: Vec<String>, frames: Vec<Frame>) -> Self {
        let width = channels.len();
        let frames = frames
            .into_iter()
            .map(|mut frame| {
                frame.values.resize(width, f64::NAN);
                frame
            })
            .collect();
        Self { channels, frames }
    }

    /// Convenience constructor from string channel names and raw rows.
    pub fn from_rows<S: Into<String>>(channels: impl IntoIterator<Item = S>, rows: Vec<Vec<f64>>) -> Self {
        Self::new(
            channels.into_iter().map(Into::into).collect(),
            rows.into_iter().map(Frame::new).collect(),
        )
    }

    /// Number of frames.
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Channel names in header order.
    pub fn channels(&self) -> &[String] {
        &self.channels
    }

    /// Index of a named channel.
    pub fn channel_index(&self, name: &str) -> Option<usize> {
        self.channels.iter().position(|c| c == name)
    }

    /// Joint channels (everything except `pos_*` / `rot_*`), in header order.
    pub fn joint_channels(&self) -> Vec<&str> {
        self.channels
            .iter()
            .map(String::as_str)
            .filter(|c| !is_pose_channel(c))
            .collect()
    }

    /// Frame at an index.
    pub fn frame(&self, index: usize) -> Option<&Frame> {
        self.frames.get(index)
    }

    /// All frames in order.
    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    /// Raw value of a named channel at a frame (NaN if absent).
    pub fn raw(&self, index: usize, channel: &str) -> f64 {
        match (self.frame(index), self.channel_index(channel)) {
            (Some(frame), Some(c)) => frame.raw(c),
            _ => f64::NAN,
        }
    }

    /// Total number of missing samples across the series.
    pub fn missing_samples(&self) -> usize {
        self.frames.iter().map(Frame::missing).sum()
    }
}
