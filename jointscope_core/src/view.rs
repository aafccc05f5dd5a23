//! WindowedSeriesView - sliding-window projection for line charts.
//!
//! Projects a slice of a series into pixel space for one or more channels
//! and answers nearest-point queries for hover highlighting and
//! click-to-seek. Scales are rebuilt on every call because the window's
//! frame extent moves every tick.

use std::ops::Range;

use serde::{Deserialize, Serialize};

use crate::config::ChartConfig;
use crate::series::Series;

/// Pixel box of a chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChartGeometry {
    pub width: f64,
    pub height: f64,
    pub margin_top: f64,
    pub margin_right: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
}

impl ChartGeometry {
    /// Derives the chart box from its container width.
    pub fn from_config(config: &ChartConfig) -> Self {
        let width = config.container_width * config.width_ratio;
        Self {
            width,
            height: width * config.aspect_ratio,
            margin_top: config.margin_top,
            margin_right: config.margin_right,
            margin_bottom: config.margin_bottom,
            margin_left: config.margin_left,
        }
    }

    /// Horizontal pixel span available for data.
    pub fn x_range(&self) -> (f64, f64) {
        (self.margin_left, self.width - self.margin_right)
    }

    /// Vertical pixel span, bottom first (values grow upward).
    pub fn y_range(&self) -> (f64, f64) {
        (self.height - self.margin_bottom, self.margin_top)
    }
}

impl Default for ChartGeometry {
    fn default() -> Self {
        Self::from_config(&ChartConfig::default())
    }
}

/// Continuous linear mapping from a data domain to a pixel range.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LinearScale {
    pub domain: (f64, f64),
    pub range: (f64, f64),
}

impl LinearScale {
    pub fn new(domain: (f64, f64), range: (f64, f64)) -> Self {
        Self { domain, range }
    }

    /// Maps a domain value to the range. A degenerate domain maps to the
    /// middle of the range.
    pub fn apply(&self, value: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        if d1 == d0 {
            return (r0 + r1) / 2.0;
        }
        r0 + (value - d0) / (d1 - d0) * (r1 - r0)
    }

    /// Maps a range value back into the domain.
    pub fn invert(&self, pixel: f64) -> f64 {
        let (d0, d1) = self.domain;
        let (r0, r1) = self.range;
        if r1 == r0 {
            return d0;
        }
        d0 + (pixel - r0) / (r1 - r0) * (d1 - d0)
    }
}

/// One projected sample.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlotPoint {
    pub frame: usize,
    pub value: f64,
    pub x: f64,
    pub y: f64,
}

/// The points of one labelled line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trace {
    pub label: String,
    pub points: Vec<PlotPoint>,
}

/// One line to plot: a channel of a series under a display label.
#[derive(Debug, Clone)]
pub struct TraceSource<'a> {
    pub label: String,
    pub series: &'a Series,
    pub channel: &'a str,
}

impl<'a> TraceSource<'a> {
    pub fn new(label: impl Into<String>, series: &'a Series, channel: &'a str) -> Self {
        Self {
            label: label.into(),
            series,
            channel,
        }
    }

    /// One source per channel of `series`, labelled by channel name.
    pub fn channels(series: &'a Series, channels: &[&'a str]) -> Vec<Self> {
        channels
            .iter()
            .map(|&channel| Self::new(channel, series, channel))
            .collect()
    }
}

/// Unprojected samples for one labelled line.
#[derive(Debug, Clone, PartialEq)]
pub struct RawTrace {
    pub label: String,
    pub samples: Vec<(usize, f64)>,
}

/// A projected window: the frame range, its traces and the scales used.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WindowPoints {
    pub frames: Range<usize>,
    pub traces: Vec<Trace>,
    pub x_scale: LinearScale,
    pub y_scale: LinearScale,
}

impl WindowPoints {
    /// True when there is nothing to draw.
    pub fn is_empty(&self) -> bool {
        self.traces.iter().all(|t| t.points.is_empty())
    }

    /// Total number of points across traces.
    pub fn point_count(&self) -> usize {
        self.traces.iter().map(|t| t.points.len()).sum()
    }

    /// Trace by label.
    pub fn trace(&self, label: &str) -> Option<&Trace> {
        self.traces.iter().find(|t| t.label == label)
    }

    /// Frame under a horizontal pixel, clamped to the window.
    pub fn frame_at(&self, pixel_x: f64) -> Option<usize> {
        if self.frames.is_empty() {
            return None;
        }
        let frame = self.x_scale.invert(pixel_x).floor().max(0.0) as usize;
        Some(frame.clamp(self.frames.start, self.frames.end - 1))
    }
}

/// Result of a nearest-point query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestPoint<'a> {
    pub label: &'a str,
    pub point: &'a PlotPoint,
    pub distance: f64,
}

/// Sliding-window projector bound to one chart geometry.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct WindowedSeriesView {
    geometry: ChartGeometry,
}

impl WindowedSeriesView {
    pub fn new(geometry: ChartGeometry) -> Self {
        Self { geometry }
    }

    pub fn geometry(&self) -> &ChartGeometry {
        &self.geometry
    }

    /// `[max(0, center - half), min(len, center + half))` with `half =
    /// window_size / 2`; never inverted.
    pub fn window_range(len: usize, center: usize, window_size: usize) -> Range<usize> {
        let half = window_size / 2;
        let end = center.saturating_add(half).min(len);
        let start = center.saturating_sub(half).min(end);
        start..end
    }

    /// Projects the playback-driven window around `center`.
    pub fn build_window<'a>(
        &self,
        series: &'a Series,
        center: usize,
        window_size: usize,
        channels: &[&'a str],
    ) -> WindowPoints {
        let sources = TraceSource::channels(series, channels);
        self.build_window_over(series.len(), &sources, center, window_size)
    }

    /// `build_window` for lines that share a frame axis of `len` frames,
    /// e.g. the same joint across several robots.
    pub fn build_window_over(
        &self,
        len: usize,
        sources: &[TraceSource<'_>],
        center: usize,
        window_size: usize,
    ) -> WindowPoints {
        let frames = Self::window_range(len, center, window_size);
        self.project(frames.clone(), Self::sample(sources, frames))
    }

    /// Projects exactly the brushed `[start, end)` range, independent of the
    /// playback position.
    ///
    /// Selections with `end - start <= 1` are ignored (`None`).
    pub fn rescale_to_selection<'a>(
        &self,
        series: &'a Series,
        start: usize,
        end: usize,
        channels: &[&'a str],
    ) -> Option<WindowPoints> {
        let sources = TraceSource::channels(series, channels);
        self.rescale_over(series.len(), &sources, start, end)
    }

    /// `rescale_to_selection` over a shared frame axis of `len` frames.
    pub fn rescale_over(
        &self,
        len: usize,
        sources: &[TraceSource<'_>],
        start: usize,
        end: usize,
    ) -> Option<WindowPoints> {
        if end <= start.saturating_add(1) {
            return None;
        }
        let frames = start.min(len)..end.min(len);
        Some(self.project(frames.clone(), Self::sample(sources, frames)))
    }

    /// Reads each source over a frame range. Missing samples hold the last
    /// parsed value (zero before the first one). Sources naming an unknown
    /// channel yield no trace.
    pub fn sample(sources: &[TraceSource<'_>], frames: Range<usize>) -> Vec<RawTrace> {
        sources
            .iter()
            .filter_map(|source| {
                let series = source.series;
                let idx = series.channel_index(source.channel)?;
                let mut last = 0.0;
                let samples = frames
                    .clone()
                    .filter_map(|f| series.frame(f).map(|frame| (f, frame)))
                    .map(|(f, frame)| {
                        last = frame.value_or(idx, last);
                        (f, last)
                    })
                    .collect();
                Some(RawTrace {
                    label: source.label.clone(),
                    samples,
                })
            })
            .collect()
    }

    /// Builds fresh scales for `frames` and the value extent of `traces`,
    /// then maps every sample to pixels.
    pub fn project(&self, frames: Range<usize>, traces: Vec<RawTrace>) -> WindowPoints {
        let x_domain = if frames.len() >= 2 {
            (frames.start as f64, (frames.end - 1) as f64)
        } else {
            (frames.start as f64, frames.start as f64 + 1.0)
        };
        let x_scale = LinearScale::new(x_domain, self.geometry.x_range());
        let y_scale = LinearScale::new(value_extent(&traces), self.geometry.y_range());

        let traces = traces
            .into_iter()
            .map(|raw| Trace {
                label: raw.label,
                points: raw
                    .samples
                    .into_iter()
                    .map(|(frame, value)| PlotPoint {
                        frame,
                        value,
                        x: x_scale.apply(frame as f64),
                        y: y_scale.apply(value),
                    })
                    .collect(),
            })
            .collect();

        WindowPoints {
            frames,
            traces,
            x_scale,
            y_scale,
        }
    }

    /// The point closest to `(pixel_x, pixel_y)` by Euclidean pixel
    /// distance, with its trace label. First wins on ties.
    pub fn nearest_point(points: &WindowPoints, pixel_x: f64, pixel_y: f64) -> Option<NearestPoint<'_>> {
        let mut best: Option<NearestPoint<'_>> = None;
        for trace in &points.traces {
            for point in &trace.points {
                let distance = (point.x - pixel_x).hypot(point.y - pixel_y);
                if best.map_or(true, |b| distance < b.distance) {
                    best = Some(NearestPoint {
                        label: &trace.label,
                        point,
                        distance,
                    });
                }
            }
        }
        best
    }
}

/// `[min, max]` of all samples, padded by one unit when flat or empty.
fn value_extent(traces: &[RawTrace]) -> (f64, f64) {
    let (lo, hi) = traces
        .iter()
        .flat_map(|t| t.samples.iter().map(|(_, v)| *v))
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() || !hi.is_finite() {
        return (-1.0, 1.0);
    }
    if lo == hi {
        return (lo - 1.0, hi + 1.0);
    }
    (lo, hi)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ramp(len: usize) -> Series {
        Series::from_rows(
            ["a", "b"],
            (0..len).map(|f| vec![f as f64, -(f as f64)]).collect(),
        )
    }

    #[test]
    fn test_window_left_clamped() {
        let view = WindowedSeriesView::default();
        let points = view.build_window(&ramp(50), 5, 20, &["a"]);
        assert_eq!(points.frames, 0..15);
        let frames: Vec<usize> = points.traces[0].points.iter().map(|p| p.frame).collect();
        assert_eq!(frames, (0..15).collect::<Vec<_>>());
    }

    #[test]
    fn test_window_right_clamped() {
        assert_eq!(WindowedSeriesView::window_range(50, 45, 20), 35..50);
        assert_eq!(WindowedSeriesView::window_range(50, 49, 20), 39..50);
    }

    #[test]
    fn test_short_series_degenerates_to_whole_series() {
        assert_eq!(WindowedSeriesView::window_range(8, 3, 20), 0..8);
    }

    #[test]
    fn test_center_past_end_is_empty_not_inverted() {
        let range = WindowedSeriesView::window_range(10, 100, 20);
        assert!(range.is_empty());
        assert!(range.start <= range.end);
    }

    #[test]
    fn test_empty_channels_yield_nothing() {
        let view = WindowedSeriesView::default();
        let points = view.build_window(&ramp(50), 25, 20, &[]);
        assert!(points.is_empty());
        let points = view.build_window(&ramp(50), 25, 20, &["missing"]);
        assert!(points.traces.is_empty());
    }

    #[test]
    fn test_scale_maps_window_to_pixel_width() {
        let view = WindowedSeriesView::default();
        let geometry = *view.geometry();
        let points = view.build_window(&ramp(100), 50, 20, &["a"]);
        let first = points.traces[0].points.first().unwrap();
        let last = points.traces[0].points.last().unwrap();
        assert_relative_eq!(first.x, geometry.margin_left);
        assert_relative_eq!(last.x, geometry.width - geometry.margin_right);
        // Larger values sit higher (smaller y)
        assert!(last.y < first.y);
    }

    #[test]
    fn test_missing_samples_hold_last() {
        let series = Series::from_rows(["a"], vec![vec![f64::NAN], vec![2.0], vec![f64::NAN], vec![4.0]]);
        let traces = WindowedSeriesView::sample(&TraceSource::channels(&series, &["a"]), 0..4);
        let values: Vec<f64> = traces[0].samples.iter().map(|(_, v)| *v).collect();
        assert_eq!(values, vec![0.0, 2.0, 2.0, 4.0]);
    }

    #[test]
    fn test_degenerate_selection_ignored() {
        let view = WindowedSeriesView::default();
        assert!(view.rescale_to_selection(&ramp(50), 10, 10, &["a"]).is_none());
        assert!(view.rescale_to_selection(&ramp(50), 10, 11, &["a"]).is_none());
        assert!(view.rescale_to_selection(&ramp(50), 12, 10, &["a"]).is_none());
    }

    #[test]
    fn test_selection_ignores_playback_center() {
        let view = WindowedSeriesView::default();
        let points = view.rescale_to_selection(&ramp(50), 10, 30, &["a", "b"]).unwrap();
        assert_eq!(points.frames, 10..30);
        assert_eq!(points.traces.len(), 2);
        assert_eq!(points.traces[1].points.len(), 20);
    }

    #[test]
    fn test_shared_axis_uses_common_length() {
        let view = WindowedSeriesView::default();
        let long = ramp(100);
        let short = ramp(30);
        let sources = [
            TraceSource::new("Robot 0", &long, "a"),
            TraceSource::new("Robot 1", &short, "a"),
        ];
        let points = view.build_window_over(30, &sources, 29, 20);
        assert_eq!(points.frames, 19..30);
        assert_eq!(points.trace("Robot 0").unwrap().points.len(), 11);
        assert_eq!(points.trace("Robot 1").unwrap().points.len(), 11);

        assert!(view.rescale_over(30, &sources, 5, 6).is_none());
        let brushed = view.rescale_over(30, &sources, 20, 80).unwrap();
        assert_eq!(brushed.frames, 20..30);
    }

    #[test]
    fn test_nearest_point_and_label() {
        let view = WindowedSeriesView::default();
        let points = view.build_window(&ramp(100), 50, 20, &["a", "b"]);
        let target = points.trace("b").unwrap().points[4];
        let nearest = WindowedSeriesView::nearest_point(&points, target.x + 0.5, target.y - 0.5).unwrap();
        assert_eq!(nearest.label, "b");
        assert_eq!(nearest.point.frame, target.frame);
    }

    #[test]
    fn test_nearest_point_empty() {
        let view = WindowedSeriesView::default();
        let points = view.build_window(&ramp(10), 5, 20, &[]);
        assert!(WindowedSeriesView::nearest_point(&points, 0.0, 0.0).is_none());
    }

    #[test]
    fn test_frame_at_pixel_round_trip() {
        let view = WindowedSeriesView::default();
        let points = view.build_window(&ramp(100), 50, 20, &["a"]);
        let p = points.traces[0].points[3];
        assert_eq!(points.frame_at(p.x + 0.01), Some(p.frame));
        assert_eq!(points.frame_at(-1_000.0), Some(points.frames.start));
        assert_eq!(points.frame_at(1e9), Some(points.frames.end - 1));
    }

    #[test]
    fn test_linear_scale_invert() {
        let scale = LinearScale::new((10.0, 20.0), (0.0, 100.0));
        assert_relative_eq!(scale.apply(15.0), 50.0);
        assert_relative_eq!(scale.invert(25.0), 12.5);
    }
}
