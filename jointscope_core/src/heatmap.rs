//! HeatmapAggregator - whole-session overview of one series.
//!
//! Bins the frame axis into `grid_columns` equal buckets and averages each
//! channel per bucket. Independent of the playback clock; re-run whenever
//! the selected robot or its series changes. O(len × channels).

use std::f64::consts::PI;

use palette::{Mix, Srgb};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::series::Series;

/// Legend ticks shown next to the grid (radians).
pub const LEGEND_TICKS: [f64; 7] = [-3.0, -2.0, -1.0, 0.0, 1.0, 2.0, 3.0];

/// Column label spacing.
pub const LABEL_EVERY: usize = 10;

/// One cell of the overview.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HeatmapCell {
    pub column: usize,
    pub row: usize,
    pub value: f64,
}

/// A `columns × rows` grid of bucket means, one row per channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeatmapGrid {
    pub columns: usize,
    pub bucket_size: usize,
    pub rows: Vec<String>,
    /// Row-major: all columns of row 0, then row 1, ...
    pub cells: Vec<HeatmapCell>,
}

impl HeatmapGrid {
    /// Cell at `(column, row)`.
    pub fn cell(&self, column: usize, row: usize) -> Option<&HeatmapCell> {
        if column >= self.columns || row >= self.rows.len() {
            return None;
        }
        self.cells.get(row * self.columns + column)
    }

    /// The cells of one channel row, in column order.
    pub fn row(&self, row: usize) -> &[HeatmapCell] {
        let start = (row * self.columns).min(self.cells.len());
        let end = (start + self.columns).min(self.cells.len());
        &self.cells[start..end]
    }

    /// Column indices that carry an axis label (every tenth column).
    pub fn column_labels(&self) -> Vec<usize> {
        (0..self.columns / LABEL_EVERY).map(|i| i * LABEL_EVERY).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Bucketed mean aggregator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeatmapAggregator {
    grid_columns: usize,
}

impl HeatmapAggregator {
    pub fn new(grid_columns: usize) -> Self {
        Self { grid_columns }
    }

    pub fn grid_columns(&self) -> usize {
        self.grid_columns
    }

    /// Aggregates `channels` of `series`.
    ///
    /// Bucket size is `floor(len / grid_columns)`; trailing remainder frames
    /// are dropped. Missing samples count as zero. Buckets that are empty
    /// (series shorter than the grid) produce zero. Channels the series does
    /// not carry are skipped.
    pub fn process(&self, series: &Series, channels: &[&str]) -> HeatmapGrid {
        let columns = self.grid_columns;
        let bucket_size = if columns == 0 { 0 } else { series.len() / columns };

        let present: Vec<(&str, usize)> = channels
            .iter()
            .filter_map(|name| series.channel_index(name).map(|idx| (*name, idx)))
            .collect();

        let mut cells = Vec::with_capacity(columns * present.len());
        for (row, (_, idx)) in present.iter().enumerate() {
            for column in 0..columns {
                let value = if bucket_size == 0 {
                    0.0
                } else {
                    let start = column * bucket_size;
                    let sum: f64 = series.frames()[start..start + bucket_size]
                        .iter()
                        .map(|frame| frame.value_or_zero(*idx))
                        .sum();
                    sum / bucket_size as f64
                };
                cells.push(HeatmapCell { column, row, value });
            }
        }

        debug!(
            "Heatmap: {} frames -> {} columns x {} rows (bucket {})",
            series.len(),
            columns,
            present.len(),
            bucket_size
        );

        HeatmapGrid {
            columns,
            bucket_size,
            rows: present.into_iter().map(|(name, _)| name.to_string()).collect(),
            cells,
        }
    }
}

/// Red-white-blue diverging colour scale over a fixed domain.
///
/// Out-of-domain values clamp to the end colours.
#[derive(Debug, Clone, PartialEq)]
pub struct DivergingColorScale {
    domain: (f64, f64),
    stops: Vec<Srgb<f32>>,
}

/// ColorBrewer RdBu, red (low) to blue (high).
const RDBU: [(u8, u8, u8); 11] = [
    (0x67, 0x00, 0x1f),
    (0xb2, 0x18, 0x2b),
    (0xd6, 0x60, 0x4d),
    (0xf4, 0xa5, 0x82),
    (0xfd, 0xdb, 0xc7),
    (0xf7, 0xf7, 0xf7),
    (0xd1, 0xe5, 0xf0),
    (0x92, 0xc5, 0xde),
    (0x43, 0x93, 0xc3),
    (0x21, 0x66, 0xac),
    (0x05, 0x30, 0x61),
];

impl DivergingColorScale {
    /// RdBu over `[-π, π]`, the joint-angle range.
    pub fn joint_angles() -> Self {
        Self::rdbu((-PI, PI))
    }

    /// RdBu over an arbitrary domain.
    pub fn rdbu(domain: (f64, f64)) -> Self {
        let stops = RDBU
            .iter()
            .map(|(r, g, b)| Srgb::new(*r, *g, *b).into_format::<f32>())
            .collect();
        Self { domain, stops }
    }

    pub fn domain(&self) -> (f64, f64) {
        self.domain
    }

    /// Position of `value` in the domain, clamped to `[0, 1]`. NaN maps to
    /// the midpoint.
    pub fn normalize(&self, value: f64) -> f64 {
        let (lo, hi) = self.domain;
        if value.is_nan() || hi == lo {
            return 0.5;
        }
        ((value - lo) / (hi - lo)).clamp(0.0, 1.0)
    }

    /// Colour for a value.
    pub fn color(&self, value: f64) -> Srgb<u8> {
        let t = self.normalize(value) * (self.stops.len() - 1) as f64;
        let lower = t.floor() as usize;
        let upper = (lower + 1).min(self.stops.len() - 1);
        let factor = (t - lower as f64) as f32;
        self.stops[lower]
            .mix(self.stops[upper], factor)
            .into_format::<u8>()
    }

    /// Legend entries: tick value and its colour.
    pub fn legend(&self) -> Vec<(f64, Srgb<u8>)> {
        LEGEND_TICKS.iter().map(|v| (*v, self.color(*v))).collect()
    }
}

impl Default for DivergingColorScale {
    fn default() -> Self {
        Self::joint_angles()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn series(len: usize) -> Series {
        Series::from_rows(
            ["a", "b"],
            (0..len).map(|f| vec![f as f64, 1.0]).collect(),
        )
    }

    #[test]
    fn test_bucket_means() {
        // 10 frames, 3 columns -> buckets of 3, frame 9 dropped
        let grid = HeatmapAggregator::new(3).process(&series(10), &["a", "b"]);
        assert_eq!(grid.bucket_size, 3);
        assert_eq!(grid.rows, vec!["a", "b"]);
        assert_eq!(grid.cells.len(), 6);
        assert_relative_eq!(grid.cell(0, 0).unwrap().value, 1.0);
        assert_relative_eq!(grid.cell(1, 0).unwrap().value, 4.0);
        assert_relative_eq!(grid.cell(2, 0).unwrap().value, 7.0);
        assert_relative_eq!(grid.cell(2, 1).unwrap().value, 1.0);
    }

    #[test]
    fn test_cell_order_is_row_major() {
        let grid = HeatmapAggregator::new(4).process(&series(8), &["a", "b"]);
        let coords: Vec<(usize, usize)> = grid.cells.iter().map(|c| (c.column, c.row)).collect();
        assert_eq!(coords[..5], [(0, 0), (1, 0), (2, 0), (3, 0), (0, 1)]);
        assert_eq!(grid.row(1).len(), 4);
    }

    #[test]
    fn test_missing_values_count_as_zero() {
        let s = Series::from_rows(["a"], vec![vec![2.0], vec![f64::NAN]]);
        let grid = HeatmapAggregator::new(1).process(&s, &["a"]);
        assert_relative_eq!(grid.cell(0, 0).unwrap().value, 1.0);
    }

    #[test]
    fn test_short_series_yields_zero_cells() {
        let grid = HeatmapAggregator::new(100).process(&series(5), &["a"]);
        assert_eq!(grid.bucket_size, 0);
        assert_eq!(grid.cells.len(), 100);
        assert!(grid.cells.iter().all(|c| c.value == 0.0));
    }

    #[test]
    fn test_unknown_channels_skipped() {
        let grid = HeatmapAggregator::new(2).process(&series(4), &["nope", "b"]);
        assert_eq!(grid.rows, vec!["b"]);
    }

    #[test]
    fn test_column_labels() {
        let grid = HeatmapAggregator::new(100).process(&series(200), &["a"]);
        assert_eq!(grid.column_labels(), vec![0, 10, 20, 30, 40, 50, 60, 70, 80, 90]);
    }

    #[test]
    fn test_color_scale_clamps_and_diverges() {
        let scale = DivergingColorScale::joint_angles();
        assert_eq!(scale.color(-PI), Srgb::new(0x67, 0x00, 0x1f));
        assert_eq!(scale.color(-100.0), scale.color(-PI));
        assert_eq!(scale.color(PI), Srgb::new(0x05, 0x30, 0x61));
        assert_eq!(scale.color(0.0), Srgb::new(0xf7, 0xf7, 0xf7));
        assert_relative_eq!(scale.normalize(f64::NAN), 0.5);
    }

    #[test]
    fn test_legend_has_seven_ticks() {
        let legend = DivergingColorScale::default().legend();
        assert_eq!(legend.len(), 7);
        assert_eq!(legend[3].0, 0.0);
    }
}
