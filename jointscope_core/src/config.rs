//! Replay configuration.
//!
//! Loaded from TOML; every field has a default so a partial file works.
//!
//! ```toml
//! sample_interval_secs = 0.0333
//! window_size = 200
//!
//! [chart]
//! container_width = 1200.0
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Line chart geometry, derived from the width of its container.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// Width of the container the chart lives in (pixels)
    pub container_width: f64,
    /// Chart width as a fraction of the container
    pub width_ratio: f64,
    /// Height as a fraction of the chart width
    pub aspect_ratio: f64,
    pub margin_top: f64,
    pub margin_right: f64,
    pub margin_bottom: f64,
    pub margin_left: f64,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            container_width: 800.0,
            width_ratio: 0.95,
            aspect_ratio: 0.5,
            margin_top: 20.0,
            margin_right: 20.0,
            margin_bottom: 30.0,
            margin_left: 30.0,
        }
    }
}

impl ChartConfig {
    /// Sizes must be finite and positive, margins finite and non-negative,
    /// and the margins must leave room for data.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let sizes = [
            ("container_width", self.container_width),
            ("width_ratio", self.width_ratio),
            ("aspect_ratio", self.aspect_ratio),
        ];
        for (name, value) in sizes {
            if !(value.is_finite() && value > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "chart.{} must be positive, got {}",
                    name, value
                )));
            }
        }
        let margins = [
            ("margin_top", self.margin_top),
            ("margin_right", self.margin_right),
            ("margin_bottom", self.margin_bottom),
            ("margin_left", self.margin_left),
        ];
        for (name, value) in margins {
            if !(value.is_finite() && value >= 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "chart.{} must be non-negative, got {}",
                    name, value
                )));
            }
        }

        let width = self.container_width * self.width_ratio;
        let height = width * self.aspect_ratio;
        if self.margin_left + self.margin_right >= width
            || self.margin_top + self.margin_bottom >= height
        {
            return Err(ConfigError::Invalid(format!(
                "chart margins leave no plot area in a {:.0}x{:.0} chart",
                width, height
            )));
        }
        Ok(())
    }
}

/// Configuration for a replay session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplayConfig {
    /// Data time per frame (recordings are uniformly sampled)
    pub sample_interval_secs: f64,

    /// Clock tick / chart redraw cadence in Hz
    pub tick_rate_hz: u32,

    /// Pose update / control pump cadence in Hz
    pub display_rate_hz: u32,

    /// Frames shown by a playback-driven chart window
    pub window_size: usize,

    /// Columns of the heatmap overview
    pub heatmap_grid_columns: usize,

    pub chart: ChartConfig,
}

impl Default for ReplayConfig {
    fn default() -> Self {
        Self {
            sample_interval_secs: 1.0 / 30.0,
            tick_rate_hz: 30,
            display_rate_hz: 60,
            window_size: 100,
            heatmap_grid_columns: 100,
            chart: ChartConfig::default(),
        }
    }
}

impl ReplayConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Rejects values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.sample_interval_secs.is_finite() && self.sample_interval_secs > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "sample_interval_secs must be positive, got {}",
                self.sample_interval_secs
            )));
        }
        match Duration::try_from_secs_f64(self.sample_interval_secs) {
            Ok(interval) if !interval.is_zero() => {}
            Ok(_) => {
                return Err(ConfigError::Invalid(format!(
                    "sample_interval_secs {} is below one nanosecond",
                    self.sample_interval_secs
                )))
            }
            Err(err) => {
                return Err(ConfigError::Invalid(format!(
                    "sample_interval_secs {}: {}",
                    self.sample_interval_secs, err
                )))
            }
        }
        if self.tick_rate_hz == 0 || self.display_rate_hz == 0 {
            return Err(ConfigError::Invalid("rates must be non-zero".to_string()));
        }
        if self.window_size == 0 {
            return Err(ConfigError::Invalid("window_size must be non-zero".to_string()));
        }
        if self.heatmap_grid_columns == 0 {
            return Err(ConfigError::Invalid(
                "heatmap_grid_columns must be non-zero".to_string(),
            ));
        }
        self.chart.validate()
    }

    /// Data time per frame. Saturates for values `validate()` rejects.
    pub fn sample_interval(&self) -> Duration {
        Duration::try_from_secs_f64(self.sample_interval_secs.max(0.0)).unwrap_or(Duration::MAX)
    }

    pub fn tick_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate_hz as f64)
    }

    pub fn display_period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.display_rate_hz as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ReplayConfig::default();
        assert_eq!(config.tick_rate_hz, 30);
        assert_eq!(config.window_size, 100);
        assert_eq!(config.heatmap_grid_columns, 100);
        assert!(config.validate().is_ok());
        assert_eq!(config.sample_interval(), Duration::from_secs_f64(1.0 / 30.0));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = ReplayConfig::from_toml_str(
            r#"
            window_size = 40

            [chart]
            container_width = 1000.0
            "#,
        )
        .unwrap();
        assert_eq!(config.window_size, 40);
        assert_eq!(config.chart.container_width, 1000.0);
        assert_eq!(config.chart.margin_left, 30.0);
        assert_eq!(config.display_rate_hz, 60);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            ReplayConfig::from_toml_str("sample_interval_secs = 0.0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ReplayConfig::from_toml_str("window_size = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            ReplayConfig::from_toml_str("window_size = \"wide\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_unrepresentable_interval_rejected() {
        for secs in [1e300, f64::INFINITY, f64::NAN, -1.0, 1e-12] {
            let config = ReplayConfig {
                sample_interval_secs: secs,
                ..ReplayConfig::default()
            };
            assert!(
                matches!(config.validate(), Err(ConfigError::Invalid(_))),
                "accepted {}",
                secs
            );
            // Never panics, even unvalidated
            let _ = config.sample_interval();
        }
    }

    #[test]
    fn test_chart_geometry_rejected() {
        let cases = [
            "[chart]\ncontainer_width = nan",
            "[chart]\ncontainer_width = inf",
            "[chart]\nwidth_ratio = 0.0",
            "[chart]\naspect_ratio = -0.5",
            "[chart]\nmargin_left = -1.0",
            "[chart]\nmargin_top = nan",
            "[chart]\ncontainer_width = 40.0",
        ];
        for raw in cases {
            assert!(
                matches!(ReplayConfig::from_toml_str(raw), Err(ConfigError::Invalid(_))),
                "accepted {:?}",
                raw
            );
        }
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            ReplayConfig::load("/definitely/not/here.toml"),
            Err(ConfigError::Io { .. })
        ));
    }
}
