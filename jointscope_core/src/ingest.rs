//! CSV ingestion boundary.
//!
//! The header row names the channels (joint names plus `pos_0..2` and
//! `rot_0..2`); every following row is one frame. Only trailing blank rows,
//! like the one most exporters write, are discarded; a blank row between
//! frames is a frame of missing values so robots stay aligned frame for
//! frame. Cells that do not parse as floating point are kept as NaN so
//! consumers can apply their own missing-value policy.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::series::{Frame, Series};

/// Ingestion errors.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to open movement file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed CSV: {0}")]
    Csv(#[from] csv::Error),

    #[error("Movement has no header row")]
    MissingHeader,

    #[error("Movement has no data rows")]
    NoFrames,
}

/// Summary of a parse, for diagnostics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    pub frames: usize,
    pub channels: usize,
    pub unparseable_cells: usize,
}

/// Parses a movement CSV into a series.
pub fn parse_movement<R: Read>(reader: R) -> Result<(Series, IngestReport), IngestError> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let channels: Vec<String> = rdr.headers()?.iter().map(str::to_string).collect();
    if channels.iter().all(String::is_empty) {
        return Err(IngestError::MissingHeader);
    }

    let mut frames = Vec::new();
    let mut unparseable_cells = 0;
    // Widths of blank rows not yet known to be interior
    let mut pending_blank: Vec<usize> = Vec::new();
    for record in rdr.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            pending_blank.push(record.len());
            continue;
        }
        for width in pending_blank.drain(..) {
            unparseable_cells += width;
            frames.push(Frame::new(vec![f64::NAN; width]));
        }
        let values = record
            .iter()
            .map(|cell| {
                cell.parse::<f64>().unwrap_or_else(|_| {
                    unparseable_cells += 1;
                    f64::NAN
                })
            })
            .collect();
        frames.push(Frame::new(values));
    }

    if !pending_blank.is_empty() {
        debug!("Dropped {} trailing blank rows", pending_blank.len());
    }
    if frames.is_empty() {
        return Err(IngestError::NoFrames);
    }

    let series = Series::new(channels, frames);
    let report = IngestReport {
        frames: series.len(),
        channels: series.channels().len(),
        unparseable_cells,
    };
    if unparseable_cells > 0 {
        warn!(
            "{} unparseable cells in movement; they read as zero for pose and hold-last for charts",
            unparseable_cells
        );
    }
    Ok((series, report))
}

/// Opens and parses a movement file.
pub fn load_movement_file(path: impl AsRef<Path>) -> Result<(Series, IngestReport), IngestError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| IngestError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let (series, report) = parse_movement(file)?;
    info!(
        "Loaded movement {} ({} frames, {} channels)",
        path.display(),
        report.frames,
        report.channels
    );
    Ok((series, report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_with_trailing_blank_row() {
        let csv = "hip,knee,pos_0,pos_1,pos_2\n0.1,0.2,1,2,3\n0.3,0.4,1,2,3\n\n";
        let (series, report) = parse_movement(csv.as_bytes()).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(report.channels, 5);
        assert_eq!(series.joint_channels(), vec!["hip", "knee"]);
        assert_eq!(series.raw(1, "knee"), 0.4);
    }

    #[test]
    fn test_interior_blank_row_is_a_missing_frame() {
        let (series, report) = parse_movement("a,b\n1,1\n,\n3,3\n".as_bytes()).unwrap();
        assert_eq!(series.len(), 3);
        assert_eq!(report.unparseable_cells, 2);
        assert!(series.raw(1, "a").is_nan());
        assert!(series.raw(1, "b").is_nan());
        assert_eq!(series.raw(2, "a"), 3.0);
    }

    #[test]
    fn test_trailing_separator_rows_dropped() {
        let (series, report) = parse_movement("a,b\n1,1\n2,2\n,\n,\n".as_bytes()).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(report.unparseable_cells, 0);
    }

    #[test]
    fn test_unparseable_cells_become_nan() {
        let csv = "a,b\n1,oops\n2,\n";
        let (series, report) = parse_movement(csv.as_bytes()).unwrap();
        assert_eq!(report.unparseable_cells, 2);
        assert!(series.raw(0, "b").is_nan());
        assert_eq!(series.frame(1).unwrap().value_or_zero(1), 0.0);
    }

    #[test]
    fn test_short_rows_padded() {
        let csv = "a,b,c\n1,2\n";
        let (series, _) = parse_movement(csv.as_bytes()).unwrap();
        assert!(series.raw(0, "c").is_nan());
    }

    #[test]
    fn test_header_only_is_error() {
        assert!(matches!(
            parse_movement("a,b\n".as_bytes()),
            Err(IngestError::NoFrames)
        ));
    }

    #[test]
    fn test_empty_input_is_error() {
        assert!(matches!(
            parse_movement("".as_bytes()),
            Err(IngestError::MissingHeader)
        ));
    }

    #[test]
    fn test_missing_file() {
        assert!(matches!(
            load_movement_file("/no/such/movement.csv"),
            Err(IngestError::Io { .. })
        ));
    }
}
