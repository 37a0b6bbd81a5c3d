// thundercast/src/io/mod.rs

mod csv_files;
mod errors;

pub use csv_files::{
    read_grid, read_observations, read_series, CsvForecastWriter, CsvSeriesSource,
};
pub use errors::IoError;

use crate::assembler::ForecastSequence;
use crate::series::FieldSeries;
use chrono::{DateTime, Duration, Utc};

/// Source of the gridded precipitation-rate history. The operational
/// implementation decodes the gridded binary exchange format; the core only
/// sees frames, masks and timestamps.
pub trait SeriesProvider {
    /// Number of primary input frames expected for one run.
    fn primary_slots(&self) -> usize;
    /// One primary frame slot, oldest first.
    fn fetch_slot(&self, slot: usize) -> Result<FieldSeries, IoError>;
    /// The single backup source covering the full history window.
    fn fetch_backup(&self) -> Result<FieldSeries, IoError>;
}

/// Metadata reused for every output frame of one run.
///
/// Built once per run and passed explicitly to each write call; this is
/// deliberately a value, not process-wide state.
#[derive(Clone, Debug)]
pub struct OutputTemplate {
    pub analysis_time: DateTime<Utc>,
    pub step_minutes: i64,
    pub parameter: String,
    pub shape: (usize, usize),
}

impl OutputTemplate {
    pub fn new(
        analysis_time: DateTime<Utc>,
        step_minutes: i64,
        parameter: impl Into<String>,
        shape: (usize, usize),
    ) -> Self {
        Self {
            analysis_time,
            step_minutes,
            parameter: parameter.into(),
            shape,
        }
    }

    /// Valid time of lead `index`.
    pub fn lead_time(&self, index: usize) -> DateTime<Utc> {
        self.analysis_time + Duration::minutes(self.step_minutes * index as i64)
    }
}

/// Sink for the finished forecast. Frames are handed over in increasing
/// lead-time order with no gaps; all encoding is the implementation's
/// concern.
pub trait ForecastWriter {
    fn write(
        &mut self,
        template: &OutputTemplate,
        sequence: &ForecastSequence,
    ) -> Result<(), IoError>;
}
