// thundercast/src/io/csv_files.rs

use super::errors::IoError;
use super::{ForecastWriter, OutputTemplate, SeriesProvider};
use crate::assembler::ForecastSequence;
use crate::grid::Grid;
use crate::observations::ObservationReport;
use crate::series::{FieldSeries, FieldSeriesBuilder};
use chrono::{DateTime, Utc};
use csv::{ReaderBuilder, StringRecord, WriterBuilder};
use log::{debug, info};
use ndarray::Array2;
use std::path::{Path, PathBuf};

/// Plain-table renditions of the exchange files, one value row per grid
/// row. A frame is a metadata record `time,rows,cols` followed by `rows`
/// records of `cols` values; a file may carry several frames back to back.
/// The gridded binary format of the operational chain is handled by an
/// external collaborator and never enters the core.
pub fn read_series(path: &Path) -> Result<FieldSeries, IoError> {
    if !path.exists() {
        return Err(IoError::MissingInputFile(path.to_path_buf()));
    }
    info!("reading {}", path.display());
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;

    let mut builder = FieldSeriesBuilder::default();
    let mut records = reader.records();
    while let Some(record) = records.next() {
        let record = record?;
        let (time, rows, cols) = parse_frame_meta(path, &record)?;
        let mut frame = Array2::zeros((rows, cols));
        for row in 0..rows {
            let record = records.next().ok_or_else(|| {
                IoError::InvalidFormat(
                    path.to_path_buf(),
                    format!("frame truncated at row {} of {}", row, rows),
                )
            })??;
            if record.len() != cols {
                return Err(IoError::InvalidFormat(
                    path.to_path_buf(),
                    format!("expected {} columns, got {}", cols, record.len()),
                ));
            }
            for (col, cell) in record.iter().enumerate() {
                frame[[row, col]] = parse_value(path, cell)?;
            }
        }
        builder.push_frame_with_sentinel_mask(frame, time);
    }
    let series = builder.build()?;
    debug!(
        "read {} frames of {:?} from {}",
        series.len(),
        series.shape(),
        path.display()
    );
    Ok(series)
}

/// Grid coordinate table: a `rows,cols` record followed by `rows * cols`
/// records of `latitude,longitude`, row-major.
pub fn read_grid(path: &Path) -> Result<Grid, IoError> {
    if !path.exists() {
        return Err(IoError::MissingInputFile(path.to_path_buf()));
    }
    let mut reader = ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_path(path)?;
    let mut records = reader.records();
    let meta = records
        .next()
        .ok_or_else(|| IoError::InvalidFormat(path.to_path_buf(), "empty grid file".into()))??;
    if meta.len() != 2 {
        return Err(IoError::InvalidFormat(
            path.to_path_buf(),
            "grid metadata record must be rows,cols".into(),
        ));
    }
    let rows = parse_count(path, &meta[0])?;
    let cols = parse_count(path, &meta[1])?;

    let mut latitudes = Array2::zeros((rows, cols));
    let mut longitudes = Array2::zeros((rows, cols));
    for index in 0..rows * cols {
        let record = records.next().ok_or_else(|| {
            IoError::InvalidFormat(
                path.to_path_buf(),
                format!("grid truncated at cell {} of {}", index, rows * cols),
            )
        })??;
        let (row, col) = (index / cols, index % cols);
        latitudes[[row, col]] = parse_value(path, &record[0])?;
        longitudes[[row, col]] = parse_value(path, &record[1])?;
    }
    Ok(Grid::new(latitudes, longitudes)?)
}

/// Observation table with a `latitude,longitude,time` header.
pub fn read_observations(path: &Path) -> Result<Vec<ObservationReport>, IoError> {
    if !path.exists() {
        return Err(IoError::MissingInputFile(path.to_path_buf()));
    }
    let mut reader = ReaderBuilder::new().has_headers(true).from_path(path)?;
    let headers = reader.headers()?.clone();
    let latitude_col = column(path, &headers, "latitude")?;
    let longitude_col = column(path, &headers, "longitude")?;
    let time_col = column(path, &headers, "time")?;

    let mut reports = Vec::new();
    for record in reader.records() {
        let record = record?;
        reports.push(ObservationReport {
            latitude: parse_value(path, &record[latitude_col])?,
            longitude: parse_value(path, &record[longitude_col])?,
            time: parse_time(&record[time_col])?,
        });
    }
    info!("read {} observation reports from {}", reports.len(), path.display());
    Ok(reports)
}

/// Primary frame files (oldest first) plus the optional single backup file.
pub struct CsvSeriesSource {
    primary: Vec<PathBuf>,
    backup: Option<PathBuf>,
}

impl CsvSeriesSource {
    pub fn new(primary: Vec<PathBuf>, backup: Option<PathBuf>) -> Self {
        Self { primary, backup }
    }
}

impl SeriesProvider for CsvSeriesSource {
    fn primary_slots(&self) -> usize {
        self.primary.len()
    }

    fn fetch_slot(&self, slot: usize) -> Result<FieldSeries, IoError> {
        read_series(&self.primary[slot])
    }

    fn fetch_backup(&self) -> Result<FieldSeries, IoError> {
        match &self.backup {
            Some(path) => read_series(path),
            None => Err(IoError::NoBackupConfigured),
        }
    }
}

/// Writes the forecast in the same frame-table layout the readers consume,
/// leads in increasing order.
pub struct CsvForecastWriter {
    path: PathBuf,
}

impl CsvForecastWriter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

impl ForecastWriter for CsvForecastWriter {
    fn write(
        &mut self,
        template: &OutputTemplate,
        sequence: &ForecastSequence,
    ) -> Result<(), IoError> {
        let mut writer = WriterBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_path(&self.path)?;
        let (rows, cols) = template.shape;
        for lead in 0..sequence.n_frames() {
            writer.write_record([
                template.lead_time(lead).to_rfc3339(),
                rows.to_string(),
                cols.to_string(),
            ])?;
            let frame = sequence.frame(lead);
            for row in 0..rows {
                let fields: Vec<String> =
                    (0..cols).map(|col| frame[[row, col]].to_string()).collect();
                writer.write_record(&fields)?;
            }
        }
        writer.flush()?;
        info!(
            "wrote {} {} frames to {}",
            sequence.n_frames(),
            template.parameter,
            self.path.display()
        );
        Ok(())
    }
}

fn parse_frame_meta(
    path: &Path,
    record: &StringRecord,
) -> Result<(DateTime<Utc>, usize, usize), IoError> {
    if record.len() != 3 {
        return Err(IoError::InvalidFormat(
            path.to_path_buf(),
            "frame metadata record must be time,rows,cols".into(),
        ));
    }
    Ok((
        parse_time(&record[0])?,
        parse_count(path, &record[1])?,
        parse_count(path, &record[2])?,
    ))
}

fn parse_time(text: &str) -> Result<DateTime<Utc>, IoError> {
    DateTime::parse_from_rfc3339(text)
        .map(|time| time.with_timezone(&Utc))
        .map_err(|err| IoError::InvalidTimestamp(text.to_string(), err))
}

fn parse_value(path: &Path, text: &str) -> Result<f64, IoError> {
    text.trim().parse::<f64>().map_err(|_| {
        IoError::InvalidFormat(path.to_path_buf(), format!("not a number: '{}'", text))
    })
}

fn parse_count(path: &Path, text: &str) -> Result<usize, IoError> {
    text.trim().parse::<usize>().map_err(|_| {
        IoError::InvalidFormat(path.to_path_buf(), format!("not a count: '{}'", text))
    })
}

fn column(path: &Path, headers: &StringRecord, name: &str) -> Result<usize, IoError> {
    headers.iter().position(|header| header == name).ok_or_else(|| {
        IoError::InvalidFormat(path.to_path_buf(), format!("missing column '{}'", name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NowcastOpts;
    use chrono::TimeZone;
    use ndarray::Array3;
    use std::fs;

    fn scratch(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("thundercast-io-{}", name))
    }

    #[test]
    fn missing_series_file_is_reported_as_missing() {
        let err = read_series(Path::new("/nonexistent/rprate.csv")).unwrap_err();
        assert!(matches!(err, IoError::MissingInputFile(_)));
    }

    #[test]
    fn series_roundtrip_through_the_writer() {
        let path = scratch("roundtrip.csv");
        let analysis_time = Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap();
        let opts = NowcastOpts::default();
        let frames = Array3::from_shape_fn((3, 2, 2), |(t, r, c)| (t * 4 + r * 2 + c) as f64);
        let sequence = ForecastSequence::new(frames.clone(), analysis_time, opts.step());
        let template = OutputTemplate::new(analysis_time, opts.step_minutes, "pot", (2, 2));

        CsvForecastWriter::new(path.clone())
            .write(&template, &sequence)
            .unwrap();
        let series = read_series(&path).unwrap();
        fs::remove_file(&path).unwrap();

        assert_eq!(series.len(), 3);
        assert_eq!(series.shape(), (2, 2));
        assert_eq!(series.times()[0], analysis_time);
        assert_eq!(series.frames(), &frames);
    }

    #[test]
    fn observation_table_parses_headers() {
        let path = scratch("obs.csv");
        fs::write(
            &path,
            "latitude,longitude,time\n60.1,25.2,2023-06-01T11:55:00+00:00\n",
        )
        .unwrap();
        let reports = read_observations(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(reports.len(), 1);
        assert_eq!(reports[0].latitude, 60.1);
        assert_eq!(reports[0].longitude, 25.2);
    }

    #[test]
    fn grid_roundtrip() {
        let path = scratch("grid.csv");
        fs::write(&path, "2,2\n60.0,25.0\n60.0,25.1\n60.1,25.0\n60.1,25.1\n").unwrap();
        let grid = read_grid(&path).unwrap();
        fs::remove_file(&path).unwrap();
        assert_eq!(grid.shape(), (2, 2));
        assert_eq!(grid.latitudes()[[1, 0]], 60.1);
        assert_eq!(grid.longitudes()[[0, 1]], 25.1);
    }
}
