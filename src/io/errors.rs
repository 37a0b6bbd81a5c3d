// thundercast/src/io/errors.rs

use crate::grid::GridError;
use crate::series::FieldSeriesError;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IoError {
    #[error("input file not found: {0}")]
    MissingInputFile(PathBuf),
    #[error("no backup source configured")]
    NoBackupConfigured,
    #[error("File IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("invalid format in {0}: {1}")]
    InvalidFormat(PathBuf, String),
    #[error("invalid timestamp '{0}': {1}")]
    InvalidTimestamp(String, chrono::ParseError),
    #[error(transparent)]
    Series(#[from] FieldSeriesError),
    #[error(transparent)]
    Grid(#[from] GridError),
}
