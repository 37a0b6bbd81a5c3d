// thundercast/src/analysis/errors.rs

use crate::config::OptsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AnalysisError {
    #[error("Unitialized field on AnalysisBuilder: {0}")]
    UninitializedFieldError(String),
    #[error(transparent)]
    OptsError(#[from] OptsError),
    #[error("no observations in either age bucket")]
    NoObservations,
}
