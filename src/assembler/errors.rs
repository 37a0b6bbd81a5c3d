// thundercast/src/assembler/errors.rs

use crate::analysis::AnalysisError;
use crate::config::OptsError;
use crate::extrapolate::ExtrapolationError;
use crate::motion::MotionEstimationError;
use crate::series::FieldSeriesError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AssemblerError {
    #[error(transparent)]
    OptsError(#[from] OptsError),
    #[error("analysis stage: {0}")]
    Analysis(#[from] AnalysisError),
    #[error("motion stage: {0}")]
    Motion(#[from] MotionEstimationError),
    #[error("extrapolation stage: {0}")]
    Extrapolation(#[from] ExtrapolationError),
    #[error("input stack: {0}")]
    Series(#[from] FieldSeriesError),
    #[error("no usable precipitation input and no template field to echo")]
    AllInputsMissing,
}
