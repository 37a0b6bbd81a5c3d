// thundercast/src/extrapolate/errors.rs

use crate::config::OptsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExtrapolationError {
    #[error(transparent)]
    OptsError(#[from] OptsError),
    #[error("seed field shape {0:?} does not match motion field shape {1:?}")]
    ShapeMismatch((usize, usize), (usize, usize)),
    #[error("extrapolation failed: {0}")]
    ExtrapolationFailed(String),
}
