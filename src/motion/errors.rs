// thundercast/src/motion/errors.rs

use crate::config::OptsError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum MotionEstimationError {
    #[error(transparent)]
    OptsError(#[from] OptsError),
    #[error("motion estimation requires at least 3 frames, but got {0}")]
    InsufficientHistory(usize),
    #[error("motion estimation failed: {0}")]
    MotionEstimationFailed(#[from] BlockFlowError),
}

#[derive(Error, Debug)]
pub enum BlockFlowError {
    #[error("only {found} trackable blocks in the frame window, at least {required} required")]
    NotEnoughTrackableBlocks { found: usize, required: usize },
}
