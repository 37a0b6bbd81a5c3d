// thundercast/src/motion/estimator.rs

use super::errors::MotionEstimationError;
use super::lucas_kanade;
use crate::config::MotionOpts;
use crate::series::FieldSeries;
use humantime::format_duration;
use log::{debug, info};
use ndarray::{s, Array2};
use ndarray_stats::QuantileExt;
use std::time::Instant;

/// Estimated horizontal displacement per time step, in grid cells. `u` is
/// the column (eastward) component, `v` the row component.
#[derive(Clone, Debug)]
pub struct MotionField {
    u: Array2<f64>,
    v: Array2<f64>,
}

impl MotionField {
    pub fn new(u: Array2<f64>, v: Array2<f64>) -> Self {
        assert_eq!(u.dim(), v.dim());
        Self { u, v }
    }

    pub fn shape(&self) -> (usize, usize) {
        self.u.dim()
    }

    pub fn u(&self) -> &Array2<f64> {
        &self.u
    }

    pub fn v(&self) -> &Array2<f64> {
        &self.v
    }

    pub fn is_finite(&self) -> bool {
        self.u.iter().all(|x| x.is_finite()) && self.v.iter().all(|x| x.is_finite())
    }
}

/// Wraps the block-flow primitive with the missing-data preprocessing the
/// primitive must never see skipped: sentinel and masked cells become NaN
/// before any gradient is computed.
pub struct MotionEstimator {
    opts: MotionOpts,
}

impl MotionEstimator {
    pub fn new(opts: MotionOpts) -> Result<Self, MotionEstimationError> {
        opts.validate()?;
        Ok(Self { opts })
    }

    /// Motion from the 3 most recent frames of `series`. Older frames are
    /// ignored; fewer than 3 is an input error.
    pub fn estimate(&self, series: &FieldSeries) -> Result<MotionField, MotionEstimationError> {
        if series.len() < 3 {
            return Err(MotionEstimationError::InsufficientHistory(series.len()));
        }
        info!(
            "estimating motion from frames {}..{} of {}",
            series.len() - 3,
            series.len() - 1,
            series.len()
        );
        let now = Instant::now();
        let clean = series.scrubbed_frames();
        let window = clean.slice(s![clean.dim().0 - 3.., .., ..]);
        let field = lucas_kanade::block_flow(window, &self.opts)?;
        if let (Ok(u_max), Ok(v_max)) = (field.u().max(), field.v().max()) {
            debug!("motion field peaks: u {:.3}, v {:.3} cells/step", u_max, v_max);
        }
        debug!(
            "motion estimation took {}",
            format_duration(now.elapsed())
        );
        Ok(field)
    }
}
