// thundercast/src/config.rs

use chrono::Duration;
use thiserror::Error;

/// Value assigned to observations inside the most recent time window.
pub const RECENT_OBS_VALUE: f64 = 100.0;
/// Value assigned to observations inside the window preceding the recent one.
pub const OLDER_OBS_VALUE: f64 = 40.0;

/// Options for the forecast sequencing itself: number of extrapolation steps
/// and the wall-clock interval between consecutive lead times.
#[derive(Clone, Debug)]
pub struct NowcastOpts {
    /// Number of extrapolated steps. The forecast sequence carries
    /// `n_steps + 1` frames, lead 0 being the seed.
    pub n_steps: usize,
    /// Interval between consecutive lead times, in minutes.
    pub step_minutes: i64,
}

impl Default for NowcastOpts {
    fn default() -> Self {
        // 4h of 15-minute leads: 0..16
        Self {
            n_steps: 16,
            step_minutes: 15,
        }
    }
}

impl NowcastOpts {
    pub fn validate(&self) -> Result<(), OptsError> {
        if self.n_steps == 0 {
            return Err(OptsError::InvalidNSteps);
        }
        if self.step_minutes <= 0 {
            return Err(OptsError::InvalidStepMinutes(self.step_minutes));
        }
        Ok(())
    }

    pub fn step(&self) -> Duration {
        Duration::minutes(self.step_minutes)
    }
}

/// Options for the observation analysis: age-bucket windows and the optimal
/// interpolation parameters.
#[derive(Clone, Debug)]
pub struct AnalysisOpts {
    /// Width of the "recent" observation window, in minutes, counted back
    /// from the analysis time.
    pub obs_time_window: i64,
    /// Width of the "older" window immediately preceding the recent one.
    /// `None` means the same width as `obs_time_window`.
    pub older_window: Option<i64>,
    /// Horizontal decorrelation length scale of the structure function, in
    /// meters.
    pub horizontal_scale_m: f64,
    /// Elevation decorrelation length scale of the structure function, in
    /// meters. Station elevations are not modeled for lightning, so this
    /// only matters if a nonzero-elevation observation slips through.
    pub elevation_scale_m: f64,
    /// Observation-to-background error-variance ratio, applied uniformly to
    /// every observation.
    pub variance_ratio: f64,
    /// Maximum number of observations influencing a single grid cell.
    pub max_neighbors: usize,
    /// Analysis values below 10 are rewritten to this floor to suppress
    /// interpolation noise below a meaningful probability.
    pub noise_floor: f64,
}

impl Default for AnalysisOpts {
    fn default() -> Self {
        Self {
            obs_time_window: 15,
            older_window: None,
            horizontal_scale_m: 20_500.0,
            elevation_scale_m: 200.0,
            variance_ratio: 0.1,
            max_neighbors: 20,
            noise_floor: 0.0,
        }
    }
}

impl AnalysisOpts {
    pub fn validate(&self) -> Result<(), OptsError> {
        if self.obs_time_window <= 0 {
            return Err(OptsError::InvalidObsTimeWindow(self.obs_time_window));
        }
        if let Some(older) = self.older_window {
            if older <= 0 {
                return Err(OptsError::InvalidObsTimeWindow(older));
            }
        }
        if self.horizontal_scale_m <= 0.0 {
            return Err(OptsError::InvalidLengthScale(self.horizontal_scale_m));
        }
        if self.elevation_scale_m <= 0.0 {
            return Err(OptsError::InvalidLengthScale(self.elevation_scale_m));
        }
        if self.variance_ratio <= 0.0 {
            return Err(OptsError::InvalidVarianceRatio(self.variance_ratio));
        }
        if self.max_neighbors == 0 {
            return Err(OptsError::InvalidMaxNeighbors);
        }
        if self.noise_floor < 0.0 || self.noise_floor > 10.0 {
            return Err(OptsError::InvalidNoiseFloor(self.noise_floor));
        }
        Ok(())
    }

    pub fn recent_window(&self) -> Duration {
        Duration::minutes(self.obs_time_window)
    }

    pub fn older_window(&self) -> Duration {
        Duration::minutes(self.older_window.unwrap_or(self.obs_time_window))
    }
}

/// Options for the block-flow motion estimator.
#[derive(Clone, Debug)]
pub struct MotionOpts {
    /// Side length of the square interrogation blocks, in grid cells.
    pub block_size: usize,
    /// Minimum number of trackable blocks required for a usable estimate.
    pub min_tracked_blocks: usize,
    /// Smallest acceptable eigenvalue of the block structure tensor; blocks
    /// below it carry no trackable texture.
    pub min_eigenvalue: f64,
}

impl Default for MotionOpts {
    fn default() -> Self {
        Self {
            block_size: 16,
            min_tracked_blocks: 6,
            min_eigenvalue: 1e-4,
        }
    }
}

impl MotionOpts {
    pub fn validate(&self) -> Result<(), OptsError> {
        if self.block_size < 2 {
            return Err(OptsError::InvalidBlockSize(self.block_size));
        }
        if self.min_tracked_blocks == 0 {
            return Err(OptsError::InvalidMinTrackedBlocks);
        }
        if !(self.min_eigenvalue > 0.0) {
            return Err(OptsError::InvalidMinEigenvalue(self.min_eigenvalue));
        }
        Ok(())
    }
}

#[derive(Error, Debug)]
pub enum OptsError {
    #[error("n_steps must be > 0")]
    InvalidNSteps,
    #[error("step_minutes must be > 0, but got {0}")]
    InvalidStepMinutes(i64),
    #[error("observation time window must be > 0 minutes, but got {0}")]
    InvalidObsTimeWindow(i64),
    #[error("structure function length scale must be > 0 m, but got {0}")]
    InvalidLengthScale(f64),
    #[error("variance ratio must be > 0, but got {0}")]
    InvalidVarianceRatio(f64),
    #[error("max_neighbors must be >= 1")]
    InvalidMaxNeighbors,
    #[error("noise floor must be in [0, 10], but got {0}")]
    InvalidNoiseFloor(f64),
    #[error("block_size must be >= 2, but got {0}")]
    InvalidBlockSize(usize),
    #[error("min_tracked_blocks must be >= 1")]
    InvalidMinTrackedBlocks,
    #[error("min_eigenvalue must be > 0, but got {0}")]
    InvalidMinEigenvalue(f64),
}
