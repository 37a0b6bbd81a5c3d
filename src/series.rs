// thundercast/src/series.rs

use chrono::{DateTime, Utc};
use log::debug;
use ndarray::{Array2, Array3, ArrayView2, Axis};
use thiserror::Error;

/// Reserved value denoting "no data" in the gridded input. Always normalized
/// to NaN before numeric processing.
pub const MISSING_SENTINEL: f64 = 9999.0;

/// An ordered time series of 2-D scalar fields with a parallel validity mask
/// and per-frame timestamps, oldest first.
#[derive(Clone, Debug)]
pub struct FieldSeries {
    frames: Array3<f64>,
    mask: Array3<bool>,
    times: Vec<DateTime<Utc>>,
}

impl FieldSeries {
    pub fn len(&self) -> usize {
        self.frames.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn shape(&self) -> (usize, usize) {
        let (_, rows, cols) = self.frames.dim();
        (rows, cols)
    }

    pub fn frames(&self) -> &Array3<f64> {
        &self.frames
    }

    pub fn mask(&self) -> &Array3<bool> {
        &self.mask
    }

    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }

    pub fn frame(&self, index: usize) -> ArrayView2<f64> {
        self.frames.index_axis(Axis(0), index)
    }

    pub fn latest_frame(&self) -> ArrayView2<f64> {
        self.frames.index_axis(Axis(0), self.len() - 1)
    }

    pub fn latest_time(&self) -> DateTime<Utc> {
        self.times[self.times.len() - 1]
    }

    /// Working copy of the frames with every missing cell rewritten to NaN.
    ///
    /// A cell is missing when the mask marks it invalid or when it still
    /// carries the input sentinel. Re-running on already-clean data is a
    /// no-op: NaN cells stay NaN.
    pub fn scrubbed_frames(&self) -> Array3<f64> {
        let mut clean = self.frames.clone();
        let mut rewritten = 0usize;
        for (value, &valid) in clean.iter_mut().zip(self.mask.iter()) {
            if !valid || *value == MISSING_SENTINEL {
                *value = f64::NAN;
                rewritten += 1;
            }
        }
        debug!(
            "scrubbed {} of {} cells to NaN across {} frames",
            rewritten,
            clean.len(),
            self.len()
        );
        clean
    }
}

/// Accumulates frames one at a time, then validates the series invariants.
#[derive(Default)]
pub struct FieldSeriesBuilder {
    frames: Vec<Array2<f64>>,
    masks: Vec<Array2<bool>>,
    times: Vec<DateTime<Utc>>,
}

impl FieldSeriesBuilder {
    pub fn push_frame(
        &mut self,
        frame: Array2<f64>,
        mask: Array2<bool>,
        time: DateTime<Utc>,
    ) -> &mut Self {
        self.frames.push(frame);
        self.masks.push(mask);
        self.times.push(time);
        self
    }

    /// Derives the validity mask from the sentinel alone.
    pub fn push_frame_with_sentinel_mask(
        &mut self,
        frame: Array2<f64>,
        time: DateTime<Utc>,
    ) -> &mut Self {
        let mask = frame.mapv(|v| v != MISSING_SENTINEL && v.is_finite());
        self.push_frame(frame, mask, time)
    }

    pub fn build(&self) -> Result<FieldSeries, FieldSeriesError> {
        if self.frames.is_empty() {
            return Err(FieldSeriesError::EmptySeries);
        }
        let shape = self.frames[0].dim();
        for (i, frame) in self.frames.iter().enumerate() {
            if frame.dim() != shape {
                return Err(FieldSeriesError::FrameShapeMismatch(i, shape, frame.dim()));
            }
        }
        for (i, mask) in self.masks.iter().enumerate() {
            if mask.dim() != shape {
                return Err(FieldSeriesError::MaskShapeMismatch(i, shape, mask.dim()));
            }
        }
        for pair in self.times.windows(2) {
            if pair[1] <= pair[0] {
                return Err(FieldSeriesError::NonIncreasingTimestamps(pair[0], pair[1]));
            }
        }

        let (rows, cols) = shape;
        let t = self.frames.len();
        let mut frames = Array3::zeros((t, rows, cols));
        let mut mask = Array3::from_elem((t, rows, cols), false);
        for (i, (frame, frame_mask)) in self.frames.iter().zip(self.masks.iter()).enumerate() {
            frames.index_axis_mut(Axis(0), i).assign(frame);
            mask.index_axis_mut(Axis(0), i).assign(frame_mask);
        }
        Ok(FieldSeries {
            frames,
            mask,
            times: self.times.clone(),
        })
    }
}

#[derive(Error, Debug)]
pub enum FieldSeriesError {
    #[error("a field series requires at least one frame")]
    EmptySeries,
    #[error("frame {0} has shape {2:?} but the series shape is {1:?}")]
    FrameShapeMismatch(usize, (usize, usize), (usize, usize)),
    #[error("mask {0} has shape {2:?} but the series shape is {1:?}")]
    MaskShapeMismatch(usize, (usize, usize), (usize, usize)),
    #[error("timestamps must be strictly increasing, but got {0} followed by {1}")]
    NonIncreasingTimestamps(DateTime<Utc>, DateTime<Utc>),
}
