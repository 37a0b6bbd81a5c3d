// thundercast/src/assembler/forecast.rs

use chrono::{DateTime, Duration, Utc};
use ndarray::{Array3, ArrayView2, Axis};

/// The finished product: `n_steps + 1` frames at a fixed lead-time
/// interval, lead 0 stamped with the analysis time.
#[derive(Clone, Debug)]
pub struct ForecastSequence {
    frames: Array3<f64>,
    times: Vec<DateTime<Utc>>,
}

impl ForecastSequence {
    pub fn new(frames: Array3<f64>, analysis_time: DateTime<Utc>, step: Duration) -> Self {
        let times = (0..frames.len_of(Axis(0)))
            .map(|lead| analysis_time + step * lead as i32)
            .collect();
        Self { frames, times }
    }

    pub fn n_frames(&self) -> usize {
        self.frames.len_of(Axis(0))
    }

    pub fn shape(&self) -> (usize, usize) {
        let (_, rows, cols) = self.frames.dim();
        (rows, cols)
    }

    pub fn frames(&self) -> &Array3<f64> {
        &self.frames
    }

    pub fn frame(&self, lead: usize) -> ArrayView2<f64> {
        self.frames.index_axis(Axis(0), lead)
    }

    pub fn times(&self) -> &[DateTime<Utc>] {
        &self.times
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn lead_times_step_evenly_from_the_analysis_time() {
        let analysis_time = Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap();
        let sequence = ForecastSequence::new(
            Array3::zeros((5, 2, 2)),
            analysis_time,
            Duration::minutes(15),
        );
        assert_eq!(sequence.times()[0], analysis_time);
        for pair in sequence.times().windows(2) {
            assert_eq!(pair[1] - pair[0], Duration::minutes(15));
        }
    }
}
