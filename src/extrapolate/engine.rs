// thundercast/src/extrapolate/engine.rs

use super::advection;
use super::errors::ExtrapolationError;
use crate::analysis::AnalysisField;
use crate::config::NowcastOpts;
use crate::motion::MotionField;
use log::{debug, info};
use ndarray::{Array3, ArrayView2};

/// The initial condition for the extrapolation, with its provenance.
///
/// The provenance is an explicit branch, not something sniffed from the
/// array shape at call time: an observation analysis gets the low-value
/// floor applied to every output frame, a raw model frame does not (small
/// raw values are meaningful signal).
pub enum SeedField<'a> {
    ObservationAnalysis(&'a AnalysisField),
    RawFrame(ArrayView2<'a, f64>),
}

impl<'a> SeedField<'a> {
    fn view(&self) -> ArrayView2<'_, f64> {
        match self {
            SeedField::ObservationAnalysis(analysis) => analysis.values().view(),
            SeedField::RawFrame(view) => view.view(),
        }
    }

    fn is_observation_seeded(&self) -> bool {
        matches!(self, SeedField::ObservationAnalysis(_))
    }
}

/// Advects a seed field along a motion field into a fixed-step forecast
/// sequence of `n_steps + 1` frames.
pub struct ExtrapolationEngine {
    opts: NowcastOpts,
}

impl ExtrapolationEngine {
    pub fn new(opts: NowcastOpts) -> Result<Self, ExtrapolationError> {
        opts.validate()?;
        Ok(Self { opts })
    }

    pub fn n_steps(&self) -> usize {
        self.opts.n_steps
    }

    pub fn extrapolate(
        &self,
        seed: SeedField,
        motion: &MotionField,
    ) -> Result<Array3<f64>, ExtrapolationError> {
        let seed_view = seed.view();
        if seed_view.dim() != motion.shape() {
            return Err(ExtrapolationError::ShapeMismatch(
                seed_view.dim(),
                motion.shape(),
            ));
        }
        if !motion.is_finite() {
            // a silent zero-motion substitute would misrepresent forecast
            // confidence
            return Err(ExtrapolationError::ExtrapolationFailed(
                "motion field contains non-finite components".to_string(),
            ));
        }

        info!(
            "extrapolating {} steps from {} seed",
            self.opts.n_steps,
            if seed.is_observation_seeded() {
                "observation analysis"
            } else {
                "raw frame"
            }
        );
        let mut frames = advection::advect(seed_view, motion, self.opts.n_steps);

        if seed.is_observation_seeded() {
            // advecting a sparse, mostly-zero analysis smears small spurious
            // values; below the meaningful probability threshold they are
            // zeroed on every frame
            let mut zeroed = 0usize;
            frames.mapv_inplace(|value| {
                if value < 10.0 && value != 0.0 && !value.is_nan() {
                    zeroed += 1;
                    0.0
                } else {
                    value
                }
            });
            debug!("floored {} sub-threshold cells to 0", zeroed);
        }
        Ok(frames)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::{AnalysisBuilder, AnalysisField};
    use crate::config::AnalysisOpts;
    use crate::grid::Grid;
    use crate::motion::MotionField;
    use crate::observations::{ObservationReport, ObservationSet};
    use chrono::{TimeZone, Utc};
    use ndarray::{Array2, Axis};

    fn drift(rows: usize, cols: usize, u: f64, v: f64) -> MotionField {
        MotionField::new(
            Array2::from_elem((rows, cols), u),
            Array2::from_elem((rows, cols), v),
        )
    }

    fn analysis_field(rows: usize, cols: usize) -> AnalysisField {
        let analysis_time = Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap();
        let lats = Array2::from_shape_fn((rows, cols), |(r, _)| 60.0 + 0.1 * r as f64);
        let lons = Array2::from_shape_fn((rows, cols), |(_, c)| 25.0 + 0.1 * c as f64);
        let grid = Grid::new(lats, lons).unwrap();
        let opts = AnalysisOpts::default();
        let reports = [ObservationReport {
            latitude: 60.0 + 0.1 * (rows / 2) as f64,
            longitude: 25.0 + 0.1 * (cols / 2) as f64,
            time: analysis_time - chrono::Duration::minutes(5),
        }];
        let set = ObservationSet::bucketed(&reports, analysis_time, &opts);
        AnalysisBuilder::default()
            .grid(&grid)
            .observations(&set)
            .opts(&opts)
            .build()
            .unwrap()
    }

    #[test]
    fn returns_exactly_n_plus_one_frames() {
        let engine = ExtrapolationEngine::new(NowcastOpts::default()).unwrap();
        let seed = Array2::from_elem((8, 8), 5.0);
        let frames = engine
            .extrapolate(SeedField::RawFrame(seed.view()), &drift(8, 8, 0.0, 0.0))
            .unwrap();
        assert_eq!(frames.dim().0, 17);
    }

    #[test]
    fn raw_seed_lead_zero_is_bit_identical() {
        let engine = ExtrapolationEngine::new(NowcastOpts {
            n_steps: 2,
            ..NowcastOpts::default()
        })
        .unwrap();
        // raw values under 10 are meaningful and must survive every frame
        let seed = Array2::from_elem((8, 8), 3.25);
        let frames = engine
            .extrapolate(SeedField::RawFrame(seed.view()), &drift(8, 8, 0.0, 0.0))
            .unwrap();
        assert_eq!(frames.index_axis(Axis(0), 0), seed);
        assert_eq!(frames[[2, 4, 4]], 3.25);
    }

    #[test]
    fn observation_seed_has_no_values_between_zero_and_ten() {
        let engine = ExtrapolationEngine::new(NowcastOpts {
            n_steps: 4,
            ..NowcastOpts::default()
        })
        .unwrap();
        let analysis = analysis_field(8, 8);
        let frames = engine
            .extrapolate(
                SeedField::ObservationAnalysis(&analysis),
                &drift(8, 8, 0.4, 0.2),
            )
            .unwrap();
        for &value in frames.iter() {
            if value.is_nan() {
                continue;
            }
            assert!(value == 0.0 || value >= 10.0, "value {} in (0, 10)", value);
        }
    }

    #[test]
    fn shape_mismatch_is_rejected() {
        let engine = ExtrapolationEngine::new(NowcastOpts::default()).unwrap();
        let seed = Array2::from_elem((8, 8), 5.0);
        let err = engine
            .extrapolate(SeedField::RawFrame(seed.view()), &drift(6, 6, 0.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, ExtrapolationError::ShapeMismatch(_, _)));
    }

    #[test]
    fn non_finite_motion_is_an_extrapolation_failure() {
        let engine = ExtrapolationEngine::new(NowcastOpts::default()).unwrap();
        let seed = Array2::from_elem((4, 4), 5.0);
        let mut u = Array2::zeros((4, 4));
        u[[1, 1]] = f64::NAN;
        let motion = MotionField::new(u, Array2::zeros((4, 4)));
        let err = engine
            .extrapolate(SeedField::RawFrame(seed.view()), &motion)
            .unwrap_err();
        assert!(matches!(err, ExtrapolationError::ExtrapolationFailed(_)));
    }
}
