// thundercast/src/analysis/builder.rs

use super::errors::AnalysisError;
use super::oi::{self, StructureFunction};
use crate::config::AnalysisOpts;
use crate::grid::Grid;
use crate::observations::ObservationSet;
use humantime::format_duration;
use log::{debug, info, warn};
use ndarray::Array2;
use ndarray_stats::QuantileExt;
use std::time::Instant;

/// The observation analysis: a single probability field over the target
/// grid, clamped to the valid range, used as the extrapolation seed.
#[derive(Clone, Debug)]
pub struct AnalysisField {
    field: Array2<f64>,
}

impl AnalysisField {
    pub fn shape(&self) -> (usize, usize) {
        self.field.dim()
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.field
    }
}

#[derive(Default)]
pub struct AnalysisBuilder<'a> {
    grid: Option<&'a Grid>,
    observations: Option<&'a ObservationSet>,
    opts: Option<&'a AnalysisOpts>,
}

impl<'a> AnalysisBuilder<'a> {
    pub fn build(&self) -> Result<AnalysisField, AnalysisError> {
        let grid = self
            .grid
            .ok_or_else(|| AnalysisError::UninitializedFieldError("grid".to_string()))?;
        let observations = self.observations.ok_or_else(|| {
            AnalysisError::UninitializedFieldError("observations".to_string())
        })?;
        let default_opts = AnalysisOpts::default();
        let opts = match self.opts {
            Some(opts) => opts,
            None => &default_opts,
        };
        opts.validate()?;

        if observations.is_empty() {
            return Err(AnalysisError::NoObservations);
        }

        // coordinates can come back non-finite from the observation service
        let usable: Vec<_> = observations
            .observations()
            .iter()
            .filter(|obs| obs.latitude.is_finite() && obs.longitude.is_finite())
            .copied()
            .collect();
        if usable.len() < observations.len() {
            warn!(
                "dropped {} observations with non-finite coordinates",
                observations.len() - usable.len()
            );
        }
        if usable.is_empty() {
            return Err(AnalysisError::NoObservations);
        }

        info!(
            "analysis from {} observations ({} recent, {} older)",
            usable.len(),
            observations.recent_count(),
            observations.older_count()
        );
        let now = Instant::now();

        // no climatological prior: the background is all zero
        let background = Array2::<f64>::zeros(grid.shape());
        let background_at_points: Vec<f64> = usable
            .iter()
            .map(|obs| oi::nearest(grid, &background, obs.latitude, obs.longitude))
            .collect();

        let structure = StructureFunction {
            horizontal_scale_m: opts.horizontal_scale_m,
            elevation_scale_m: opts.elevation_scale_m,
        };
        let mut field = oi::optimal_interpolation(
            grid,
            &background,
            &usable,
            opts.variance_ratio,
            &background_at_points,
            &structure,
            opts.max_neighbors,
        );

        Self::clamp(&mut field, opts.noise_floor);
        if let (Ok(min), Ok(max)) = (field.min(), field.max()) {
            debug!("analysis range [{:.2}, {:.2}]", min, max);
        }
        debug!("analysis built in {}", format_duration(now.elapsed()));
        Ok(AnalysisField { field })
    }

    /// Values above 100 are capped; values below 10 drop to the configured
    /// floor so interpolation noise never reads as a meaningful probability.
    fn clamp(field: &mut Array2<f64>, noise_floor: f64) {
        field.mapv_inplace(|value| {
            if value > 100.0 {
                100.0
            } else if value < 10.0 {
                noise_floor
            } else {
                value
            }
        });
    }

    pub fn grid(&mut self, grid: &'a Grid) -> &mut Self {
        self.grid = Some(grid);
        self
    }

    pub fn observations(&mut self, observations: &'a ObservationSet) -> &mut Self {
        self.observations = Some(observations);
        self
    }

    pub fn opts(&mut self, opts: &'a AnalysisOpts) -> &mut Self {
        self.opts = Some(opts);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AnalysisOpts;
    use crate::observations::{ObservationReport, ObservationSet};
    use approx::assert_relative_eq;
    use chrono::{DateTime, TimeZone, Utc};
    use ndarray::Array2;

    fn analysis_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 6, 1, 12, 0, 0).unwrap()
    }

    fn test_grid() -> Grid {
        // 8x8 cells, 0.1 degree spacing around 60N 25E
        let lats = Array2::from_shape_fn((8, 8), |(r, _)| 60.0 + 0.1 * r as f64);
        let lons = Array2::from_shape_fn((8, 8), |(_, c)| 25.0 + 0.1 * c as f64);
        Grid::new(lats, lons).unwrap()
    }

    fn recent_report(lat: f64, lon: f64) -> ObservationReport {
        ObservationReport {
            latitude: lat,
            longitude: lon,
            time: analysis_time() - chrono::Duration::minutes(5),
        }
    }

    #[test]
    fn empty_set_is_no_observations() {
        let grid = test_grid();
        let set = ObservationSet::default();
        let err = AnalysisBuilder::default()
            .grid(&grid)
            .observations(&set)
            .build()
            .unwrap_err();
        assert!(matches!(err, AnalysisError::NoObservations));
    }

    #[test]
    fn single_observation_peaks_at_its_cell() {
        let grid = test_grid();
        let opts = AnalysisOpts::default();
        let set = ObservationSet::bucketed(&[recent_report(60.3, 25.3)], analysis_time(), &opts);
        let analysis = AnalysisBuilder::default()
            .grid(&grid)
            .observations(&set)
            .opts(&opts)
            .build()
            .unwrap();
        // single obs, zero background: increment = 100 / (1 + ratio) at the
        // observation cell
        let expected = 100.0 / 1.1;
        assert_relative_eq!(analysis.values()[[3, 3]], expected, max_relative = 1e-6);
    }

    #[test]
    fn output_stays_in_the_clamped_range() {
        let grid = test_grid();
        let opts = AnalysisOpts::default();
        let reports: Vec<_> = (0..6)
            .map(|i| recent_report(60.0 + 0.1 * i as f64, 25.2))
            .collect();
        let set = ObservationSet::bucketed(&reports, analysis_time(), &opts);
        let analysis = AnalysisBuilder::default()
            .grid(&grid)
            .observations(&set)
            .opts(&opts)
            .build()
            .unwrap();
        for &value in analysis.values() {
            assert!(value <= 100.0);
            assert!(value == 0.0 || value >= 10.0, "value {} in (0, 10)", value);
        }
    }

    #[test]
    fn noise_floor_variant_raises_low_values() {
        let grid = test_grid();
        let opts = AnalysisOpts {
            noise_floor: 10.0,
            ..AnalysisOpts::default()
        };
        let set = ObservationSet::bucketed(&[recent_report(60.3, 25.3)], analysis_time(), &opts);
        let analysis = AnalysisBuilder::default()
            .grid(&grid)
            .observations(&set)
            .opts(&opts)
            .build()
            .unwrap();
        let min = *analysis.values().min().unwrap();
        assert_relative_eq!(min, 10.0);
    }
}
