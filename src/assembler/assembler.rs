// thundercast/src/assembler/assembler.rs

use super::errors::AssemblerError;
use super::forecast::ForecastSequence;
use crate::analysis::{AnalysisBuilder, AnalysisError, AnalysisField};
use crate::config::{AnalysisOpts, MotionOpts, NowcastOpts};
use crate::extrapolate::{ExtrapolationEngine, SeedField};
use crate::grid::Grid;
use crate::io::SeriesProvider;
use crate::motion::MotionEstimator;
use crate::observations::ObservationSet;
use crate::series::{FieldSeries, FieldSeriesBuilder};
use chrono::{DateTime, Utc};
use log::{error, info, warn};
use ndarray::{Array2, Array3, Axis};

/// Control states over missing inputs. The traversal is recorded on the run
/// report so every transition stays independently testable.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssemblerState {
    Nominal,
    PartialFallback,
    TotalFailure,
    Done,
}

/// What to do when the primary input stack is incomplete.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FallbackPolicy {
    /// Substitute the single backup source covering the history window.
    #[default]
    SingleBackup,
    /// Skip the backup and go straight to the degraded product.
    DegradeImmediately,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Product {
    /// A real extrapolation forecast.
    Forecast,
    /// The analysis-time field echoed across all leads; emitted so the
    /// delivery slot never stays empty.
    Degraded,
}

#[derive(Clone, Debug)]
pub struct RunReport {
    pub path: Vec<AssemblerState>,
    pub product: Product,
    pub observation_seeded: bool,
}

#[derive(Debug)]
pub struct AssembledForecast {
    pub sequence: ForecastSequence,
    pub report: RunReport,
}

/// Sequences analysis, motion estimation and extrapolation for one
/// analysis time, resolving the fallback policy when inputs are missing.
pub struct ForecastAssembler {
    nowcast_opts: NowcastOpts,
    motion_opts: MotionOpts,
    analysis_opts: AnalysisOpts,
    fallback: FallbackPolicy,
}

impl ForecastAssembler {
    pub fn run<P: SeriesProvider>(
        &self,
        provider: &P,
        grid: &Grid,
        observations: &ObservationSet,
        template: Option<&FieldSeries>,
        analysis_time: DateTime<Utc>,
    ) -> Result<AssembledForecast, AssemblerError> {
        let mut path = vec![AssemblerState::Nominal];
        info!("assembling nowcast for {}", analysis_time);

        let analysis = match AnalysisBuilder::default()
            .grid(grid)
            .observations(observations)
            .opts(&self.analysis_opts)
            .build()
        {
            Ok(field) => Some(field),
            Err(AnalysisError::NoObservations) => {
                info!("no observations in either bucket; using a raw-frame seed");
                None
            }
            Err(err) => return Err(err.into()),
        };

        let series = match self.collect_primary(provider)? {
            Some(series) => Some(series),
            None => match self.fallback {
                FallbackPolicy::SingleBackup => {
                    path.push(AssemblerState::PartialFallback);
                    warn!("primary input incomplete, switching to the backup source");
                    match provider.fetch_backup() {
                        Ok(series) => Some(series),
                        Err(err) => {
                            error!("backup source unavailable: {}", err);
                            None
                        }
                    }
                }
                FallbackPolicy::DegradeImmediately => None,
            },
        };

        let (frames, product) = match series {
            Some(series) => {
                let estimator = MotionEstimator::new(self.motion_opts.clone())?;
                let motion = estimator.estimate(&series)?;
                let engine = ExtrapolationEngine::new(self.nowcast_opts.clone())?;
                let seed = match &analysis {
                    Some(analysis) => SeedField::ObservationAnalysis(analysis),
                    None => SeedField::RawFrame(series.latest_frame()),
                };
                let mut frames = engine.extrapolate(seed, &motion)?;
                normalize(&mut frames);
                (frames, Product::Forecast)
            }
            None => {
                path.push(AssemblerState::TotalFailure);
                error!("no motion field possible, emitting the degraded slot product");
                let frames = self.degraded_frames(analysis.as_ref(), template)?;
                (frames, Product::Degraded)
            }
        };
        path.push(AssemblerState::Done);

        Ok(AssembledForecast {
            sequence: ForecastSequence::new(frames, analysis_time, self.nowcast_opts.step()),
            report: RunReport {
                path,
                product,
                observation_seeded: analysis.is_some(),
            },
        })
    }

    /// Stacks the analysis-time frame of every primary slot, oldest first.
    /// `Ok(None)` is the missing-file condition the fallback policy handles;
    /// malformed stacks (shape drift, unordered times) are fatal.
    fn collect_primary<P: SeriesProvider>(
        &self,
        provider: &P,
    ) -> Result<Option<FieldSeries>, AssemblerError> {
        let mut builder = FieldSeriesBuilder::default();
        for slot in 0..provider.primary_slots() {
            match provider.fetch_slot(slot) {
                Ok(series) => {
                    builder.push_frame(
                        series.frame(0).to_owned(),
                        series.mask().index_axis(Axis(0), 0).to_owned(),
                        series.times()[0],
                    );
                }
                Err(err) => {
                    warn!("primary slot {} unavailable: {}", slot, err);
                    return Ok(None);
                }
            }
        }
        Ok(Some(builder.build()?))
    }

    fn degraded_frames(
        &self,
        analysis: Option<&AnalysisField>,
        template: Option<&FieldSeries>,
    ) -> Result<Array3<f64>, AssemblerError> {
        let echo: Array2<f64> = if let Some(analysis) = analysis {
            analysis.values().clone()
        } else if let Some(template) = template {
            template.scrubbed_frames().index_axis(Axis(0), 0).to_owned()
        } else {
            return Err(AssemblerError::AllInputsMissing);
        };
        let (rows, cols) = echo.dim();
        let mut frames = Array3::zeros((self.nowcast_opts.n_steps + 1, rows, cols));
        for mut frame in frames.axis_iter_mut(Axis(0)) {
            frame.assign(&echo);
        }
        normalize(&mut frames);
        Ok(frames)
    }
}

/// NaN cells become 0 and everything is pinned to the probability range
/// before handoff to the writer.
fn normalize(frames: &mut Array3<f64>) {
    frames.mapv_inplace(|value| {
        if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, 100.0)
        }
    });
}

#[derive(Default)]
pub struct ForecastAssemblerBuilder<'a> {
    nowcast_opts: Option<&'a NowcastOpts>,
    motion_opts: Option<&'a MotionOpts>,
    analysis_opts: Option<&'a AnalysisOpts>,
    fallback: Option<&'a FallbackPolicy>,
}

impl<'a> ForecastAssemblerBuilder<'a> {
    pub fn build(&self) -> Result<ForecastAssembler, AssemblerError> {
        let nowcast_opts = self.nowcast_opts.cloned().unwrap_or_default();
        nowcast_opts.validate()?;
        let motion_opts = self.motion_opts.cloned().unwrap_or_default();
        motion_opts.validate()?;
        let analysis_opts = self.analysis_opts.cloned().unwrap_or_default();
        analysis_opts.validate()?;
        let fallback = self.fallback.copied().unwrap_or_default();
        Ok(ForecastAssembler {
            nowcast_opts,
            motion_opts,
            analysis_opts,
            fallback,
        })
    }

    pub fn nowcast_opts(&mut self, nowcast_opts: &'a NowcastOpts) -> &mut Self {
        self.nowcast_opts = Some(nowcast_opts);
        self
    }

    pub fn motion_opts(&mut self, motion_opts: &'a MotionOpts) -> &mut Self {
        self.motion_opts = Some(motion_opts);
        self
    }

    pub fn analysis_opts(&mut self, analysis_opts: &'a AnalysisOpts) -> &mut Self {
        self.analysis_opts = Some(analysis_opts);
        self
    }

    pub fn fallback(&mut self, fallback: &'a FallbackPolicy) -> &mut Self {
        self.fallback = Some(fallback);
        self
    }
}
