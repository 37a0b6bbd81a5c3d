// thundercast/src/observations.rs

use crate::config::{AnalysisOpts, OLDER_OBS_VALUE, RECENT_OBS_VALUE};
use chrono::{DateTime, Utc};
use log::warn;

/// A point report from the lightning location network. Only position and
/// time survive ingestion; the physical magnitude (peak current) carries no
/// weight in the analysis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObservationReport {
    pub latitude: f64,
    pub longitude: f64,
    pub time: DateTime<Utc>,
}

/// A point observation after age weighting, ready for interpolation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    pub latitude: f64,
    pub longitude: f64,
    pub elevation: f64,
    pub value: f64,
    pub time: DateTime<Utc>,
}

/// Flat, unordered collection of weighted observations with the per-bucket
/// counts kept for diagnostics.
#[derive(Clone, Debug, Default)]
pub struct ObservationSet {
    observations: Vec<Observation>,
    recent_count: usize,
    older_count: usize,
}

impl ObservationSet {
    /// Splits reports into the two age buckets relative to `analysis_time`
    /// and assigns the bucket values: the decay of probability with
    /// observation age is a two-step function, deliberately not smoothed.
    ///
    /// Reports newer than the analysis time or older than both windows are
    /// discarded. Station elevation is not modeled; every observation gets
    /// elevation 0.
    pub fn bucketed(
        reports: &[ObservationReport],
        analysis_time: DateTime<Utc>,
        opts: &AnalysisOpts,
    ) -> Self {
        let recent_start = analysis_time - opts.recent_window();
        let older_start = recent_start - opts.older_window();

        let mut observations = Vec::with_capacity(reports.len());
        let mut recent_count = 0usize;
        let mut older_count = 0usize;
        for report in reports {
            let value = if report.time > recent_start && report.time <= analysis_time {
                recent_count += 1;
                RECENT_OBS_VALUE
            } else if report.time > older_start && report.time <= recent_start {
                older_count += 1;
                OLDER_OBS_VALUE
            } else {
                continue;
            };
            observations.push(Observation {
                latitude: report.latitude,
                longitude: report.longitude,
                elevation: 0.0,
                value,
                time: report.time,
            });
        }

        if recent_count == 0 {
            warn!("no near real time observations");
            if older_count == 0 {
                warn!("no observations at all from the selected windows");
            }
        }

        Self {
            observations,
            recent_count,
            older_count,
        }
    }

    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn observations(&self) -> &[Observation] {
        &self.observations
    }

    pub fn recent_count(&self) -> usize {
        self.recent_count
    }

    pub fn older_count(&self) -> usize {
        self.older_count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t(minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 6, 1, 12, minute, 0).unwrap()
    }

    fn report(minute: u32) -> ObservationReport {
        ObservationReport {
            latitude: 60.0,
            longitude: 25.0,
            time: t(minute),
        }
    }

    #[test]
    fn buckets_assign_fixed_values() {
        let opts = AnalysisOpts::default(); // 15 min windows
        let reports = [report(50), report(30), report(35)];
        let set = ObservationSet::bucketed(&reports, t(55), &opts);
        assert_eq!(set.len(), 3);
        assert_eq!(set.recent_count(), 1);
        assert_eq!(set.older_count(), 2);
        let values: Vec<f64> = set.observations().iter().map(|o| o.value).collect();
        assert!(values.contains(&RECENT_OBS_VALUE));
        assert_eq!(values.iter().filter(|&&v| v == OLDER_OBS_VALUE).count(), 2);
        assert!(set.observations().iter().all(|o| o.elevation == 0.0));
    }

    #[test]
    fn stale_and_future_reports_are_discarded() {
        let opts = AnalysisOpts::default();
        // 12:00 is older than both 15-min windows ending 12:55; 12:59 is in
        // the future relative to the analysis time
        let reports = [report(0), report(59)];
        let set = ObservationSet::bucketed(&reports, t(55), &opts);
        assert!(set.is_empty());
        assert_eq!(set.recent_count(), 0);
        assert_eq!(set.older_count(), 0);
    }

    #[test]
    fn older_window_width_is_configurable() {
        let opts = AnalysisOpts {
            older_window: Some(30),
            ..AnalysisOpts::default()
        };
        // recent: (12:40, 12:55], older: (12:10, 12:40]
        let set = ObservationSet::bucketed(&[report(15)], t(55), &opts);
        assert_eq!(set.older_count(), 1);
    }
}
