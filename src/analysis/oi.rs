// thundercast/src/analysis/oi.rs

use crate::grid::{haversine_m, Grid};
use crate::observations::Observation;
use libm::exp;
use log::warn;
use ndarray::{Array2, Axis};
use rayon::prelude::*;

/// Correlations below this value are treated as zero; observations past the
/// implied distance cannot influence a cell.
const MIN_CORRELATION: f64 = 1e-3;

/// Isotropic Gaussian-taper covariance structure: correlation decays with
/// horizontal distance and elevation difference on independent length
/// scales.
#[derive(Clone, Copy, Debug)]
pub struct StructureFunction {
    pub horizontal_scale_m: f64,
    pub elevation_scale_m: f64,
}

impl StructureFunction {
    pub fn correlation(&self, distance_m: f64, elevation_diff_m: f64) -> f64 {
        let dh = distance_m / self.horizontal_scale_m;
        let dz = elevation_diff_m / self.elevation_scale_m;
        exp(-0.5 * dh * dh) * exp(-0.5 * dz * dz)
    }
}

/// Background value at the grid cell nearest to a point ("nearest"
/// sampling).
pub fn nearest(grid: &Grid, background: &Array2<f64>, latitude: f64, longitude: f64) -> f64 {
    let (rows, cols) = grid.shape();
    let mut best = f64::INFINITY;
    let mut value = f64::NAN;
    for row in 0..rows {
        for col in 0..cols {
            let d = grid.distance_m(row, col, latitude, longitude);
            if d < best {
                best = d;
                value = background[[row, col]];
            }
        }
    }
    value
}

/// Optimal interpolation of point observations onto the grid.
///
/// Per cell, the `max_neighbors` strongest-correlated observations within
/// the taper cutoff contribute through weights solving
/// `(S + rI) w = s`, where `S` holds observation-observation correlations,
/// `s` the observation-cell correlations and `r` the uniform
/// observation-to-background error-variance ratio. The analysis increment
/// is the weighted sum of innovations against the background.
#[allow(clippy::too_many_arguments)]
pub fn optimal_interpolation(
    grid: &Grid,
    background: &Array2<f64>,
    observations: &[Observation],
    variance_ratio: f64,
    background_at_points: &[f64],
    structure: &StructureFunction,
    max_neighbors: usize,
) -> Array2<f64> {
    let innovations: Vec<f64> = observations
        .iter()
        .zip(background_at_points)
        .map(|(obs, bg)| obs.value - bg)
        .collect();

    let mut output = background.clone();
    output
        .axis_iter_mut(Axis(0))
        .into_par_iter()
        .enumerate()
        .for_each(|(row, mut out_row)| {
            for (col, out) in out_row.iter_mut().enumerate() {
                *out += increment_at_cell(
                    grid,
                    row,
                    col,
                    observations,
                    &innovations,
                    variance_ratio,
                    structure,
                    max_neighbors,
                );
            }
        });
    output
}

#[allow(clippy::too_many_arguments)]
fn increment_at_cell(
    grid: &Grid,
    row: usize,
    col: usize,
    observations: &[Observation],
    innovations: &[f64],
    variance_ratio: f64,
    structure: &StructureFunction,
    max_neighbors: usize,
) -> f64 {
    // neighbors inside the taper cutoff, strongest correlation first
    let mut neighbors: Vec<(usize, f64)> = observations
        .iter()
        .enumerate()
        .filter_map(|(i, obs)| {
            let d = grid.distance_m(row, col, obs.latitude, obs.longitude);
            let corr = structure.correlation(d, obs.elevation);
            (corr >= MIN_CORRELATION).then_some((i, corr))
        })
        .collect();
    if neighbors.is_empty() {
        return 0.0;
    }
    neighbors.sort_unstable_by(|a, b| b.1.partial_cmp(&a.1).unwrap());
    neighbors.truncate(max_neighbors);

    let k = neighbors.len();
    let mut matrix = vec![0.0; k * k];
    let mut rhs = vec![0.0; k];
    for (i, &(oi, corr_i)) in neighbors.iter().enumerate() {
        rhs[i] = corr_i;
        matrix[i * k + i] = 1.0 + variance_ratio;
        for (j, &(oj, _)) in neighbors.iter().enumerate().skip(i + 1) {
            let a = &observations[oi];
            let b = &observations[oj];
            let d = haversine_m(a.latitude, a.longitude, b.latitude, b.longitude);
            let corr = structure.correlation(d, a.elevation - b.elevation);
            matrix[i * k + j] = corr;
            matrix[j * k + i] = corr;
        }
    }

    let weights = match solve_spd(matrix, rhs, k) {
        Some(weights) => weights,
        None => {
            warn!(
                "singular observation covariance at cell ({}, {}), leaving background",
                row, col
            );
            return 0.0;
        }
    };
    weights
        .iter()
        .zip(neighbors.iter())
        .map(|(w, &(oi, _))| w * innovations[oi])
        .sum()
}

/// Cholesky solve of a symmetric positive-definite `k`×`k` system, row-major.
fn solve_spd(mut a: Vec<f64>, mut b: Vec<f64>, k: usize) -> Option<Vec<f64>> {
    // decompose A = L Lᵀ in the lower triangle
    for i in 0..k {
        for j in 0..=i {
            let mut sum = a[i * k + j];
            for p in 0..j {
                sum -= a[i * k + p] * a[j * k + p];
            }
            if i == j {
                if sum <= 0.0 {
                    return None;
                }
                a[i * k + i] = sum.sqrt();
            } else {
                a[i * k + j] = sum / a[j * k + j];
            }
        }
    }
    // forward substitution: L y = b
    for i in 0..k {
        let mut sum = b[i];
        for p in 0..i {
            sum -= a[i * k + p] * b[p];
        }
        b[i] = sum / a[i * k + i];
    }
    // back substitution: Lᵀ x = y
    for i in (0..k).rev() {
        let mut sum = b[i];
        for p in i + 1..k {
            sum -= a[p * k + i] * b[p];
        }
        b[i] = sum / a[i * k + i];
    }
    Some(b)
}
