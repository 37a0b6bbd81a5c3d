// thundercast/src/motion/lucas_kanade.rs

use super::errors::BlockFlowError;
use super::estimator::MotionField;
use crate::config::MotionOpts;
use log::{debug, trace};
use ndarray::{Array2, ArrayView2, ArrayView3, Axis};

/// One solved interrogation block: its center and displacement.
struct BlockVector {
    row: f64,
    col: f64,
    u: f64,
    v: f64,
}

/// Least-squares accumulators for one interrogation block.
#[derive(Clone, Copy, Default)]
struct BlockSums {
    sxx: f64,
    sxy: f64,
    syy: f64,
    sxt: f64,
    syt: f64,
    n: usize,
}

/// Dense displacement field from a short window of cleaned frames.
///
/// Lucas-Kanade style: each consecutive frame pair is divided into square
/// interrogation blocks; per block the local normal equations
/// `[Sxx Sxy; Sxy Syy]·(u, v) = -(Sxt, Syt)` are solved where the structure
/// tensor is well conditioned. Cells touched by NaN are excluded from the
/// sums, so missing data weakens a block instead of corrupting it. The
/// sparse block vectors are then spread onto the full grid by
/// inverse-distance weighting.
pub fn block_flow(
    window: ArrayView3<f64>,
    opts: &MotionOpts,
) -> Result<MotionField, BlockFlowError> {
    let (nframes, rows, cols) = window.dim();
    debug_assert!(nframes >= 2);

    let mut vectors: Vec<BlockVector> = Vec::new();
    for pair in 0..nframes - 1 {
        let prev = window.index_axis(Axis(0), pair);
        let next = window.index_axis(Axis(0), pair + 1);
        solve_pair(prev, next, opts, &mut vectors);
    }

    if vectors.len() < opts.min_tracked_blocks {
        return Err(BlockFlowError::NotEnoughTrackableBlocks {
            found: vectors.len(),
            required: opts.min_tracked_blocks,
        });
    }
    debug!(
        "tracked {} blocks across {} frame pairs",
        vectors.len(),
        nframes - 1
    );

    Ok(spread_to_grid(&vectors, rows, cols))
}

fn solve_pair(
    prev: ArrayView2<f64>,
    next: ArrayView2<f64>,
    opts: &MotionOpts,
    vectors: &mut Vec<BlockVector>,
) {
    let (rows, cols) = prev.dim();
    let block = opts.block_size;
    let blocks_y = (rows + block - 1) / block;
    let blocks_x = (cols + block - 1) / block;
    let mut sums = vec![BlockSums::default(); blocks_y * blocks_x];

    for row in 1..rows - 1 {
        for col in 1..cols - 1 {
            let center = prev[[row, col]];
            let east = prev[[row, col + 1]];
            let west = prev[[row, col - 1]];
            let south = prev[[row + 1, col]];
            let north = prev[[row - 1, col]];
            let ahead = next[[row, col]];
            if !center.is_finite()
                || !east.is_finite()
                || !west.is_finite()
                || !south.is_finite()
                || !north.is_finite()
                || !ahead.is_finite()
            {
                continue;
            }
            let ix = (east - west) / 2.0;
            let iy = (south - north) / 2.0;
            let it = ahead - center;
            let entry = &mut sums[(row / block) * blocks_x + col / block];
            entry.sxx += ix * ix;
            entry.sxy += ix * iy;
            entry.syy += iy * iy;
            entry.sxt += ix * it;
            entry.syt += iy * it;
            entry.n += 1;
        }
    }

    // displacements beyond one block per step are outside the trustable
    // range of this scheme
    let clamp = block as f64;

    for by in 0..blocks_y {
        for bx in 0..blocks_x {
            let entry = &sums[by * blocks_x + bx];
            if entry.n < block {
                continue;
            }
            let n = entry.n as f64;
            let a = entry.sxx / n;
            let b = entry.sxy / n;
            let c = entry.syy / n;
            let trace_half = (a + c) / 2.0;
            let discriminant = ((a - c) / 2.0).powi(2) + b * b;
            let min_eigenvalue = trace_half - discriminant.sqrt();
            if min_eigenvalue < opts.min_eigenvalue {
                trace!(
                    "block ({}, {}) untextured: min eigenvalue {:.2e}",
                    by,
                    bx,
                    min_eigenvalue
                );
                continue;
            }
            let det = entry.sxx * entry.syy - entry.sxy * entry.sxy;
            let u = (-entry.sxt * entry.syy + entry.sxy * entry.syt) / det;
            let v = (-entry.syt * entry.sxx + entry.sxy * entry.sxt) / det;
            vectors.push(BlockVector {
                row: (by * block) as f64 + block as f64 / 2.0,
                col: (bx * block) as f64 + block as f64 / 2.0,
                u: u.clamp(-clamp, clamp),
                v: v.clamp(-clamp, clamp),
            });
        }
    }
}

/// Inverse-distance interpolation of the sparse block vectors onto every
/// grid cell.
fn spread_to_grid(vectors: &[BlockVector], rows: usize, cols: usize) -> MotionField {
    let mut u = Array2::zeros((rows, cols));
    let mut v = Array2::zeros((rows, cols));
    for row in 0..rows {
        for col in 0..cols {
            let mut weight_sum = 0.0;
            let mut u_sum = 0.0;
            let mut v_sum = 0.0;
            for vector in vectors {
                let dy = row as f64 - vector.row;
                let dx = col as f64 - vector.col;
                let d2 = dx * dx + dy * dy;
                let weight = 1.0 / (d2 + 1.0);
                weight_sum += weight;
                u_sum += weight * vector.u;
                v_sum += weight * vector.v;
            }
            u[[row, col]] = u_sum / weight_sum;
            v[[row, col]] = v_sum / weight_sum;
        }
    }
    MotionField::new(u, v)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array3;

    fn blob(rows: usize, cols: usize, center_row: f64, center_col: f64) -> Array2<f64> {
        Array2::from_shape_fn((rows, cols), |(r, c)| {
            let dr = r as f64 - center_row;
            let dc = c as f64 - center_col;
            100.0 * (-(dr * dr + dc * dc) / 18.0).exp()
        })
    }

    fn stack(frames: Vec<Array2<f64>>) -> Array3<f64> {
        let (rows, cols) = frames[0].dim();
        let mut out = Array3::zeros((frames.len(), rows, cols));
        for (i, frame) in frames.into_iter().enumerate() {
            out.index_axis_mut(Axis(0), i).assign(&frame);
        }
        out
    }

    #[test]
    fn uniform_window_has_no_trackable_blocks() {
        let window = Array3::from_elem((3, 32, 32), 5.0);
        let opts = MotionOpts::default();
        let err = block_flow(window.view(), &opts).unwrap_err();
        assert!(matches!(
            err,
            BlockFlowError::NotEnoughTrackableBlocks { found: 0, .. }
        ));
    }

    #[test]
    fn recovers_eastward_translation() {
        let frames = stack(vec![
            blob(48, 48, 24.0, 20.0),
            blob(48, 48, 24.0, 21.0),
            blob(48, 48, 24.0, 22.0),
        ]);
        let opts = MotionOpts {
            block_size: 8,
            min_tracked_blocks: 1,
            ..MotionOpts::default()
        };
        let field = block_flow(frames.view(), &opts).unwrap();
        assert_eq!(field.shape(), (48, 48));
        // the blob moves +1 column per step; the recovered flow near the
        // blob center must point east with negligible meridional drift
        let u = field.u()[[24, 21]];
        let v = field.v()[[24, 21]];
        assert!(u > 0.3 && u < 2.0, "u = {}", u);
        assert!(v.abs() < 0.5, "v = {}", v);
    }

    #[test]
    fn nan_cells_do_not_poison_the_estimate() {
        let mut f0 = blob(48, 48, 24.0, 20.0);
        let mut f1 = blob(48, 48, 24.0, 21.0);
        let f2 = blob(48, 48, 24.0, 22.0);
        f0[[0, 0]] = f64::NAN;
        f1[[47, 47]] = f64::NAN;
        let frames = stack(vec![f0, f1, f2]);
        let opts = MotionOpts {
            block_size: 8,
            min_tracked_blocks: 1,
            ..MotionOpts::default()
        };
        let field = block_flow(frames.view(), &opts).unwrap();
        assert!(field.u().iter().all(|x| x.is_finite()));
        assert!(field.v().iter().all(|x| x.is_finite()));
    }
}
