// thundercast/src/extrapolate/advection.rs

use crate::motion::MotionField;
use ndarray::{Array2, Array3, ArrayView2, Axis};

/// Semi-Lagrangian extrapolation: each step back-traces every cell along
/// the motion field and bilinearly samples the previous frame at the
/// departure point. Departure points outside the domain, and samples whose
/// contributing stencil carries NaN, yield NaN.
///
/// Returns `n_steps + 1` frames; frame 0 is the unmodified seed.
pub fn advect(seed: ArrayView2<f64>, motion: &MotionField, n_steps: usize) -> Array3<f64> {
    let (rows, cols) = seed.dim();
    let mut frames = Array3::from_elem((n_steps + 1, rows, cols), f64::NAN);
    frames.index_axis_mut(Axis(0), 0).assign(&seed);

    let mut previous = seed.to_owned();
    for step in 1..=n_steps {
        let mut current = Array2::from_elem((rows, cols), f64::NAN);
        for row in 0..rows {
            for col in 0..cols {
                let departure_row = row as f64 - motion.v()[[row, col]];
                let departure_col = col as f64 - motion.u()[[row, col]];
                current[[row, col]] = sample_bilinear(&previous, departure_row, departure_col);
            }
        }
        frames.index_axis_mut(Axis(0), step).assign(&current);
        previous = current;
    }
    frames
}

fn sample_bilinear(field: &Array2<f64>, row: f64, col: f64) -> f64 {
    let (rows, cols) = field.dim();
    if row < 0.0 || col < 0.0 || row > (rows - 1) as f64 || col > (cols - 1) as f64 {
        return f64::NAN;
    }
    let r0 = row.floor() as usize;
    let c0 = col.floor() as usize;
    let fr = row - r0 as f64;
    let fc = col - c0 as f64;

    let mut value = 0.0;
    for (dr, wr) in [(0usize, 1.0 - fr), (1, fr)] {
        for (dc, wc) in [(0usize, 1.0 - fc), (1, fc)] {
            let weight = wr * wc;
            if weight == 0.0 {
                continue;
            }
            let sample = field[[r0 + dr, c0 + dc]];
            if sample.is_nan() {
                return f64::NAN;
            }
            value += weight * sample;
        }
    }
    value
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::motion::MotionField;
    use ndarray::Array2;

    fn still_air(rows: usize, cols: usize) -> MotionField {
        MotionField::new(Array2::zeros((rows, cols)), Array2::zeros((rows, cols)))
    }

    fn eastward(rows: usize, cols: usize) -> MotionField {
        MotionField::new(Array2::from_elem((rows, cols), 1.0), Array2::zeros((rows, cols)))
    }

    #[test]
    fn returns_n_plus_one_frames() {
        let seed = Array2::zeros((4, 4));
        let frames = advect(seed.view(), &still_air(4, 4), 5);
        assert_eq!(frames.dim(), (6, 4, 4));
    }

    #[test]
    fn zero_motion_preserves_the_field() {
        let seed = Array2::from_shape_fn((6, 6), |(r, c)| (r * 10 + c) as f64);
        let frames = advect(seed.view(), &still_air(6, 6), 3);
        for step in 0..=3 {
            assert_eq!(frames.index_axis(Axis(0), step), seed);
        }
    }

    #[test]
    fn impulse_travels_with_the_flow() {
        let mut seed = Array2::zeros((8, 8));
        seed[[4, 2]] = 50.0;
        let frames = advect(seed.view(), &eastward(8, 8), 2);
        assert_eq!(frames[[1, 4, 3]], 50.0);
        assert_eq!(frames[[1, 4, 2]], 0.0);
        assert_eq!(frames[[2, 4, 4]], 50.0);
    }

    #[test]
    fn departure_outside_the_domain_is_nan() {
        let seed = Array2::from_elem((4, 4), 1.0);
        let frames = advect(seed.view(), &eastward(4, 4), 1);
        // column 0 back-traces to column -1
        assert!(frames[[1, 0, 0]].is_nan());
        assert_eq!(frames[[1, 0, 1]], 1.0);
    }

    #[test]
    fn nan_cells_propagate_downstream() {
        let mut seed = Array2::from_elem((4, 8), 2.0);
        seed[[2, 3]] = f64::NAN;
        let frames = advect(seed.view(), &eastward(4, 8), 1);
        assert!(frames[[1, 2, 4]].is_nan());
        assert_eq!(frames[[1, 2, 2]], 2.0);
    }
}
