// thundercast/src/grid.rs

use libm::{asin, cos, sin, sqrt};
use ndarray::Array2;
use thiserror::Error;

const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Immutable horizontal coordinates of the model grid. Every field in a
/// series shares this shape; the grid itself is read-only input owned by the
/// ingestion collaborator.
#[derive(Clone, Debug)]
pub struct Grid {
    latitudes: Array2<f64>,
    longitudes: Array2<f64>,
}

impl Grid {
    pub fn new(latitudes: Array2<f64>, longitudes: Array2<f64>) -> Result<Self, GridError> {
        if latitudes.dim() != longitudes.dim() {
            return Err(GridError::CoordinateShapeMismatch(
                latitudes.dim(),
                longitudes.dim(),
            ));
        }
        Ok(Self {
            latitudes,
            longitudes,
        })
    }

    pub fn shape(&self) -> (usize, usize) {
        self.latitudes.dim()
    }

    pub fn latitudes(&self) -> &Array2<f64> {
        &self.latitudes
    }

    pub fn longitudes(&self) -> &Array2<f64> {
        &self.longitudes
    }

    /// Great-circle distance in meters between the cell at `[row, col]` and
    /// an arbitrary point.
    pub fn distance_m(&self, row: usize, col: usize, latitude: f64, longitude: f64) -> f64 {
        haversine_m(
            self.latitudes[[row, col]],
            self.longitudes[[row, col]],
            latitude,
            longitude,
        )
    }
}

/// Haversine great-circle distance in meters.
pub fn haversine_m(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let dphi = (lat2 - lat1).to_radians();
    let dlambda = (lon2 - lon1).to_radians();
    let a = sin(dphi / 2.0) * sin(dphi / 2.0)
        + cos(phi1) * cos(phi2) * sin(dlambda / 2.0) * sin(dlambda / 2.0);
    2.0 * EARTH_RADIUS_M * asin(sqrt(a))
}

#[derive(Error, Debug)]
pub enum GridError {
    #[error("latitude and longitude arrays must share a shape, but got {0:?} and {1:?}")]
    CoordinateShapeMismatch((usize, usize), (usize, usize)),
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use ndarray::Array2;

    #[test]
    fn rejects_mismatched_coordinates() {
        let lats = Array2::zeros((2, 3));
        let lons = Array2::zeros((3, 2));
        assert!(Grid::new(lats, lons).is_err());
    }

    #[test]
    fn haversine_equator_degree() {
        // one degree of longitude at the equator is ~111.2 km
        let d = haversine_m(0.0, 0.0, 0.0, 1.0);
        assert_relative_eq!(d, 111_195.0, max_relative = 1e-3);
    }

    #[test]
    fn distance_to_own_cell_is_zero() {
        let lats = Array2::from_shape_fn((2, 2), |(r, _)| 60.0 + r as f64);
        let lons = Array2::from_shape_fn((2, 2), |(_, c)| 25.0 + c as f64);
        let grid = Grid::new(lats, lons).unwrap();
        assert_relative_eq!(grid.distance_m(1, 1, 61.0, 26.0), 0.0, epsilon = 1e-6);
    }
}
