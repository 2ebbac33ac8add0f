//! Tile abstraction shared by every raster backing.
//!
//! A tile is a regular latitude/longitude grid of elevation samples. The
//! `min_latitude`/`min_longitude` pair is the position of the south-west-most
//! *sample* (the center of the south-west cell), not the outer edge of the
//! tile: all the index arithmetic below depends on this convention.
//!
//! Between four neighboring samples the terrain is the bilinear surface
//!
//! ```text
//! h(x, y) = h00 (1-x)(1-y) + h10 x (1-y) + h01 (1-x) y + h11 x y
//! ```
//!
//! where `x` is the normalized longitude offset and `y` the normalized
//! latitude offset inside the cell.

use crate::{DemError, Result};
use nalgebra::Vector3;
use std::f64::consts::{PI, TAU};

/// Fraction of a cell accepted outside of a tile before a point is rejected.
pub const TOLERANCE: f64 = 1.0 / 8.0;

/// Normalize a longitude into the 2π-wide window centered on `center`.
pub fn normalize_longitude(longitude: f64, center: f64) -> f64 {
    longitude - TAU * ((longitude + PI - center) / TAU).floor()
}

/// A point given by geodetic coordinates (radians) and altitude (meters).
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct GeodeticPoint {
    /// Latitude in radians.
    pub latitude: f64,
    /// Longitude in radians.
    pub longitude: f64,
    /// Altitude in meters.
    pub altitude: f64,
}

impl GeodeticPoint {
    /// Create a new geodetic point.
    pub fn new(latitude: f64, longitude: f64, altitude: f64) -> Self {
        Self {
            latitude,
            longitude,
            altitude,
        }
    }
}

/// Lifecycle of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileState {
    /// Freshly created by a factory, no geometry yet.
    Uninitialized,
    /// Geometry set, elevation samples being written.
    Configured,
    /// Update completed, samples are read-only and min/max are known.
    Available,
}

/// Position of a point with respect to a tile.
///
/// Only [`Location::HasInterpolationNeighbors`] means the four corners of the
/// cell containing the point belong to the tile. The other values tell on
/// which side(s) the missing samples are.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Location {
    SouthWest,
    West,
    NorthWest,
    South,
    HasInterpolationNeighbors,
    North,
    SouthEast,
    East,
    NorthEast,
}

/// Position of an index along one axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Band {
    Below,
    Inside,
    Above,
}

impl Band {
    fn classify(floor_index: f64, count: usize) -> Self {
        if floor_index < 0.0 {
            Band::Below
        } else if floor_index > count as f64 - 2.0 {
            Band::Above
        } else {
            Band::Inside
        }
    }
}

impl Location {
    pub(crate) fn from_bands(latitude: Band, longitude: Band) -> Self {
        match (latitude, longitude) {
            (Band::Below, Band::Below) => Location::SouthWest,
            (Band::Inside, Band::Below) => Location::West,
            (Band::Above, Band::Below) => Location::NorthWest,
            (Band::Below, Band::Inside) => Location::South,
            (Band::Inside, Band::Inside) => Location::HasInterpolationNeighbors,
            (Band::Above, Band::Inside) => Location::North,
            (Band::Below, Band::Above) => Location::SouthEast,
            (Band::Inside, Band::Above) => Location::East,
            (Band::Above, Band::Above) => Location::NorthEast,
        }
    }

    /// Split the location into its (latitude, longitude) bands.
    pub(crate) fn bands(self) -> (Band, Band) {
        match self {
            Location::SouthWest => (Band::Below, Band::Below),
            Location::West => (Band::Inside, Band::Below),
            Location::NorthWest => (Band::Above, Band::Below),
            Location::South => (Band::Below, Band::Inside),
            Location::HasInterpolationNeighbors => (Band::Inside, Band::Inside),
            Location::North => (Band::Above, Band::Inside),
            Location::SouthEast => (Band::Below, Band::Above),
            Location::East => (Band::Inside, Band::Above),
            Location::NorthEast => (Band::Above, Band::Above),
        }
    }

    /// Check if the point lies on a tile corner (two missing sides).
    pub fn is_corner(self) -> bool {
        matches!(
            self,
            Location::SouthWest | Location::NorthWest | Location::SouthEast | Location::NorthEast
        )
    }
}

/// Write side of a tile, the only part a [`TileUpdater`](crate::TileUpdater) sees.
pub trait UpdatableTile {
    /// Set the tile geometry and allocate the samples grid.
    ///
    /// `min_latitude` and `min_longitude` are the coordinates of the
    /// south-west-most sample, steps are in radians.
    fn set_geometry(
        &mut self,
        min_latitude: f64,
        min_longitude: f64,
        latitude_step: f64,
        longitude_step: f64,
        latitude_rows: usize,
        longitude_columns: usize,
    ) -> Result<()>;

    /// Set one elevation sample, row 0 being the southernmost row.
    fn set_elevation(&mut self, row: usize, column: usize, elevation: f64) -> Result<()>;
}

/// Read side of a tile.
///
/// Implementors provide the raw geometry and samples; classification,
/// interpolation and cell intersection are provided on top of them.
pub trait Tile: UpdatableTile {
    /// Mark the end of the update, computing derived data.
    ///
    /// Fails with [`DemError::EmptyTile`] if no geometry was ever set.
    fn tile_update_completed(&mut self) -> Result<()>;

    /// Current lifecycle state.
    fn state(&self) -> TileState;

    /// Latitude of the southernmost sample row (radians).
    fn min_latitude(&self) -> f64;

    /// Longitude of the westernmost sample column (radians).
    fn min_longitude(&self) -> f64;

    /// Step between rows (radians).
    fn latitude_step(&self) -> f64;

    /// Step between columns (radians).
    fn longitude_step(&self) -> f64;

    /// Number of latitude rows.
    fn latitude_rows(&self) -> usize;

    /// Number of longitude columns.
    fn longitude_columns(&self) -> usize;

    /// Minimum elevation over the tile, only meaningful once available.
    fn min_elevation(&self) -> f64;

    /// Maximum elevation over the tile, only meaningful once available.
    fn max_elevation(&self) -> f64;

    /// Raw elevation sample.
    fn elevation_at_indices(&self, row: usize, column: usize) -> Result<f64>;

    /// Latitude of the northernmost sample row.
    fn max_latitude(&self) -> f64 {
        self.latitude_at_index(self.latitude_rows().saturating_sub(1))
    }

    /// Longitude of the easternmost sample column.
    fn max_longitude(&self) -> f64 {
        self.longitude_at_index(self.longitude_columns().saturating_sub(1))
    }

    fn latitude_at_index(&self, row: usize) -> f64 {
        self.min_latitude() + self.latitude_step() * row as f64
    }

    fn longitude_at_index(&self, column: usize) -> f64 {
        self.min_longitude() + self.longitude_step() * column as f64
    }

    /// Longitude of the middle of the samples span, used as normalization center.
    fn center_longitude(&self) -> f64 {
        self.min_longitude()
            + 0.5 * self.longitude_step() * self.longitude_columns().saturating_sub(1) as f64
    }

    /// Fractional, unclamped, row index of a latitude.
    fn double_latitude_index(&self, latitude: f64) -> f64 {
        (latitude - self.min_latitude()) / self.latitude_step()
    }

    /// Fractional, unclamped, column index of a longitude.
    ///
    /// The longitude is first normalized around the tile, so both
    /// representations of a point near the antimeridian give the same index.
    fn double_longitude_index(&self, longitude: f64) -> f64 {
        let longitude = normalize_longitude(longitude, self.center_longitude());
        (longitude - self.min_longitude()) / self.longitude_step()
    }

    /// Row of the south-west corner of the cell containing `latitude`,
    /// clamped to `[0, rows - 2]`.
    fn floor_latitude_index(&self, latitude: f64) -> usize {
        clamped_floor(self.double_latitude_index(latitude), self.latitude_rows())
    }

    /// Column of the south-west corner of the cell containing `longitude`,
    /// clamped to `[0, columns - 2]`.
    fn floor_longitude_index(&self, longitude: f64) -> usize {
        clamped_floor(self.double_longitude_index(longitude), self.longitude_columns())
    }

    /// Classify a point with respect to the tile.
    fn location(&self, latitude: f64, longitude: f64) -> Location {
        let latitude_band = Band::classify(
            self.double_latitude_index(latitude).floor(),
            self.latitude_rows(),
        );
        let longitude_band = Band::classify(
            self.double_longitude_index(longitude).floor(),
            self.longitude_columns(),
        );
        Location::from_bands(latitude_band, longitude_band)
    }

    /// Bilinear interpolation of the elevation at a point.
    ///
    /// Points up to [`TOLERANCE`] cell outside of the samples span are
    /// accepted and linearly extrapolated from the border cell.
    fn interpolate_elevation(&self, latitude: f64, longitude: f64) -> Result<f64> {
        let rows = self.latitude_rows();
        let columns = self.longitude_columns();
        let double_row = self.double_latitude_index(latitude);
        let double_column = self.double_longitude_index(longitude);

        let inside = double_row >= -TOLERANCE
            && double_row < rows as f64 - 1.0 + TOLERANCE
            && double_column >= -TOLERANCE
            && double_column < columns as f64 - 1.0 + TOLERANCE;
        if !inside {
            return Err(DemError::OutOfTileAngles {
                latitude: latitude.to_degrees(),
                longitude: longitude.to_degrees(),
                min_latitude: self.min_latitude().to_degrees(),
                max_latitude: self.max_latitude().to_degrees(),
                min_longitude: self.min_longitude().to_degrees(),
                max_longitude: self.max_longitude().to_degrees(),
            });
        }

        let row = clamped_floor(double_row, rows);
        let column = clamped_floor(double_column, columns);
        let e00 = self.elevation_at_indices(row, column)?;
        let e10 = self.elevation_at_indices(row, column + 1)?;
        let e01 = self.elevation_at_indices(row + 1, column)?;
        let e11 = self.elevation_at_indices(row + 1, column + 1)?;

        Ok(bilinear(
            e00,
            e10,
            e01,
            e11,
            double_column - column as f64,
            double_row - row as f64,
        ))
    }

    /// Intersection of a line with the bilinear surface of one cell.
    ///
    /// The line is `point + t * los`, with `los.x` along longitude (radians),
    /// `los.y` along latitude (radians) and `los.z` along altitude (meters).
    /// The cell indices are clamped so the cell stays inside the tile.
    ///
    /// When the line crosses the cell surface twice, the point with the
    /// smallest `t` is returned, i.e. the first one met when travelling from
    /// `point` along `los`. `None` means the line does not cross the surface
    /// within the cell.
    fn cell_intersection(
        &self,
        point: &GeodeticPoint,
        los: &Vector3<f64>,
        latitude_index: usize,
        longitude_index: usize,
    ) -> Result<Option<GeodeticPoint>> {
        let row = latitude_index.min(self.latitude_rows().saturating_sub(2));
        let column = longitude_index.min(self.longitude_columns().saturating_sub(2));

        let x00 = self.longitude_at_index(column);
        let y00 = self.latitude_at_index(row);
        let z00 = self.elevation_at_indices(row, column)?;
        let z10 = self.elevation_at_indices(row, column + 1)?;
        let z01 = self.elevation_at_indices(row + 1, column)?;
        let z11 = self.elevation_at_indices(row + 1, column + 1)?;

        // line in normalized cell coordinates: (xa + t dx, ya + t dy, za + t dz)
        let longitude = normalize_longitude(point.longitude, x00);
        let xa = (longitude - x00) / self.longitude_step();
        let ya = (point.latitude - y00) / self.latitude_step();
        let dx = los.x / self.longitude_step();
        let dy = los.y / self.latitude_step();

        // h(x, y) = z00 + (z10 - z00) x + (z01 - z00) y + k x y
        // h(t) - z(t) = a t² + b t + c
        let k = z00 - z10 - z01 + z11;
        let a = k * dx * dy;
        let b = (z10 - z00) * dx + (z01 - z00) * dy + k * (xa * dy + ya * dx) - los.z;
        let c = bilinear(z00, z10, z01, z11, xa, ya) - point.altitude;

        let (t1, t2) = if a.abs() <= f64::EPSILON * c.abs() {
            // coplanar corners, or line of sight along a grid axis
            let t = -c / b;
            // 0/0: the line lies on the surface
            (if t.is_nan() { 0.0 } else { t }, f64::INFINITY)
        } else {
            let discriminant = b * b - 4.0 * a * c;
            if discriminant < 0.0 {
                return Ok(None);
            }
            let q = -0.5 * (b + b.signum() * discriminant.sqrt());
            let t1 = q / a;
            let t2 = if q != 0.0 { c / q } else { t1 };
            (t1, t2)
        };

        let on_cell = |t: f64| -> Option<GeodeticPoint> {
            if !t.is_finite() {
                return None;
            }
            let x = xa + t * dx;
            let y = ya + t * dy;
            if (-TOLERANCE..=1.0 + TOLERANCE).contains(&x)
                && (-TOLERANCE..=1.0 + TOLERANCE).contains(&y)
            {
                Some(GeodeticPoint::new(
                    point.latitude + t * los.y,
                    longitude + t * los.x,
                    point.altitude + t * los.z,
                ))
            } else {
                None
            }
        };

        Ok(match (on_cell(t1), on_cell(t2)) {
            (Some(p1), Some(p2)) => Some(if t1 <= t2 { p1 } else { p2 }),
            (p1, p2) => p1.or(p2),
        })
    }
}

/// Floor of a fractional index, clamped so that `index + 1` is still a sample.
pub(crate) fn clamped_floor(double_index: f64, count: usize) -> usize {
    let max = count.saturating_sub(2) as f64;
    let floor = double_index.floor();
    if floor.is_nan() || floor <= 0.0 {
        0
    } else if floor >= max {
        max as usize
    } else {
        floor as usize
    }
}

/// Bilinear combination of four corners at normalized offsets `(x, y)`.
pub(crate) fn bilinear(z00: f64, z10: f64, z01: f64, z11: f64, x: f64, y: f64) -> f64 {
    (z00 * (1.0 - x) + z10 * x) * (1.0 - y) + (z01 * (1.0 - x) + z11 * x) * y
}
