//! Zipper tiles stitched across tile borders.
//!
//! When a point falls in the half-cell skirt between the outermost samples of
//! a tile and its nominal edge, no single tile can interpolate it. A zipper is
//! a small tile laid across the seam, whose samples are taken from whichever
//! contributing tile owns each sample position.
//!
//! Along an axis where the point is inside the base tile, the zipper follows
//! the base tile grid. Along an axis crossing a seam, the zipper samples sit
//! half a step on each side of the seam, so two same-resolution tiles give
//! back their own samples. The zipper step is the finest step among the
//! contributors, and enough samples are added on each side of the seam to
//! cover the skirt of the coarsest contributor.

use crate::tile::{bilinear, clamped_floor, normalize_longitude, Band, Tile, TOLERANCE};
use crate::Result;

/// One axis of a zipper grid.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Axis {
    origin: f64,
    step: f64,
    count: usize,
}

impl Axis {
    /// Axis of a zipper along which the point is inside the samples span of
    /// `(min, step, count)`.
    ///
    /// The (up to) four samples are taken from that grid, shifted so that
    /// none of them falls beyond its first or last sample.
    fn inside(min: f64, step: f64, count: usize, value: f64) -> Self {
        let last_cell = count.saturating_sub(2);
        let cell = ((value - min) / step).floor().clamp(0.0, last_cell as f64) as usize;
        let samples = count.min(4);
        let first = cell.saturating_sub(1).min(count - samples);
        Axis {
            origin: min + first as f64 * step,
            step,
            count: samples,
        }
    }

    /// Axis of a zipper across the seam below or above the base tile axis.
    fn across(band: Band, min: f64, step: f64, count: usize, finest: f64, coarsest: f64) -> Self {
        let seam = match band {
            Band::Below => min - 0.5 * step,
            _ => min + (count as f64 - 0.5) * step,
        };
        let per_side = (0.5 * coarsest / finest).ceil() as usize + 1;
        Axis {
            origin: seam - (per_side as f64 - 0.5) * finest,
            step: finest,
            count: 2 * per_side,
        }
    }

    fn at(&self, index: usize) -> f64 {
        self.origin + self.step * index as f64
    }
}

/// Distance (in cells) between a point and the nominal area of a tile.
///
/// The nominal area extends half a cell beyond the outermost samples, zero
/// means the tile owns the point.
pub(crate) fn skirt_distance<T: Tile + ?Sized>(tile: &T, latitude: f64, longitude: f64) -> f64 {
    let outside = |index: f64, count: usize| {
        (-0.5 - index).max(index - (count as f64 - 0.5)).max(0.0)
    };
    let row = tile.double_latitude_index(latitude);
    let column = tile.double_longitude_index(longitude);
    outside(row, tile.latitude_rows()).max(outside(column, tile.longitude_columns()))
}

/// Check if a point is within the nominal area of a tile, without tolerance.
pub(crate) fn owns<T: Tile + ?Sized>(tile: &T, latitude: f64, longitude: f64) -> bool {
    skirt_distance(tile, latitude, longitude) <= 0.0
}

/// Check if a point is within the nominal area of a tile.
pub(crate) fn in_skirt<T: Tile + ?Sized>(tile: &T, latitude: f64, longitude: f64) -> bool {
    skirt_distance(tile, latitude, longitude) <= TOLERANCE
}

/// Elevation of a tile at a point near it, extrapolating linearly from the
/// enclosing border cell when the point is in the skirt.
pub(crate) fn resample<T: Tile + ?Sized>(tile: &T, latitude: f64, longitude: f64) -> Result<f64> {
    let double_row = tile.double_latitude_index(latitude);
    let double_column = tile.double_longitude_index(longitude);
    let row = clamped_floor(double_row, tile.latitude_rows());
    let column = clamped_floor(double_column, tile.longitude_columns());
    Ok(bilinear(
        tile.elevation_at_indices(row, column)?,
        tile.elevation_at_indices(row, column + 1)?,
        tile.elevation_at_indices(row + 1, column)?,
        tile.elevation_at_indices(row + 1, column + 1)?,
        double_column - column as f64,
        double_row - row as f64,
    ))
}

/// Contributor with the finest step, the first one (the base) on ties.
fn finest_source<'a, T: Tile>(sources: &[&'a T], step: impl Fn(&T) -> f64) -> &'a T {
    sources[1..]
        .iter()
        .fold(sources[0], |best, &tile| if step(tile) < step(best) { tile } else { best })
}

fn step_range(steps: impl Iterator<Item = f64>) -> (f64, f64) {
    steps.fold((f64::INFINITY, 0.0), |(finest, coarsest), step| {
        (finest.min(step), coarsest.max(step))
    })
}

/// Fill `zipper` with the samples around `(latitude, longitude)`.
///
/// `base` is the tile whose skirt contains the point, `others` the
/// neighbors across the crossed seam(s). The zipper is expressed in the base
/// tile longitude frame.
pub(crate) fn zip<T: Tile>(mut zipper: T, base: &T, others: &[&T], latitude: f64, longitude: f64) -> Result<T> {
    let (latitude_band, longitude_band) = base.location(latitude, longitude).bands();
    let longitude = normalize_longitude(longitude, base.center_longitude());

    let mut sources = Vec::with_capacity(1 + others.len());
    sources.push(base);
    sources.extend_from_slice(others);

    let rows = match latitude_band {
        Band::Inside => {
            let anchor = finest_source(&sources, |t| t.latitude_step());
            Axis::inside(anchor.min_latitude(), anchor.latitude_step(), anchor.latitude_rows(), latitude)
        }
        band => {
            let (finest, coarsest) = step_range(sources.iter().map(|t| t.latitude_step()));
            Axis::across(band, base.min_latitude(), base.latitude_step(), base.latitude_rows(), finest, coarsest)
        }
    };
    let columns = match longitude_band {
        Band::Inside => {
            let anchor = finest_source(&sources, |t| t.longitude_step());
            let min = normalize_longitude(anchor.min_longitude(), base.center_longitude());
            Axis::inside(min, anchor.longitude_step(), anchor.longitude_columns(), longitude)
        }
        band => {
            let (finest, coarsest) = step_range(sources.iter().map(|t| t.longitude_step()));
            Axis::across(
                band,
                base.min_longitude(),
                base.longitude_step(),
                base.longitude_columns(),
                finest,
                coarsest,
            )
        }
    };

    zipper.set_geometry(rows.origin, columns.origin, rows.step, columns.step, rows.count, columns.count)?;
    for i in 0..rows.count {
        let sample_latitude = rows.at(i);
        for j in 0..columns.count {
            let sample_longitude = columns.at(j);
            let source = sources
                .iter()
                .copied()
                .min_by(|a, b| {
                    skirt_distance(*a, sample_latitude, sample_longitude)
                        .total_cmp(&skirt_distance(*b, sample_latitude, sample_longitude))
                })
                .unwrap_or(base);
            zipper.set_elevation(i, j, resample(source, sample_latitude, sample_longitude)?)?;
        }
    }
    zipper.tile_update_completed()?;
    Ok(zipper)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simple_tile::SimpleTile;
    use crate::tile::{Location, UpdatableTile};
    use approx::assert_relative_eq;

    const STEP: f64 = 0.001;

    /// Cell-centered 10x10 tile whose south-west edge is at `(lat0, lon0)`.
    fn tile(lat0: f64, lon0: f64, f: impl Fn(f64, f64) -> f64) -> SimpleTile {
        let mut tile = SimpleTile::new();
        tile.set_geometry(lat0 + 0.5 * STEP, lon0 + 0.5 * STEP, STEP, STEP, 10, 10)
            .unwrap();
        for i in 0..10 {
            for j in 0..10 {
                let lat = tile.latitude_at_index(i);
                let lon = tile.longitude_at_index(j);
                tile.set_elevation(i, j, f(lat, lon)).unwrap();
            }
        }
        tile.tile_update_completed().unwrap();
        tile
    }

    fn plane(lat: f64, lon: f64) -> f64 {
        100.0 + 3.0e4 * lat - 2.0e4 * lon
    }

    #[test]
    fn test_axis_inside() {
        let axis = Axis::inside(0.0, 1.0, 10, 4.5);
        assert_eq!(axis.count, 4);
        assert_relative_eq!(axis.origin, 3.0);
        assert_relative_eq!(axis.step, 1.0);

        // never beyond the first or last sample of the grid
        let last = Axis::inside(0.0, 1.0, 10, 8.7);
        assert_relative_eq!(last.origin, 6.0);
        assert_relative_eq!(last.at(3), 9.0);
        let first = Axis::inside(0.0, 1.0, 10, 0.2);
        assert_relative_eq!(first.origin, 0.0);

        let small = Axis::inside(0.0, 1.0, 3, 1.2);
        assert_eq!(small.count, 3);
        assert_relative_eq!(small.origin, 0.0);
    }

    #[test]
    fn test_axis_across_seam() {
        // base samples at 0.5, 1.5, ... 9.5, seam at 10
        let above = Axis::across(Band::Above, 0.5, 1.0, 10, 1.0, 1.0);
        assert_eq!(above.count, 4);
        assert_relative_eq!(above.origin, 8.5);
        let below = Axis::across(Band::Below, 0.5, 1.0, 10, 1.0, 1.0);
        assert_relative_eq!(below.origin, -1.5);

        // coarsest three times the finest: skirts up to 1.5 fine cells wide
        let mixed = Axis::across(Band::Above, 0.5, 1.0, 10, 1.0 / 3.0, 1.0);
        assert_eq!(mixed.count, 6);
        assert_relative_eq!(mixed.at(3), 10.0 + 0.5 / 3.0);
    }

    #[test]
    fn test_skirt_distance() {
        let t = tile(0.0, 0.0, plane);
        assert_eq!(skirt_distance(&t, 0.005, 0.005), 0.0);
        assert_eq!(skirt_distance(&t, 0.0002, 0.005), 0.0);
        assert_relative_eq!(skirt_distance(&t, -0.001, 0.005), 1.0, epsilon = 1.0e-9);
        assert!(owns(&t, 0.0099, 0.0099));
        assert!(!owns(&t, 0.01001, 0.005));
        assert!(in_skirt(&t, 0.01001, 0.005));
        assert!(in_skirt(&t, 0.0099, 0.0099));
        assert!(!in_skirt(&t, 0.0115, 0.005));
    }

    #[test]
    fn test_resample_extrapolates_plane() {
        let t = tile(0.0, 0.0, plane);
        assert_relative_eq!(resample(&t, 0.0001, 0.0098).unwrap(), plane(0.0001, 0.0098), epsilon = 1.0e-9);
    }

    #[test]
    fn test_zip_east_west() {
        let west = tile(0.0, 0.0, plane);
        let east = tile(0.0, 10.0 * STEP, plane);
        let (lat, lon) = (0.0052, 0.0099);
        assert_eq!(west.location(lat, lon), Location::East);

        let zipper = zip(SimpleTile::new(), &west, &[&east], lat, lon).unwrap();
        assert_eq!(zipper.latitude_rows(), 4);
        assert_eq!(zipper.longitude_columns(), 4);
        assert_eq!(zipper.location(lat, lon), Location::HasInterpolationNeighbors);

        // samples on both sides of the seam come back unchanged
        assert_relative_eq!(
            zipper.elevation_at_indices(1, 1).unwrap(),
            west.elevation_at_indices(4, 9).unwrap(),
            max_relative = 1.0e-12
        );
        assert_relative_eq!(
            zipper.elevation_at_indices(1, 2).unwrap(),
            east.elevation_at_indices(4, 0).unwrap(),
            max_relative = 1.0e-12
        );
        assert_relative_eq!(
            zipper.interpolate_elevation(lat, lon).unwrap(),
            plane(lat, lon),
            epsilon = 1.0e-9
        );
    }

    #[test]
    fn test_zip_corner() {
        let f = |lat: f64, lon: f64| plane(lat, lon) + 5.0e6 * lat * lon;
        let sw = tile(0.0, 0.0, f);
        let se = tile(0.0, 10.0 * STEP, f);
        let nw = tile(10.0 * STEP, 0.0, f);
        let ne = tile(10.0 * STEP, 10.0 * STEP, f);
        let (lat, lon) = (0.0103, 0.0098);
        assert_eq!(ne.location(lat, lon), Location::SouthWest);

        let zipper = zip(SimpleTile::new(), &ne, &[&se, &nw, &sw], lat, lon).unwrap();
        assert_eq!(zipper.location(lat, lon), Location::HasInterpolationNeighbors);
        assert_relative_eq!(
            zipper.elevation_at_indices(1, 1).unwrap(),
            sw.elevation_at_indices(9, 9).unwrap(),
            max_relative = 1.0e-12
        );
        assert_relative_eq!(
            zipper.elevation_at_indices(2, 2).unwrap(),
            ne.elevation_at_indices(0, 0).unwrap(),
            max_relative = 1.0e-12
        );
        assert_relative_eq!(
            zipper.elevation_at_indices(1, 2).unwrap(),
            se.elevation_at_indices(9, 0).unwrap(),
            max_relative = 1.0e-12
        );
        assert_relative_eq!(
            zipper.elevation_at_indices(2, 1).unwrap(),
            nw.elevation_at_indices(0, 9).unwrap(),
            max_relative = 1.0e-12
        );
    }
}
