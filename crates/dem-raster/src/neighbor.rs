//! Resolution of the tiles around a tile.

use crate::cache::{TileFactory, TileUpdater, TilesCache};
use crate::tile::{Band, Tile};
use crate::Result;
use std::rc::Rc;

/// Side of a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    North,
    South,
    East,
    West,
}

impl Direction {
    /// Direction toward the missing samples along one axis, if any.
    fn across(band: Band, below: Direction, above: Direction) -> Option<Direction> {
        match band {
            Band::Below => Some(below),
            Band::Inside => None,
            Band::Above => Some(above),
        }
    }
}

/// Middle of the samples span of a tile.
fn middle<T: Tile + ?Sized>(tile: &T) -> (f64, f64) {
    let latitude = tile.min_latitude()
        + 0.5 * tile.latitude_step() * tile.latitude_rows().saturating_sub(1) as f64;
    (latitude, tile.center_longitude())
}

/// Position a quarter cell beyond the nominal edge of a tile.
fn beyond_edge(min: f64, step: f64, count: usize, toward_max: bool) -> f64 {
    if toward_max {
        min + (count.saturating_sub(1) as f64 + 0.75) * step
    } else {
        min - 0.75 * step
    }
}

impl<T, F, U> TilesCache<T, F, U>
where
    T: Tile,
    F: TileFactory<T>,
    U: TileUpdater,
{
    /// Get the tile next to `tile` in the given direction.
    ///
    /// The neighbor is the tile owning the point a quarter cell beyond the
    /// middle of the `tile` side, so it does not depend on whether adjacent
    /// tiles share their edge samples. The lookup goes through the cache
    /// itself, so the neighbor may be loaded (and evict another tile) like
    /// any other query.
    pub fn neighbor(&mut self, tile: &T, direction: Direction) -> Result<Rc<T>> {
        let (latitude, longitude) = middle(tile);
        let (latitude, longitude) = match direction {
            Direction::North | Direction::South => (
                beyond_edge(
                    tile.min_latitude(),
                    tile.latitude_step(),
                    tile.latitude_rows(),
                    direction == Direction::North,
                ),
                longitude,
            ),
            Direction::East | Direction::West => (
                latitude,
                beyond_edge(
                    tile.min_longitude(),
                    tile.longitude_step(),
                    tile.longitude_columns(),
                    direction == Direction::East,
                ),
            ),
        };
        let longitude = self.normalize_longitude(longitude);
        self.get_owning_tile(latitude, longitude)
    }

    /// Tiles needed together with `base` to interpolate a point in its skirt.
    ///
    /// One tile for an edge, three for a corner: the tile across the longitude
    /// seam, the diagonal tile (found as the east/west neighbor of the
    /// north/south one), then the tile across the latitude seam.
    pub(crate) fn border_neighbors(&mut self, base: &T, latitude: f64, longitude: f64) -> Result<Vec<Rc<T>>> {
        let location = base.location(latitude, longitude);
        let (latitude_band, longitude_band) = location.bands();
        let vertical = Direction::across(latitude_band, Direction::South, Direction::North);
        let horizontal = Direction::across(longitude_band, Direction::West, Direction::East);

        let mut neighbors = Vec::with_capacity(3);
        let across_latitude = match vertical {
            Some(direction) => Some(self.neighbor(base, direction)?),
            None => None,
        };
        if let Some(direction) = horizontal {
            neighbors.push(self.neighbor(base, direction)?);
        }
        if location.is_corner() {
            if let (Some(tile), Some(direction)) = (&across_latitude, horizontal) {
                neighbors.push(self.neighbor(tile, direction)?);
            }
        }
        neighbors.extend(across_latitude);
        Ok(neighbors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simple_tile::SimpleTile;
    use crate::synthetic::{FunctionUpdater, SampleLayout, TileGrid};
    use approx::assert_relative_eq;

    fn cache() -> TilesCache<SimpleTile, fn() -> SimpleTile, FunctionUpdater<fn(f64, f64) -> f64>> {
        let grid = TileGrid::new(1.0_f64.to_radians(), 11, SampleLayout::CellCentered);
        let f: fn(f64, f64) -> f64 = |lat, lon| lat - lon;
        TilesCache::with_capacity(SimpleTile::new as fn() -> SimpleTile, FunctionUpdater::new(grid, f), 8)
            .unwrap()
    }

    fn edge_degrees(tile: &SimpleTile) -> (f64, f64) {
        let half = 0.5 * tile.latitude_step();
        (
            (tile.min_latitude() - half).to_degrees().round(),
            (tile.min_longitude() - half).to_degrees().round(),
        )
    }

    #[test]
    fn test_neighbors() {
        let mut cache = cache();
        let tile = cache
            .get_owning_tile(10.5_f64.to_radians(), 20.5_f64.to_radians())
            .unwrap();
        assert_eq!(edge_degrees(&tile), (10.0, 20.0));
        assert_eq!(edge_degrees(&cache.neighbor(&tile, Direction::North).unwrap()), (11.0, 20.0));
        assert_eq!(edge_degrees(&cache.neighbor(&tile, Direction::South).unwrap()), (9.0, 20.0));
        assert_eq!(edge_degrees(&cache.neighbor(&tile, Direction::East).unwrap()), (10.0, 21.0));
        assert_eq!(edge_degrees(&cache.neighbor(&tile, Direction::West).unwrap()), (10.0, 19.0));
        assert_eq!(cache.stats().tiles_loaded, 5);

        // second lookup is a hit
        cache.neighbor(&tile, Direction::North).unwrap();
        assert_eq!(cache.stats().tiles_loaded, 5);
    }

    #[test]
    fn test_neighbor_across_antimeridian() {
        let mut cache = cache();
        let tile = cache
            .get_owning_tile(0.5_f64.to_radians(), 179.5_f64.to_radians())
            .unwrap();
        let east = cache.neighbor(&tile, Direction::East).unwrap();
        assert_eq!(edge_degrees(&east), (0.0, -180.0));
        let west = cache.neighbor(&east, Direction::West).unwrap();
        assert!(Rc::ptr_eq(&west, &tile));
    }

    #[test]
    fn test_neighbors_with_shared_edges() {
        let grid = TileGrid::new(1.0_f64.to_radians(), 3, SampleLayout::Overlapping);
        let f: fn(f64, f64) -> f64 = |lat, lon| lat + lon;
        let mut cache =
            TilesCache::with_capacity(SimpleTile::new as fn() -> SimpleTile, FunctionUpdater::new(grid, f), 8).unwrap();
        let tile = cache
            .get_owning_tile(0.5_f64.to_radians(), 0.5_f64.to_radians())
            .unwrap();
        assert_relative_eq!(tile.min_longitude(), 0.0, epsilon = 1.0e-12);

        let east = cache.neighbor(&tile, Direction::East).unwrap();
        assert_relative_eq!(east.min_longitude(), 1.0_f64.to_radians(), epsilon = 1.0e-12);
        assert_relative_eq!(east.min_latitude(), 0.0, epsilon = 1.0e-12);
        let north = cache.neighbor(&tile, Direction::North).unwrap();
        assert_relative_eq!(north.min_latitude(), 1.0_f64.to_radians(), epsilon = 1.0e-12);
        let west = cache.neighbor(&tile, Direction::West).unwrap();
        assert_relative_eq!(west.min_longitude(), -1.0_f64.to_radians(), epsilon = 1.0e-12);
        assert!(Rc::ptr_eq(&cache.neighbor(&east, Direction::West).unwrap(), &tile));
        assert_eq!(cache.stats().tiles_loaded, 4);
    }

    #[test]
    fn test_border_neighbors() {
        let mut cache = cache();
        let base = cache
            .get_owning_tile(10.5_f64.to_radians(), 20.5_f64.to_radians())
            .unwrap();

        let inside = cache
            .border_neighbors(&base, 10.5_f64.to_radians(), 20.5_f64.to_radians())
            .unwrap();
        assert!(inside.is_empty());

        let edge = cache
            .border_neighbors(&base, 10.5_f64.to_radians(), 20.99_f64.to_radians())
            .unwrap();
        assert_eq!(edge.len(), 1);
        assert_eq!(edge_degrees(&edge[0]), (10.0, 21.0));

        let corner = cache
            .border_neighbors(&base, 10.01_f64.to_radians(), 20.01_f64.to_radians())
            .unwrap();
        let corners: Vec<(f64, f64)> = corner.iter().map(|t| edge_degrees(t)).collect();
        assert_eq!(corners, vec![(10.0, 19.0), (9.0, 19.0), (9.0, 20.0)]);
        assert_relative_eq!(corner[1].max_latitude(), base.min_latitude() - base.latitude_step(), epsilon = 1.0e-12);
    }
}
