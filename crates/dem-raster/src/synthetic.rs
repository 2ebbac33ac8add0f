//! Analytic tile updaters.
//!
//! These updaters generate elevation on a regular grid of square tiles
//! instead of reading it from files. They are handy for tests, benchmarks and
//! demos, and as templates for real updaters.

use crate::cache::TileUpdater;
use crate::tile::{normalize_longitude, GeodeticPoint, UpdatableTile};
use crate::Result;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Equatorial radius used to turn angles into ground distances (meters).
pub const EARTH_RADIUS: f64 = 6_378_137.0;

/// Placement of the samples inside a tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SampleLayout {
    /// Samples on the tile edges, shared with the adjacent tiles.
    Overlapping,
    /// Samples at cell centers, the first one half a step inside the edge.
    ///
    /// Adjacent tiles do not share samples, so points near an edge need a
    /// zipper tile.
    CellCentered,
}

/// Regular grid of square tiles.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TileGrid {
    /// Tile size along both axes (radians).
    pub tile_size: f64,
    /// Number of samples along each axis.
    pub samples: usize,
    /// Samples placement.
    pub layout: SampleLayout,
}

impl TileGrid {
    pub fn new(tile_size: f64, samples: usize, layout: SampleLayout) -> Self {
        Self {
            tile_size,
            samples,
            layout,
        }
    }

    /// Step between samples (radians).
    pub fn step(&self) -> f64 {
        match self.layout {
            SampleLayout::Overlapping => self.tile_size / self.samples.saturating_sub(1).max(1) as f64,
            SampleLayout::CellCentered => self.tile_size / self.samples.max(1) as f64,
        }
    }

    /// South-west edge of the tile containing a point.
    pub fn tile_edge(&self, latitude: f64, longitude: f64) -> (f64, f64) {
        (
            (latitude / self.tile_size).floor() * self.tile_size,
            (longitude / self.tile_size).floor() * self.tile_size,
        )
    }

    /// Position of the south-west sample of the tile containing a point.
    pub fn first_sample(&self, latitude: f64, longitude: f64) -> (f64, f64) {
        let (latitude, longitude) = self.tile_edge(latitude, longitude);
        match self.layout {
            SampleLayout::Overlapping => (latitude, longitude),
            SampleLayout::CellCentered => {
                let half = 0.5 * self.step();
                (latitude + half, longitude + half)
            }
        }
    }

    /// Configure `tile` and set every sample from a function of
    /// `(row, column, latitude, longitude)`.
    pub fn fill<G>(&self, latitude: f64, longitude: f64, tile: &mut dyn UpdatableTile, mut elevation: G) -> Result<()>
    where
        G: FnMut(usize, usize, f64, f64) -> f64,
    {
        let (min_latitude, min_longitude) = self.first_sample(latitude, longitude);
        let step = self.step();
        tile.set_geometry(min_latitude, min_longitude, step, step, self.samples, self.samples)?;
        for i in 0..self.samples {
            let sample_latitude = min_latitude + step * i as f64;
            for j in 0..self.samples {
                let sample_longitude = min_longitude + step * j as f64;
                tile.set_elevation(i, j, elevation(i, j, sample_latitude, sample_longitude))?;
            }
        }
        Ok(())
    }
}

/// Updater sampling an arbitrary function of `(latitude, longitude)`.
#[derive(Debug, Clone)]
pub struct FunctionUpdater<F> {
    grid: TileGrid,
    function: F,
}

impl<F> FunctionUpdater<F>
where
    F: Fn(f64, f64) -> f64,
{
    pub fn new(grid: TileGrid, function: F) -> Self {
        Self { grid, function }
    }

    pub fn grid(&self) -> &TileGrid {
        &self.grid
    }
}

impl<F> TileUpdater for FunctionUpdater<F>
where
    F: Fn(f64, f64) -> f64,
{
    fn update_tile(&mut self, latitude: f64, longitude: f64, tile: &mut dyn UpdatableTile) -> Result<()> {
        let function = &self.function;
        self.grid
            .fill(latitude, longitude, tile, |_, _, lat, lon| function(lat, lon))
    }
}

/// Checkerboard of flat squares alternating between two elevations.
#[derive(Debug, Clone)]
pub struct CheckedPatternUpdater {
    grid: TileGrid,
    square: f64,
    low: f64,
    high: f64,
}

impl CheckedPatternUpdater {
    /// `square` is the size of the checkerboard squares (radians).
    pub fn new(grid: TileGrid, square: f64, low: f64, high: f64) -> Self {
        Self {
            grid,
            square,
            low,
            high,
        }
    }

    /// Elevation of the pattern at a point.
    pub fn elevation(&self, latitude: f64, longitude: f64) -> f64 {
        let parity = (latitude / self.square).floor() + (longitude / self.square).floor();
        if parity.rem_euclid(2.0) == 0.0 {
            self.low
        } else {
            self.high
        }
    }
}

impl TileUpdater for CheckedPatternUpdater {
    fn update_tile(&mut self, latitude: f64, longitude: f64, tile: &mut dyn UpdatableTile) -> Result<()> {
        let pattern = &*self;
        pattern
            .grid
            .fill(latitude, longitude, tile, |_, _, lat, lon| pattern.elevation(lat, lon))
    }
}

/// Cone with a constant slope around a summit.
#[derive(Debug, Clone)]
pub struct VolcanicConeUpdater {
    grid: TileGrid,
    summit: GeodeticPoint,
    slope: f64,
}

impl VolcanicConeUpdater {
    /// `slope` is the angle between the cone flanks and the horizontal (radians).
    pub fn new(grid: TileGrid, summit: GeodeticPoint, slope: f64) -> Self {
        Self {
            grid,
            summit,
            slope,
        }
    }

    /// Elevation of the cone at a point.
    pub fn elevation(&self, latitude: f64, longitude: f64) -> f64 {
        let delta_latitude = latitude - self.summit.latitude;
        let delta_longitude = normalize_longitude(longitude, self.summit.longitude) - self.summit.longitude;
        let distance = EARTH_RADIUS * delta_latitude.hypot(delta_longitude * latitude.cos());
        self.summit.altitude - distance * self.slope.tan()
    }
}

impl TileUpdater for VolcanicConeUpdater {
    fn update_tile(&mut self, latitude: f64, longitude: f64, tile: &mut dyn UpdatableTile) -> Result<()> {
        let cone = &*self;
        cone.grid
            .fill(latitude, longitude, tile, |_, _, lat, lon| cone.elevation(lat, lon))
    }
}

/// Fractal landscape generated by the diamond-square algorithm.
///
/// Each tile is generated independently from a generator seeded with the
/// updater seed and the tile position, so the same tile is always rebuilt
/// identically after an eviction. Adjacent tiles do not join smoothly.
#[derive(Debug, Clone)]
pub struct RandomLandscapeUpdater {
    grid: TileGrid,
    base_elevation: f64,
    initial_scale: f64,
    reduction_factor: f64,
    seed: u64,
}

impl RandomLandscapeUpdater {
    /// Create an updater.
    ///
    /// `initial_scale` is the amplitude of the random displacement of the
    /// coarsest level (meters), multiplied by `reduction_factor` at each finer
    /// level.
    pub fn new(grid: TileGrid, base_elevation: f64, initial_scale: f64, reduction_factor: f64, seed: u64) -> Self {
        Self {
            grid,
            base_elevation,
            initial_scale,
            reduction_factor,
            seed,
        }
    }

    fn rng_for_tile(&self, latitude: f64, longitude: f64) -> ChaCha8Rng {
        let (edge_latitude, edge_longitude) = self.grid.tile_edge(latitude, longitude);
        let row = (edge_latitude / self.grid.tile_size).round() as i64;
        let column = (edge_longitude / self.grid.tile_size).round() as i64;
        let key = (row as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15) ^ (column as u64).rotate_left(32);
        ChaCha8Rng::seed_from_u64(self.seed ^ key)
    }

    /// Diamond-square heights on a `(2^k + 1)²` grid of at least `samples` per side.
    fn landscape(&self, rng: &mut ChaCha8Rng) -> (usize, Vec<f64>) {
        let size = self.grid.samples.saturating_sub(1).max(1).next_power_of_two() + 1;
        let mut heights = vec![self.base_elevation; size * size];
        let mut scale = self.initial_scale;
        let noise = |rng: &mut ChaCha8Rng, scale: f64| scale * rng.gen_range(-1.0..=1.0);

        for (i, j) in [(0, 0), (0, size - 1), (size - 1, 0), (size - 1, size - 1)] {
            heights[i * size + j] += noise(rng, scale);
        }

        let mut step = size - 1;
        while step > 1 {
            let half = step / 2;
            scale *= self.reduction_factor;

            // diamond: centers of the squares
            for i in (half..size).step_by(step) {
                for j in (half..size).step_by(step) {
                    let mean = 0.25
                        * (heights[(i - half) * size + j - half]
                            + heights[(i - half) * size + j + half]
                            + heights[(i + half) * size + j - half]
                            + heights[(i + half) * size + j + half]);
                    heights[i * size + j] = mean + noise(rng, scale);
                }
            }

            // square: middles of the edges
            for i in (0..size).step_by(half) {
                let start = if (i / half) % 2 == 0 { half } else { 0 };
                for j in (start..size).step_by(step) {
                    let mut sum = 0.0;
                    let mut count = 0.0;
                    if i >= half {
                        sum += heights[(i - half) * size + j];
                        count += 1.0;
                    }
                    if i + half < size {
                        sum += heights[(i + half) * size + j];
                        count += 1.0;
                    }
                    if j >= half {
                        sum += heights[i * size + j - half];
                        count += 1.0;
                    }
                    if j + half < size {
                        sum += heights[i * size + j + half];
                        count += 1.0;
                    }
                    heights[i * size + j] = sum / count + noise(rng, scale);
                }
            }

            step = half;
        }

        (size, heights)
    }
}

impl TileUpdater for RandomLandscapeUpdater {
    fn update_tile(&mut self, latitude: f64, longitude: f64, tile: &mut dyn UpdatableTile) -> Result<()> {
        let mut rng = self.rng_for_tile(latitude, longitude);
        let (size, heights) = self.landscape(&mut rng);
        self.grid
            .fill(latitude, longitude, tile, |i, j, _, _| heights[i * size + j])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simple_tile::SimpleTile;
    use crate::tile::{Location, Tile};
    use approx::assert_relative_eq;

    fn degree() -> f64 {
        1.0_f64.to_radians()
    }

    fn load<U: TileUpdater>(updater: &mut U, latitude: f64, longitude: f64) -> SimpleTile {
        let mut tile = SimpleTile::new();
        updater.update_tile(latitude, longitude, &mut tile).unwrap();
        tile.tile_update_completed().unwrap();
        tile
    }

    #[test]
    fn test_grid_layouts() {
        let overlapping = TileGrid::new(1.0, 11, SampleLayout::Overlapping);
        assert_relative_eq!(overlapping.step(), 0.1);
        assert_eq!(overlapping.first_sample(2.3, -0.4), (2.0, -1.0));

        let centered = TileGrid::new(1.0, 10, SampleLayout::CellCentered);
        assert_relative_eq!(centered.step(), 0.1);
        let (lat, lon) = centered.first_sample(2.3, -0.4);
        assert_relative_eq!(lat, 2.05);
        assert_relative_eq!(lon, -0.95);
    }

    #[test]
    fn test_cell_centered_edges_need_neighbors() {
        let grid = TileGrid::new(degree(), 10, SampleLayout::CellCentered);
        let mut updater = FunctionUpdater::new(grid, |lat, lon| lat + lon);
        let tile = load(&mut updater, 0.5 * degree(), 0.5 * degree());
        assert_eq!(tile.location(0.5 * degree(), 0.5 * degree()), Location::HasInterpolationNeighbors);
        assert_eq!(tile.location(0.01 * degree(), 0.5 * degree()), Location::South);
        assert_eq!(tile.location(0.99 * degree(), 0.99 * degree()), Location::NorthEast);
    }

    #[test]
    fn test_checked_pattern() {
        let grid = TileGrid::new(degree(), 11, SampleLayout::Overlapping);
        let mut updater = CheckedPatternUpdater::new(grid, 0.25 * degree(), -10.0, 250.0);
        let tile = load(&mut updater, 0.5 * degree(), 0.5 * degree());
        assert_eq!(tile.min_elevation(), -10.0);
        assert_eq!(tile.max_elevation(), 250.0);
        assert_eq!(tile.elevation_at_indices(1, 1).unwrap(), -10.0);
        assert_eq!(tile.elevation_at_indices(1, 3).unwrap(), 250.0);
        assert_eq!(tile.elevation_at_indices(3, 3).unwrap(), -10.0);
    }

    #[test]
    fn test_volcanic_cone() {
        let summit = GeodeticPoint::new(0.5 * degree(), 0.5 * degree(), 2500.0);
        let grid = TileGrid::new(degree(), 11, SampleLayout::Overlapping);
        let mut updater = VolcanicConeUpdater::new(grid, summit, 0.5_f64.to_radians());
        let tile = load(&mut updater, 0.2 * degree(), 0.7 * degree());
        assert_relative_eq!(tile.max_elevation(), 2500.0, epsilon = 1.0e-9);
        assert_relative_eq!(tile.elevation_at_indices(5, 5).unwrap(), 2500.0, epsilon = 1.0e-9);

        // one tenth of a degree north of the summit
        let distance = EARTH_RADIUS * 0.1 * degree();
        assert_relative_eq!(
            tile.elevation_at_indices(6, 5).unwrap(),
            2500.0 - distance * 0.5_f64.to_radians().tan(),
            max_relative = 1.0e-9
        );
        assert!(tile.min_elevation() < tile.elevation_at_indices(6, 5).unwrap());
    }

    #[test]
    fn test_volcanic_cone_across_antimeridian() {
        let summit = GeodeticPoint::new(0.0, std::f64::consts::PI, 1000.0);
        let grid = TileGrid::new(degree(), 11, SampleLayout::Overlapping);
        let updater = VolcanicConeUpdater::new(grid, summit, 0.1);
        assert_relative_eq!(
            updater.elevation(0.0, -std::f64::consts::PI + 0.01),
            updater.elevation(0.0, std::f64::consts::PI - 0.01),
            max_relative = 1.0e-9
        );
    }

    #[test]
    fn test_random_landscape_is_reproducible() {
        let grid = TileGrid::new(degree(), 33, SampleLayout::Overlapping);
        let mut updater = RandomLandscapeUpdater::new(grid, 800.0, 300.0, 0.5, 0xe12e_f744_f224_cf43);
        let first = load(&mut updater, 0.5 * degree(), 0.5 * degree());
        let again = load(&mut updater, 0.1 * degree(), 0.9 * degree());
        let other = load(&mut updater, 1.5 * degree(), 0.5 * degree());

        assert_eq!(first.elevations(), again.elevations());
        assert_ne!(first.elevations(), other.elevations());
        assert!(first.max_elevation() > first.min_elevation());
        assert!(first.min_elevation() > 800.0 - 2.0 * 300.0);
        assert!(first.max_elevation() < 800.0 + 2.0 * 300.0);
    }

    #[test]
    fn test_random_landscape_any_samples() {
        let grid = TileGrid::new(degree(), 20, SampleLayout::CellCentered);
        let mut updater = RandomLandscapeUpdater::new(grid, 0.0, 100.0, 0.6, 42);
        let tile = load(&mut updater, 0.5 * degree(), 0.5 * degree());
        assert_eq!(tile.latitude_rows(), 20);
        assert!(tile.elevations().iter().all(|e| e.is_finite()));
    }
}
