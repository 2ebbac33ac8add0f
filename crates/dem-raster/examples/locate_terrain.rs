//! Example: locate the terrain point seen along a slanted line of sight.
//!
//! The terrain is a synthetic volcanic cone split over cell-centered tiles,
//! so the line crosses tile borders and zipper tiles are built on the way.
//!
//! Usage: cargo run --example locate_terrain -- [slope_deg] [max_tiles]
//!
//! Set `RUST_LOG=dem_raster=debug` to see tile loading and zipper synthesis.

use dem_raster::{GeodeticPoint, SampleLayout, SimpleTile, Tile, TileGrid, TilesCache, VolcanicConeUpdater};
use nalgebra::Vector3;
use std::env;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args: Vec<String> = env::args().collect();
    let slope: f64 = args.get(1).map(|s| s.parse().expect("Invalid slope")).unwrap_or(10.0);
    let max_tiles: usize = args.get(2).map(|s| s.parse().expect("Invalid tiles count")).unwrap_or(8);

    let degree = 1.0_f64.to_radians();
    let summit = GeodeticPoint::new(1.0 * degree, 1.0 * degree, 3000.0);
    let grid = TileGrid::new(0.25 * degree, 51, SampleLayout::CellCentered);
    let updater = VolcanicConeUpdater::new(grid, summit, slope.to_radians());
    let mut cache = match TilesCache::with_capacity(SimpleTile::new, updater, max_tiles) {
        Ok(cache) => cache,
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    };

    // looking down toward the summit from the south-west
    let start = GeodeticPoint::new(0.4 * degree, 0.45 * degree, 6000.0);
    let los = Vector3::new(0.5 * degree, 0.5 * degree, -4000.0);
    let step = 0.001;

    println!(
        "Line of sight from ({:.4}°, {:.4}°, {:.1} m)",
        start.latitude.to_degrees(),
        start.longitude.to_degrees(),
        start.altitude
    );

    let mut t = 0.0;
    while t <= 1.5 {
        let current = GeodeticPoint::new(
            start.latitude + t * los.y,
            start.longitude + t * los.x,
            start.altitude + t * los.z,
        );
        let tile = match cache.get_tile(current.latitude, current.longitude) {
            Ok(tile) => tile,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        };
        let i = tile.floor_latitude_index(current.latitude);
        let j = tile.floor_longitude_index(current.longitude);
        match tile.cell_intersection(&current, &los, i, j) {
            Ok(Some(ground)) if ground.altitude <= current.altitude + 1.0e-6 => {
                println!(
                    "Terrain hit at ({:.6}°, {:.6}°, {:.2} m), interpolated {:.2} m",
                    ground.latitude.to_degrees(),
                    ground.longitude.to_degrees(),
                    ground.altitude,
                    tile.interpolate_elevation(ground.latitude, ground.longitude)
                        .unwrap_or(f64::NAN)
                );
                let stats = cache.stats();
                println!(
                    "Tiles loaded: {}, zipper tiles: {}, hits: {}, evictions: {}",
                    stats.tiles_loaded, stats.zipper_tiles, stats.hits, stats.evictions
                );
                return;
            }
            Ok(_) => {}
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        }
        t += step;
    }

    println!("No terrain along the line of sight");
}
