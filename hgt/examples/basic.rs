//! Basic example demonstrating hgt library usage.
//!
//! Run with: cargo run --example basic -- /path/to/hgt/files

use hgt::{DirOptions, HgtError, TileDirectory};
use std::env;

fn main() -> Result<(), HgtError> {
    // Get data directory from command line
    let data_dir = env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: cargo run --example basic -- /path/to/hgt/files");
        std::process::exit(1);
    });

    let dir = TileDirectory::open(&data_dir, DirOptions::default())?;

    // Query some famous peaks
    let locations = [
        ("Kosice, Slovakia", 48.7162, 21.2613),
        ("Mount Fuji, Japan", 35.3606, 138.7274),
        ("Mount Everest, Nepal", 27.9881, 86.9250),
        ("Denali, Alaska", 63.0695, -151.0074),
    ];

    println!("Elevation queries:");
    println!("{:-<50}", "");

    for (name, lat, lon) in &locations {
        match dir.elevation_at(*lat, *lon) {
            Ok((elevation, resolution)) => {
                println!("{}: {}m ({})", name, elevation, resolution);
            }
            Err(e) if e.is_not_found() => {
                println!("{}: tile not available locally", name);
            }
            Err(HgtError::OutOfRange { .. }) => {
                println!("{}: outside SRTM coverage", name);
            }
            Err(e) => {
                println!("{}: error - {}", name, e);
            }
        }
    }

    // Show cache statistics
    let stats = dir.cache_stats();
    println!("\nCache statistics:");
    println!("  Cached tiles: {}", stats.entry_count);
    println!("  Hits: {}", stats.hit_count);
    println!("  Misses: {}", stats.miss_count);
    println!("  Hit rate: {:.1}%", stats.hit_rate() * 100.0);

    dir.close()
}
