//! # HGT - SRTM Tile Directory Library
//!
//! Random-access elevation lookups against SRTM `.hgt` tiles, either one
//! file at a time or across a whole directory of tiles.
//!
//! ## Features
//!
//! - **Exact addressing**: maps a coordinate to its tile name and the byte
//!   offset of its sample, with no interpolation
//! - **Automatic Detection**: Determines tile resolution (1 or 3 arc-second) from file size
//! - **Shared cache**: open tiles are kept across queries and opened at most
//!   once, even when first queried from many threads at the same time
//! - **Offline**: Works with local `.hgt` files, no internet required
//!
//! ## Quick Start
//!
//! ```ignore
//! use hgt::{addressing::tile_key, DirOptions, FileOptions, TileDirectory, TileFile};
//!
//! // Determine which file holds a coordinate
//! let key = tile_key(48.7162, 21.2613);
//! assert_eq!(key.file_name(), "N48E021.hgt");
//!
//! // Query a single tile
//! let tile = TileFile::open(format!("/data/{}", key.file_name()), FileOptions::default())?;
//! let (elevation, resolution) = tile.elevation_at(48.7162, 21.2613)?;
//! println!("Elevation: {}m ({})", elevation, resolution);
//!
//! // Or let a directory pick and cache the tiles
//! let dir = TileDirectory::open("/data", DirOptions::default())?;
//! let (elevation, _) = dir.elevation_at(48.7162, 21.2613)?;
//! dir.close()?;
//! ```
//!
//! ## HGT Data Format
//!
//! HGT files contain elevation data in a simple binary format:
//!
//! - **1 arc-second**: 3601×3601 samples (~30m)
//! - **3 arc-second**: 1201×1201 samples (~90m)
//!
//! Each sample is a 16-bit big-endian signed integer representing elevation in meters.
//! Rows run north to south, columns west to east. The special value -32768
//! indicates void (no data).
//!
//! ## Data Sources
//!
//! Download SRTM data from:
//! - <https://dwtkns.com/srtm30m/>
//! - <https://earthexplorer.usgs.gov/>

pub mod addressing;
pub mod cache;
pub mod directory;
pub mod error;
pub mod tile;
pub mod validator;

// Re-export main types at crate root for convenience
pub use addressing::{byte_offset, tile_key, TileKey};
pub use cache::{MokaTileCache, NoCache, TileCache};
pub use directory::{CacheStats, DirOptions, TileDirectory, TileDirectoryBuilder};
pub use error::{HgtError, Result};
pub use tile::{FileOptions, ReadMode, Resolution, TileFile, VOID_VALUE};
pub use validator::{LatitudeBand, RangeValidator};
