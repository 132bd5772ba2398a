//! Error types for the HGT library.

use std::io;
use std::sync::Arc;

use thiserror::Error;

/// Errors that can occur when reading HGT tiles.
#[derive(Error, Debug)]
pub enum HgtError {
    /// IO error from the underlying storage, returned unchanged.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// File size doesn't match a 1 or 3 arc-second tile.
    #[error(
        "Unsupported resolution: {size} bytes \
         (expected 25934402 for 1 arc-second or 2884802 for 3 arc-second)"
    )]
    UnsupportedResolution { size: u64 },

    /// Tile name is not of the form `N00E000`.
    #[error("Invalid tile file name: {name:?}")]
    InvalidFileName { name: String },

    /// Coordinates rejected by a range validator or outside the tile.
    #[error("Coordinates out of range: lat={lat}, lon={lon}")]
    OutOfRange { lat: f64, lon: f64 },

    /// The addressed sample holds the void marker.
    #[error("No elevation data at lat={lat}, lon={lon}")]
    VoidData { lat: f64, lon: f64 },
}

impl HgtError {
    /// Returns `true` for the platform's "does not exist" condition,
    /// e.g. a missing data directory or tile file.
    pub fn is_not_found(&self) -> bool {
        matches!(self, HgtError::Io(e) if e.kind() == io::ErrorKind::NotFound)
    }

    /// Recover an owned error from one shared between single-flight waiters.
    ///
    /// The caller that ran the failing open gets its own error back from the
    /// cache; this is only used for callers that waited on it.
    pub(crate) fn from_shared(err: Arc<HgtError>) -> HgtError {
        Arc::try_unwrap(err).unwrap_or_else(|shared| shared.duplicate())
    }

    /// Copy of this error for handing to other callers.
    ///
    /// IO errors can't be cloned. OS errors are rebuilt from their raw code,
    /// anything else from its kind and message.
    pub(crate) fn duplicate(&self) -> HgtError {
        match self {
            HgtError::Io(e) => HgtError::Io(match e.raw_os_error() {
                Some(code) => io::Error::from_raw_os_error(code),
                None => io::Error::new(e.kind(), e.to_string()),
            }),
            HgtError::UnsupportedResolution { size } => {
                HgtError::UnsupportedResolution { size: *size }
            }
            HgtError::InvalidFileName { name } => {
                HgtError::InvalidFileName { name: name.clone() }
            }
            HgtError::OutOfRange { lat, lon } => HgtError::OutOfRange {
                lat: *lat,
                lon: *lon,
            },
            HgtError::VoidData { lat, lon } => HgtError::VoidData {
                lat: *lat,
                lon: *lon,
            },
        }
    }
}

/// Result type alias using [`HgtError`].
pub type Result<T> = std::result::Result<T, HgtError>;
