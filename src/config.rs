//! Route file loading.
//!
//! Routes live in a JSON file: an array of route objects using the
//! externally-defined field names (`Recipient`, `Type`, `Destination`,
//! `LocalhostOnly`, `Relay`, `Username`, `Password`, `Timeout`). Loading
//! happens once at startup; the parsed list is handed to
//! [`RouteTable::new`](crate::RouteTable::new) and is read-only afterwards.

use std::{fs, path::Path};

use crate::{error::ConfigError, route::Route};

/// Read and deserialize a JSON route list.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file cannot be read and
/// [`ConfigError::Parse`] if it is not a valid route list; both name the
/// offending path.
pub fn load_routes(path: impl AsRef<Path>) -> Result<Vec<Route>, ConfigError> {
    let path = path.as_ref();

    let contents = fs::read(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    serde_json::from_slice(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}
