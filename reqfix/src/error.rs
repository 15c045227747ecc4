//! Error handling for reqfix.

use std::path::PathBuf;

use thiserror::Error;

/// The reqfix error.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// A [`reqfix_types::Error`].
    #[error(transparent)]
    Types(#[from] reqfix_types::Error),

    /// The configured resolver binary cannot be found.
    #[error("Resolver command '{binary}' not found: {source}")]
    ResolverNotFound {
        /// The binary name or path that was looked up.
        binary: String,
        /// The lookup error.
        source: which::Error,
    },

    /// The input contained no valid requirements.
    #[error("No valid requirements found in the input")]
    NoValidRequirements,

    /// A filesystem operation failed.
    #[error("I/O error while {context} {path}: {source}")]
    IoPath {
        /// The path the operation was performed on.
        path: PathBuf,
        /// A short description of the attempted operation.
        context: &'static str,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// A version catalog file does not contain a valid name-to-versions map.
    #[error("Malformed version catalog {path}: {source}")]
    MalformedCatalog {
        /// The path of the catalog file.
        path: PathBuf,
        /// The deserialisation error.
        source: serde_json::Error,
    },

    /// JSON output could not be produced.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
