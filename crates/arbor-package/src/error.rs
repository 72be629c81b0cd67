//! Package error types.

use thiserror::Error;

/// Errors that can occur while reading or interpreting a package.
#[derive(Debug, Error)]
pub enum PackageError {
    /// A well-known file is missing from the package.
    #[error("missing package file: {path}")]
    MissingFile {
        /// Package-relative path of the missing file.
        path: String,
    },

    /// The package payload is not a readable archive.
    #[error("malformed archive: {0}")]
    Archive(String),

    /// A manifest file failed to parse.
    #[error("malformed manifest {path}: {source}")]
    Manifest {
        /// Package-relative path of the manifest.
        path: String,
        /// The underlying parse error.
        #[source]
        source: serde_json::Error,
    },

    /// Reading through the package directory failed.
    #[error("package read failed: {0}")]
    Read(String),
}

/// Result type for package operations.
pub type PackageResult<T> = Result<T, PackageError>;
