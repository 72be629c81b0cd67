//! The resolved-package model and its collaborator seams.

use std::sync::Arc;

use arbor_core::DirectoryHandle;
use async_trait::async_trait;

use crate::error::PackageResult;

/// Package-relative path of the sandbox manifest.
pub const SANDBOX_MANIFEST_PATH: &str = "meta/sandbox";

/// Package-relative path of the runtime manifest.
pub const RUNTIME_MANIFEST_PATH: &str = "meta/runtime";

/// Package-relative path of the embedded application binary.
pub const APP_BINARY_PATH: &str = "bin/app";

/// A package resolved from a URL.
///
/// Carries inline payload bytes, a directory view, or both. A package with
/// neither is a loader failure and is dropped by dispatch.
#[derive(Clone, Default)]
pub struct Package {
    /// Inline payload bytes, when the loader produced them.
    pub data: Option<Vec<u8>>,
    /// Directory view of the package contents, when available.
    pub directory: Option<Arc<dyn PackageDirectory>>,
    /// The canonical URL the package was resolved from.
    pub resolved_url: String,
}

impl std::fmt::Debug for Package {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Package")
            .field("data", &self.data.as_ref().map(Vec::len))
            .field("directory", &self.directory.is_some())
            .field("resolved_url", &self.resolved_url)
            .finish()
    }
}

/// Resolves package URLs to package contents.
#[async_trait]
pub trait Loader: Send + Sync {
    /// Resolve `url` to a package, or `None` if resolution failed.
    async fn load_url(&self, url: &str) -> Option<Package>;
}

/// A readable view of a package's contents.
#[async_trait]
pub trait PackageDirectory: Send + Sync {
    /// Read a file at a package-relative path.
    async fn read_file(&self, path: &str) -> PackageResult<Vec<u8>>;

    /// The directory handle for the package root.
    fn root(&self) -> DirectoryHandle;
}

/// Opens archive payload bytes as a package directory.
pub trait ArchiveReader: Send + Sync {
    /// Open `bytes` as an archive.
    ///
    /// # Errors
    ///
    /// Returns [`crate::PackageError::Archive`] if the payload is not a
    /// readable archive.
    fn open(&self, bytes: &[u8]) -> PackageResult<Arc<dyn PackageDirectory>>;
}
