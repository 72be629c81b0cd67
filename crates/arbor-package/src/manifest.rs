//! Sandbox and runtime manifest parsing.
//!
//! Both manifests are small JSON documents stored at well-known paths
//! inside a package. The sandbox manifest declares the extra namespace
//! paths an application is allowed to see; the runtime manifest names the
//! delegated runner that should execute the package.

use std::collections::BTreeMap;

use serde::Deserialize;

use crate::error::{PackageError, PackageResult};

/// Declaration of the extra namespace paths an application may see.
///
/// Maps a namespace path (e.g. `/data`) to a sandbox source key the host
/// resolves to a concrete directory at namespace-assembly time.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct SandboxManifest {
    /// Namespace path -> sandbox source key.
    #[serde(default)]
    pub paths: BTreeMap<String, String>,
}

impl SandboxManifest {
    /// Parse a sandbox manifest from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::Manifest`] if the document is not valid
    /// JSON of the expected shape.
    pub fn parse(path: &str, bytes: &[u8]) -> PackageResult<Self> {
        serde_json::from_slice(bytes).map_err(|source| PackageError::Manifest {
            path: path.to_string(),
            source,
        })
    }
}

/// Declaration of which runner should execute a package.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RuntimeManifest {
    /// Name of the delegated runner.
    pub runner: String,
}

impl RuntimeManifest {
    /// Parse a runtime manifest from raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`PackageError::Manifest`] if the document is not valid
    /// JSON of the expected shape.
    pub fn parse(path: &str, bytes: &[u8]) -> PackageResult<Self> {
        serde_json::from_slice(bytes).map_err(|source| PackageError::Manifest {
            path: path.to_string(),
            source,
        })
    }
}
