//! First-wins namespace assembly.

use std::collections::HashSet;

use arbor_core::{DirectoryHandle, FlatNamespace};
use arbor_package::SandboxManifest;
use tracing::debug;

use crate::error::{NamespaceError, NamespaceResult};

/// Namespace path of the package root.
pub const PACKAGE_ROOT_PATH: &str = "/pkg";

/// Namespace path of the services directory.
pub const SERVICES_PATH: &str = "/svc";

/// Namespace path of the diagnostics directory.
pub const DIAGNOSTICS_PATH: &str = "/diagnostics";

/// Resolves sandbox source keys to concrete directories.
///
/// The sandbox manifest names *what* an application may see; the host
/// decides *where* those sources actually live.
pub trait SandboxResolver: Send + Sync {
    /// Resolve a source key, or `None` if the host does not grant it.
    fn resolve(&self, source_key: &str) -> Option<DirectoryHandle>;
}

/// One (path, directory) pair in a composed namespace.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceEntry {
    /// Absolute namespace path.
    pub path: String,
    /// Directory served at that path.
    pub directory: DirectoryHandle,
}

/// Accumulates namespace entries in layer order with strict first-wins
/// override semantics: once a path is present, later layers cannot
/// replace it.
#[derive(Debug, Default)]
pub struct NamespaceBuilder {
    entries: Vec<NamespaceEntry>,
    paths: HashSet<String>,
}

impl NamespaceBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one entry. Returns `false` (and changes nothing) if the path is
    /// already claimed by an earlier layer.
    pub fn add_directory(&mut self, path: impl Into<String>, directory: DirectoryHandle) -> bool {
        let path = path.into();
        if !self.paths.insert(path.clone()) {
            debug!(%path, "namespace path already claimed, keeping earlier entry");
            return false;
        }
        self.entries.push(NamespaceEntry { path, directory });
        true
    }

    /// Add the package root at [`PACKAGE_ROOT_PATH`].
    pub fn add_package_root(&mut self, directory: DirectoryHandle) {
        self.add_directory(PACKAGE_ROOT_PATH, directory);
    }

    /// Add the services directory at [`SERVICES_PATH`].
    pub fn add_services(&mut self, directory: DirectoryHandle) {
        self.add_directory(SERVICES_PATH, directory);
    }

    /// Add the diagnostics directory at [`DIAGNOSTICS_PATH`].
    pub fn add_diagnostics(&mut self, directory: DirectoryHandle) {
        self.add_directory(DIAGNOSTICS_PATH, directory);
    }

    /// Add every path a sandbox manifest declares, resolving source keys
    /// through the host.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::SandboxSource`] if the host does not grant
    /// a declared source; entries added before the failure remain.
    pub fn add_sandbox(
        &mut self,
        manifest: &SandboxManifest,
        resolver: &dyn SandboxResolver,
    ) -> NamespaceResult<()> {
        for (path, source_key) in &manifest.paths {
            let directory =
                resolver
                    .resolve(source_key)
                    .ok_or_else(|| NamespaceError::SandboxSource {
                        path: path.clone(),
                        source_key: source_key.clone(),
                    })?;
            self.add_directory(path.clone(), directory);
        }
        Ok(())
    }

    /// Merge a caller-supplied flat namespace; each path is added only if
    /// no earlier layer claimed it.
    ///
    /// # Errors
    ///
    /// Returns [`NamespaceError::FlatArity`] if the path and directory
    /// lists differ in length; nothing is added in that case.
    pub fn add_flat_namespace(&mut self, flat: &FlatNamespace) -> NamespaceResult<()> {
        if flat.paths.len() != flat.directories.len() {
            return Err(NamespaceError::FlatArity {
                paths: flat.paths.len(),
                directories: flat.directories.len(),
            });
        }
        for (path, directory) in flat.paths.iter().zip(&flat.directories) {
            self.add_directory(path.clone(), directory.clone());
        }
        Ok(())
    }

    /// Append the host's legacy default directories as a final fallback
    /// layer.
    pub fn add_legacy_defaults(&mut self, defaults: &[NamespaceEntry]) {
        for entry in defaults {
            self.add_directory(entry.path.clone(), entry.directory.clone());
        }
    }

    /// Finish composition.
    #[must_use]
    pub fn build(self) -> Namespace {
        Namespace {
            entries: self.entries,
        }
    }
}

/// A composed namespace: ordered, collision-free (first-wins already
/// applied) entries ready for the spawn primitive.
#[derive(Debug, Clone, Default)]
pub struct Namespace {
    entries: Vec<NamespaceEntry>,
}

impl Namespace {
    /// The directory served at `path`, if any.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&DirectoryHandle> {
        self.entries
            .iter()
            .find(|entry| entry.path == path)
            .map(|entry| &entry.directory)
    }

    /// All entries in layer order.
    #[must_use]
    pub fn entries(&self) -> &[NamespaceEntry] {
        &self.entries
    }
}
