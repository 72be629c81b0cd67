//! Observational diagnostics directories.
//!
//! Every environment and every directly-launched application publishes a
//! read-only directory under its parent's diagnostics directory, named by
//! its label. The tree mirrors the orchestration tree for introspection
//! and is never authoritative state.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, PoisonError};

use arbor_core::DirectoryHandle;

/// One node of the diagnostics tree.
#[derive(Debug)]
pub struct DiagnosticsDir {
    handle: DirectoryHandle,
    entries: Mutex<BTreeMap<String, Arc<DiagnosticsDir>>>,
}

impl DiagnosticsDir {
    /// Create an empty diagnostics directory.
    #[must_use]
    pub fn new() -> Self {
        Self {
            handle: DirectoryHandle::new(),
            entries: Mutex::new(BTreeMap::new()),
        }
    }

    /// The directory handle under which this node is served.
    #[must_use]
    pub fn handle(&self) -> DirectoryHandle {
        self.handle.clone()
    }

    /// Register `child` under `label`, replacing any previous entry with
    /// the same label.
    pub fn insert(&self, label: impl Into<String>, child: Arc<DiagnosticsDir>) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(label.into(), child);
    }

    /// Remove the entry registered under `label`, if any.
    pub fn remove(&self, label: &str) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(label);
    }

    /// Look up the entry registered under `label`.
    #[must_use]
    pub fn get(&self, label: &str) -> Option<Arc<DiagnosticsDir>> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(label)
            .cloned()
    }

    /// All registered labels, sorted.
    #[must_use]
    pub fn list(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

impl Default for DiagnosticsDir {
    fn default() -> Self {
        Self::new()
    }
}
