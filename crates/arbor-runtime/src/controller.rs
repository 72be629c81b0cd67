//! Environment controllers.
//!
//! Ownership of a nested environment is explicit and two-step: the parent
//! holds an [`EnvironmentController`] in its child registry, and
//! destruction only ever happens by extracting that controller
//! ([`Environment::extract_child`]) and dropping it. The client-facing
//! [`EnvironmentHandle`] drives the same path: `kill` extracts and drops,
//! and losing the controller connection (unless detached) does the same
//! through the parent's watcher.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use arbor_core::EnvironmentId;

use crate::environment::Environment;

/// Owning handle to one nested environment, held in the parent's child
/// registry. Dropping it destroys the environment: the containment unit is
/// killed and outstanding work is cancelled.
pub struct EnvironmentController {
    environment: Arc<Environment>,
    /// When set, loss of the controller connection no longer destroys the
    /// environment.
    detached: Arc<AtomicBool>,
}

impl EnvironmentController {
    pub(crate) fn new(environment: Arc<Environment>, detached: Arc<AtomicBool>) -> Self {
        Self {
            environment,
            detached,
        }
    }

    /// The owned environment.
    #[must_use]
    pub fn environment(&self) -> &Arc<Environment> {
        &self.environment
    }

    pub(crate) fn detach(&self) {
        self.detached.store(true, Ordering::SeqCst);
    }
}

impl std::fmt::Debug for EnvironmentController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnvironmentController")
            .field("id", &self.environment.id())
            .field("label", &self.environment.label())
            .finish_non_exhaustive()
    }
}

/// Client-side handle to a nested environment's controller.
#[derive(Debug)]
pub struct EnvironmentHandle {
    parent: Weak<Environment>,
    id: EnvironmentId,
}

impl EnvironmentHandle {
    pub(crate) fn new(parent: Weak<Environment>, id: EnvironmentId) -> Self {
        Self { parent, id }
    }

    /// The controlled environment's id.
    #[must_use]
    pub fn id(&self) -> EnvironmentId {
        self.id
    }

    /// Detach this environment from its parent and destroy it, then invoke
    /// `done`.
    pub fn kill(self, done: impl FnOnce()) {
        if let Some(parent) = self.parent.upgrade() {
            drop(parent.extract_child(self.id));
        }
        done();
    }

    /// Clear the self-destruct trigger: losing the controller connection
    /// becomes a no-op.
    pub fn detach(&self) {
        if let Some(parent) = self.parent.upgrade() {
            parent.detach_child(self.id);
        }
    }
}
