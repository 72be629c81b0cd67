//! The kernel containment-unit seam.

use thiserror::Error;

/// Rights granted to a derived containment unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobRights {
    /// Full rights of the parent unit.
    Full,
    /// A restricted subset suitable for untrusted children.
    Restricted,
}

/// A containment-unit operation failed at the kernel boundary.
#[derive(Debug, Error)]
#[error("containment unit failure: {0}")]
pub struct JobError(pub String);

/// A kernel containment unit ("job"): the resource and lifetime boundary
/// that bounds everything spawned under one environment.
///
/// Units nest; killing a unit transitively terminates every unit and
/// process created under it. The orchestrator relies on that nesting for
/// teardown instead of recursing through its own bookkeeping.
pub trait Job: Send + Sync {
    /// Derive a child unit with the given rights.
    ///
    /// # Errors
    ///
    /// Returns [`JobError`] if the kernel refuses to create the unit; the
    /// caller treats this as fatal for the environment being built.
    fn create_child(&self, rights: JobRights) -> Result<Box<dyn Job>, JobError>;

    /// Kill the unit and everything under it.
    fn kill(&self);
}
