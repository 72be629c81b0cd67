//! The capability-provider seam.

use crate::handles::{DirectoryHandle, ServiceRequest};

/// A source of named service connections.
///
/// Implemented by the host for the root environment's backing capabilities
/// and for caller-supplied additional-services lists; implemented inside
/// the orchestrator by each capability scope.
pub trait CapabilityProvider: Send + Sync {
    /// Route a connection request for the named service.
    ///
    /// Unknown names drop `request`, which the caller observes as
    /// peer-closed.
    fn open_service(&self, name: &str, request: ServiceRequest);

    /// The provider's service set as an openable directory, if it has one.
    ///
    /// Used when assembling a launched process's namespace; a provider
    /// without a directory form causes that launch to be aborted.
    fn directory(&self) -> Option<DirectoryHandle>;
}
