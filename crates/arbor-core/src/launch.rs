//! Launch-request types.

use std::sync::Arc;

use crate::handles::{DirectoryHandle, IoHandle, ServiceProviderRequest};
use crate::provider::CapabilityProvider;

/// A caller-supplied list of named services to layer over an environment's
/// default scope for one launched application.
#[derive(Clone)]
pub struct ServiceList {
    /// Names of the services the application may reach.
    pub names: Vec<String>,
    /// Provider that serves connection requests for those names.
    pub provider: Arc<dyn CapabilityProvider>,
}

impl std::fmt::Debug for ServiceList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceList")
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

/// A caller-supplied flat list of (path, directory) pairs to merge into a
/// launched process's namespace.
#[derive(Debug, Clone, Default)]
pub struct FlatNamespace {
    /// Namespace paths, parallel to `directories`.
    pub paths: Vec<String>,
    /// Directory handles, parallel to `paths`.
    pub directories: Vec<DirectoryHandle>,
}

/// Everything a caller specifies when asking for an application launch.
#[derive(Debug, Default)]
pub struct LaunchInfo {
    /// Package URL to resolve and launch.
    pub url: String,
    /// Arguments handed to the launched program.
    pub arguments: Vec<String>,
    /// Where the application's outgoing services should be served.
    pub service_request: Option<ServiceProviderRequest>,
    /// Standard-output sink for the launched process.
    pub out: Option<IoHandle>,
    /// Standard-error sink for the launched process.
    pub err: Option<IoHandle>,
    /// Extra named services layered over the environment's default scope.
    pub additional_services: Option<ServiceList>,
    /// Caller-declared namespace entries (merged last-resort, first-wins).
    pub flat_namespace: Option<FlatNamespace>,
}

impl LaunchInfo {
    /// Create a launch request for `url` with no extras.
    #[must_use]
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }
}
