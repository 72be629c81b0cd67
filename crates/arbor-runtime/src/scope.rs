//! Per-scope capability providers.
//!
//! A capability scope is what a client actually holds when it talks to an
//! environment: two built-in services (environment administration and
//! application launching), an optional layer of caller-supplied named
//! services, and a backing provider everything else forwards to. The
//! environment's default scope is backed by the host; per-launch scopes
//! derive from the default scope and layer an additional-services list on
//! top.

use std::sync::{Arc, Mutex, PoisonError, Weak};

use arbor_core::{
    AppControllerRequest, BoundHandle, CapabilityProvider, ControllerRequest, DirectoryHandle,
    DirectoryRequest, EnvironmentRequest, LaunchInfo, LauncherRequest, ServiceList,
    ServiceProviderRequest, ServiceRequest,
};
use tracing::warn;

use crate::controller::EnvironmentHandle;
use crate::environment::Environment;
use crate::error::EnvironmentResult;

/// Service name under which environment administration is published.
pub const ENVIRONMENT_SERVICE: &str = "arbor.Environment";

/// Service name under which application launching is published.
pub const LAUNCHER_SERVICE: &str = "arbor.Launcher";

/// A per-scope capability provider.
pub struct CapabilityScope {
    /// The scope this one derives from, if any.
    parent: Option<Arc<CapabilityScope>>,
    /// The environment this scope belongs to; validated at every use.
    environment: Weak<Environment>,
    /// Provider backing everything the scope does not serve itself.
    backing: Arc<dyn CapabilityProvider>,
    /// Caller-supplied named services layered over the backing.
    additional: Option<ServiceList>,
    /// This scope's service set in directory form.
    directory: DirectoryHandle,
    /// Connections bound to this scope, retained for their lifetime.
    bindings: Mutex<Vec<BoundHandle>>,
}

impl CapabilityScope {
    /// Create a scope with no parent, backed directly by an external
    /// provider. Used for every environment's default scope.
    pub(crate) fn rooted(
        backing: Arc<dyn CapabilityProvider>,
        environment: Weak<Environment>,
    ) -> Self {
        Self {
            parent: None,
            environment,
            backing,
            additional: None,
            directory: DirectoryHandle::new(),
            bindings: Mutex::new(Vec::new()),
        }
    }

    /// Derive a scope from `parent`, forwarding to the parent's backing
    /// provider and layering `additional` named services on top. Used for
    /// per-launch scopes carrying a caller's additional-services list.
    pub(crate) fn derived(
        parent: &Arc<CapabilityScope>,
        environment: Weak<Environment>,
        additional: ServiceList,
    ) -> Self {
        Self {
            parent: Some(Arc::clone(parent)),
            environment,
            backing: Arc::clone(&parent.backing),
            additional: Some(additional),
            directory: DirectoryHandle::new(),
            bindings: Mutex::new(Vec::new()),
        }
    }

    fn retain(&self, binding: BoundHandle) {
        self.bindings
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(binding);
    }

    fn environment(&self) -> Option<Arc<Environment>> {
        let env = self.environment.upgrade();
        if env.is_none() {
            warn!("capability scope outlived its environment, dropping request");
        }
        env
    }

    /// Bind a new environment-admin connection to this scope.
    pub fn add_binding(&self, request: EnvironmentRequest) {
        self.retain(request.bind());
    }

    /// Bind a new launcher connection to this scope.
    pub fn get_application_launcher(&self, request: LauncherRequest) {
        self.retain(request.bind());
    }

    /// Bind this scope's capability set as a service set.
    pub fn get_services(&self, request: ServiceProviderRequest) {
        self.retain(request.bind());
    }

    /// Bind this scope's capability set as a directory.
    pub fn get_directory(&self, request: DirectoryRequest) {
        self.retain(request.bind());
    }

    /// This scope's service set as an openable directory, if the backing
    /// set has a directory form.
    #[must_use]
    pub fn services_directory(&self) -> Option<DirectoryHandle> {
        self.backing.directory()?;
        Some(self.directory.clone())
    }

    /// Create a child environment of this scope's environment.
    ///
    /// # Errors
    ///
    /// Propagates [`crate::EnvironmentError::Containment`] from the child
    /// constructor; returns `Ok(None)` if this scope's environment is
    /// already gone.
    pub fn create_nested_environment(
        &self,
        host: Arc<dyn CapabilityProvider>,
        environment_request: EnvironmentRequest,
        controller_request: ControllerRequest,
        label: Option<String>,
    ) -> EnvironmentResult<Option<EnvironmentHandle>> {
        let Some(env) = self.environment() else {
            return Ok(None);
        };
        env.create_nested_environment(host, environment_request, controller_request, label)
            .map(Some)
    }

    /// Launch an application into this scope's environment, with this
    /// scope's capabilities.
    pub fn create_application(
        &self,
        launch_info: LaunchInfo,
        controller_request: Option<AppControllerRequest>,
    ) {
        let Some(env) = self.environment() else {
            drop(controller_request);
            return;
        };
        env.create_application(launch_info, controller_request);
    }
}

impl CapabilityProvider for CapabilityScope {
    fn open_service(&self, name: &str, request: ServiceRequest) {
        match name {
            ENVIRONMENT_SERVICE | LAUNCHER_SERVICE => self.retain(request.bind()),
            _ => {
                if let Some(additional) = &self.additional {
                    if additional.names.iter().any(|n| n == name) {
                        additional.provider.open_service(name, request);
                        return;
                    }
                }
                self.backing.open_service(name, request);
            }
        }
    }

    fn directory(&self) -> Option<DirectoryHandle> {
        self.services_directory()
    }
}

impl std::fmt::Debug for CapabilityScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapabilityScope")
            .field("has_parent", &self.parent.is_some())
            .field("directory", &self.directory)
            .finish_non_exhaustive()
    }
}
