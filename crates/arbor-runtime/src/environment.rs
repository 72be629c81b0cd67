//! The environment tree.
//!
//! An environment is one vertex of the orchestration tree: it owns a
//! containment unit, a default capability scope, and three registries —
//! child environments (via their controllers), launched applications (via
//! their controllers), and started runners. Environments are created only
//! by nesting under an existing node, except for the root, which an
//! external host constructs once.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use arbor_core::{
    AppControllerRequest, AppId, CapabilityProvider, ControllerRequest, EnvironmentId,
    EnvironmentRequest, LaunchInfo, ServiceProviderRequest, canonicalize_url,
};
use arbor_package::Loader;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::controller::{EnvironmentController, EnvironmentHandle};
use crate::diagnostics::DiagnosticsDir;
use crate::error::EnvironmentResult;
use crate::job::{Job, JobRights};
use crate::platform::{ApplicationController, Platform};
use crate::runner::RunnerState;
use crate::scope::CapabilityScope;

/// Maximum length of an environment label, in bytes.
pub const MAX_LABEL_LENGTH: usize = 32;

/// Lock a registry map, ignoring poisoning: registries hold plain data and
/// a panicked writer cannot leave them logically inconsistent.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State shared by every environment in one tree.
#[derive(Debug)]
pub(crate) struct TreeContext {
    /// Source of generated labels; one sequence for the whole tree.
    label_counter: AtomicU64,
    /// Services request handed to the root by its creator, served from the
    /// first nested environment ever created in the tree.
    first_nested_services: Mutex<Option<ServiceProviderRequest>>,
}

impl TreeContext {
    fn new(first_nested_services: Option<ServiceProviderRequest>) -> Self {
        Self {
            label_counter: AtomicU64::new(1),
            first_nested_services: Mutex::new(first_nested_services),
        }
    }

    fn next_label(&self) -> String {
        format!("env-{}", self.label_counter.fetch_add(1, Ordering::Relaxed))
    }

    fn take_first_nested_services(&self) -> Option<ServiceProviderRequest> {
        lock(&self.first_nested_services).take()
    }
}

/// One vertex of the environment tree.
pub struct Environment {
    id: EnvironmentId,
    label: String,
    /// Parent node; `None` for the root.
    parent: Option<Weak<Environment>>,
    /// This node's containment unit; killed on drop.
    job: Box<dyn Job>,
    /// Default capability scope, backed by the host provider.
    scope: Arc<CapabilityScope>,
    /// Loader reached through the default scope's capabilities.
    pub(crate) loader: Arc<dyn Loader>,
    /// Child environments by id, owned via their controllers.
    children: Mutex<HashMap<EnvironmentId, EnvironmentController>>,
    /// Directly-launched applications by id.
    apps: Mutex<HashMap<AppId, Arc<dyn ApplicationController>>>,
    /// Started runners by name.
    pub(crate) runners: Mutex<HashMap<String, RunnerState>>,
    /// This node's diagnostics directory.
    diagnostics: Arc<DiagnosticsDir>,
    /// Cancels outstanding dispatch and watcher tasks at teardown.
    pub(crate) cancel: CancellationToken,
    ctx: Arc<TreeContext>,
    pub(crate) platform: Platform,
}

impl Environment {
    /// Construct the root of a new tree.
    ///
    /// `default_job` is the unit the root's own containment unit is
    /// derived from. `first_nested_services`, when supplied by the host's
    /// creator, is served from the first nested environment ever created
    /// anywhere in the tree.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EnvironmentError::Containment`] if the root's
    /// containment unit cannot be created.
    pub fn new_root(
        label: impl Into<String>,
        default_job: &dyn Job,
        host: Arc<dyn CapabilityProvider>,
        platform: Platform,
        first_nested_services: Option<ServiceProviderRequest>,
    ) -> EnvironmentResult<Arc<Self>> {
        let ctx = Arc::new(TreeContext::new(first_nested_services));
        Self::new(
            None,
            truncate_label(label.into()),
            default_job,
            host,
            ctx,
            platform,
        )
    }

    fn new(
        parent: Option<Weak<Environment>>,
        label: String,
        parent_job: &dyn Job,
        host: Arc<dyn CapabilityProvider>,
        ctx: Arc<TreeContext>,
        platform: Platform,
    ) -> EnvironmentResult<Arc<Self>> {
        let job = parent_job.create_child(JobRights::Restricted)?;
        let env = Arc::new_cyclic(|weak: &Weak<Environment>| {
            let scope = Arc::new(CapabilityScope::rooted(host, weak.clone()));
            let provider: Arc<dyn CapabilityProvider> = Arc::clone(&scope) as _;
            let loader = platform.connector.connect_loader(provider);
            Environment {
                id: EnvironmentId::new(),
                label,
                parent,
                job,
                scope,
                loader,
                children: Mutex::new(HashMap::new()),
                apps: Mutex::new(HashMap::new()),
                runners: Mutex::new(HashMap::new()),
                diagnostics: Arc::new(DiagnosticsDir::new()),
                cancel: CancellationToken::new(),
                ctx,
                platform,
            }
        });
        Ok(env)
    }

    /// This environment's id.
    #[must_use]
    pub fn id(&self) -> EnvironmentId {
        self.id
    }

    /// This environment's label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// The parent environment, if it is still alive.
    #[must_use]
    pub fn parent(&self) -> Option<Arc<Environment>> {
        self.parent.as_ref().and_then(Weak::upgrade)
    }

    /// This environment's default capability scope.
    #[must_use]
    pub fn default_scope(&self) -> &Arc<CapabilityScope> {
        &self.scope
    }

    /// This environment's containment unit.
    pub(crate) fn job(&self) -> &dyn Job {
        self.job.as_ref()
    }

    /// This environment's diagnostics directory.
    #[must_use]
    pub fn diagnostics(&self) -> &Arc<DiagnosticsDir> {
        &self.diagnostics
    }

    /// Ids of the currently registered child environments.
    #[must_use]
    pub fn child_ids(&self) -> Vec<EnvironmentId> {
        lock(&self.children).keys().copied().collect()
    }

    /// Ids of the currently registered applications.
    #[must_use]
    pub fn application_ids(&self) -> Vec<AppId> {
        lock(&self.apps).keys().copied().collect()
    }

    /// Create a nested environment under this one.
    ///
    /// Binds `environment_request` to the child's default scope, registers
    /// the child's diagnostics directory under its label, and installs a
    /// controller that self-extracts when `controller_request`'s peer goes
    /// away (unless detached). Must be called from within a runtime.
    ///
    /// # Errors
    ///
    /// Returns [`crate::EnvironmentError::Containment`] if the child's
    /// containment unit cannot be created.
    pub fn create_nested_environment(
        self: &Arc<Self>,
        host: Arc<dyn CapabilityProvider>,
        environment_request: EnvironmentRequest,
        controller_request: ControllerRequest,
        label: Option<String>,
    ) -> EnvironmentResult<EnvironmentHandle> {
        let label = match label.filter(|l| !l.is_empty()) {
            Some(requested) => truncate_label(requested),
            None => self.ctx.next_label(),
        };
        let child = Self::new(
            Some(Arc::downgrade(self)),
            label,
            self.job.as_ref(),
            host,
            Arc::clone(&self.ctx),
            self.platform.clone(),
        )?;

        child.scope.add_binding(environment_request);
        self.diagnostics
            .insert(child.label.clone(), Arc::clone(&child.diagnostics));

        // One-time hand-off: the very first nested environment in the tree
        // serves the process-start-time services request.
        if let Some(request) = self.ctx.take_first_nested_services() {
            child.scope.get_services(request);
        }

        let id = child.id;
        let detached = Arc::new(AtomicBool::new(false));
        let controller = EnvironmentController::new(Arc::clone(&child), Arc::clone(&detached));
        lock(&self.children).insert(id, controller);

        // Armed only after the controller is registered, so a client that
        // drops its end immediately still finds something to extract.
        self.watch_controller(controller_request, &child, &detached);
        info!(label = %child.label, %id, "created nested environment");

        Ok(EnvironmentHandle::new(Arc::downgrade(self), id))
    }

    /// Self-destruct trigger: when the controller connection's peer goes
    /// away and the controller has not been detached, extract the child
    /// and drop it.
    fn watch_controller(
        self: &Arc<Self>,
        controller_request: ControllerRequest,
        child: &Arc<Environment>,
        detached: &Arc<AtomicBool>,
    ) {
        let parent = Arc::downgrade(self);
        let child_cancel = child.cancel.clone();
        let id = child.id;
        let detached = Arc::clone(detached);
        tokio::spawn(async move {
            tokio::select! {
                () = child_cancel.cancelled() => {}
                () = controller_request.on_closed() => {
                    if detached.load(Ordering::SeqCst) {
                        return;
                    }
                    let Some(parent) = parent.upgrade() else { return };
                    if let Some(controller) = parent.extract_child(id) {
                        info!(%id, "controller connection lost, destroying environment");
                        drop(controller);
                    }
                }
            }
        });
    }

    /// Atomically remove and return the controller for `child`, removing
    /// its diagnostics entry with it. Dropping the returned controller
    /// destroys the child.
    #[must_use]
    pub fn extract_child(&self, child: EnvironmentId) -> Option<EnvironmentController> {
        let controller = lock(&self.children).remove(&child)?;
        self.diagnostics.remove(controller.environment().label());
        Some(controller)
    }

    /// Atomically remove and return the controller for `app`, removing its
    /// diagnostics entry with it.
    #[must_use]
    pub fn extract_application(&self, app: AppId) -> Option<Arc<dyn ApplicationController>> {
        let controller = lock(&self.apps).remove(&app)?;
        self.diagnostics.remove(controller.label());
        Some(controller)
    }

    /// Clear the self-destruct trigger for `child`.
    pub(crate) fn detach_child(&self, child: EnvironmentId) {
        if let Some(controller) = lock(&self.children).get(&child) {
            controller.detach();
        }
    }

    /// Register a spawned application and watch it for termination.
    pub(crate) fn register_application(
        self: &Arc<Self>,
        id: AppId,
        controller: Arc<dyn ApplicationController>,
    ) {
        self.diagnostics
            .insert(controller.label().to_string(), controller.diagnostics_dir());
        lock(&self.apps).insert(id, Arc::clone(&controller));

        let weak = Arc::downgrade(self);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = controller.wait_terminated() => {
                    let Some(env) = weak.upgrade() else { return };
                    if env.extract_application(id).is_some() {
                        debug!(%id, label = controller.label(), "application terminated");
                    }
                }
            }
        });
    }

    /// Begin asynchronous launch dispatch for `launch_info`.
    ///
    /// Rejects (logs, drops) requests whose URL is empty or fails
    /// canonicalization; otherwise replaces the URL with its canonical
    /// form and hands off to the resolution pipeline on an owned task.
    /// Failure is only ever observable as peer-closed on
    /// `controller_request`. Must be called from within a runtime.
    pub fn create_application(
        self: &Arc<Self>,
        mut launch_info: LaunchInfo,
        controller_request: Option<AppControllerRequest>,
    ) {
        let Some(canonical) = canonicalize_url(&launch_info.url) else {
            warn!(url = %launch_info.url, "rejecting launch with invalid url");
            return;
        };
        launch_info.url = canonical;

        let weak = Arc::downgrade(self);
        let loader = Arc::clone(&self.loader);
        let cancel = self.cancel.clone();
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {
                    debug!("launch cancelled by environment teardown");
                }
                () = Environment::launch_application(weak, loader, launch_info, controller_request) => {}
            }
        });
    }
}

impl Drop for Environment {
    fn drop(&mut self) {
        self.cancel.cancel();
        // Killing the unit transitively terminates everything spawned
        // under this environment; descendants are not walked here.
        self.job.kill();
    }
}

impl std::fmt::Debug for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish_non_exhaustive()
    }
}

/// Truncate a label to [`MAX_LABEL_LENGTH`] bytes on a char boundary.
fn truncate_label(mut label: String) -> String {
    if label.len() > MAX_LABEL_LENGTH {
        let mut end = MAX_LABEL_LENGTH;
        while !label.is_char_boundary(end) {
            end = end.saturating_sub(1);
        }
        label.truncate(end);
    }
    label
}
