//! Delegated execution engines and their cycle-safe lazy registry.
//!
//! A runner is itself a launched application; starting one therefore goes
//! back through the launch pipeline. The registry caches one started
//! runner per name per environment and uses a pending sentinel to detect
//! a runner that (directly or transitively) requires itself.

use std::sync::Arc;

use arbor_core::{
    AppControllerMarker, AppControllerRequest, ClientEnd, LaunchInfo, ServiceProviderMarker,
    canonicalize_url, endpoints,
};
use arbor_namespace::Namespace;
use arbor_package::Package;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::environment::{Environment, lock};

/// Everything a runner needs to start one application, short of the
/// package itself.
pub struct StartupInfo {
    /// The original launch request (URL already canonical; arguments and
    /// handles untouched).
    pub launch_info: LaunchInfo,
    /// The namespace composed for the application.
    pub namespace: Namespace,
}

/// A delegated execution engine.
#[async_trait]
pub trait Runner: Send + Sync {
    /// Hand an application to the runner. The runner owns all further
    /// bookkeeping for it, including the controller binding.
    async fn start_application(
        &self,
        package: Package,
        startup: StartupInfo,
        controller: Option<AppControllerRequest>,
    );
}

/// A started, cached runner.
pub struct RunnerEntry {
    runner: Arc<dyn Runner>,
    /// Connection to the runner app's outgoing services; held open for the
    /// life of the entry.
    _services: ClientEnd<ServiceProviderMarker>,
    /// Connection to the runner app's controller; watched for eviction.
    controller: ClientEnd<AppControllerMarker>,
}

impl RunnerEntry {
    /// The runner client.
    #[must_use]
    pub fn runner(&self) -> &Arc<dyn Runner> {
        &self.runner
    }
}

impl std::fmt::Debug for RunnerEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RunnerEntry")
            .field("controller_closed", &self.controller.is_closed())
            .finish_non_exhaustive()
    }
}

/// Registry slot for one runner name. Absence of a slot is the third
/// state: never requested.
#[derive(Debug)]
pub(crate) enum RunnerState {
    /// Requested but not yet resolved; doubles as the cycle sentinel.
    Pending,
    /// Resolved and reusable.
    Ready(Arc<RunnerEntry>),
}

impl Environment {
    /// Resolve the named runner, starting it on first use.
    ///
    /// Returns `None` if the runner cannot be started or if resolution is
    /// already in progress further up this call chain (a cycle). The
    /// pending sentinel stays in place for the outer call; a nested
    /// detection does not touch it.
    pub async fn get_or_create_runner(self: &Arc<Self>, name: &str) -> Option<Arc<RunnerEntry>> {
        {
            let mut runners = lock(&self.runners);
            match runners.get(name) {
                Some(RunnerState::Ready(entry)) => return Some(Arc::clone(entry)),
                Some(RunnerState::Pending) => {
                    warn!(runner = name, "runner requires itself, aborting resolution");
                    return None;
                }
                None => {
                    runners.insert(name.to_string(), RunnerState::Pending);
                }
            }
        }

        match self.create_runner(name).await {
            Some(entry) => {
                lock(&self.runners)
                    .insert(name.to_string(), RunnerState::Ready(Arc::clone(&entry)));
                self.watch_runner(name, &entry);
                info!(runner = name, "runner started");
                Some(entry)
            }
            None => {
                lock(&self.runners).remove(name);
                None
            }
        }
    }

    /// Launch the runner as an ordinary application and connect to it.
    async fn create_runner(self: &Arc<Self>, name: &str) -> Option<Arc<RunnerEntry>> {
        let Some(url) = canonicalize_url(name) else {
            warn!(runner = name, "runner name is not a valid url");
            return None;
        };

        let (services_client, services_server) = endpoints::<ServiceProviderMarker>();
        let (controller_client, controller_server) = endpoints::<AppControllerMarker>();

        let mut launch_info = LaunchInfo::new(url);
        launch_info.service_request = Some(services_server);

        // The recursive trip back through the launch pipeline; boxed to
        // break the cycle in the future type.
        Box::pin(Environment::launch_application(
            Arc::downgrade(self),
            Arc::clone(&self.loader),
            launch_info,
            Some(controller_server),
        ))
        .await;

        if controller_client.is_closed() {
            warn!(runner = name, "runner application failed to launch");
            return None;
        }

        let runner = self.platform.connector.connect_runner(&services_client);
        Some(Arc::new(RunnerEntry {
            runner,
            _services: services_client,
            controller: controller_client,
        }))
    }

    /// Evict the cached entry when the runner app's controller connection
    /// fails, permitting a fresh attempt later.
    fn watch_runner(self: &Arc<Self>, name: &str, entry: &Arc<RunnerEntry>) {
        let weak = Arc::downgrade(self);
        let cancel = self.cancel.clone();
        let entry = Arc::clone(entry);
        let name = name.to_string();
        tokio::spawn(async move {
            tokio::select! {
                () = cancel.cancelled() => {}
                () = entry.controller.on_closed() => {
                    let Some(env) = weak.upgrade() else { return };
                    let mut runners = lock(&env.runners);
                    // Only evict our own entry; a replacement may already
                    // be resolving under the same name.
                    if matches!(
                        runners.get(&name),
                        Some(RunnerState::Ready(current)) if Arc::ptr_eq(current, &entry)
                    ) {
                        runners.remove(&name);
                        info!(runner = %name, "runner connection lost, evicting");
                    }
                }
            }
        });
    }
}
