//! Launch dispatch.
//!
//! Turns one resolved package into a spawned process or a delegated
//! runner invocation. Package resolution is the only suspension point;
//! the continuation re-validates its environment reference afterwards, so
//! a tree torn down mid-resolution never sees the request. Per the
//! orchestrator's error contract, every failure path here logs and drops
//! the request; callers observe peer-closed and nothing else.

use std::sync::{Arc, Weak};

use arbor_core::{AppControllerRequest, DirectoryHandle, FlatNamespace, LaunchInfo};
use arbor_namespace::{Namespace, NamespaceBuilder};
use arbor_package::{
    APP_BINARY_PATH, LaunchKind, Loader, Package, PackageDirectory, RUNTIME_MANIFEST_PATH,
    RuntimeManifest, SANDBOX_MANIFEST_PATH, SandboxManifest, classify,
};
use tracing::{debug, info, warn};

use arbor_core::AppId;

use crate::diagnostics::DiagnosticsDir;
use crate::environment::Environment;
use crate::platform::SpawnRequest;
use crate::runner::StartupInfo;
use crate::scope::CapabilityScope;

/// Canonical argv[0] for a binary embedded in a package at
/// [`APP_BINARY_PATH`]; deliberately distinct from the URL-derived label.
const PACKAGED_APP_ARGV0: &str = "app";

/// Derive an application label from a canonical URL: the last path
/// segment, or the URL itself when it has none.
fn app_label_from_url(url: &str) -> String {
    url.rsplit('/')
        .find(|segment| !segment.is_empty())
        .unwrap_or(url)
        .to_string()
}

impl Environment {
    /// The resolution continuation: load the package, re-validate the
    /// environment, and dispatch. Shared by [`Environment::create_application`]
    /// (spawned on an owned task) and the runner registry (awaited inline
    /// so cycle detection runs within one call chain).
    pub(crate) async fn launch_application(
        weak: Weak<Environment>,
        loader: Arc<dyn Loader>,
        launch_info: LaunchInfo,
        controller_request: Option<AppControllerRequest>,
    ) {
        let url = launch_info.url.clone();
        let Some(package) = loader.load_url(&url).await else {
            warn!(%url, "package resolution failed, dropping launch request");
            return;
        };
        let Some(env) = weak.upgrade() else {
            debug!(%url, "environment destroyed during package resolution");
            return;
        };
        env.dispatch_package(package, launch_info, controller_request)
            .await;
    }

    /// Classify a resolved package and hand it to the right launch path.
    async fn dispatch_package(
        self: &Arc<Self>,
        package: Package,
        mut launch_info: LaunchInfo,
        controller_request: Option<AppControllerRequest>,
    ) {
        // The launched app sees the default scope unless the caller
        // supplied additional services, which get a scope of their own
        // layered over it.
        let scope = match launch_info.additional_services.take() {
            Some(services) => Arc::new(CapabilityScope::derived(
                self.default_scope(),
                Arc::downgrade(self),
                services,
            )),
            None => Arc::clone(self.default_scope()),
        };

        if let Some(data) = package.data.clone() {
            match classify(&data) {
                LaunchKind::Process => {
                    let label = app_label_from_url(&package.resolved_url);
                    let argv0 = label.clone();
                    self.launch_process(
                        &scope,
                        data,
                        label,
                        argv0,
                        None,
                        None,
                        launch_info,
                        controller_request,
                    )
                    .await;
                }
                LaunchKind::Runner(name) => {
                    self.launch_with_runner(
                        &name,
                        package,
                        &scope,
                        None,
                        None,
                        launch_info,
                        controller_request,
                    )
                    .await;
                }
                LaunchKind::Archive => {
                    let contents = match self.platform.archive_reader.open(&data) {
                        Ok(contents) => contents,
                        Err(err) => {
                            warn!(%err, url = %package.resolved_url, "unreadable package archive");
                            return;
                        }
                    };
                    self.launch_from_package_dir(
                        contents,
                        package.resolved_url,
                        &scope,
                        launch_info,
                        controller_request,
                    )
                    .await;
                }
            }
        } else if let Some(contents) = package.directory.clone() {
            self.launch_from_package_dir(
                contents,
                package.resolved_url,
                &scope,
                launch_info,
                controller_request,
            )
            .await;
        } else {
            warn!(url = %package.resolved_url, "loader returned an empty package");
        }
    }

    /// Launch from a package directory (unpacked archive or
    /// directory-backed package): the runtime manifest decides between a
    /// direct spawn of the embedded binary and runner delegation.
    async fn launch_from_package_dir(
        self: &Arc<Self>,
        contents: Arc<dyn PackageDirectory>,
        resolved_url: String,
        scope: &Arc<CapabilityScope>,
        launch_info: LaunchInfo,
        controller_request: Option<AppControllerRequest>,
    ) {
        let runtime = match contents.read_file(RUNTIME_MANIFEST_PATH).await {
            Ok(bytes) => match RuntimeManifest::parse(RUNTIME_MANIFEST_PATH, &bytes) {
                Ok(manifest) => Some(manifest),
                Err(err) => {
                    warn!(%err, url = %resolved_url, "malformed runtime manifest, dropping launch");
                    return;
                }
            },
            Err(_) => None,
        };

        let Some(runtime) = runtime else {
            // No runtime declaration: the package carries a directly
            // executable binary at the well-known path.
            let payload = match contents.read_file(APP_BINARY_PATH).await {
                Ok(payload) => payload,
                Err(err) => {
                    warn!(%err, url = %resolved_url, "package has neither runtime manifest nor app binary");
                    return;
                }
            };
            let label = app_label_from_url(&resolved_url);
            self.launch_process(
                scope,
                payload,
                label,
                PACKAGED_APP_ARGV0.to_string(),
                Some(contents.root()),
                None,
                launch_info,
                controller_request,
            )
            .await;
            return;
        };

        let sandbox = match contents.read_file(SANDBOX_MANIFEST_PATH).await {
            Ok(bytes) => match SandboxManifest::parse(SANDBOX_MANIFEST_PATH, &bytes) {
                Ok(manifest) => Some(manifest),
                Err(err) => {
                    warn!(%err, url = %resolved_url, "malformed sandbox manifest, dropping launch");
                    return;
                }
            },
            Err(_) => None,
        };

        // The runner receives the package by URL and directory only; the
        // original arguments stay in the startup info's launch_info.
        let inner = Package {
            data: None,
            directory: Some(Arc::clone(&contents)),
            resolved_url,
        };
        self.launch_with_runner(
            &runtime.runner,
            inner,
            scope,
            sandbox.as_ref(),
            Some(contents.root()),
            launch_info,
            controller_request,
        )
        .await;
    }

    /// Direct process launch.
    #[allow(clippy::too_many_arguments)]
    async fn launch_process(
        self: &Arc<Self>,
        scope: &Arc<CapabilityScope>,
        payload: Vec<u8>,
        label: String,
        argv0: String,
        package_root: Option<DirectoryHandle>,
        sandbox: Option<&SandboxManifest>,
        mut launch_info: LaunchInfo,
        controller_request: Option<AppControllerRequest>,
    ) {
        let Some(services) = scope.services_directory() else {
            warn!(url = %launch_info.url, "cannot open services directory, aborting launch");
            return;
        };
        let diagnostics = Arc::new(DiagnosticsDir::new());
        let Some(namespace) = self.assemble_namespace(
            services,
            diagnostics.handle(),
            package_root,
            sandbox,
            launch_info.flat_namespace.as_ref(),
            &launch_info.url,
        ) else {
            return;
        };

        let request = SpawnRequest {
            job: self.job(),
            payload,
            label: label.clone(),
            argv0,
            arguments: std::mem::take(&mut launch_info.arguments),
            namespace,
            out: launch_info.out.take(),
            err: launch_info.err.take(),
            service_request: launch_info.service_request.take(),
            controller: controller_request,
            diagnostics,
        };
        match self.platform.spawner.spawn(request).await {
            Ok(controller) => {
                let id = AppId::new();
                info!(url = %launch_info.url, %label, %id, "application launched");
                self.register_application(id, controller);
            }
            Err(err) => {
                warn!(%err, url = %launch_info.url, "process spawn failed, aborting launch");
            }
        }
    }

    /// Runner-mediated launch. This node does no controller bookkeeping
    /// for runner-mediated apps; the runner owns that.
    #[allow(clippy::too_many_arguments)]
    async fn launch_with_runner(
        self: &Arc<Self>,
        name: &str,
        package: Package,
        scope: &Arc<CapabilityScope>,
        sandbox: Option<&SandboxManifest>,
        package_root: Option<DirectoryHandle>,
        launch_info: LaunchInfo,
        controller_request: Option<AppControllerRequest>,
    ) {
        let Some(services) = scope.services_directory() else {
            warn!(url = %launch_info.url, "cannot open services directory, aborting launch");
            return;
        };
        let diagnostics = Arc::new(DiagnosticsDir::new());
        let Some(namespace) = self.assemble_namespace(
            services,
            diagnostics.handle(),
            package_root,
            sandbox,
            launch_info.flat_namespace.as_ref(),
            &launch_info.url,
        ) else {
            return;
        };

        let Some(entry) = self.get_or_create_runner(name).await else {
            warn!(runner = name, url = %launch_info.url, "runner unavailable, aborting launch");
            return;
        };
        let startup = StartupInfo {
            launch_info,
            namespace,
        };
        entry
            .runner()
            .start_application(package, startup, controller_request)
            .await;
    }

    /// Compose a launch namespace in override order: package root,
    /// services, diagnostics, sandbox-declared paths, caller flat
    /// namespace, legacy defaults — strictly first-wins throughout.
    fn assemble_namespace(
        &self,
        services: DirectoryHandle,
        diagnostics: DirectoryHandle,
        package_root: Option<DirectoryHandle>,
        sandbox: Option<&SandboxManifest>,
        flat: Option<&FlatNamespace>,
        url: &str,
    ) -> Option<Namespace> {
        let mut builder = NamespaceBuilder::new();
        if let Some(root) = package_root {
            builder.add_package_root(root);
        }
        builder.add_services(services);
        builder.add_diagnostics(diagnostics);
        if let Some(manifest) = sandbox {
            if let Err(err) =
                builder.add_sandbox(manifest, self.platform.sandbox_resolver.as_ref())
            {
                warn!(%err, %url, "sandbox paths unresolvable, aborting launch");
                return None;
            }
        }
        if let Some(flat) = flat {
            if let Err(err) = builder.add_flat_namespace(flat) {
                warn!(%err, %url, "malformed flat namespace, aborting launch");
                return None;
            }
        }
        builder.add_legacy_defaults(&self.platform.legacy_defaults);
        Some(builder.build())
    }
}
