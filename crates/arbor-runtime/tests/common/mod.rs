//! Stub platform collaborators shared by the integration suites.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use arbor_core::{
    BoundHandle, CapabilityProvider, ClientEnd, ControllerMarker, DirectoryHandle,
    EnvironmentMarker, ServiceProviderRequest, ServiceRequest, endpoints,
};
use arbor_namespace::{Namespace, NamespaceEntry, SandboxResolver};
use arbor_package::{
    ArchiveReader, Loader, Package, PackageDirectory, PackageError, PackageResult,
};
use arbor_runtime::{
    ApplicationController, CapabilityConnector, DiagnosticsDir, Environment, EnvironmentHandle,
    Job, JobError, JobRights, Platform, ProcessSpawner, Runner, SpawnError, SpawnRequest,
    StartupInfo,
};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Containment-unit stub counting kills across the whole tree.
pub struct StubJob {
    kills: Arc<AtomicUsize>,
}

impl StubJob {
    pub fn new(kills: Arc<AtomicUsize>) -> Self {
        Self { kills }
    }
}

impl Job for StubJob {
    fn create_child(&self, _rights: JobRights) -> Result<Box<dyn Job>, JobError> {
        Ok(Box::new(StubJob {
            kills: Arc::clone(&self.kills),
        }))
    }

    fn kill(&self) {
        self.kills.fetch_add(1, Ordering::SeqCst);
    }
}

/// Containment unit that refuses to derive children.
pub struct FailingJob;

impl Job for FailingJob {
    fn create_child(&self, _rights: JobRights) -> Result<Box<dyn Job>, JobError> {
        Err(JobError("out of kernel resources".into()))
    }

    fn kill(&self) {}
}

/// Host capability provider; drops every service request.
pub struct StubProvider {
    directory: Option<DirectoryHandle>,
}

impl StubProvider {
    pub fn new() -> Self {
        Self {
            directory: Some(DirectoryHandle::new()),
        }
    }

    /// A provider whose service set has no directory form, which makes
    /// every launch through it abort at namespace assembly.
    pub fn without_directory() -> Self {
        Self { directory: None }
    }
}

impl CapabilityProvider for StubProvider {
    fn open_service(&self, _name: &str, request: ServiceRequest) {
        drop(request);
    }

    fn directory(&self) -> Option<DirectoryHandle> {
        self.directory.clone()
    }
}

/// In-memory package directory.
pub struct MemoryPackageDir {
    root: DirectoryHandle,
    files: HashMap<String, Vec<u8>>,
}

impl MemoryPackageDir {
    pub fn new() -> Self {
        Self {
            root: DirectoryHandle::new(),
            files: HashMap::new(),
        }
    }

    pub fn with_file(mut self, path: &str, bytes: &[u8]) -> Self {
        self.files.insert(path.to_string(), bytes.to_vec());
        self
    }

    pub fn root_handle(&self) -> DirectoryHandle {
        self.root.clone()
    }
}

#[async_trait]
impl PackageDirectory for MemoryPackageDir {
    async fn read_file(&self, path: &str) -> PackageResult<Vec<u8>> {
        self.files
            .get(path)
            .cloned()
            .ok_or_else(|| PackageError::MissingFile {
                path: path.to_string(),
            })
    }

    fn root(&self) -> DirectoryHandle {
        self.root.clone()
    }
}

/// Loader stub serving pre-registered packages and recording every call.
#[derive(Default)]
pub struct StubLoader {
    packages: Mutex<HashMap<String, Package>>,
    calls: Mutex<Vec<String>>,
    delay: Mutex<Option<Duration>>,
}

impl StubLoader {
    pub fn insert_payload(&self, url: &str, data: &[u8]) {
        self.packages.lock().unwrap().insert(
            url.to_string(),
            Package {
                data: Some(data.to_vec()),
                directory: None,
                resolved_url: url.to_string(),
            },
        );
    }

    pub fn insert_directory(&self, url: &str, directory: Arc<dyn PackageDirectory>) {
        self.packages.lock().unwrap().insert(
            url.to_string(),
            Package {
                data: None,
                directory: Some(directory),
                resolved_url: url.to_string(),
            },
        );
    }

    pub fn insert_empty(&self, url: &str) {
        self.packages.lock().unwrap().insert(
            url.to_string(),
            Package {
                data: None,
                directory: None,
                resolved_url: url.to_string(),
            },
        );
    }

    /// Delay every resolution; used to keep a request in flight across a
    /// teardown.
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = Some(delay);
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| *c == url).count()
    }
}

#[async_trait]
impl Loader for StubLoader {
    async fn load_url(&self, url: &str) -> Option<Package> {
        self.calls.lock().unwrap().push(url.to_string());
        let delay = *self.delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.packages.lock().unwrap().get(url).cloned()
    }
}

/// What the spawn primitive saw for one process.
pub struct SpawnRecord {
    pub label: String,
    pub argv0: String,
    pub arguments: Vec<String>,
    pub namespace: Namespace,
    pub has_service_request: bool,
}

/// Application controller stub; terminable from the test.
pub struct StubAppController {
    label: String,
    diagnostics: Arc<DiagnosticsDir>,
    terminated: CancellationToken,
    bindings: Mutex<Vec<BoundHandle>>,
}

impl StubAppController {
    /// Simulate process exit: release the controller binding and signal
    /// termination.
    pub fn terminate(&self) {
        self.bindings.lock().unwrap().clear();
        self.terminated.cancel();
    }
}

#[async_trait]
impl ApplicationController for StubAppController {
    fn label(&self) -> &str {
        &self.label
    }

    fn diagnostics_dir(&self) -> Arc<DiagnosticsDir> {
        Arc::clone(&self.diagnostics)
    }

    async fn wait_terminated(&self) {
        self.terminated.cancelled().await;
    }
}

/// Spawn primitive stub recording requests and handing out terminable
/// controllers.
#[derive(Default)]
pub struct StubSpawner {
    pub records: Mutex<Vec<SpawnRecord>>,
    pub controllers: Mutex<Vec<Arc<StubAppController>>>,
    pub fail: AtomicBool,
}

impl StubSpawner {
    pub fn spawn_count(&self) -> usize {
        self.records.lock().unwrap().len()
    }
}

#[async_trait]
impl ProcessSpawner for StubSpawner {
    async fn spawn(
        &self,
        request: SpawnRequest<'_>,
    ) -> Result<Arc<dyn ApplicationController>, SpawnError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(SpawnError::Create("forced failure".into()));
        }

        self.records.lock().unwrap().push(SpawnRecord {
            label: request.label.clone(),
            argv0: request.argv0.clone(),
            arguments: request.arguments.clone(),
            namespace: request.namespace.clone(),
            has_service_request: request.service_request.is_some(),
        });

        let mut bindings = Vec::new();
        if let Some(controller) = request.controller {
            bindings.push(controller.bind());
        }
        if let Some(service_request) = request.service_request {
            bindings.push(service_request.bind());
        }

        let controller = Arc::new(StubAppController {
            label: request.label,
            diagnostics: request.diagnostics,
            terminated: CancellationToken::new(),
            bindings: Mutex::new(bindings),
        });
        self.controllers.lock().unwrap().push(Arc::clone(&controller));
        Ok(controller)
    }
}

/// What a runner saw for one delegated application.
pub struct StartedApp {
    pub resolved_url: String,
    pub url: String,
    pub arguments: Vec<String>,
    pub namespace: Namespace,
}

/// Runner stub recording every delegated start.
#[derive(Default)]
pub struct StubRunner {
    pub started: Mutex<Vec<StartedApp>>,
    bindings: Mutex<Vec<BoundHandle>>,
}

impl StubRunner {
    pub fn started_count(&self) -> usize {
        self.started.lock().unwrap().len()
    }
}

#[async_trait]
impl Runner for StubRunner {
    async fn start_application(
        &self,
        package: Package,
        startup: StartupInfo,
        controller: Option<arbor_core::AppControllerRequest>,
    ) {
        self.started.lock().unwrap().push(StartedApp {
            resolved_url: package.resolved_url,
            url: startup.launch_info.url,
            arguments: startup.launch_info.arguments,
            namespace: startup.namespace,
        });
        if let Some(controller) = controller {
            self.bindings.lock().unwrap().push(controller.bind());
        }
    }
}

/// Archive reader stub keyed by exact payload bytes.
#[derive(Default)]
pub struct StubArchiveReader {
    archives: Mutex<Vec<(Vec<u8>, Arc<dyn PackageDirectory>)>>,
}

impl StubArchiveReader {
    pub fn register(&self, bytes: &[u8], directory: Arc<dyn PackageDirectory>) {
        self.archives
            .lock()
            .unwrap()
            .push((bytes.to_vec(), directory));
    }
}

impl ArchiveReader for StubArchiveReader {
    fn open(&self, bytes: &[u8]) -> PackageResult<Arc<dyn PackageDirectory>> {
        self.archives
            .lock()
            .unwrap()
            .iter()
            .find(|(registered, _)| registered.as_slice() == bytes)
            .map(|(_, directory)| Arc::clone(directory))
            .ok_or_else(|| PackageError::Archive("unknown archive".into()))
    }
}

/// Sandbox resolver stub with explicit grants.
#[derive(Default)]
pub struct StubResolver {
    sources: Mutex<HashMap<String, DirectoryHandle>>,
}

impl StubResolver {
    pub fn grant(&self, source_key: &str, directory: DirectoryHandle) {
        self.sources
            .lock()
            .unwrap()
            .insert(source_key.to_string(), directory);
    }
}

impl SandboxResolver for StubResolver {
    fn resolve(&self, source_key: &str) -> Option<DirectoryHandle> {
        self.sources.lock().unwrap().get(source_key).cloned()
    }
}

/// Connector stub: every environment gets the shared loader, and runner
/// connections resolve to the shared runner stub.
pub struct StubConnector {
    loader: Arc<StubLoader>,
    runner: Arc<StubRunner>,
}

impl StubConnector {
    pub fn new(loader: Arc<StubLoader>, runner: Arc<StubRunner>) -> Self {
        Self { loader, runner }
    }
}

impl CapabilityConnector for StubConnector {
    fn connect_loader(
        &self,
        _provider: Arc<dyn CapabilityProvider>,
    ) -> Arc<dyn Loader> {
        Arc::clone(&self.loader) as Arc<dyn Loader>
    }

    fn connect_runner(
        &self,
        _services: &ClientEnd<arbor_core::ServiceProviderMarker>,
    ) -> Arc<dyn Runner> {
        Arc::clone(&self.runner) as Arc<dyn Runner>
    }
}

/// Options for building a [`Harness`].
#[derive(Default)]
pub struct HarnessOptions {
    pub legacy_defaults: Vec<NamespaceEntry>,
    pub host_without_directory: bool,
    pub first_nested_services: Option<ServiceProviderRequest>,
}

/// A root environment wired to stub collaborators.
pub struct Harness {
    pub loader: Arc<StubLoader>,
    pub spawner: Arc<StubSpawner>,
    pub runner: Arc<StubRunner>,
    pub archive_reader: Arc<StubArchiveReader>,
    pub resolver: Arc<StubResolver>,
    pub kills: Arc<AtomicUsize>,
    pub root: Arc<Environment>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_options(HarnessOptions::default())
    }

    pub fn with_options(options: HarnessOptions) -> Self {
        let loader = Arc::new(StubLoader::default());
        let spawner = Arc::new(StubSpawner::default());
        let runner = Arc::new(StubRunner::default());
        let archive_reader = Arc::new(StubArchiveReader::default());
        let resolver = Arc::new(StubResolver::default());
        let kills = Arc::new(AtomicUsize::new(0));

        let platform = Platform {
            connector: Arc::new(StubConnector::new(
                Arc::clone(&loader),
                Arc::clone(&runner),
            )),
            archive_reader: Arc::clone(&archive_reader) as Arc<dyn ArchiveReader>,
            spawner: Arc::clone(&spawner) as Arc<dyn ProcessSpawner>,
            sandbox_resolver: Arc::clone(&resolver) as Arc<dyn SandboxResolver>,
            legacy_defaults: options.legacy_defaults,
        };

        let host: Arc<dyn CapabilityProvider> = if options.host_without_directory {
            Arc::new(StubProvider::without_directory())
        } else {
            Arc::new(StubProvider::new())
        };

        let default_job = StubJob::new(Arc::clone(&kills));
        let root = Environment::new_root(
            "root",
            &default_job,
            host,
            platform,
            options.first_nested_services,
        )
        .expect("root environment");

        Self {
            loader,
            spawner,
            runner,
            archive_reader,
            resolver,
            kills,
            root,
        }
    }
}

/// A nested environment plus the client-side connections that keep it
/// alive.
pub struct NestedEnv {
    pub handle: EnvironmentHandle,
    pub environment_client: ClientEnd<EnvironmentMarker>,
    pub controller_client: ClientEnd<ControllerMarker>,
}

/// Create a nested environment under `parent` with a fresh stub host.
pub fn nest(parent: &Arc<Environment>, label: Option<&str>) -> NestedEnv {
    let (environment_client, environment_server) = endpoints();
    let (controller_client, controller_server) = endpoints();
    let handle = parent
        .create_nested_environment(
            Arc::new(StubProvider::new()),
            environment_server,
            controller_server,
            label.map(str::to_string),
        )
        .expect("create nested environment");
    NestedEnv {
        handle,
        environment_client,
        controller_client,
    }
}

/// Poll until `condition` holds; panics after a generous timeout.
pub async fn wait_for(description: &str, mut condition: impl FnMut() -> bool) {
    for _ in 0..1000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("timed out waiting for {description}");
}
