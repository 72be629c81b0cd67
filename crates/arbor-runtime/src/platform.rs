//! Platform collaborator seams: process spawning, typed capability
//! connection, and the bundle of primitives a tree is constructed with.

use std::sync::Arc;

use arbor_core::{
    AppControllerRequest, CapabilityProvider, ClientEnd, IoHandle, ServiceProviderMarker,
    ServiceProviderRequest,
};
use arbor_namespace::{Namespace, NamespaceEntry, SandboxResolver};
use arbor_package::{ArchiveReader, Loader};
use async_trait::async_trait;
use thiserror::Error;

use crate::diagnostics::DiagnosticsDir;
use crate::job::Job;
use crate::runner::Runner;

/// A process could not be spawned.
#[derive(Debug, Error)]
pub enum SpawnError {
    /// Process creation was rejected by the kernel or loader primitive.
    #[error("process creation failed: {0}")]
    Create(String),

    /// The containment unit refused to adopt the process.
    #[error("containment unit rejected the process: {0}")]
    Containment(String),
}

/// Everything the spawn primitive needs to start one process.
pub struct SpawnRequest<'a> {
    /// Containment unit the process is created under.
    pub job: &'a dyn Job,
    /// Executable payload bytes.
    pub payload: Vec<u8>,
    /// Human-readable label for bookkeeping and diagnostics.
    pub label: String,
    /// argv[0] for the launched program.
    pub argv0: String,
    /// Remaining program arguments.
    pub arguments: Vec<String>,
    /// The composed namespace the process observes.
    pub namespace: Namespace,
    /// Standard-output sink, if the caller supplied one.
    pub out: Option<IoHandle>,
    /// Standard-error sink, if the caller supplied one.
    pub err: Option<IoHandle>,
    /// Where the process should serve its outgoing services.
    pub service_request: Option<ServiceProviderRequest>,
    /// Controller request to bind for the caller, if it asked for one.
    pub controller: Option<AppControllerRequest>,
    /// Diagnostics directory pre-created for this application.
    pub diagnostics: Arc<DiagnosticsDir>,
}

/// The external process-spawn primitive.
#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    /// Spawn a process and return its controller.
    ///
    /// Implementations bind `request.controller` (when present) to the
    /// returned controller so the caller observes the process lifetime;
    /// on error the request is dropped and the caller sees peer-closed.
    ///
    /// # Errors
    ///
    /// Returns [`SpawnError`] if the process could not be created.
    async fn spawn(&self, request: SpawnRequest<'_>)
    -> Result<Arc<dyn ApplicationController>, SpawnError>;
}

/// The per-application controller object tracking one running process.
///
/// External to the orchestrator; only its extraction contract is consumed
/// here: a label, a diagnostics directory, and a termination signal.
#[async_trait]
pub trait ApplicationController: Send + Sync {
    /// The application's label.
    fn label(&self) -> &str;

    /// The application's diagnostics directory.
    fn diagnostics_dir(&self) -> Arc<DiagnosticsDir>;

    /// Resolves when the application terminates or its controller
    /// connection fails.
    async fn wait_terminated(&self);
}

/// Builds typed clients over opaque capability connections.
pub trait CapabilityConnector: Send + Sync {
    /// Connect a package loader through `provider`.
    ///
    /// Called while the owning environment is still under construction;
    /// implementations must capture the provider and defer any service
    /// traffic until the loader is first used.
    fn connect_loader(&self, provider: Arc<dyn CapabilityProvider>) -> Arc<dyn Loader>;

    /// Connect a runner client through a launched runner's service
    /// directory.
    fn connect_runner(&self, services: &ClientEnd<ServiceProviderMarker>) -> Arc<dyn Runner>;
}

/// The bundle of platform primitives a tree is constructed with. Shared by
/// every environment in one tree.
#[derive(Clone)]
pub struct Platform {
    /// Typed-capability connector.
    pub connector: Arc<dyn CapabilityConnector>,
    /// Archive reader for inline package payloads.
    pub archive_reader: Arc<dyn ArchiveReader>,
    /// Process-spawn primitive.
    pub spawner: Arc<dyn ProcessSpawner>,
    /// Resolver for sandbox-declared namespace sources.
    pub sandbox_resolver: Arc<dyn SandboxResolver>,
    /// Legacy default namespace entries appended as the final fallback
    /// layer of every launched process's namespace.
    pub legacy_defaults: Vec<NamespaceEntry>,
}

impl std::fmt::Debug for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Platform")
            .field("legacy_defaults", &self.legacy_defaults)
            .finish_non_exhaustive()
    }
}
