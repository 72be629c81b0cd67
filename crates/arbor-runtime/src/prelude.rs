//! Convenience re-exports of the types most consumers need.

pub use crate::controller::{EnvironmentController, EnvironmentHandle};
pub use crate::diagnostics::DiagnosticsDir;
pub use crate::environment::Environment;
pub use crate::error::{EnvironmentError, EnvironmentResult};
pub use crate::job::{Job, JobError, JobRights};
pub use crate::platform::{
    ApplicationController, CapabilityConnector, Platform, ProcessSpawner, SpawnError, SpawnRequest,
};
pub use crate::runner::{Runner, RunnerEntry, StartupInfo};
pub use crate::scope::CapabilityScope;
