//! Arbor Runtime - The environment orchestrator.
//!
//! This crate provides:
//! - The recursive environment tree with self-destructing controllers
//! - Per-scope capability providers with built-in and delegated routes
//! - The launch-dispatch pipeline (direct spawn, archive, runner)
//! - A cycle-safe lazy registry of delegated runners
//! - Observational diagnostics directories mirroring the tree
//!
//! # Architecture
//!
//! A tree is built from one [`Environment::new_root`] call; every further
//! environment nests under an existing one. Environments own three
//! registries (children, applications, runners) and mutate them only on
//! their own execution context. Launch requests resolve packages through
//! an injected [`arbor_package::Loader`] and continue on owned,
//! cancellable tasks that re-validate the environment after suspension.
//!
//! Failures of a single launch request never propagate: they are logged
//! and the caller observes peer-closed on its request channel.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod controller;
pub mod diagnostics;
pub mod environment;
pub mod error;
pub mod job;
pub mod platform;
pub mod runner;
pub mod scope;

mod dispatch;

pub use controller::{EnvironmentController, EnvironmentHandle};
pub use diagnostics::DiagnosticsDir;
pub use environment::{Environment, MAX_LABEL_LENGTH};
pub use error::{EnvironmentError, EnvironmentResult};
pub use job::{Job, JobError, JobRights};
pub use platform::{
    ApplicationController, CapabilityConnector, Platform, ProcessSpawner, SpawnError, SpawnRequest,
};
pub use runner::{Runner, RunnerEntry, StartupInfo};
pub use scope::{CapabilityScope, ENVIRONMENT_SERVICE, LAUNCHER_SERVICE};
