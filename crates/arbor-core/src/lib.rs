//! Arbor Core - Foundation types for the Arbor environment orchestrator.
//!
//! This crate provides:
//! - Typed channel endpoints with peer-closed observation
//! - Unforgeable directory and I/O handle tokens
//! - Environment and application identifiers
//! - Launch-request types shared across the workspace
//! - URL canonicalization

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

pub mod handles;
pub mod launch;
pub mod provider;
pub mod types;
pub mod urls;

pub use handles::{
    AppControllerMarker, AppControllerRequest, BoundHandle, ClientEnd, ControllerMarker,
    ControllerRequest, DirectoryHandle, DirectoryMarker, DirectoryRequest, EnvironmentMarker,
    EnvironmentRequest, IoHandle, LauncherMarker, LauncherRequest, ServerEnd, ServiceMarker,
    ServiceProviderMarker, ServiceProviderRequest, ServiceRequest, endpoints,
};
pub use launch::{FlatNamespace, LaunchInfo, ServiceList};
pub use provider::CapabilityProvider;
pub use types::{AppId, EnvironmentId};
pub use urls::canonicalize_url;
