//! Arbor Namespace - Layered capability-namespace composition.
//!
//! Assembles the filesystem-like view a launched process observes from
//! multiple ordered sources with strict first-wins override semantics:
//! package root, services directory, diagnostics directory,
//! sandbox-declared paths, the caller's flat namespace, and finally the
//! host's legacy defaults. Binding a built namespace into a process is the
//! spawn primitive's concern, not this crate's.

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod builder;
pub mod error;

pub use builder::{
    DIAGNOSTICS_PATH, Namespace, NamespaceBuilder, NamespaceEntry, PACKAGE_ROOT_PATH,
    SERVICES_PATH, SandboxResolver,
};
pub use error::{NamespaceError, NamespaceResult};
