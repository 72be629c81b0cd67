//! Arbor Package - Package model and format handling for the Arbor
//! environment orchestrator.
//!
//! This crate provides:
//! - The resolved-package model and the loader/archive-reader seams
//! - Payload classification (raw executable, archive, runner declaration)
//! - Sandbox and runtime manifest parsing

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod classify;
pub mod error;
pub mod manifest;
pub mod package;

pub use classify::{ARCHIVE_MAGIC, CLASSIFY_PREFIX_CAP, LaunchKind, RUNNER_MARKER, classify};
pub use error::{PackageError, PackageResult};
pub use manifest::{RuntimeManifest, SandboxManifest};
pub use package::{
    APP_BINARY_PATH, ArchiveReader, Loader, Package, PackageDirectory, RUNTIME_MANIFEST_PATH,
    SANDBOX_MANIFEST_PATH,
};
