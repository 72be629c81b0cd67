//! Runtime error types.
//!
//! Almost nothing in the orchestrator surfaces a typed error: a bad launch
//! request is logged and dropped, and the caller only ever observes
//! peer-closed on its own request channel. The exceptions below are the
//! hard failures an environment constructor is allowed to propagate.

use thiserror::Error;

use crate::job::JobError;

/// Errors that can occur while constructing or administering environments.
#[derive(Debug, Error)]
pub enum EnvironmentError {
    /// The containment unit for a new environment could not be created.
    ///
    /// This is the only failure class that propagates out of environment
    /// construction; everything else degrades to a dropped request.
    #[error("containment unit creation failed: {0}")]
    Containment(#[from] JobError),
}

/// Result type for environment operations.
pub type EnvironmentResult<T> = Result<T, EnvironmentError>;
