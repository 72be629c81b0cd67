//! Namespace composition error types.

use thiserror::Error;

/// Errors that can occur while composing a namespace.
#[derive(Debug, Error)]
pub enum NamespaceError {
    /// A flat namespace's path and directory lists differ in length.
    #[error("flat namespace arity mismatch: {paths} paths, {directories} directories")]
    FlatArity {
        /// Number of paths supplied.
        paths: usize,
        /// Number of directories supplied.
        directories: usize,
    },

    /// A sandbox source key could not be resolved to a directory.
    #[error("unresolvable sandbox source {source_key:?} for path {path}")]
    SandboxSource {
        /// The namespace path being declared.
        path: String,
        /// The source key the resolver rejected.
        source_key: String,
    },
}

/// Result type for namespace operations.
pub type NamespaceResult<T> = Result<T, NamespaceError>;
