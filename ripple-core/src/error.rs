//! Error types.
//!
//! Tracking and triggering never fail. Errors only come from strict store
//! access, record conversion, and executor construction.

use thiserror::Error;

/// Errors from store construction and strict access.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A strict read found no such property on the record.
    #[error("store has no property `{0}`")]
    MissingKey(String),

    /// A JSON value used as a record was not an object.
    #[error("expected a JSON object as the store record, found {0}")]
    NotAnObject(&'static str),
}

/// Errors from building a deferred executor.
#[derive(Debug, Error)]
pub enum ExecutorError {
    /// The tokio executor was requested outside of a tokio runtime.
    #[error("no tokio runtime is running on this thread")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    /// The runtime can run tasks on worker threads, which would break the
    /// single-threaded effect stack and the FIFO order of deferred tasks.
    #[error("deferred execution needs a current-thread tokio runtime, found {0:?}")]
    MultiThreaded(tokio::runtime::RuntimeFlavor),
}

/// Errors from loading a runtime configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid runtime configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("runtime label must not be empty")]
    EmptyLabel,
}
