//! Error types for kube-nukem

use std::fmt;

use thiserror::Error;

/// Result type for kube-nukem
pub type Result<T> = std::result::Result<T, Error>;

/// Step of the nuke sequence an error occurred in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Fetching the CRD
    Fetch,
    /// Deleting the CRD
    Delete,
    /// Picking the served version of the CRD
    Resolve,
    /// Enumerating namespaces for a namespaced CRD
    ListNamespaces,
    /// Listing instances of the custom resource
    ListObjects,
    /// Clearing finalizers on an instance
    Patch,
    /// Polling for the CRD to disappear
    Poll,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Phase::Fetch => "retrieve CRD",
            Phase::Delete => "delete CRD resource",
            Phase::Resolve => "resolve served version of",
            Phase::ListNamespaces => "list namespaces",
            Phase::ListObjects => "list objects",
            Phase::Patch => "remove finalizers from",
            Phase::Poll => "check final CRD existence of",
        };
        f.write_str(s)
    }
}

/// Error type for kube-nukem
#[derive(Debug, Error)]
pub enum Error {
    /// The addressed object or resource type does not exist
    #[error("not found: {0}")]
    NotFound(String),

    /// Kubernetes API or transport error
    #[error("Kubernetes API error: {0}")]
    KubeError(String),

    /// The CRD has no version that is currently served
    #[error("CRD {crd} has no version marked as `served`")]
    NoServedVersion { crd: String },

    /// Client configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Work was interrupted by the process-wide cancellation token
    #[error("operation cancelled")]
    Cancelled,

    /// An error annotated with the step and resource it happened on
    #[error("failed to {phase} {target}: {source}")]
    Phase {
        phase: Phase,
        target: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Wrap `source` with the phase and resource it concerned.
    ///
    /// Cancellation is passed through untouched so callers can still match on it.
    pub fn phase(phase: Phase, target: impl Into<String>, source: Error) -> Self {
        match source {
            Error::Cancelled => Error::Cancelled,
            source => Error::Phase {
                phase,
                target: target.into(),
                source: Box::new(source),
            },
        }
    }

    /// Whether this error, or the error it wraps, is a not-found condition
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::NotFound(_) => true,
            Error::Phase { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Whether the work was cancelled
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }

    /// The phase this error was raised in, if known
    pub fn failed_phase(&self) -> Option<Phase> {
        match self {
            Error::Phase { phase, .. } => Some(*phase),
            _ => None,
        }
    }
}

impl From<kube::Error> for Error {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(resp) if resp.code == 404 => Error::NotFound(resp.message),
            other => Error::KubeError(other.to_string()),
        }
    }
}
