//! Error types for graph construction

use thiserror::Error;

/// Errors reported by a [`ResourceProvider`](crate::graph::ResourceProvider)
///
/// None of these abort a build: the branch that hit them is abandoned.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("no resource type registered for {kind} in {group_version}")]
    Discovery { group_version: String, kind: String },

    #[error("Kubernetes API request failed: {0}")]
    Api(#[from] kube::Error),

    #[error("provider call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("{0}")]
    Other(String),
}

/// Errors returned to callers of the graph builder
#[derive(Debug, Error)]
pub enum GraphError {
    /// The root handed to a strategy does not have the shape it needs
    #[error("invalid root for {strategy} graph: {reason}")]
    InvalidRoot {
        strategy: &'static str,
        reason: String,
    },

    /// A Helm storage Secret could not be decoded into a release
    #[error("invalid Helm release: {0:#}")]
    Release(anyhow::Error),

    /// The build was cancelled before it finished
    #[error("graph build cancelled")]
    Cancelled,
}

impl GraphError {
    pub(crate) fn invalid_root(strategy: &'static str, reason: impl Into<String>) -> Self {
        GraphError::InvalidRoot {
            strategy,
            reason: reason.into(),
        }
    }
}
