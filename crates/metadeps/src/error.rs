//! Error types for metadeps operations.
//!
//! Every failure in this crate is fail-fast: graph mutations that would break
//! an invariant are rejected outright, and errors raised by listeners travel
//! back to the caller of [`Registry::notify_downstream`] unchanged.
//!
//! [`Registry::notify_downstream`]: crate::Registry::notify_downstream

use crate::domain::{ComponentKind, MetadataId};
use std::io;
use thiserror::Error;

/// The error type for metadeps operations.
#[derive(Debug, Error)]
pub enum Error {
    /// Identifier is blank or otherwise malformed.
    #[error("Invalid identifier {value:?}: {reason}")]
    InvalidIdentifier {
        /// The rejected input
        value: String,
        /// Why it was rejected
        reason: String,
    },

    /// An item cannot depend on itself.
    #[error("Self dependency rejected: {0}")]
    SelfDependency(MetadataId),

    /// Adding the edge would make an item transitively depend on itself.
    #[error("Circular dependency: {upstream} -> {downstream}")]
    CircularDependency {
        /// Proposed upstream item
        upstream: MetadataId,
        /// Proposed downstream item
        downstream: MetadataId,
    },

    /// A cycle was found while ordering the graph.
    #[error("Dependency graph contains a cycle through {0}")]
    CycleDetected(MetadataId),

    /// The two adjacency views disagree.
    #[error("Dependency graph is inconsistent: {0}")]
    GraphInconsistency(String),

    /// A second primary consumer was registered.
    #[error("Primary listener already registered ({existing}); refusing {rejected}")]
    DuplicatePrimaryListener {
        /// Kind of the listener holding the primary slot
        existing: ComponentKind,
        /// Kind of the listener that was refused
        rejected: ComponentKind,
    },

    /// Re-entrant notification went deeper than the configured limit.
    #[error("Notification depth limit {limit} exceeded while notifying downstream of {upstream}")]
    MaxDepthExceeded {
        /// Identifier whose notification would have exceeded the limit
        upstream: MetadataId,
        /// Configured maximum depth
        limit: usize,
    },

    /// A listener failed while handling a notification.
    #[error("Listener {kind} failed: {source}")]
    Listener {
        /// Kind of the failing listener
        kind: ComponentKind,
        /// Underlying failure
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error occurred.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

impl Error {
    /// Wrap a listener-side failure.
    pub fn listener(
        kind: ComponentKind,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Listener {
            kind,
            source: source.into(),
        }
    }

    pub(crate) fn invalid_identifier(value: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidIdentifier {
            value: value.into(),
            reason: reason.into(),
        }
    }
}

/// A specialized Result type for metadeps operations.
pub type Result<T> = std::result::Result<T, Error>;
