//! Store error types for the coordination store client boundary.

/// Errors reported by a coordination store client.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StoreError {
    /// The client could not connect to (or was never able to reach) the endpoint.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of the connection error.
        message: String,
    },

    /// The node does not exist.
    #[error("Node not found: {path}")]
    NoNode {
        /// Path of the missing node.
        path: String,
    },

    /// Attempted to create a node that already exists.
    #[error("Node already exists: {path}")]
    NodeExists {
        /// Path of the existing node.
        path: String,
    },

    /// Attempted to create a node whose parent does not exist.
    #[error("Parent node missing for: {path}")]
    NoParent {
        /// Path of the node whose parent is missing.
        path: String,
    },

    /// Attempted to delete a node that still has children.
    #[error("Node has children: {path}")]
    NotEmpty {
        /// Path of the non-empty node.
        path: String,
    },

    /// The path is not a valid absolute store path.
    #[error("Invalid path '{path}': {reason}")]
    InvalidPath {
        /// The rejected path.
        path: String,
        /// Why the path was rejected.
        reason: String,
    },

    /// The client is not started or has already been closed.
    #[error("Client not usable: {message}")]
    Closed {
        /// Description of the client state.
        message: String,
    },

    /// A transient failure while talking to the store (e.g. lost session).
    #[error("Store unavailable: {message}")]
    Unavailable {
        /// Description of the failure.
        message: String,
    },

    /// An internal client error occurred.
    #[error("Internal error: {message}")]
    Internal {
        /// Description of the internal error.
        message: String,
    },
}

impl StoreError {
    /// Creates a new `Connection` error.
    #[must_use]
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Creates a new `NoNode` error.
    #[must_use]
    pub fn no_node(path: impl Into<String>) -> Self {
        Self::NoNode { path: path.into() }
    }

    /// Creates a new `NodeExists` error.
    #[must_use]
    pub fn node_exists(path: impl Into<String>) -> Self {
        Self::NodeExists { path: path.into() }
    }

    /// Creates a new `NoParent` error.
    #[must_use]
    pub fn no_parent(path: impl Into<String>) -> Self {
        Self::NoParent { path: path.into() }
    }

    /// Creates a new `NotEmpty` error.
    #[must_use]
    pub fn not_empty(path: impl Into<String>) -> Self {
        Self::NotEmpty { path: path.into() }
    }

    /// Creates a new `InvalidPath` error.
    #[must_use]
    pub fn invalid_path(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidPath {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// Creates a new `Closed` error.
    #[must_use]
    pub fn closed(message: impl Into<String>) -> Self {
        Self::Closed {
            message: message.into(),
        }
    }

    /// Creates a new `Unavailable` error.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a `NodeExists` error.
    #[must_use]
    pub fn is_node_exists(&self) -> bool {
        matches!(self, Self::NodeExists { .. })
    }

    /// Returns `true` if this is a `NoNode` error.
    #[must_use]
    pub fn is_no_node(&self) -> bool {
        matches!(self, Self::NoNode { .. })
    }

    /// Returns `true` if this is a `Connection` error.
    #[must_use]
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. })
    }
}
