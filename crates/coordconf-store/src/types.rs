//! Core types shared by all coordination store clients.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a client.
///
/// A client moves `Created -> Started` exactly once and `Started -> Closed`
/// only when it is shut down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientState {
    Created,
    Started,
    Closed,
}

impl fmt::Display for ClientState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Created => write!(f, "created"),
            Self::Started => write!(f, "started"),
            Self::Closed => write!(f, "closed"),
        }
    }
}

/// Data stored on a node together with its modification version.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct NodeData {
    /// Opaque node payload.
    pub bytes: Vec<u8>,
    /// Store-wide modification id of the last write to this node.
    ///
    /// Strictly increasing across all writes in a store, so a larger value is
    /// always the more recent state of the node.
    pub version: i64,
}

impl NodeData {
    pub fn new(bytes: impl Into<Vec<u8>>, version: i64) -> Self {
        Self {
            bytes: bytes.into(),
            version,
        }
    }
}

/// Change notification delivered to a [`NodeListener`](crate::NodeListener).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeEvent {
    /// Node was created or its data was rewritten.
    DataChanged { path: String, data: NodeData },
    /// Node was deleted by the write with modification id `version`.
    Deleted { path: String, version: i64 },
    /// The watch could not deliver a change (e.g. session loss while re-reading).
    Error { path: String, message: String },
}

impl NodeEvent {
    /// Path the event refers to.
    pub fn path(&self) -> &str {
        match self {
            Self::DataChanged { path, .. }
            | Self::Deleted { path, .. }
            | Self::Error { path, .. } => {
                path
            }
        }
    }
}

/// Identifier of a registered watch, used to unregister it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WatchId(pub u64);

impl fmt::Display for WatchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "watch#{}", self.0)
    }
}
