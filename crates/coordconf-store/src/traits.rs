//! Client traits for the coordination store boundary.
//!
//! The loader never talks to the network directly: it only consumes the
//! capabilities below, so any store client (or an in-process fake) can be
//! plugged in.

use std::fmt::Debug;
use std::sync::{Arc, Weak};

use async_trait::async_trait;

use crate::error::StoreError;
use crate::retry::RetryPolicy;
use crate::types::{ClientState, NodeData, NodeEvent, WatchId};

/// Receives change notifications for a watched node.
///
/// Called on the client's own background context, possibly concurrently
/// with readers of whatever the listener updates.
pub trait NodeListener: Send + Sync {
    fn on_event(&self, event: NodeEvent);
}

/// A client connected to one coordination store endpoint.
///
/// # Example
///
/// ```ignore
/// use coordconf_store::{CoordinationClient, StoreError};
///
/// async fn children(client: &dyn CoordinationClient, root: &str) -> Result<Vec<String>, StoreError> {
///     if !client.exists(root).await? {
///         return Ok(Vec::new());
///     }
///     client.list_children(root).await
/// }
/// ```
#[async_trait]
pub trait CoordinationClient: Send + Sync + Debug {
    /// The endpoint this client targets.
    fn connect_string(&self) -> &str;

    /// Current lifecycle state.
    fn state(&self) -> ClientState;

    /// Connects the client, applying its retry policy.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::Connection` if the endpoint cannot be reached
    /// within the retry policy, `StoreError::Closed` if already closed.
    async fn start(&self) -> Result<(), StoreError>;

    /// Closes the client and drops all of its watches.
    async fn close(&self) -> Result<(), StoreError>;

    /// Returns whether a node exists at `path`.
    async fn exists(&self, path: &str) -> Result<bool, StoreError>;

    /// Creates a node at `path` with the given data.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NodeExists` if the node exists and
    /// `StoreError::NoParent` if its parent is missing.
    async fn create(&self, path: &str, data: &[u8]) -> Result<(), StoreError>;

    /// Reads the data of the node at `path`; `None` if it does not exist.
    async fn get_data(&self, path: &str) -> Result<Option<NodeData>, StoreError>;

    /// Lists the immediate children names of `path`, in store order.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::NoNode` if `path` does not exist.
    async fn list_children(&self, path: &str) -> Result<Vec<String>, StoreError>;

    /// Registers a persistent watch on `path`.
    ///
    /// The client only keeps a weak reference: once the listener is dropped
    /// no further events are delivered to it.
    fn watch(&self, path: &str, listener: Weak<dyn NodeListener>) -> Result<WatchId, StoreError>;

    /// Unregisters a watch. Returns `false` if it was not registered.
    fn unwatch(&self, id: WatchId) -> bool;
}

/// Builds unstarted clients for a connection string.
pub trait ClientFactory: Send + Sync {
    /// Constructs a client in the `Created` state.
    fn build(
        &self,
        connect_string: &str,
        retry: RetryPolicy,
    ) -> Result<Arc<dyn CoordinationClient>, StoreError>;
}

/// Type alias for a shareable client.
pub type DynClient = Arc<dyn CoordinationClient>;
