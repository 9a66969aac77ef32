use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

use coordconf_store::{NodeData, NodeEvent, StoreError, path};
use indexmap::IndexSet;
use tokio::sync::broadcast;
use tracing::debug;

/// Capacity of the change feed shared by all clients of a store.
const EVENT_CAPACITY: usize = 1024;

#[derive(Debug, Default)]
struct Node {
    data: Vec<u8>,
    /// Modification id of the last write.
    version: i64,
    /// Child names in creation order.
    children: IndexSet<String>,
}

#[derive(Debug)]
struct StoreInner {
    nodes: HashMap<String, Node>,
    /// Last issued modification id.
    last_version: i64,
    /// One-shot failures for the next `list_children` on a path.
    list_failures: HashMap<String, StoreError>,
}

impl StoreInner {
    fn next_version(&mut self) -> i64 {
        self.last_version += 1;
        self.last_version
    }
}

/// In-process hierarchical store.
///
/// This store provides:
/// - A tree of nodes rooted at `/`, each with data and a version
/// - Children enumerated in creation order
/// - A change feed that clients turn into watch notifications
/// - Fault injection hooks for availability, enumeration and close failures
#[derive(Debug)]
pub struct MemoryStore {
    inner: Mutex<StoreInner>,
    events: broadcast::Sender<NodeEvent>,
    available: AtomicBool,
    fail_close: AtomicBool,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store containing only the root node.
    pub fn new() -> Self {
        let mut nodes = HashMap::new();
        nodes.insert("/".to_string(), Node::default());
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            inner: Mutex::new(StoreInner {
                nodes,
                last_version: 0,
                list_failures: HashMap::new(),
            }),
            events,
            available: AtomicBool::new(true),
            fail_close: AtomicBool::new(false),
        }
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn publish(&self, event: NodeEvent) {
        // No receivers simply means no client is watching yet.
        let _ = self.events.send(event);
    }

    pub(crate) fn subscribe(&self) -> broadcast::Receiver<NodeEvent> {
        self.events.subscribe()
    }

    // ==================== Node operations ====================

    /// Returns whether a node exists at `path`.
    pub fn exists(&self, node_path: &str) -> Result<bool, StoreError> {
        path::validate(node_path)?;
        Ok(self.lock().nodes.contains_key(node_path))
    }

    /// Creates a node; its parent must exist.
    pub fn create(&self, node_path: &str, data: &[u8]) -> Result<(), StoreError> {
        path::validate(node_path)?;
        let parent = path::parent(node_path)
            .ok_or_else(|| StoreError::node_exists(node_path))?
            .to_string();

        let node_data = {
            let mut inner = self.lock();
            if inner.nodes.contains_key(node_path) {
                return Err(StoreError::node_exists(node_path));
            }
            let parent_node = inner
                .nodes
                .get_mut(&parent)
                .ok_or_else(|| StoreError::no_parent(node_path))?;
            parent_node
                .children
                .insert(path::name(node_path).to_string());
            let version = inner.next_version();
            inner.nodes.insert(
                node_path.to_string(),
                Node {
                    data: data.to_vec(),
                    version,
                    children: IndexSet::new(),
                },
            );
            NodeData::new(data, version)
        };

        debug!(path = node_path, "node created");
        self.publish(NodeEvent::DataChanged {
            path: node_path.to_string(),
            data: node_data,
        });
        Ok(())
    }

    /// Creates a node and any missing ancestors (ancestors get empty data).
    ///
    /// Succeeds without touching data if the node already exists.
    pub fn create_all(&self, node_path: &str, data: &[u8]) -> Result<(), StoreError> {
        path::validate(node_path)?;
        let mut missing = Vec::new();
        let mut cursor = Some(node_path);
        while let Some(current) = cursor {
            if self.exists(current)? {
                break;
            }
            missing.push(current);
            cursor = path::parent(current);
        }
        for ancestor in missing.iter().rev() {
            let payload: &[u8] = if *ancestor == node_path { data } else { &[] };
            match self.create(ancestor, payload) {
                Ok(()) => {}
                Err(err) if err.is_node_exists() => {}
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Reads a node's data; `None` if it does not exist.
    pub fn get_data(&self, node_path: &str) -> Result<Option<NodeData>, StoreError> {
        path::validate(node_path)?;
        Ok(self
            .lock()
            .nodes
            .get(node_path)
            .map(|node| NodeData::new(node.data.clone(), node.version)))
    }

    /// Rewrites a node's data; returns the new modification id.
    pub fn set_data(&self, node_path: &str, data: &[u8]) -> Result<i64, StoreError> {
        path::validate(node_path)?;
        let version = {
            let mut inner = self.lock();
            if !inner.nodes.contains_key(node_path) {
                return Err(StoreError::no_node(node_path));
            }
            let version = inner.next_version();
            if let Some(node) = inner.nodes.get_mut(node_path) {
                node.data = data.to_vec();
                node.version = version;
            }
            version
        };

        debug!(path = node_path, version, "node data set");
        self.publish(NodeEvent::DataChanged {
            path: node_path.to_string(),
            data: NodeData::new(data, version),
        });
        Ok(version)
    }

    /// Deletes a leaf node.
    pub fn delete(&self, node_path: &str) -> Result<(), StoreError> {
        path::validate(node_path)?;
        if node_path == "/" {
            return Err(StoreError::invalid_path(node_path, "cannot delete root"));
        }
        let version = {
            let mut inner = self.lock();
            let node = inner
                .nodes
                .get(node_path)
                .ok_or_else(|| StoreError::no_node(node_path))?;
            if !node.children.is_empty() {
                return Err(StoreError::not_empty(node_path));
            }
            inner.nodes.remove(node_path);
            if let Some(parent) = path::parent(node_path)
                && let Some(parent_node) = inner.nodes.get_mut(parent)
            {
                parent_node.children.shift_remove(path::name(node_path));
            }
            inner.next_version()
        };

        debug!(path = node_path, version, "node deleted");
        self.publish(NodeEvent::Deleted {
            path: node_path.to_string(),
            version,
        });
        Ok(())
    }

    /// Lists child names of a node in creation order.
    pub fn children(&self, node_path: &str) -> Result<Vec<String>, StoreError> {
        path::validate(node_path)?;
        let mut inner = self.lock();
        if let Some(err) = inner.list_failures.remove(node_path) {
            return Err(err);
        }
        inner
            .nodes
            .get(node_path)
            .map(|node| node.children.iter().cloned().collect())
            .ok_or_else(|| StoreError::no_node(node_path))
    }

    // ==================== Fault injection ====================

    /// Makes the next `children` call on `path` fail with `error`.
    pub fn fail_next_list(&self, node_path: &str, error: StoreError) {
        self.lock()
            .list_failures
            .insert(node_path.to_string(), error);
    }

    /// Publishes a watch-delivery error for `path` to every watching client.
    pub fn emit_watch_error(&self, node_path: &str, message: impl Into<String>) {
        self.publish(NodeEvent::Error {
            path: node_path.to_string(),
            message: message.into(),
        });
    }

    /// Toggles whether clients can connect.
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub(crate) fn connect(&self) -> Result<(), StoreError> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::unavailable("store is not accepting connections"))
        }
    }

    /// Makes every subsequent client `close` fail.
    pub fn set_close_failure(&self, fail: bool) {
        self.fail_close.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn close_fails(&self) -> bool {
        self.fail_close.load(Ordering::SeqCst)
    }
}
