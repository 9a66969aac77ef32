//! Configuration unit bound to one store node

use std::fmt;
use std::sync::{Arc, Weak};

use arc_swap::{ArcSwap, ArcSwapOption};
use coordconf_store::{
    CoordinationClient, DynClient, NodeEvent, NodeListener, StoreError, WatchId, path,
};
use serde_json::Value;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use super::PropertySource;
use crate::decode::{NodeDataFormat, PropertyMap, decode};
use crate::events::{ConfigChangeEvent, ConfigOperation};
use crate::Result;

/// Version of a unit that has never seen its node.
const UNREAD: i64 = -1;

const EVENT_CAPACITY: usize = 100;

/// Immutable view of a unit's decoded values.
#[derive(Debug, Clone, PartialEq)]
pub struct NodeSnapshot {
    pub values: PropertyMap,
    /// Store modification id the values were read at
    pub version: i64,
}

impl NodeSnapshot {
    fn empty(version: i64) -> Self {
        Self {
            values: PropertyMap::new(),
            version,
        }
    }
}

/// State shared with the client's watch dispatcher.
struct NodeState {
    name: String,
    path: String,
    format: NodeDataFormat,
    snapshot: ArcSwap<NodeSnapshot>,
    last_error: ArcSwapOption<String>,
    events: broadcast::Sender<ConfigChangeEvent>,
}

impl NodeState {
    /// Swap in `next` unless the current snapshot is at least as new.
    fn apply(&self, next: NodeSnapshot) -> bool {
        let next = Arc::new(next);
        let mut applied = false;
        self.snapshot.rcu(|current| {
            applied = next.version > current.version;
            if applied {
                Arc::clone(&next)
            } else {
                Arc::clone(current)
            }
        });
        applied
    }

    fn publish(&self, event: ConfigChangeEvent) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    fn event(&self, operation: ConfigOperation) -> ConfigChangeEvent {
        ConfigChangeEvent::new(&self.name, &self.path, operation)
    }

    fn refresh_failed(&self, message: String) {
        warn!(path = %self.path, error = %message, "refresh failed, keeping last-known values");
        self.last_error.store(Some(Arc::new(message.clone())));
        self.publish(self.event(ConfigOperation::RefreshFailed).with_message(message));
    }
}

impl NodeListener for NodeState {
    fn on_event(&self, event: NodeEvent) {
        match event {
            NodeEvent::DataChanged { data, .. } => {
                if data.version <= self.snapshot.load().version {
                    debug!(
                        path = %self.path,
                        version = data.version,
                        "ignoring stale notification"
                    );
                    return;
                }
                match decode(&self.path, &data.bytes, self.format) {
                    Ok(values) => {
                        let key_count = values.len();
                        if self.apply(NodeSnapshot {
                            values,
                            version: data.version,
                        }) {
                            self.last_error.store(None);
                            info!(
                                path = %self.path,
                                version = data.version,
                                keys = key_count,
                                "configuration unit updated"
                            );
                            self.publish(
                                self.event(ConfigOperation::Updated)
                                    .with_version(data.version),
                            );
                        }
                    }
                    Err(e) => self.refresh_failed(e.to_string()),
                }
            }
            NodeEvent::Deleted { version, .. } => {
                if self.apply(NodeSnapshot::empty(version)) {
                    info!(path = %self.path, version, "configuration unit node deleted");
                    self.publish(self.event(ConfigOperation::Deleted).with_version(version));
                }
            }
            NodeEvent::Error { message, .. } => self.refresh_failed(message),
        }
    }
}

/// One configuration unit: the decoded contents of a single child node.
///
/// When auto-refreshed, the unit watches its node from [`initialize`] until
/// it is dropped; updates replace the whole snapshot at once, so readers
/// never observe a partially applied change.
///
/// [`initialize`]: NodeSource::initialize
pub struct NodeSource {
    inner: Arc<NodeState>,
    client: Weak<dyn CoordinationClient>,
    auto_refreshed: bool,
    watch: Option<WatchId>,
}

impl NodeSource {
    /// Bind a unit to `node_path`. Nothing is read until [`NodeSource::initialize`].
    pub fn new(
        name: impl Into<String>,
        node_path: impl Into<String>,
        client: &DynClient,
        auto_refreshed: bool,
        format: NodeDataFormat,
    ) -> Self {
        Self::with_events(
            name,
            node_path,
            client,
            auto_refreshed,
            format,
            broadcast::channel(EVENT_CAPACITY).0,
        )
    }

    /// Like [`NodeSource::new`], publishing change events on a shared channel.
    pub fn with_events(
        name: impl Into<String>,
        node_path: impl Into<String>,
        client: &DynClient,
        auto_refreshed: bool,
        format: NodeDataFormat,
        events: broadcast::Sender<ConfigChangeEvent>,
    ) -> Self {
        Self {
            inner: Arc::new(NodeState {
                name: name.into(),
                path: node_path.into(),
                format,
                snapshot: ArcSwap::from_pointee(NodeSnapshot::empty(UNREAD)),
                last_error: ArcSwapOption::empty(),
                events,
            }),
            client: Arc::downgrade(client),
            auto_refreshed,
            watch: None,
        }
    }

    /// Register the watch (when auto-refreshed) and read the initial values.
    ///
    /// The watch goes in before the read so no change between the two is
    /// lost; whichever of the two carries the newer version wins.
    pub async fn initialize(&mut self) -> Result<()> {
        let client = self
            .client
            .upgrade()
            .ok_or_else(|| StoreError::closed("coordination client dropped"))?;

        if self.auto_refreshed && self.watch.is_none() {
            let listener: Arc<dyn NodeListener> = self.inner.clone();
            self.watch = Some(client.watch(&self.inner.path, Arc::downgrade(&listener))?);
            debug!(path = %self.inner.path, "watch registered");
        }

        let Some(data) = client.get_data(&self.inner.path).await? else {
            debug!(path = %self.inner.path, "unit node missing, starting empty");
            self.inner.publish(self.inner.event(ConfigOperation::Loaded));
            return Ok(());
        };

        let values = decode(&self.inner.path, &data.bytes, self.inner.format)?;
        self.inner.apply(NodeSnapshot {
            values,
            version: data.version,
        });
        self.inner.publish(
            self.inner
                .event(ConfigOperation::Loaded)
                .with_version(data.version),
        );
        Ok(())
    }

    pub fn path(&self) -> &str {
        &self.inner.path
    }

    pub fn format(&self) -> NodeDataFormat {
        self.inner.format
    }

    pub fn is_auto_refreshed(&self) -> bool {
        self.auto_refreshed
    }

    /// Whether a watch is currently registered for this unit.
    pub fn is_watching(&self) -> bool {
        self.watch.is_some()
    }

    /// Current values; cheap to call and never blocks on an update.
    pub fn snapshot(&self) -> Arc<NodeSnapshot> {
        self.inner.snapshot.load_full()
    }

    /// Store version of the current values, `None` if the node was never read.
    pub fn version(&self) -> Option<i64> {
        let version = self.inner.snapshot.load().version;
        (version != UNREAD).then_some(version)
    }

    /// Most recent refresh failure, cleared by the next applied update.
    pub fn last_error(&self) -> Option<String> {
        self.inner.last_error.load_full().map(|e| e.as_ref().clone())
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChangeEvent> {
        self.inner.events.subscribe()
    }
}

impl PropertySource for NodeSource {
    fn name(&self) -> &str {
        &self.inner.name
    }

    fn get_property(&self, key: &str) -> Option<Value> {
        self.inner.snapshot.load().values.get(key).cloned()
    }

    fn property_names(&self) -> Vec<String> {
        self.inner.snapshot.load().values.keys().cloned().collect()
    }

    fn contains_property(&self, key: &str) -> bool {
        self.inner.snapshot.load().values.contains_key(key)
    }
}

impl Drop for NodeSource {
    fn drop(&mut self) {
        if let Some(id) = self.watch.take()
            && let Some(client) = self.client.upgrade()
        {
            client.unwatch(id);
        }
    }
}

impl fmt::Debug for NodeSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeSource")
            .field("name", &self.inner.name)
            .field("path", &self.inner.path)
            .field("version", &self.version())
            .field("auto_refreshed", &self.auto_refreshed)
            .field("watch", &self.watch)
            .finish()
    }
}

/// Builds configuration units for the children of a root path.
#[derive(Debug, Clone)]
pub struct NodeSourceFactory {
    format: NodeDataFormat,
    events: broadcast::Sender<ConfigChangeEvent>,
}

impl NodeSourceFactory {
    pub fn new(format: NodeDataFormat) -> Self {
        Self {
            format,
            events: broadcast::channel(EVENT_CAPACITY).0,
        }
    }

    /// Channel every unit built by this factory publishes on.
    pub fn events(&self) -> broadcast::Sender<ConfigChangeEvent> {
        self.events.clone()
    }

    /// Unit for `child` under `root_path`, named by its full node path.
    pub fn create(
        &self,
        root_path: &str,
        child: &str,
        client: &DynClient,
        auto_refreshed: bool,
    ) -> NodeSource {
        let node_path = path::join(root_path, child);
        NodeSource::with_events(
            node_path.clone(),
            node_path,
            client,
            auto_refreshed,
            self.format,
            self.events(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use coordconf_store::RetryPolicy;
    use coordconf_store_memory::{MemoryClient, MemoryStore};
    use serde_json::json;
    use std::time::Duration;

    async fn setup() -> (Arc<MemoryStore>, Arc<MemoryClient>, DynClient) {
        let store = Arc::new(MemoryStore::new());
        let memory = Arc::new(MemoryClient::new("mem", store.clone(), RetryPolicy::default()));
        memory.start().await.unwrap();
        let client: DynClient = memory.clone();
        (store, memory, client)
    }

    fn properties_unit(client: &DynClient, node_path: &str, auto_refreshed: bool) -> NodeSource {
        let name = path::name(node_path);
        NodeSource::new(name, node_path, client, auto_refreshed, NodeDataFormat::Properties)
    }

    async fn wait_for(unit: &NodeSource, version: i64) {
        tokio::time::timeout(Duration::from_secs(2), async {
            while unit.version() != Some(version) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("unit did not reach version");
    }

    #[test]
    fn test_factory_joins_paths() {
        let store = Arc::new(MemoryStore::new());
        let client: DynClient = Arc::new(MemoryClient::new("mem", store, RetryPolicy::default()));
        let factory = NodeSourceFactory::new(NodeDataFormat::Properties);

        let unit = factory.create("/config", "app", &client, false);
        assert_eq!(unit.path(), "/config/app");
        assert_eq!(unit.name(), "/config/app");
        assert!(unit.version().is_none());
        assert!(!unit.is_watching());
    }

    #[tokio::test]
    async fn test_initialize_reads_values() {
        let (store, _memory, client) = setup().await;
        store.create_all("/config/app", b"port=8080\nname=svc").unwrap();

        let mut unit = NodeSourceFactory::new(NodeDataFormat::Properties)
            .create("/config", "app", &client, false);
        unit.initialize().await.unwrap();

        assert_eq!(unit.get_property("port"), Some(json!("8080")));
        assert_eq!(unit.property_names(), vec!["name", "port"]);
        assert!(unit.version().is_some());
        assert!(!unit.is_watching());
    }

    #[tokio::test]
    async fn test_static_unit_ignores_changes() {
        let (store, _memory, client) = setup().await;
        store.create_all("/config/app", b"port=8080").unwrap();

        let mut unit = properties_unit(&client, "/config/app", false);
        unit.initialize().await.unwrap();
        let version = unit.version();

        store.set_data("/config/app", b"port=9090").unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(unit.get_property("port"), Some(json!("8080")));
        assert_eq!(unit.version(), version);
    }

    #[tokio::test]
    async fn test_auto_refreshed_unit_follows_node() {
        let (store, memory, client) = setup().await;
        store.create_all("/config/app", b"port=8080").unwrap();

        let mut unit = properties_unit(&client, "/config/app", true);
        let mut events = unit.subscribe();
        unit.initialize().await.unwrap();
        assert_eq!(memory.watch_count(), 1);
        assert_eq!(events.recv().await.unwrap().operation, ConfigOperation::Loaded);

        let version = store.set_data("/config/app", b"port=9090").unwrap();
        wait_for(&unit, version).await;
        assert_eq!(unit.get_property("port"), Some(json!("9090")));

        let event = events.recv().await.unwrap();
        assert_eq!(event.operation, ConfigOperation::Updated);
        assert_eq!(event.version, Some(version));
    }

    #[tokio::test]
    async fn test_deleted_node_empties_unit() {
        let (store, _memory, client) = setup().await;
        store.create_all("/config/app", b"port=8080").unwrap();

        let mut unit = properties_unit(&client, "/config/app", true);
        unit.initialize().await.unwrap();

        store.delete("/config/app").unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while unit.contains_property("port") {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert!(unit.property_names().is_empty());

        // Recreating the node brings the unit back.
        store.create("/config/app", b"port=7070").unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while unit.get_property("port") != Some(json!("7070")) {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_stale_notification_is_ignored() {
        let (store, _memory, client) = setup().await;
        store.create_all("/config/app", b"port=8080").unwrap();
        let mut unit = properties_unit(&client, "/config/app", true);
        unit.initialize().await.unwrap();
        let current = unit.version().unwrap();

        unit.inner.on_event(NodeEvent::DataChanged {
            path: "/config/app".to_string(),
            data: coordconf_store::NodeData::new("port=1", current - 1),
        });
        assert_eq!(unit.get_property("port"), Some(json!("8080")));
        assert_eq!(unit.version(), Some(current));
    }

    #[tokio::test]
    async fn test_bad_update_keeps_last_known_values() {
        let (store, _memory, client) = setup().await;
        store.create_all("/config/app", br#"{"port": 8080}"#).unwrap();
        let mut unit = NodeSource::new("app", "/config/app", &client, true, NodeDataFormat::Json);
        unit.initialize().await.unwrap();

        store.set_data("/config/app", b"not json").unwrap();
        tokio::time::timeout(Duration::from_secs(2), async {
            while unit.last_error().is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(unit.get_property("port"), Some(json!(8080)));

        let version = store.set_data("/config/app", br#"{"port": 9090}"#).unwrap();
        wait_for(&unit, version).await;
        assert!(unit.last_error().is_none());
    }

    #[tokio::test]
    async fn test_watch_error_is_recorded() {
        let (store, _memory, client) = setup().await;
        store.create_all("/config/app", b"port=8080").unwrap();
        let mut unit = properties_unit(&client, "/config/app", true);
        unit.initialize().await.unwrap();

        store.emit_watch_error("/config/app", "session expired");
        tokio::time::timeout(Duration::from_secs(2), async {
            while unit.last_error().is_none() {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
        assert_eq!(unit.last_error().as_deref(), Some("session expired"));
        assert_eq!(unit.get_property("port"), Some(json!("8080")));
    }

    #[tokio::test]
    async fn test_missing_node_starts_empty() {
        let (store, _memory, client) = setup().await;
        store.create("/config", b"").unwrap();
        let mut unit = properties_unit(&client, "/config/ghost", false);
        unit.initialize().await.unwrap();
        assert!(unit.version().is_none());
        assert!(unit.property_names().is_empty());
    }

    #[tokio::test]
    async fn test_drop_unregisters_watch() {
        let (store, memory, client) = setup().await;
        store.create_all("/config/app", b"port=8080").unwrap();
        let mut unit = properties_unit(&client, "/config/app", true);
        unit.initialize().await.unwrap();
        assert_eq!(memory.watch_count(), 1);

        drop(unit);
        assert_eq!(memory.watch_count(), 0);
    }
}
