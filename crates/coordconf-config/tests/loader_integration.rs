//! End-to-end loading against the in-memory store

use std::sync::Arc;
use std::time::Duration;

use coordconf_config::{
    ClientRegistry, ConfigLoader, ConfigOperation, ConnectionIdentity, Placement, PropertySource,
    PropertySources, ShutdownCoordinator, SourceAttributes,
};
use coordconf_store::{ClientState, CoordinationClient};
use coordconf_store_memory::{MemoryClientFactory, MemoryStore};
use serde_json::json;

struct Harness {
    store: Arc<MemoryStore>,
    factory: Arc<MemoryClientFactory>,
    registry: Arc<ClientRegistry>,
    loader: ConfigLoader,
}

fn harness() -> Harness {
    coordconf_config::observability::init_tracing_with_level("debug");
    let store = Arc::new(MemoryStore::new());
    let factory = Arc::new(MemoryClientFactory::new());
    factory.register("host:2181", store.clone());
    let registry = Arc::new(ClientRegistry::new(factory.clone()));
    let loader = ConfigLoader::new(registry.clone());
    Harness {
        store,
        factory,
        registry,
        loader,
    }
}

async fn eventually(mut check: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(2), async {
        while !check() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached in time");
}

#[tokio::test]
async fn test_example_tree_with_live_refresh() {
    let h = harness();
    h.store.create_all("/config/app", b"port=8080").unwrap();
    h.store.create_all("/config/db", b"url=jdbc:pg\nport=5432").unwrap();

    let attributes = SourceAttributes::new("host:2181", "/config")
        .with_auto_refresh(true)
        .with_name("zookeeper");
    let composite = h.loader.load(&attributes).await.unwrap().unwrap();

    assert_eq!(h.factory.built_count(), 1);
    assert_eq!(
        h.registry.identities(),
        vec![ConnectionIdentity::new("host:2181", "/config")]
    );
    assert_eq!(composite.name(), "zookeeper");
    assert_eq!(composite.unit_paths(), vec!["/config/app", "/config/db"]);
    assert_eq!(composite.get_property("port"), Some(json!("8080")));

    let mut events = composite.subscribe();
    h.store.set_data("/config/app", b"port=9090").unwrap();
    eventually(|| composite.get_property("port") == Some(json!("9090"))).await;

    let event = tokio::time::timeout(Duration::from_secs(2), events.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(event.operation, ConfigOperation::Updated);
    assert_eq!(event.path, "/config/app");
}

#[tokio::test]
async fn test_repeated_loads_share_one_client() {
    let h = harness();
    h.store.create_all("/config/app", b"a=1").unwrap();
    let attributes = SourceAttributes::new("host:2181", "/config");

    let mut handles = Vec::new();
    for _ in 0..3 {
        handles.push(h.loader.load(&attributes).await.unwrap().unwrap());
    }

    assert_eq!(h.factory.built_count(), 1);
    assert_eq!(h.factory.built()[0].start_count(), 1);
    assert_eq!(h.registry.len(), 1);
    assert!(handles.iter().all(|c| c.get_property("a") == Some(json!("1"))));
}

#[tokio::test]
async fn test_absent_root_without_refresh_is_nothing() {
    let h = harness();
    let attributes = SourceAttributes::new("host:2181", "/config");

    assert!(h.loader.load(&attributes).await.unwrap().is_none());
    assert!(!h.store.exists("/config").unwrap());

    let mut sources = PropertySources::new();
    assert!(
        !h.loader
            .load_into(&attributes, &mut sources, &Placement::First)
            .await
            .unwrap()
    );
    assert!(sources.is_empty());
}

#[tokio::test]
async fn test_absent_root_with_refresh_is_created() {
    let h = harness();
    let attributes = SourceAttributes::new("host:2181", "/config").with_auto_refresh(true);

    let composite = h.loader.load(&attributes).await.unwrap().unwrap();
    assert!(composite.is_empty());
    assert!(h.store.exists("/config").unwrap());
}

#[tokio::test]
async fn test_unit_order_follows_store() {
    let h = harness();
    for (child, value) in [("c", "first"), ("a", "second"), ("b", "third")] {
        h.store
            .create_all(&format!("/config/{child}"), format!("key={value}").as_bytes())
            .unwrap();
    }

    let composite = h
        .loader
        .load(&SourceAttributes::new("host:2181", "/config"))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        composite.unit_paths(),
        vec!["/config/c", "/config/a", "/config/b"]
    );
    assert_eq!(composite.get_property("key"), Some(json!("first")));
}

#[tokio::test]
async fn test_shutdown_twice_closes_once() {
    let h = harness();
    h.store.create_all("/one/x", b"k=v").unwrap();
    h.store.create_all("/two/y", b"k=v").unwrap();
    for root in ["/one", "/two"] {
        h.loader
            .load(&SourceAttributes::new("host:2181", root))
            .await
            .unwrap();
    }

    let coordinator = ShutdownCoordinator::new(h.registry.clone());
    let first = coordinator.shutdown().await;
    let second = coordinator.shutdown().await;

    assert_eq!(first.closed.len(), 2);
    assert!(second.closed.is_empty() && second.is_clean());
    assert!(h.registry.is_empty());
    for client in h.factory.built() {
        assert_eq!(client.state(), ClientState::Closed);
        assert_eq!(client.close_count(), 1);
    }

    // Nothing new is handed out once shut down.
    assert!(
        h.loader
            .load(&SourceAttributes::new("host:2181", "/one"))
            .await
            .is_err()
    );
}

#[tokio::test]
async fn test_refresh_failure_is_isolated_to_one_unit() {
    let h = harness();
    h.store.create_all("/config/app", b"port=8080").unwrap();
    h.store.create_all("/config/db", b"user=svc").unwrap();

    let composite = h
        .loader
        .load(&SourceAttributes::new("host:2181", "/config").with_auto_refresh(true))
        .await
        .unwrap()
        .unwrap();

    h.store.emit_watch_error("/config/app", "connection loss");
    let app = composite.unit("/config/app").unwrap();
    eventually(|| app.last_error().is_some()).await;

    let db = composite.unit("/config/db").unwrap();
    assert!(db.last_error().is_none());
    assert_eq!(db.get_property("user"), Some(json!("svc")));
    assert_eq!(app.get_property("port"), Some(json!("8080")));
    assert_eq!(composite.get_property("user"), Some(json!("svc")));

    // The other unit still refreshes.
    h.store.set_data("/config/db", b"user=admin").unwrap();
    eventually(|| composite.get_property("user") == Some(json!("admin"))).await;
}

#[tokio::test]
async fn test_reload_replaces_composite_and_releases_watches() {
    let h = harness();
    h.store.create_all("/config/app", b"port=8080").unwrap();
    h.store.create_all("/config/old", b"legacy=true").unwrap();
    let attributes = SourceAttributes::new("host:2181", "/config").with_auto_refresh(true);

    let mut sources = PropertySources::new();
    h.loader
        .load_into(&attributes, &mut sources, &Placement::First)
        .await
        .unwrap();
    let client = h.factory.built()[0].clone();
    assert_eq!(client.watch_count(), 2);

    h.store.delete("/config/old").unwrap();
    h.loader
        .load_into(&attributes, &mut sources, &Placement::First)
        .await
        .unwrap();

    assert_eq!(sources.len(), 1);
    assert_eq!(client.watch_count(), 1);
    assert!(!sources.contains_property("legacy"));
}
