use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use async_trait::async_trait;
use coordconf_store::{
    ClientState, CoordinationClient, NodeData, NodeEvent, NodeListener, RetryPolicy, StoreError,
    WatchId,
};
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::store::MemoryStore;

type WatchTable = HashMap<WatchId, (String, Weak<dyn NodeListener>)>;

/// Client bound to a [`MemoryStore`].
///
/// Watch notifications are dispatched from a background task spawned on
/// `start`, never on the caller of a store write.
pub struct MemoryClient {
    connect_string: String,
    store: Arc<MemoryStore>,
    retry: RetryPolicy,
    state: Mutex<ClientState>,
    watches: Arc<Mutex<WatchTable>>,
    next_watch: AtomicU64,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
    starts: AtomicUsize,
    closes: AtomicUsize,
}

impl std::fmt::Debug for MemoryClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryClient")
            .field("connect_string", &self.connect_string)
            .field("state", &self.state())
            .field("retry", &self.retry)
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl MemoryClient {
    /// Creates an unstarted client.
    pub fn new(
        connect_string: impl Into<String>,
        store: Arc<MemoryStore>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            connect_string: connect_string.into(),
            store,
            retry,
            state: Mutex::new(ClientState::Created),
            watches: Arc::new(Mutex::new(HashMap::new())),
            next_watch: AtomicU64::new(1),
            dispatcher: Mutex::new(None),
            starts: AtomicUsize::new(0),
            closes: AtomicUsize::new(0),
        }
    }

    /// The retry policy this client was built with.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Number of successful `Created -> Started` transitions.
    pub fn start_count(&self) -> usize {
        self.starts.load(Ordering::SeqCst)
    }

    /// Number of successful `Started -> Closed` transitions.
    pub fn close_count(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }

    /// Number of registered watches whose listener is still alive.
    pub fn watch_count(&self) -> usize {
        lock(&self.watches)
            .values()
            .filter(|(_, listener)| listener.strong_count() > 0)
            .count()
    }

    fn ensure_started(&self) -> Result<(), StoreError> {
        match self.state() {
            ClientState::Started => Ok(()),
            state => Err(StoreError::closed(format!(
                "client for {} is {state}",
                self.connect_string
            ))),
        }
    }

    fn spawn_dispatcher(&self) -> JoinHandle<()> {
        let mut rx = self.store.subscribe();
        let watches = Arc::clone(&self.watches);
        let connect_string = self.connect_string.clone();

        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(event) => dispatch(&watches, event),
                    Err(RecvError::Lagged(missed)) => {
                        warn!(%connect_string, missed, "watch dispatcher lagged");
                        let paths: Vec<String> = lock(&watches)
                            .values()
                            .map(|(path, _)| path.clone())
                            .collect();
                        for path in paths {
                            dispatch(
                                &watches,
                                NodeEvent::Error {
                                    path,
                                    message: format!("missed {missed} change notifications"),
                                },
                            );
                        }
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        })
    }
}

/// Delivers `event` to every live listener watching its path.
fn dispatch(watches: &Mutex<WatchTable>, event: NodeEvent) {
    let listeners: Vec<Arc<dyn NodeListener>> = {
        let mut table = lock(watches);
        table.retain(|_, (_, listener)| listener.strong_count() > 0);
        table
            .values()
            .filter(|(path, _)| path == event.path())
            .filter_map(|(_, listener)| listener.upgrade())
            .collect()
    };
    for listener in listeners {
        listener.on_event(event.clone());
    }
}

#[async_trait]
impl CoordinationClient for MemoryClient {
    fn connect_string(&self) -> &str {
        &self.connect_string
    }

    fn state(&self) -> ClientState {
        *lock(&self.state)
    }

    async fn start(&self) -> Result<(), StoreError> {
        match self.state() {
            ClientState::Started => return Ok(()),
            ClientState::Closed => {
                return Err(StoreError::closed(format!(
                    "client for {} was closed",
                    self.connect_string
                )));
            }
            ClientState::Created => {}
        }

        let store = &self.store;
        self.retry.run(move || async move { store.connect() }).await?;

        let mut state = lock(&self.state);
        if *state != ClientState::Created {
            return Ok(());
        }
        *lock(&self.dispatcher) = Some(self.spawn_dispatcher());
        *state = ClientState::Started;
        self.starts.fetch_add(1, Ordering::SeqCst);
        info!(connect_string = %self.connect_string, "memory client started");
        Ok(())
    }

    async fn close(&self) -> Result<(), StoreError> {
        let mut state = lock(&self.state);
        if *state == ClientState::Closed {
            return Ok(());
        }
        if self.store.close_fails() {
            return Err(StoreError::internal(format!(
                "failed to close session for {}",
                self.connect_string
            )));
        }
        if let Some(handle) = lock(&self.dispatcher).take() {
            handle.abort();
        }
        lock(&self.watches).clear();
        let was_started = *state == ClientState::Started;
        *state = ClientState::Closed;
        if was_started {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
        info!(connect_string = %self.connect_string, "memory client closed");
        Ok(())
    }

    async fn exists(&self, path: &str) -> Result<bool, StoreError> {
        self.ensure_started()?;
        self.store.exists(path)
    }

    async fn create(&self, path: &str, data: &[u8]) -> Result<(), StoreError> {
        self.ensure_started()?;
        self.store.create(path, data)
    }

    async fn get_data(&self, path: &str) -> Result<Option<NodeData>, StoreError> {
        self.ensure_started()?;
        self.store.get_data(path)
    }

    async fn list_children(&self, path: &str) -> Result<Vec<String>, StoreError> {
        self.ensure_started()?;
        self.store.children(path)
    }

    fn watch(&self, path: &str, listener: Weak<dyn NodeListener>) -> Result<WatchId, StoreError> {
        self.ensure_started()?;
        coordconf_store::path::validate(path)?;
        let id = WatchId(self.next_watch.fetch_add(1, Ordering::SeqCst));
        lock(&self.watches).insert(id, (path.to_string(), listener));
        debug!(%id, path, "watch registered");
        Ok(id)
    }

    fn unwatch(&self, id: WatchId) -> bool {
        lock(&self.watches).remove(&id).is_some()
    }
}
