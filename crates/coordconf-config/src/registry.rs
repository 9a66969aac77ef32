//! Shared client registry
//!
//! Clients are expensive, so every load request targeting the same
//! [`ConnectionIdentity`] shares one started client. Construction happens
//! lazily on first use and at most once per identity, even under concurrent
//! requests; unrelated identities never wait on each other.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use coordconf_store::{ClientFactory, ClientState, DynClient, RetryPolicy, StoreError};
use dashmap::DashMap;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use crate::settings::LoaderSettings;
use crate::{ConfigError, Result};

/// Registry key: (connection string, root path)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionIdentity {
    pub connect_string: String,
    pub root_path: String,
}

impl ConnectionIdentity {
    pub fn new(connect_string: impl Into<String>, root_path: impl Into<String>) -> Self {
        Self {
            connect_string: connect_string.into(),
            root_path: root_path.into(),
        }
    }
}

impl fmt::Display for ConnectionIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.connect_string, self.root_path)
    }
}

/// One slot per identity; the cell serializes construction for that key only.
type Slot = Arc<OnceCell<DynClient>>;

/// Process-wide cache of started clients, passed by reference to loaders.
pub struct ClientRegistry {
    factory: Arc<dyn ClientFactory>,
    retry: RetryPolicy,
    slots: DashMap<ConnectionIdentity, Slot>,
    closing: AtomicBool,
}

impl ClientRegistry {
    /// Create a registry using the default indefinite retry policy.
    pub fn new(factory: Arc<dyn ClientFactory>) -> Self {
        Self::with_retry_policy(factory, RetryPolicy::default())
    }

    pub fn with_retry_policy(factory: Arc<dyn ClientFactory>, retry: RetryPolicy) -> Self {
        Self {
            factory,
            retry,
            slots: DashMap::new(),
            closing: AtomicBool::new(false),
        }
    }

    pub fn from_settings(factory: Arc<dyn ClientFactory>, settings: &LoaderSettings) -> Self {
        Self::with_retry_policy(factory, settings.retry_policy())
    }

    /// Retry policy applied to every client this registry builds.
    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// Return the started client for `identity`, building and starting it on miss.
    ///
    /// A failed construction or start leaves nothing cached, so the next call
    /// (or a caller already waiting on the same identity) tries again.
    pub async fn get_or_create(&self, identity: &ConnectionIdentity) -> Result<DynClient> {
        if self.is_closing() {
            return Err(ConfigError::connection(
                identity,
                StoreError::closed("client registry is shut down"),
            ));
        }

        let slot: Slot = Arc::clone(self.slots.entry(identity.clone()).or_default().value());

        // A failed init leaves the cell empty. The slot itself stays, since a
        // caller already waiting on it retries construction in place.
        let client = slot
            .get_or_try_init(|| self.build_and_start(identity))
            .await
            .map(Arc::clone)?;

        if self.is_closing() {
            // Shutdown drained the map while this client was starting.
            self.slots.remove_if(identity, |_, s| Arc::ptr_eq(s, &slot));
            if let Err(e) = client.close().await {
                warn!(
                    %identity,
                    error = %e,
                    "failed to close client started during shutdown"
                );
            }
            return Err(ConfigError::connection(
                identity,
                StoreError::closed("client registry is shut down"),
            ));
        }
        Ok(client)
    }

    async fn build_and_start(&self, identity: &ConnectionIdentity) -> Result<DynClient> {
        debug!(%identity, "building coordination client");
        let client = self
            .factory
            .build(&identity.connect_string, self.retry)
            .map_err(|e| ConfigError::connection(identity, e))?;

        if let Err(e) = client.start().await {
            warn!(%identity, error = %e, "coordination client failed to start");
            if client.state() != ClientState::Closed
                && let Err(close_err) = client.close().await
            {
                warn!(%identity, error = %close_err, "failed to close client after failed start");
            }
            return Err(ConfigError::connection(identity, e));
        }

        info!(%identity, retry = ?self.retry, "coordination client started");
        Ok(client)
    }

    /// The cached client for `identity`, if one has been started.
    pub fn get(&self, identity: &ConnectionIdentity) -> Option<DynClient> {
        self.slots
            .get(identity)
            .and_then(|slot| slot.get().cloned())
    }

    /// Identities with a started client, sorted.
    pub fn identities(&self) -> Vec<ConnectionIdentity> {
        let mut identities: Vec<_> = self
            .slots
            .iter()
            .filter(|entry| entry.value().initialized())
            .map(|entry| entry.key().clone())
            .collect();
        identities.sort();
        identities
    }

    /// Number of cached clients.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|entry| entry.value().initialized())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_closing(&self) -> bool {
        self.closing.load(Ordering::SeqCst)
    }

    /// Stop handing out clients and take every cached one out of the registry.
    pub(crate) fn drain(&self) -> Vec<(ConnectionIdentity, DynClient)> {
        self.closing.store(true, Ordering::SeqCst);
        let identities: Vec<ConnectionIdentity> =
            self.slots.iter().map(|entry| entry.key().clone()).collect();

        let mut drained: Vec<(ConnectionIdentity, DynClient)> = identities
            .into_iter()
            .filter_map(|identity| self.slots.remove(&identity))
            .filter_map(|(identity, slot)| slot.get().cloned().map(|client| (identity, client)))
            .collect();
        drained.sort_by(|a, b| a.0.cmp(&b.0));
        drained
    }
}

impl fmt::Debug for ClientRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClientRegistry")
            .field("clients", &self.len())
            .field("retry", &self.retry)
            .field("closing", &self.is_closing())
            .finish()
    }
}
