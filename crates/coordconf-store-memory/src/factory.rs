use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use coordconf_store::{ClientFactory, DynClient, RetryPolicy, StoreError};
use tracing::debug;

use crate::client::MemoryClient;
use crate::store::MemoryStore;

/// Builds [`MemoryClient`]s for registered endpoints.
///
/// Connection strings are mapped to stores with [`register`](Self::register);
/// building a client for an unknown connection string fails the same way an
/// unreachable endpoint would. Every built client is retained so tests can
/// inspect construction and lifecycle counts.
#[derive(Debug, Default)]
pub struct MemoryClientFactory {
    endpoints: Mutex<HashMap<String, Arc<MemoryStore>>>,
    built: Mutex<Vec<Arc<MemoryClient>>>,
}

impl MemoryClientFactory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Routes `connect_string` to `store`.
    pub fn register(&self, connect_string: impl Into<String>, store: Arc<MemoryStore>) -> &Self {
        self.endpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(connect_string.into(), store);
        self
    }

    /// All clients built so far, in construction order.
    pub fn built(&self) -> Vec<Arc<MemoryClient>> {
        self.built
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of clients built so far.
    pub fn built_count(&self) -> usize {
        self.built
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl ClientFactory for MemoryClientFactory {
    fn build(&self, connect_string: &str, retry: RetryPolicy) -> Result<DynClient, StoreError> {
        let store = self
            .endpoints
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(connect_string)
            .cloned()
            .ok_or_else(|| {
                StoreError::connection(format!("unknown endpoint: {connect_string}"))
            })?;

        let client = Arc::new(MemoryClient::new(connect_string, store, retry));
        self.built
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Arc::clone(&client));
        debug!(connect_string, "memory client built");
        Ok(client)
    }
}
