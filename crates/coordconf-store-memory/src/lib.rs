//! In-process coordination store for CoordConf.
//!
//! This crate provides an implementation of the `CoordinationClient` and
//! `ClientFactory` traits from `coordconf-store` backed by a [`MemoryStore`]
//! living in the same process. It is used for tests and local development.
//!
//! # Example
//!
//! ```ignore
//! use coordconf_store_memory::{MemoryClientFactory, MemoryStore};
//! use std::sync::Arc;
//!
//! let store = Arc::new(MemoryStore::new());
//! store.create_all("/config/app", b"server.port=8080")?;
//!
//! let factory = MemoryClientFactory::new();
//! factory.register("localhost:2181", store);
//! ```

pub mod client;
pub mod factory;
pub mod store;

pub use client::MemoryClient;
pub use factory::MemoryClientFactory;
pub use store::MemoryStore;

// Re-export the client traits for convenience
pub use coordconf_store::{ClientFactory, CoordinationClient, StoreError};
