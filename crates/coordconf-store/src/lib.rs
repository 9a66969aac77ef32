//! Coordination store abstraction for CoordConf.
//!
//! This crate defines the capabilities the configuration loader consumes from
//! a hierarchical coordination store (ZooKeeper-like): connect, check-exists,
//! create, read, list-children and watch. It carries no transport of its own.
//!
//! # Modules
//!
//! - [`error`] - Store error types
//! - [`path`] - Path normalization and joining
//! - [`retry`] - Connection retry policies
//! - [`traits`] - Client and factory traits
//! - [`types`] - Client state, node data and watch events

pub mod error;
pub mod path;
pub mod retry;
pub mod traits;
pub mod types;

pub use error::StoreError;
pub use retry::{DEFAULT_RETRY_INTERVAL, RetryPolicy};
pub use traits::{ClientFactory, CoordinationClient, DynClient, NodeListener};
pub use types::{ClientState, NodeData, NodeEvent, WatchId};
