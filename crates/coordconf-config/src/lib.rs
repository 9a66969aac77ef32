//! Hierarchical configuration loaded from a coordination store.
//!
//! This crate turns the children of a root path in a ZooKeeper-like store
//! into one ordered, queryable configuration source:
//! - Shares one started client per (connect string, root path) identity
//! - Discovers configuration units as the root path's immediate children
//! - Assembles units into a composite with first-wins lookups
//! - Optionally keeps every unit live through store watches
//! - Closes every shared client exactly once on shutdown
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │                         ConfigLoader                          │
//! │  ┌────────────────┐  ┌──────────────┐  ┌──────────────────┐   │
//! │  │ ClientRegistry │─▶│ resolve_root │─▶│ NodeSourceFactory│   │
//! │  └───────┬────────┘  └──────────────┘  └────────┬─────────┘   │
//! │          │                                      │             │
//! │  ┌───────▼────────────┐               ┌─────────▼─────────┐   │
//! │  │ ShutdownCoordinator│               │  CompositeSource  │   │
//! │  └────────────────────┘               └─────────┬─────────┘   │
//! └─────────────────────────────────────────────────┼─────────────┘
//!                                                   ▼
//!                                           PropertySources
//! ```

pub mod attributes;
pub mod decode;
pub mod events;
pub mod loader;
pub mod observability;
pub mod registry;
pub mod resolver;
pub mod settings;
pub mod shutdown;
pub mod sources;

// Re-export main types
pub use attributes::SourceAttributes;
pub use decode::{NodeDataFormat, PropertyMap};
pub use events::{ConfigChangeEvent, ConfigOperation};
pub use loader::ConfigLoader;
pub use registry::{ClientRegistry, ConnectionIdentity};
pub use resolver::{ResolvedRoot, RootPathState};
pub use settings::LoaderSettings;
pub use shutdown::{ShutdownCoordinator, ShutdownHandle, ShutdownReport};
pub use sources::{
    CompositeSource, NodeSource, NodeSourceFactory, Placement, PropertySource, PropertySources,
};

use coordconf_store::StoreError;

/// Error types for configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Connection error for {identity}: {source}")]
    Connection {
        identity: String,
        #[source]
        source: StoreError,
    },

    #[error("Root path state error at {path}: {message}")]
    PathState { path: String, message: String },

    #[error("Enumeration error under {path}: {source}")]
    Enumeration {
        path: String,
        #[source]
        source: StoreError,
    },

    #[error("Shutdown error for {identity}: {source}")]
    Shutdown {
        identity: String,
        #[source]
        source: StoreError,
    },

    #[error("Decode error at {path} ({format}): {message}")]
    Decode {
        path: String,
        format: NodeDataFormat,
        message: String,
    },

    #[error("Settings error: {0}")]
    Settings(String),

    #[error("Unknown property source: {0}")]
    UnknownSource(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl ConfigError {
    pub fn connection(identity: impl ToString, source: StoreError) -> Self {
        Self::Connection {
            identity: identity.to_string(),
            source,
        }
    }

    pub fn path_state(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::PathState {
            path: path.into(),
            message: message.into(),
        }
    }

    pub fn enumeration(path: impl Into<String>, source: StoreError) -> Self {
        Self::Enumeration {
            path: path.into(),
            source,
        }
    }

    pub fn shutdown(identity: impl ToString, source: StoreError) -> Self {
        Self::Shutdown {
            identity: identity.to_string(),
            source,
        }
    }

    pub fn decode(
        path: impl Into<String>,
        format: NodeDataFormat,
        message: impl Into<String>,
    ) -> Self {
        Self::Decode {
            path: path.into(),
            format,
            message: message.into(),
        }
    }

    pub fn settings(msg: impl Into<String>) -> Self {
        Self::Settings(msg.into())
    }

    pub fn unknown_source(name: impl Into<String>) -> Self {
        Self::UnknownSource(name.into())
    }
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;
