//! Property sources
//!
//! This module provides the queryable side of loaded configuration:
//! - Node: one configuration unit bound to a single store node
//! - Composite: the ordered units found under a root path
//! - Layered: the host's ordered list of named sources

mod composite;
mod layered;
mod node;

pub use composite::CompositeSource;
pub use layered::{Placement, PropertySources};
pub use node::{NodeSnapshot, NodeSource, NodeSourceFactory};

use serde_json::Value;

/// A named set of properties that can be queried by key.
pub trait PropertySource: Send + Sync + std::fmt::Debug {
    /// Name of this source (unique within a [`PropertySources`])
    fn name(&self) -> &str;

    /// Current value of `key`, if this source defines it
    fn get_property(&self, key: &str) -> Option<Value>;

    /// All keys currently defined, sorted and deduplicated
    fn property_names(&self) -> Vec<String>;

    fn contains_property(&self, key: &str) -> bool {
        self.get_property(key).is_some()
    }
}
