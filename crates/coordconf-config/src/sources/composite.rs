//! Ordered composite of configuration units

use std::collections::BTreeSet;

use serde_json::Value;
use tokio::sync::broadcast;

use super::PropertySource;
use super::node::NodeSource;
use crate::events::ConfigChangeEvent;

/// All units found under one root path, queried in store order.
///
/// Lookups return the value from the first unit that defines the key, so an
/// earlier child shadows a later one.
#[derive(Debug)]
pub struct CompositeSource {
    name: String,
    units: Vec<NodeSource>,
    events: broadcast::Sender<ConfigChangeEvent>,
}

impl CompositeSource {
    /// An empty composite.
    pub fn new(name: impl Into<String>) -> Self {
        Self::assemble(name, Vec::new())
    }

    /// Composite over `units`, keeping their order.
    pub fn assemble(name: impl Into<String>, units: Vec<NodeSource>) -> Self {
        Self {
            name: name.into(),
            units,
            events: broadcast::channel(1).0,
        }
    }

    /// Use the channel the units publish their change events on.
    pub fn with_events(mut self, events: broadcast::Sender<ConfigChangeEvent>) -> Self {
        self.events = events;
        self
    }

    /// Append a unit with the lowest precedence.
    pub fn add(&mut self, unit: NodeSource) {
        self.units.push(unit);
    }

    pub fn units(&self) -> &[NodeSource] {
        &self.units
    }

    /// Node paths of the units, in precedence order.
    pub fn unit_paths(&self) -> Vec<&str> {
        self.units.iter().map(NodeSource::path).collect()
    }

    pub fn unit(&self, node_path: &str) -> Option<&NodeSource> {
        self.units.iter().find(|unit| unit.path() == node_path)
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Change events from every unit assembled with a shared channel.
    pub fn subscribe(&self) -> broadcast::Receiver<ConfigChangeEvent> {
        self.events.subscribe()
    }
}

impl PropertySource for CompositeSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get_property(&self, key: &str) -> Option<Value> {
        self.units.iter().find_map(|unit| unit.get_property(key))
    }

    fn property_names(&self) -> Vec<String> {
        let names: BTreeSet<String> = self
            .units
            .iter()
            .flat_map(|unit| unit.property_names())
            .collect();
        names.into_iter().collect()
    }

    fn contains_property(&self, key: &str) -> bool {
        self.units.iter().any(|unit| unit.contains_property(key))
    }
}
