//! The host's ordered list of named property sources

use std::sync::Arc;

use serde_json::Value;

use super::PropertySource;
use crate::{ConfigError, Result};

/// Where a new source goes relative to the existing ones.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Placement {
    /// Highest precedence
    #[default]
    First,
    /// Lowest precedence
    Last,
    /// Immediately ahead of the named source
    Before(String),
    /// Immediately behind the named source
    After(String),
}

/// Named sources in precedence order; earlier sources shadow later ones.
///
/// Names are unique: adding a source whose name is already present removes
/// the old entry first.
#[derive(Debug, Default, Clone)]
pub struct PropertySources {
    sources: Vec<Arc<dyn PropertySource>>,
}

impl PropertySources {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_first(&mut self, source: Arc<dyn PropertySource>) {
        self.remove(source.name());
        self.sources.insert(0, source);
    }

    pub fn add_last(&mut self, source: Arc<dyn PropertySource>) {
        self.remove(source.name());
        self.sources.push(source);
    }

    pub fn add_before(&mut self, relative: &str, source: Arc<dyn PropertySource>) -> Result<()> {
        self.insert_relative(relative, source, 0)
    }

    pub fn add_after(&mut self, relative: &str, source: Arc<dyn PropertySource>) -> Result<()> {
        self.insert_relative(relative, source, 1)
    }

    fn insert_relative(
        &mut self,
        relative: &str,
        source: Arc<dyn PropertySource>,
        offset: usize,
    ) -> Result<()> {
        if source.name() == relative {
            return Err(ConfigError::settings(format!(
                "property source '{relative}' cannot be placed relative to itself"
            )));
        }
        if !self.contains(relative) {
            return Err(ConfigError::unknown_source(relative));
        }
        self.remove(source.name());
        // Position re-read after the removal above may have shifted it.
        let index = self
            .position(relative)
            .ok_or_else(|| ConfigError::unknown_source(relative))?;
        self.sources.insert(index + offset, source);
        Ok(())
    }

    /// Add `source` according to `placement`.
    pub fn place(&mut self, placement: &Placement, source: Arc<dyn PropertySource>) -> Result<()> {
        match placement {
            Placement::First => {
                self.add_first(source);
                Ok(())
            }
            Placement::Last => {
                self.add_last(source);
                Ok(())
            }
            Placement::Before(relative) => self.add_before(relative, source),
            Placement::After(relative) => self.add_after(relative, source),
        }
    }

    /// Swap the source named `name` in place, returning the old one.
    pub fn replace(
        &mut self,
        name: &str,
        source: Arc<dyn PropertySource>,
    ) -> Option<Arc<dyn PropertySource>> {
        let index = self.position(name)?;
        Some(std::mem::replace(&mut self.sources[index], source))
    }

    pub fn remove(&mut self, name: &str) -> Option<Arc<dyn PropertySource>> {
        let index = self.position(name)?;
        Some(self.sources.remove(index))
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn PropertySource>> {
        self.sources.iter().find(|source| source.name() == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Source names in precedence order.
    pub fn names(&self) -> Vec<&str> {
        self.sources.iter().map(|source| source.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    /// Value of `key` from the first source that defines it.
    pub fn get_property(&self, key: &str) -> Option<Value> {
        self.sources
            .iter()
            .find_map(|source| source.get_property(key))
    }

    pub fn contains_property(&self, key: &str) -> bool {
        self.sources
            .iter()
            .any(|source| source.contains_property(key))
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.sources.iter().position(|source| source.name() == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    #[derive(Debug)]
    struct MapSource {
        name: String,
        values: BTreeMap<String, Value>,
    }

    fn source(name: &str, pairs: &[(&str, Value)]) -> Arc<dyn PropertySource> {
        Arc::new(MapSource {
            name: name.to_string(),
            values: pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        })
    }

    impl PropertySource for MapSource {
        fn name(&self) -> &str {
            &self.name
        }

        fn get_property(&self, key: &str) -> Option<Value> {
            self.values.get(key).cloned()
        }

        fn property_names(&self) -> Vec<String> {
            self.values.keys().cloned().collect()
        }
    }

    #[test]
    fn test_precedence_and_placement() {
        let mut sources = PropertySources::new();
        sources.add_last(source("defaults", &[("port", json!(80)), ("host", json!("a"))]));
        sources.add_first(source("env", &[("port", json!(8080))]));
        sources
            .add_after("env", source("store", &[("host", json!("b"))]))
            .unwrap();
        sources
            .add_before("env", source("cli", &[]))
            .unwrap();

        assert_eq!(sources.names(), vec!["cli", "env", "store", "defaults"]);
        assert_eq!(sources.get_property("port"), Some(json!(8080)));
        assert_eq!(sources.get_property("host"), Some(json!("b")));
        assert!(!sources.contains_property("missing"));
    }

    #[test]
    fn test_unknown_relative_source() {
        let mut sources = PropertySources::new();
        let err = sources
            .place(&Placement::Before("nope".into()), source("a", &[]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::UnknownSource(name) if name == "nope"));
        assert!(sources.is_empty());
    }

    #[test]
    fn test_names_stay_unique() {
        let mut sources = PropertySources::new();
        sources.add_last(source("a", &[("k", json!(1))]));
        sources.add_last(source("b", &[]));
        sources.add_last(source("a", &[("k", json!(2))]));

        assert_eq!(sources.names(), vec!["b", "a"]);
        assert_eq!(sources.get_property("k"), Some(json!(2)));
    }

    #[test]
    fn test_replace_keeps_position() {
        let mut sources = PropertySources::new();
        sources.add_last(source("a", &[]));
        sources.add_last(source("b", &[("k", json!("old"))]));
        sources.add_last(source("c", &[]));

        let old = sources.replace("b", source("b", &[("k", json!("new"))]));
        assert!(old.is_some());
        assert_eq!(sources.names(), vec!["a", "b", "c"]);
        assert_eq!(sources.get_property("k"), Some(json!("new")));
        assert!(sources.replace("zzz", source("zzz", &[])).is_none());

        assert!(sources.remove("a").is_some());
        assert_eq!(sources.len(), 2);
    }
}
