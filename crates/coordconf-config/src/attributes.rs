//! Attributes of a single load request

use coordconf_store::path;
use serde::{Deserialize, Serialize};

use crate::decode::NodeDataFormat;
use crate::registry::ConnectionIdentity;
use crate::{ConfigError, Result};

/// What to load and how: endpoint, root path and refresh mode.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceAttributes {
    /// Target endpoint address, e.g. `host:2181`
    pub connect_string: String,
    /// Remote path under which configuration units live
    pub root_path: String,
    /// Track live changes and auto-create a missing root path
    #[serde(default)]
    pub auto_refreshed: bool,
    /// Name of the composite source (derived from the identity if absent)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Format of each unit's node data
    #[serde(default)]
    pub format: NodeDataFormat,
}

impl SourceAttributes {
    pub fn new(connect_string: impl Into<String>, root_path: impl Into<String>) -> Self {
        Self {
            connect_string: connect_string.into(),
            root_path: root_path.into(),
            auto_refreshed: false,
            name: None,
            format: NodeDataFormat::default(),
        }
    }

    pub fn with_auto_refresh(mut self, auto_refreshed: bool) -> Self {
        self.auto_refreshed = auto_refreshed;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_format(mut self, format: NodeDataFormat) -> Self {
        self.format = format;
        self
    }

    /// Name given to the composite source.
    pub fn source_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("coordination:{}", self.identity()))
    }

    /// Registry key for the client serving this request.
    pub fn identity(&self) -> ConnectionIdentity {
        ConnectionIdentity::new(&self.connect_string, &self.root_path)
    }

    pub fn validate(&self) -> Result<()> {
        if self.connect_string.trim().is_empty() {
            return Err(ConfigError::settings("connect_string must not be empty"));
        }
        path::validate(&self.root_path).map_err(|e| ConfigError::settings(e.to_string()))?;
        if let Some(name) = &self.name
            && name.trim().is_empty()
        {
            return Err(ConfigError::settings("name must not be blank"));
        }
        Ok(())
    }
}
