//! Configuration change events emitted by configuration units

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Operation type for configuration changes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigOperation {
    /// Initial values were read
    Loaded,
    /// Node data changed and the new values were applied
    Updated,
    /// Node was deleted; the unit is now empty
    Deleted,
    /// A change could not be applied; last-known values were kept
    RefreshFailed,
}

impl std::fmt::Display for ConfigOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Loaded => write!(f, "loaded"),
            Self::Updated => write!(f, "updated"),
            Self::Deleted => write!(f, "deleted"),
            Self::RefreshFailed => write!(f, "refresh_failed"),
        }
    }
}

/// Event representing a change to one configuration unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfigChangeEvent {
    /// Name of the unit that changed
    pub source_name: String,
    /// Node path the unit is bound to
    pub path: String,
    /// Operation type
    pub operation: ConfigOperation,
    /// Store modification id of the applied state (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<i64>,
    /// Failure description for `RefreshFailed`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Timestamp of the change
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

impl ConfigChangeEvent {
    /// Create a new configuration change event
    pub fn new(
        source_name: impl Into<String>,
        path: impl Into<String>,
        operation: ConfigOperation,
    ) -> Self {
        Self {
            source_name: source_name.into(),
            path: path.into(),
            operation,
            version: None,
            message: None,
            timestamp: OffsetDateTime::now_utc(),
        }
    }

    /// Attach the store modification id
    pub fn with_version(mut self, version: i64) -> Self {
        self.version = Some(version);
        self
    }

    /// Attach a failure description
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
