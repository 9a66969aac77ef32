//! Loader settings
//!
//! Settings are layered from an optional TOML file and `COORDCONF__*`
//! environment variables, e.g. `COORDCONF__RETRY_INTERVAL_MS=500`.

use std::path::Path;
use std::time::Duration;

use config::{Config, Environment, File};
use coordconf_store::RetryPolicy;
use serde::{Deserialize, Serialize};

use crate::attributes::SourceAttributes;
use crate::{ConfigError, Result};

fn default_retry_interval_ms() -> u64 {
    300
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Registry tuning plus the load requests a host wants to run at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoaderSettings {
    /// Fixed backoff between connection attempts
    #[serde(default = "default_retry_interval_ms")]
    pub retry_interval_ms: u64,
    /// Maximum connection retries; retry forever when absent
    #[serde(default)]
    pub max_retries: Option<u32>,
    /// Default log level when `RUST_LOG` is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Load requests, in precedence order
    #[serde(default)]
    pub sources: Vec<SourceAttributes>,
}

impl Default for LoaderSettings {
    fn default() -> Self {
        Self {
            retry_interval_ms: default_retry_interval_ms(),
            max_retries: None,
            log_level: default_log_level(),
            sources: Vec::new(),
        }
    }
}

impl LoaderSettings {
    /// Parse from TOML string
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let settings: Self = toml::from_str(toml_str)
            .map_err(|e| ConfigError::settings(format!("TOML parse error: {e}")))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Retry policy for clients built by the registry.
    pub fn retry_policy(&self) -> RetryPolicy {
        let interval = Duration::from_millis(self.retry_interval_ms);
        match self.max_retries {
            Some(max_retries) => RetryPolicy::bounded(max_retries, interval),
            None => RetryPolicy::forever(interval),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.retry_interval_ms == 0 {
            return Err(ConfigError::settings("retry_interval_ms must be > 0"));
        }
        for source in &self.sources {
            source.validate()?;
        }
        Ok(())
    }
}

/// Load settings from an optional file plus environment overrides.
///
/// A missing file is not an error: defaults and the environment still apply.
pub fn load_settings(path: Option<&Path>) -> Result<LoaderSettings> {
    let mut builder = Config::builder();
    if let Some(path) = path
        && path.exists()
    {
        builder = builder.add_source(File::from(path));
    }
    builder = builder.add_source(
        Environment::with_prefix("COORDCONF")
            .try_parsing(true)
            .separator("__"),
    );

    let settings: LoaderSettings = builder
        .build()
        .map_err(|e| ConfigError::settings(format!("config build error: {e}")))?
        .try_deserialize()
        .map_err(|e| ConfigError::settings(format!("config deserialize error: {e}")))?;
    settings.validate()?;
    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::decode::NodeDataFormat;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let settings = LoaderSettings::default();
        assert_eq!(
            settings.retry_policy(),
            RetryPolicy::forever(Duration::from_millis(300))
        );
        assert_eq!(settings.log_level, "info");
        assert!(settings.sources.is_empty());
    }

    #[test]
    fn test_bounded_retry() {
        let settings = LoaderSettings {
            max_retries: Some(3),
            retry_interval_ms: 50,
            ..Default::default()
        };
        assert_eq!(
            settings.retry_policy(),
            RetryPolicy::bounded(3, Duration::from_millis(50))
        );
    }

    #[test]
    fn test_from_toml() {
        let settings = LoaderSettings::from_toml(
            r#"
retry_interval_ms = 500

[[sources]]
connect_string = "host:2181"
root_path = "/config"
auto_refreshed = true
format = "toml"
"#,
        )
        .unwrap();

        assert_eq!(settings.retry_interval_ms, 500);
        assert_eq!(settings.sources.len(), 1);
        assert!(settings.sources[0].auto_refreshed);
        assert_eq!(settings.sources[0].format, NodeDataFormat::Toml);
    }

    #[test]
    fn test_invalid_source_rejected() {
        let err = LoaderSettings::from_toml(
            r#"
[[sources]]
connect_string = "host:2181"
root_path = "relative"
"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Settings(_)));

        assert!(LoaderSettings::from_toml("retry_interval_ms = 0").is_err());
    }

    #[test]
    fn test_load_settings_from_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("coordconf.toml");
        std::fs::write(
            &path,
            r#"
retry_interval_ms = 1000
log_level = "debug"

[[sources]]
connect_string = "zk1:2181,zk2:2181"
root_path = "/apps/billing"
name = "billing"
"#,
        )
        .unwrap();

        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.retry_interval_ms, 1000);
        assert_eq!(settings.log_level, "debug");
        assert_eq!(settings.sources[0].source_name(), "billing");
    }

    #[test]
    fn test_load_settings_missing_file_uses_defaults() {
        let settings = load_settings(Some(Path::new("/nonexistent/coordconf.toml"))).unwrap();
        assert_eq!(settings.retry_interval_ms, 300);
    }
}
