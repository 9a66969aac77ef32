//! Tracing setup for hosts that do not install their own subscriber.
//!
//! The filter level can be changed at runtime once initialized.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, Registry, fmt, prelude::*, reload};

use crate::settings::LoaderSettings;

static FILTER_HANDLE: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

pub fn init_tracing() {
    init_tracing_with_level("info");
}

/// Install a global fmt subscriber. `RUST_LOG` wins over `level` when set.
///
/// Does nothing if a global subscriber is already installed.
pub fn init_tracing_with_level(level: &str) {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|_| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new(level));

    let (filter_layer, handle) = reload::Layer::new(filter);
    if tracing_subscriber::registry()
        .with(filter_layer)
        .with(fmt::layer().with_target(true))
        .try_init()
        .is_ok()
    {
        let _ = FILTER_HANDLE.set(handle);
    }
}

pub fn init_from_settings(settings: &LoaderSettings) {
    init_tracing_with_level(&settings.log_level);
}

/// Replace the active filter. Returns `false` if this module did not
/// install the subscriber or `level` is not a valid filter.
pub fn apply_logging_level(level: &str) -> bool {
    let Some(handle) = FILTER_HANDLE.get() else {
        return false;
    };
    let Ok(filter) = EnvFilter::try_new(level) else {
        return false;
    };
    handle.modify(|current| *current = filter).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_repeatable_and_reloadable() {
        init_from_settings(&LoaderSettings::default());
        init_tracing_with_level("debug");

        // Only meaningful when this test installed the global subscriber.
        if FILTER_HANDLE.get().is_some() {
            assert!(apply_logging_level("coordconf_config=trace"));
        }
        tracing::debug!("tracing initialized");
    }
}
