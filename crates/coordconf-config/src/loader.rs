//! Configuration loading
//!
//! A load turns one [`SourceAttributes`] request into an ordered composite:
//! shared client, resolved root path, one unit per child, assembled in store
//! order. Any failure aborts the whole load; no partial composite is returned.

use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::{ConfigError, Result};
use crate::attributes::SourceAttributes;
use crate::registry::ClientRegistry;
use crate::resolver::{ResolvedRoot, resolve_root};
use crate::settings::LoaderSettings;
use crate::sources::{
    CompositeSource, NodeSourceFactory, Placement, PropertySource, PropertySources,
};

/// Loads configuration sources through a shared [`ClientRegistry`].
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    registry: Arc<ClientRegistry>,
}

impl ConfigLoader {
    pub fn new(registry: Arc<ClientRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<ClientRegistry> {
        &self.registry
    }

    /// Load the composite described by `attributes`.
    ///
    /// Returns `Ok(None)` when the root path is absent and auto-refresh is
    /// off. An existing root path without children yields an empty composite.
    #[instrument(skip(self, attributes), fields(
        connect_string = %attributes.connect_string,
        root_path = %attributes.root_path,
    ))]
    pub async fn load(&self, attributes: &SourceAttributes) -> Result<Option<CompositeSource>> {
        attributes.validate()?;

        let client = self.registry.get_or_create(&attributes.identity()).await?;

        let children = match resolve_root(
            client.as_ref(),
            &attributes.root_path,
            attributes.auto_refreshed,
        )
        .await?
        {
            ResolvedRoot::Absent => {
                info!("root path absent, no configuration loaded");
                return Ok(None);
            }
            ResolvedRoot::Present { children, .. } => children,
        };

        let factory = NodeSourceFactory::new(attributes.format);
        let mut units = Vec::with_capacity(children.len());
        for child in &children {
            let mut unit =
                factory.create(&attributes.root_path, child, &client, attributes.auto_refreshed);
            // Dropping the units built so far releases their watches.
            unit.initialize().await.map_err(|e| match e {
                ConfigError::Store(source) => ConfigError::enumeration(unit.path(), source),
                other => other,
            })?;
            debug!(path = unit.path(), version = ?unit.version(), "configuration unit loaded");
            units.push(unit);
        }

        let composite = CompositeSource::assemble(attributes.source_name(), units)
            .with_events(factory.events());
        info!(
            name = %attributes.source_name(),
            units = composite.len(),
            auto_refreshed = attributes.auto_refreshed,
            "configuration source loaded"
        );
        Ok(Some(composite))
    }

    /// Load and register the composite in `sources`.
    ///
    /// A source already registered under the same name is replaced in place;
    /// otherwise `placement` decides where it goes. Returns whether anything
    /// was loaded.
    pub async fn load_into(
        &self,
        attributes: &SourceAttributes,
        sources: &mut PropertySources,
        placement: &Placement,
    ) -> Result<bool> {
        let Some(composite) = self.load(attributes).await? else {
            return Ok(false);
        };

        let name = composite.name().to_string();
        let composite = Arc::new(composite);
        if sources.replace(&name, composite.clone()).is_some() {
            debug!(%name, "replaced existing property source");
        } else {
            sources.place(placement, composite)?;
        }
        Ok(true)
    }

    /// Run every load request in `settings`, appending in order.
    ///
    /// Returns the number of sources registered.
    pub async fn load_all(
        &self,
        settings: &LoaderSettings,
        sources: &mut PropertySources,
    ) -> Result<usize> {
        let mut loaded = 0;
        for attributes in &settings.sources {
            if self.load_into(attributes, sources, &Placement::Last).await? {
                loaded += 1;
            }
        }
        Ok(loaded)
    }
}
