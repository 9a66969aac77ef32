//! Root path resolution
//!
//! Decides whether a load proceeds, creating the root path when live refresh
//! is requested, and lists the configuration unit names beneath it.

use coordconf_store::{CoordinationClient, path};
use tracing::{debug, info};

use crate::{ConfigError, Result};

/// Existence of the root path as observed by one load.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootPathState {
    Absent,
    Present,
    JustCreated,
}

/// Outcome of resolving a root path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedRoot {
    /// Root path missing and not auto-created: the load yields no configuration.
    Absent,
    /// Root path exists; `children` in store order (possibly empty).
    Present {
        state: RootPathState,
        children: Vec<String>,
    },
}

impl ResolvedRoot {
    pub fn state(&self) -> RootPathState {
        match self {
            Self::Absent => RootPathState::Absent,
            Self::Present { state, .. } => *state,
        }
    }

    pub fn children(&self) -> &[String] {
        match self {
            Self::Absent => &[],
            Self::Present { children, .. } => children,
        }
    }
}

/// Resolve `root_path` and list its immediate children.
///
/// With `auto_refreshed` a missing root path (and any missing ancestor) is
/// created; losing a creation race to another creator is not an error.
pub async fn resolve_root(
    client: &dyn CoordinationClient,
    root_path: &str,
    auto_refreshed: bool,
) -> Result<ResolvedRoot> {
    path::validate(root_path).map_err(|e| ConfigError::path_state(root_path, e.to_string()))?;

    let state = if client.exists(root_path).await? {
        RootPathState::Present
    } else if !auto_refreshed {
        debug!(root_path, "root path absent, nothing to load");
        return Ok(ResolvedRoot::Absent);
    } else {
        create_root(client, root_path).await?
    };

    let children = client
        .list_children(root_path)
        .await
        .map_err(|e| ConfigError::enumeration(root_path, e))?;

    debug!(root_path, ?state, children = children.len(), "root path resolved");
    Ok(ResolvedRoot::Present { state, children })
}

async fn create_root(client: &dyn CoordinationClient, root_path: &str) -> Result<RootPathState> {
    // Ancestors first, shallowest to deepest.
    let mut missing = vec![root_path];
    let mut cursor = path::parent(root_path);
    while let Some(ancestor) = cursor {
        if client.exists(ancestor).await? {
            break;
        }
        missing.push(ancestor);
        cursor = path::parent(ancestor);
    }

    let mut created_root = false;
    for node in missing.into_iter().rev() {
        match client.create(node, &[]).await {
            Ok(()) => created_root = node == root_path,
            Err(e) if e.is_node_exists() => {
                debug!(path = node, "node created concurrently");
            }
            Err(e) => return Err(e.into()),
        }
    }

    if created_root {
        info!(root_path, "created root path");
        return Ok(RootPathState::JustCreated);
    }

    // Another creator won the race; make sure the node really is there.
    if client.exists(root_path).await? {
        Ok(RootPathState::Present)
    } else {
        Err(ConfigError::path_state(
            root_path,
            "root path reported as existing but is absent",
        ))
    }
}
