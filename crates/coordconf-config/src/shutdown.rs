//! Registry shutdown
//!
//! Closes every shared client once, at process exit or on demand.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use coordconf_store::ClientState;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::ConfigError;
use crate::registry::{ClientRegistry, ConnectionIdentity};

/// What a shutdown did with each drained client.
#[derive(Debug, Default)]
pub struct ShutdownReport {
    /// Started clients that closed cleanly
    pub closed: Vec<ConnectionIdentity>,
    /// Clients that were not started and were left alone
    pub skipped: Vec<ConnectionIdentity>,
    /// Clients whose close failed
    pub failures: Vec<ConfigError>,
}

impl ShutdownReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Closes the registry's clients exactly once.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    registry: Arc<ClientRegistry>,
    done: AtomicBool,
    installed: AtomicBool,
}

impl ShutdownCoordinator {
    pub fn new(registry: Arc<ClientRegistry>) -> Arc<Self> {
        Arc::new(Self {
            registry,
            done: AtomicBool::new(false),
            installed: AtomicBool::new(false),
        })
    }

    pub fn is_shut_down(&self) -> bool {
        self.done.load(Ordering::SeqCst)
    }

    /// Close every started client and empty the registry.
    ///
    /// Failures are logged and collected; they never stop the remaining
    /// clients from being closed. Only the first call does any work.
    pub async fn shutdown(&self) -> ShutdownReport {
        let mut report = ShutdownReport::default();
        if self.done.swap(true, Ordering::SeqCst) {
            debug!("shutdown already ran");
            return report;
        }

        let clients = self.registry.drain();
        info!(clients = clients.len(), "closing coordination clients");

        for (identity, client) in clients {
            if client.state() != ClientState::Started {
                debug!(%identity, state = %client.state(), "client not started, skipping close");
                report.skipped.push(identity);
                continue;
            }
            match client.close().await {
                Ok(()) => {
                    debug!(%identity, "client closed");
                    report.closed.push(identity);
                }
                Err(e) => {
                    warn!(%identity, error = %e, "failed to close client");
                    report.failures.push(ConfigError::shutdown(&identity, e));
                }
            }
        }

        info!(
            closed = report.closed.len(),
            skipped = report.skipped.len(),
            failed = report.failures.len(),
            "shutdown complete"
        );
        report
    }

    /// Run [`shutdown`](Self::shutdown) on Ctrl-C or when the returned handle
    /// is triggered, whichever comes first.
    ///
    /// Returns `None` if a hook was already installed.
    pub fn install(self: &Arc<Self>) -> Option<ShutdownHandle> {
        if self.installed.swap(true, Ordering::SeqCst) {
            warn!("shutdown hook already installed");
            return None;
        }

        let trigger = Arc::new(Notify::new());
        let coordinator = Arc::clone(self);
        let notified = Arc::clone(&trigger);
        let task = tokio::spawn(async move {
            tokio::select! {
                result = tokio::signal::ctrl_c() => match result {
                    Ok(()) => info!("received Ctrl+C, shutting down"),
                    Err(e) => error!(error = %e, "failed to listen for Ctrl+C, shutting down"),
                },
                _ = notified.notified() => debug!("shutdown triggered"),
            }
            coordinator.shutdown().await
        });

        Some(ShutdownHandle { trigger, task })
    }
}

/// Handle to an installed shutdown hook.
#[derive(Debug)]
pub struct ShutdownHandle {
    trigger: Arc<Notify>,
    task: JoinHandle<ShutdownReport>,
}

impl ShutdownHandle {
    /// Run the shutdown now instead of waiting for a signal.
    pub fn trigger(&self) {
        self.trigger.notify_one();
    }

    /// Wait for the hook to finish and return its report.
    pub async fn wait(self) -> ShutdownReport {
        match self.task.await {
            Ok(report) => report,
            Err(e) => {
                error!(error = %e, "shutdown task failed");
                ShutdownReport::default()
            }
        }
    }
}
