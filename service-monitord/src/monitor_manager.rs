use std::thread;
use tokio::sync::{mpsc, oneshot, watch};
use tokio_util::sync::CancellationToken;
use anyhow::Result;
use shared::types::ServiceStatus;
use service_registry::{CacheStore, Prober, RegistryError, ServiceRegistry};
use crate::cache::hash;
use crate::config::CacheConfig;

/// Commands sent to the registry thread
pub enum MonitorCommand {
    List {
        refresh: bool,
        reply: oneshot::Sender<Result<Vec<ServiceStatus>>>,
    },
    Get {
        name: String,
        refresh: bool,
        reply: oneshot::Sender<Result<Option<ServiceStatus>>>,
    },
    Maintenance(oneshot::Sender<Result<u64>>),
    Shutdown,
}

/// Handle to the thread that owns the service registry.
///
/// Probes block for up to the connect timeout, so the registry and its cache
/// store live on a dedicated OS thread rather than on the async runtime.
#[derive(Clone)]
pub struct MonitorHandle {
    tx: mpsc::Sender<MonitorCommand>,
}

impl MonitorHandle {
    /// Spawn the registry thread
    pub fn spawn<C, P>(mut registry: ServiceRegistry<C, P>, hash_tx: watch::Sender<String>) -> Self
    where
        C: CacheStore + Send + 'static,
        P: Prober + Send + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<MonitorCommand>(256);

        thread::spawn(move || {
            while let Some(cmd) = rx.blocking_recv() {
                match cmd {
                    MonitorCommand::List { refresh, reply } => {
                        let result = list_visible(&mut registry, refresh);
                        if let Ok(statuses) = &result {
                            hash_tx.send_replace(hash::compute_hash(statuses));
                        }
                        let _ = reply.send(result);
                    }
                    MonitorCommand::Get { name, refresh, reply } => {
                        let result = get_visible(&mut registry, &name, refresh);
                        // A forced probe may have changed a cached status
                        if refresh && matches!(&result, Ok(Some(_))) {
                            if let Ok(statuses) = list_visible(&mut registry, false) {
                                hash_tx.send_replace(hash::compute_hash(&statuses));
                            }
                        }
                        let _ = reply.send(result);
                    }
                    MonitorCommand::Maintenance(reply) => {
                        let result = registry
                            .monitor()
                            .cache()
                            .purge_expired()
                            .map_err(anyhow::Error::from);
                        let _ = reply.send(result);
                    }
                    MonitorCommand::Shutdown => {
                        tracing::info!("Registry thread shutting down");
                        break;
                    }
                }
            }
        });

        Self { tx }
    }

    /// Status of every visible service, in configuration order
    pub async fn list(&self, refresh: bool) -> Result<Vec<ServiceStatus>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(MonitorCommand::List { refresh, reply }).await?;
        rx.await?
    }

    /// Status of one visible service, by short name or key
    pub async fn get(&self, name: String, refresh: bool) -> Result<Option<ServiceStatus>> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(MonitorCommand::Get { name, refresh, reply }).await?;
        rx.await?
    }

    /// Purge expired cache entries
    pub async fn maintenance(&self) -> Result<u64> {
        let (reply, rx) = oneshot::channel();
        self.tx.send(MonitorCommand::Maintenance(reply)).await?;
        rx.await?
    }

    /// Shutdown the registry thread
    pub async fn shutdown(&self) -> Result<()> {
        self.tx.send(MonitorCommand::Shutdown).await?;
        Ok(())
    }
}

/// Walks the registry; each step selects the service that is then queried.
fn list_visible<C: CacheStore, P: Prober>(
    registry: &mut ServiceRegistry<C, P>,
    refresh: bool,
) -> Result<Vec<ServiceStatus>> {
    let mut statuses = Vec::with_capacity(registry.len());

    registry.rewind();
    while let Some(descriptor) = registry.next() {
        if !registry.is_visible()? {
            continue;
        }
        let running = registry.is_running(refresh)?;
        statuses.push(ServiceStatus::new(&descriptor, running));
    }

    Ok(statuses)
}

fn get_visible<C: CacheStore, P: Prober>(
    registry: &mut ServiceRegistry<C, P>,
    name: &str,
    refresh: bool,
) -> Result<Option<ServiceStatus>> {
    let selected = match registry.select(name) {
        Err(RegistryError::NotFound(_)) => registry.select_key(name),
        other => other,
    };

    let descriptor = match selected {
        Ok(descriptor) => descriptor,
        Err(RegistryError::NotFound(_)) => return Ok(None),
        Err(e) => return Err(e.into()),
    };

    if !descriptor.visible {
        return Ok(None);
    }

    let running = registry.is_running(refresh)?;
    Ok(Some(ServiceStatus::new(&descriptor, running)))
}

/// Monitor event loop - runs cache maintenance until cancelled
pub async fn run(
    monitor: MonitorHandle,
    config: CacheConfig,
    cancel: CancellationToken,
) -> Result<()> {
    let mut maintenance_interval = tokio::time::interval(
        std::time::Duration::from_secs(config.maintenance_interval_secs.max(1))
    );

    loop {
        tokio::select! {
            _ = maintenance_interval.tick() => {
                match monitor.maintenance().await {
                    Ok(0) => {}
                    Ok(purged) => tracing::debug!("Purged {} expired cache entries", purged),
                    Err(e) => tracing::error!("Failed to run maintenance: {}", e),
                }
            }
            _ = cancel.cancelled() => {
                tracing::info!("Monitor maintenance shutting down");
                break;
            }
        }
    }

    Ok(())
}
