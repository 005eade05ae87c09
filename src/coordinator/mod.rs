//! Coordinator side: registry, task queue, result store, discovery
//!
//! The coordinator is the hub of the mesh. Peers find it over UDP
//! broadcast, register over TCP, and pull task archives from its queue;
//! clients query it for the file index.

mod discovery;
mod queue;
mod registry;
mod results;
mod server;

pub use discovery::{local_ip, run_responder};
pub use queue::{TaskArchive, TaskQueue};
pub use registry::{PeerRecord, PeerRegistry};
pub use results::ResultStore;
pub use server::Coordinator;

use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::info;

use crate::config::{ensure_dir, NodeConfig};
use crate::error::{Error, Result};

/// Run the coordinator until the process exits
pub async fn run(config: &NodeConfig) -> Result<()> {
    let tasks_dir = config.tasks_dir();
    let results_dir = config.results_dir();
    ensure_dir(&tasks_dir)?;
    ensure_dir(&results_dir)?;

    let announce_host = if config.coordinator.advertise_host.is_empty() {
        local_ip().to_string()
    } else {
        config.coordinator.advertise_host.clone()
    };

    let listener = TcpListener::bind(("0.0.0.0", config.coordinator.port))
        .await
        .map_err(|e| {
            Error::connection_failed(format!("0.0.0.0:{}", config.coordinator.port), e.to_string())
        })?;

    let coordinator = Arc::new(Coordinator::new(
        PeerRegistry::new(),
        TaskQueue::new(&tasks_dir),
        ResultStore::new(&results_dir),
    ));

    info!(
        port = config.coordinator.port,
        discovery_port = config.coordinator.discovery_port,
        announce_host = %announce_host,
        tasks_dir = %tasks_dir.display(),
        results_dir = %results_dir.display(),
        pending_tasks = coordinator.queue.len(),
        "Starting coordinator"
    );

    let responder = tokio::spawn(run_responder(
        config.coordinator.discovery_port,
        announce_host,
        config.coordinator.port,
    ));

    let result = coordinator.run(listener).await;
    responder.abort();
    result
}
