//! Peer agent
//!
//! The long-running peer process: discovers the coordinator, registers,
//! keeps a heartbeat going, polls for task archives, executes them, and
//! submits the results. Every coordinator interaction is one framed
//! exchange over a fresh connection.

use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpListener;
use tracing::{debug, info, warn};

use crate::config::{ensure_dir, NodeConfig};
use crate::error::{Error, Result};
use crate::files::scan_shared_dir;
use crate::protocol::{decode_payload, encode_payload, exchange, Message};

use super::discovery::discover;
use super::executor::TaskExecutor;
use super::server::FileServer;

/// A peer's connection to the mesh
pub struct PeerAgent {
    peer_id: String,
    host: String,
    port: u16,
    shared_dir: std::path::PathBuf,
    coordinator_addr: String,
    executor: TaskExecutor,
}

impl PeerAgent {
    /// Build an agent from config, resolving the coordinator address
    ///
    /// Resolution order: explicit override, configured address, UDP
    /// discovery with a bounded wait.
    pub async fn new(config: &NodeConfig, coordinator_override: Option<String>) -> Result<Self> {
        let peer_id = config.peer_id();
        let shared_dir = config.shared_dir();
        let work_dir = config.work_dir();
        ensure_dir(&shared_dir)?;
        ensure_dir(&work_dir)?;

        let coordinator_addr = match coordinator_override {
            Some(addr) => addr,
            None if !config.peer.coordinator_addr.is_empty() => {
                config.peer.coordinator_addr.clone()
            }
            // Broadcast until a coordinator answers; each attempt is one
            // bounded wait
            None => loop {
                match discover(
                    &peer_id,
                    config.peer.port,
                    config.coordinator.discovery_port,
                    Duration::from_secs(config.peer.discovery_timeout_secs),
                )
                .await
                {
                    Ok(addr) => break addr,
                    Err(e) if e.is_retryable() => {
                        warn!(error = %e, "Discovery attempt failed, retrying");
                    }
                    Err(e) => return Err(e),
                }
            },
        };

        Ok(Self {
            peer_id,
            host: config.peer.host.clone(),
            port: config.peer.port,
            shared_dir,
            coordinator_addr,
            executor: TaskExecutor::new(
                work_dir,
                config.peer.entry_point.clone(),
                Duration::from_secs(config.peer.task_timeout_secs),
            ),
        })
    }

    /// Register with the coordinator, advertising the shared directory
    pub async fn register(&self) -> Result<()> {
        let files = scan_shared_dir(&self.shared_dir)?;
        let request = Message::Register {
            peer_id: self.peer_id.clone(),
            host: Some(self.host.clone()),
            port: Some(self.port),
            files: Some(files),
        };

        match exchange(&self.coordinator_addr, &request).await? {
            Message::Registered {} => {
                info!(peer_id = %self.peer_id, coordinator = %self.coordinator_addr, "Registered");
                Ok(())
            }
            Message::Error { message } => Err(Error::ProtocolUnexpected {
                expected: "REGISTERED".to_string(),
                got: format!("ERROR: {}", message),
            }),
            other => Err(Error::ProtocolUnexpected {
                expected: "REGISTERED".to_string(),
                got: other.type_name().to_string(),
            }),
        }
    }

    /// One heartbeat exchange, carrying a fresh file list
    ///
    /// A coordinator that restarted answers ERROR; the agent re-registers
    /// and carries on.
    pub async fn heartbeat(&self) -> Result<()> {
        let files = scan_shared_dir(&self.shared_dir)?;
        let request = Message::Heartbeat {
            peer_id: self.peer_id.clone(),
            files: Some(files),
        };

        match exchange(&self.coordinator_addr, &request).await? {
            Message::Alive {} => Ok(()),
            Message::Error { message } => {
                warn!(message = %message, "Heartbeat rejected, re-registering");
                self.register().await
            }
            other => Err(Error::ProtocolUnexpected {
                expected: "ALIVE".to_string(),
                got: other.type_name().to_string(),
            }),
        }
    }

    /// Ask for one task and run it if one is available
    ///
    /// Returns whether a task was handed out. A task that fails to
    /// execute is logged and dropped; it was already removed from the
    /// coordinator's queue at hand-out.
    pub async fn poll_task(&self) -> Result<bool> {
        let request = Message::RequestTask {
            peer_id: self.peer_id.clone(),
        };

        let (task_name, task_data) = match exchange(&self.coordinator_addr, &request).await? {
            Message::TaskPackage { task_name, task_data } => (task_name, task_data),
            Message::NoTasks {} => return Ok(false),
            Message::Error { message } => {
                warn!(message = %message, "Task request rejected");
                return Ok(false);
            }
            other => {
                return Err(Error::ProtocolUnexpected {
                    expected: "TASK_PACKAGE or NO_TASKS".to_string(),
                    got: other.type_name().to_string(),
                })
            }
        };

        let archive = decode_payload(&task_data)?;
        info!(task = %task_name, bytes = archive.len(), "Received task");

        let outcome = match self.executor.execute(&task_name, &archive).await {
            Ok(outcome) => outcome,
            Err(e) => {
                warn!(task = %task_name, error = %e, "Task execution failed, dropping task");
                return Ok(true);
            }
        };

        self.submit_result(&outcome.result_name, &outcome.result_data)
            .await?;
        Ok(true)
    }

    /// Submit one result archive
    async fn submit_result(&self, result_name: &str, result_data: &[u8]) -> Result<()> {
        let request = Message::SubmitResult {
            peer_id: self.peer_id.clone(),
            result_name: result_name.to_string(),
            result_data: encode_payload(result_data),
        };

        match exchange(&self.coordinator_addr, &request).await? {
            Message::Ok {} => {
                info!(result = %result_name, "Result submitted");
                Ok(())
            }
            Message::Error { message } => Err(Error::ProtocolUnexpected {
                expected: "OK".to_string(),
                got: format!("ERROR: {}", message),
            }),
            other => Err(Error::ProtocolUnexpected {
                expected: "OK".to_string(),
                got: other.type_name().to_string(),
            }),
        }
    }

    /// Run the agent until the process exits: file server, heartbeat
    /// loop, and task polling
    pub async fn run(self, config: &NodeConfig) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", self.port))
            .await
            .map_err(|e| Error::connection_failed(format!("0.0.0.0:{}", self.port), e.to_string()))?;

        let file_server = Arc::new(FileServer::new(self.shared_dir.clone()));
        let mut server_task = tokio::spawn(Arc::clone(&file_server).run(listener));

        self.register().await?;

        let mut heartbeat = tokio::time::interval(Duration::from_secs(
            config.peer.heartbeat_interval_secs,
        ));
        let mut poll = tokio::time::interval(Duration::from_secs(config.peer.poll_interval_secs));
        // The first interval tick fires immediately; registration already
        // covered that moment
        heartbeat.tick().await;
        poll.tick().await;

        info!(
            peer_id = %self.peer_id,
            coordinator = %self.coordinator_addr,
            port = self.port,
            "Peer agent running"
        );

        loop {
            tokio::select! {
                _ = heartbeat.tick() => {
                    if let Err(e) = self.heartbeat().await {
                        warn!(error = %e, "Heartbeat failed");
                    }
                }
                _ = poll.tick() => {
                    match self.poll_task().await {
                        Ok(true) => debug!("Task cycle complete"),
                        Ok(false) => debug!("No tasks available"),
                        Err(e) => warn!(error = %e, "Task poll failed"),
                    }
                }
                res = &mut server_task => {
                    // The file server only returns on an accept-level failure
                    return match res {
                        Ok(result) => result,
                        Err(e) => Err(Error::Internal(format!("file server task failed: {}", e))),
                    };
                }
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
