//! Coordinator TCP server
//!
//! Accepts one framed request per connection, answers it, and lets the
//! connection close. All peer and client operations go through here:
//! registration, heartbeats, task hand-out, result submission, and the
//! file index queries.

use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{decode_payload, encode_payload, read_message, write_message, Message};

use super::queue::TaskQueue;
use super::registry::PeerRegistry;
use super::results::ResultStore;

/// Shared coordinator state handed to every connection
pub struct Coordinator {
    pub registry: PeerRegistry,
    pub queue: TaskQueue,
    pub results: ResultStore,
}

impl Coordinator {
    pub fn new(registry: PeerRegistry, queue: TaskQueue, results: ResultStore) -> Self {
        Self {
            registry,
            queue,
            results,
        }
    }

    /// Accept loop. Each connection is one request/reply exchange handled
    /// on its own task.
    pub async fn run(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        info!(addr = %addr, "Coordinator listening");

        loop {
            let (stream, peer_addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    continue;
                }
            };

            let coordinator = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = coordinator.handle_connection(stream).await {
                    debug!(peer = %peer_addr, error = %e, "Connection ended with error");
                }
            });
        }
    }

    /// One exchange: read a framed request, answer it, done
    ///
    /// A malformed envelope gets a best-effort ERROR reply before the
    /// connection closes; only a transport-level loss closes silently.
    async fn handle_connection(&self, mut stream: TcpStream) -> Result<()> {
        let request = match read_message(&mut stream).await {
            Ok(request) => request,
            Err(e @ Error::ProtocolMalformed(_)) => {
                warn!(error = %e, "Malformed request envelope");
                let _ = write_message(&mut stream, &Message::error(e.to_string())).await;
                return Ok(());
            }
            Err(e) => return Err(e),
        };
        let tag = request.type_name();

        let reply = self.handle_message(request);
        debug!(request = tag, reply = reply.type_name(), "Handled exchange");

        write_message(&mut stream, &reply).await
    }

    /// Map one request to its reply. Does not touch the connection.
    pub fn handle_message(&self, request: Message) -> Message {
        match request {
            Message::Register {
                peer_id,
                host,
                port,
                files,
            } => match (host, port) {
                (Some(host), Some(port)) => {
                    let files = files.unwrap_or_default();
                    info!(peer_id = %peer_id, host = %host, port, files = files.len(), "Peer registered");
                    self.registry.register(&peer_id, host, port, files);
                    Message::Registered {}
                }
                _ => {
                    warn!(peer_id = %peer_id, "Rejected registration without host or port");
                    Message::error(Error::RegistrationInvalid.to_string())
                }
            },

            Message::Heartbeat { peer_id, files } => {
                match self.registry.heartbeat(&peer_id, files) {
                    Ok(()) => Message::Alive {},
                    Err(e) => {
                        debug!(peer_id = %peer_id, "Heartbeat from unregistered peer");
                        Message::error(e.to_string())
                    }
                }
            }

            Message::RequestTask { peer_id } => match self.queue.pop() {
                Ok(Some(task)) => {
                    info!(peer_id = %peer_id, task = %task.name, bytes = task.data.len(), "Task handed out");
                    Message::TaskPackage {
                        task_name: task.name,
                        task_data: encode_payload(&task.data),
                    }
                }
                Ok(None) => Message::NoTasks {},
                Err(e) => {
                    error!(error = %e, "Task queue read failed");
                    Message::error(e.to_string())
                }
            },

            Message::SubmitResult {
                peer_id,
                result_name,
                result_data,
            } => {
                let bytes = match decode_payload(&result_data) {
                    Ok(bytes) => bytes,
                    Err(e) => return Message::error(e.to_string()),
                };
                match self.results.store(&peer_id, &result_name, &bytes) {
                    Ok(()) => Message::Ok {},
                    Err(e) => {
                        error!(peer_id = %peer_id, result = %result_name, error = %e, "Failed to store result");
                        Message::error(e.to_string())
                    }
                }
            }

            Message::ListFiles { target_peer_id } => {
                match self.registry.list_files(&target_peer_id) {
                    Some(files) => Message::FilesList {
                        peer_id: target_peer_id,
                        files,
                    },
                    None => Message::PeerNotFound {
                        peer_id: target_peer_id,
                    },
                }
            }

            Message::FindFile { filename } => {
                let peers = self.registry.find_file(&filename);
                if peers.is_empty() {
                    Message::FileNotFound { filename }
                } else {
                    Message::FileLocation { peers }
                }
            }

            other => Message::error(format!("unexpected message: {}", other.type_name())),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
