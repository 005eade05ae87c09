//! Peer file server
//!
//! Serves GET_FILE requests from other nodes. The request arrives framed
//! like every other envelope; the response is the raw file content,
//! unframed, terminated by closing the connection. A request for a file
//! the peer does not have gets an empty body.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{read_message, write_message, Message};

/// Serves files out of the peer's shared directory
pub struct FileServer {
    shared_dir: PathBuf,
}

impl FileServer {
    pub fn new(shared_dir: impl Into<PathBuf>) -> Self {
        Self {
            shared_dir: shared_dir.into(),
        }
    }

    /// Accept loop for incoming file requests
    pub async fn run(self: Arc<Self>, listener: TcpListener) -> Result<()> {
        let addr = listener.local_addr()?;
        info!(addr = %addr, shared_dir = %self.shared_dir.display(), "File server listening");

        loop {
            let (stream, peer_addr) = match listener.accept().await {
                Ok(accepted) => accepted,
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    continue;
                }
            };

            let server = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = server.handle_connection(stream).await {
                    debug!(peer = %peer_addr, error = %e, "File request ended with error");
                }
            });
        }
    }

    async fn handle_connection(&self, mut stream: TcpStream) -> Result<()> {
        let request = read_message(&mut stream).await?;

        let filename = match request {
            Message::GetFile { filename } => filename,
            other => {
                let reply = Message::error(format!("unexpected message: {}", other.type_name()));
                return write_message(&mut stream, &reply).await;
            }
        };

        // Shared files are a flat namespace; anything that is not a plain
        // name cannot match an advertised file
        if filename.contains('/') || filename.contains('\\') || filename.is_empty() {
            warn!(filename = %filename, "Rejected file request with path components");
            return Ok(());
        }

        let path = self.shared_dir.join(&filename);
        if !path.is_file() {
            warn!(filename = %filename, "Requested file not in shared directory");
            return Ok(());
        }

        let mut file = tokio::fs::File::open(&path).await.map_err(|e| Error::IoRead {
            path: path.clone(),
            source: e,
        })?;
        let sent = tokio::io::copy(&mut file, &mut stream).await?;
        stream.shutdown().await?;

        info!(filename = %filename, bytes = sent, "Served file");
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;
    use tempfile::TempDir;

    async fn spawn_server(dir: &TempDir) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = Arc::new(FileServer::new(dir.path()));
        tokio::spawn(server.run(listener));
        addr
    }

    async fn get_file(addr: std::net::SocketAddr, filename: &str) -> Vec<u8> {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = Message::GetFile {
            filename: filename.to_string(),
        };
        write_message(&mut stream, &request).await.unwrap();

        let mut body = Vec::new();
        stream.read_to_end(&mut body).await.unwrap();
        body
    }

    #[tokio::test]
    async fn test_get_file_streams_raw_bytes() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("data.bin"), b"\x00raw bytes\xff").unwrap();
        let addr = spawn_server(&dir).await;

        let body = get_file(addr, "data.bin").await;
        assert_eq!(body, b"\x00raw bytes\xff");
    }

    #[tokio::test]
    async fn test_missing_file_closes_with_empty_body() {
        let dir = TempDir::new().unwrap();
        let addr = spawn_server(&dir).await;

        let body = get_file(addr, "nope.txt").await;
        assert!(body.is_empty());
    }

    #[tokio::test]
    async fn test_traversal_request_gets_nothing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("inside.txt"), b"x").unwrap();
        let addr = spawn_server(&dir).await;

        let body = get_file(addr, "../inside.txt").await;
        assert!(body.is_empty());
    }
}
