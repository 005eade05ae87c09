//! Client operations: the one-shot subcommands
//!
//! Thin wrappers over single protocol exchanges: look a file up in the
//! coordinator's index, download it from the first peer that holds it,
//! or list what a peer advertises.

use std::path::Path;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::protocol::{exchange, write_message, FileDescriptor, Message, PeerLocation};

/// Ask the coordinator which peers hold a file
pub async fn find_file(coordinator_addr: &str, filename: &str) -> Result<Vec<PeerLocation>> {
    let request = Message::FindFile {
        filename: filename.to_string(),
    };

    match exchange(coordinator_addr, &request).await? {
        Message::FileLocation { peers } => Ok(peers),
        Message::FileNotFound { filename } => Err(Error::FileNotFound(filename)),
        other => Err(Error::ProtocolUnexpected {
            expected: "FILE_LOCATION or FILE_NOT_FOUND".to_string(),
            got: other.type_name().to_string(),
        }),
    }
}

/// List the files a registered peer advertises
pub async fn list_files(
    coordinator_addr: &str,
    target_peer_id: &str,
) -> Result<Vec<FileDescriptor>> {
    let request = Message::ListFiles {
        target_peer_id: target_peer_id.to_string(),
    };

    match exchange(coordinator_addr, &request).await? {
        Message::FilesList { files, .. } => Ok(files),
        Message::PeerNotFound { peer_id } => {
            Err(Error::FileNotFound(format!("peer not found: {}", peer_id)))
        }
        other => Err(Error::ProtocolUnexpected {
            expected: "FILES_LIST or PEER_NOT_FOUND".to_string(),
            got: other.type_name().to_string(),
        }),
    }
}

/// Locate a file via the coordinator and download it from the first
/// peer holding it
pub async fn fetch_file(coordinator_addr: &str, filename: &str, output: &Path) -> Result<u64> {
    let peers = find_file(coordinator_addr, filename).await?;

    // The coordinator answers FILE_NOT_FOUND rather than an empty list,
    // but the payload is remote input and gets checked anyway
    let peer = peers.first().ok_or_else(|| Error::ProtocolUnexpected {
        expected: "FILE_LOCATION with at least one peer".to_string(),
        got: "FILE_LOCATION with no peers".to_string(),
    })?;
    let peer_addr = format!("{}:{}", peer.host, peer.port);
    info!(filename = %filename, peer_id = %peer.peer_id, peer = %peer_addr, "Downloading");

    download_from_peer(&peer_addr, filename, output).await
}

/// GET_FILE from a specific peer: framed request out, raw bytes back
/// until the peer closes the connection
pub async fn download_from_peer(peer_addr: &str, filename: &str, output: &Path) -> Result<u64> {
    let mut stream = TcpStream::connect(peer_addr)
        .await
        .map_err(|e| Error::connection_failed(peer_addr, e.to_string()))?;

    let request = Message::GetFile {
        filename: filename.to_string(),
    };
    write_message(&mut stream, &request).await?;

    if let Some(parent) = output.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let mut file = tokio::fs::File::create(output).await.map_err(|e| Error::IoWrite {
        path: output.to_path_buf(),
        source: e,
    })?;

    let bytes = tokio::io::copy(&mut stream, &mut file).await?;
    file.flush().await?;

    debug!(filename = %filename, bytes, output = %output.display(), "Download complete");
    Ok(bytes)
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{Coordinator, PeerRegistry, ResultStore, TaskQueue};
    use crate::peer::FileServer;
    use std::sync::Arc;
    use tempfile::TempDir;
    use tokio::net::TcpListener;

    async fn spawn_coordinator(dir: &TempDir) -> (Arc<Coordinator>, String) {
        let coordinator = Arc::new(Coordinator::new(
            PeerRegistry::new(),
            TaskQueue::new(dir.path().join("tasks")),
            ResultStore::new(dir.path().join("results")),
        ));
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(Arc::clone(&coordinator).run(listener));
        (coordinator, addr)
    }

    fn descriptor(name: &str) -> FileDescriptor {
        FileDescriptor {
            name: name.to_string(),
            checksum: "ab".repeat(32),
        }
    }

    #[tokio::test]
    async fn test_find_file_not_found() {
        let dir = TempDir::new().unwrap();
        let (_coordinator, addr) = spawn_coordinator(&dir).await;

        let err = find_file(&addr, "nope.txt").await.unwrap_err();
        assert!(matches!(err, Error::FileNotFound(_)));
    }

    #[tokio::test]
    async fn test_list_files_round_trip() {
        let dir = TempDir::new().unwrap();
        let (coordinator, addr) = spawn_coordinator(&dir).await;
        coordinator
            .registry
            .register("p1", "127.0.0.1".into(), 9001, vec![descriptor("a.txt")]);

        let files = list_files(&addr, "p1").await.unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].name, "a.txt");

        assert!(list_files(&addr, "ghost").await.is_err());
    }

    #[tokio::test]
    async fn test_fetch_rejects_location_without_peers() {
        // An index reply naming no holders is invalid; it must surface as
        // a protocol error, not a crash
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            crate::protocol::read_message(&mut stream).await.unwrap();
            write_message(&mut stream, &Message::FileLocation { peers: vec![] })
                .await
                .unwrap();
        });

        let dir = TempDir::new().unwrap();
        let err = fetch_file(&addr, "data.csv", &dir.path().join("out"))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::ProtocolUnexpected { .. }));
    }

    #[tokio::test]
    async fn test_fetch_file_end_to_end() {
        let dir = TempDir::new().unwrap();
        let (coordinator, addr) = spawn_coordinator(&dir).await;

        // Peer file server with real content
        let shared = dir.path().join("shared");
        std::fs::create_dir_all(&shared).unwrap();
        std::fs::write(shared.join("data.csv"), b"col1,col2\n1,2\n").unwrap();

        let peer_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let peer_addr = peer_listener.local_addr().unwrap();
        tokio::spawn(Arc::new(FileServer::new(&shared)).run(peer_listener));

        coordinator.registry.register(
            "p1",
            "127.0.0.1".into(),
            peer_addr.port(),
            vec![descriptor("data.csv")],
        );

        let output = dir.path().join("downloads").join("data.csv");
        let bytes = fetch_file(&addr, "data.csv", &output).await.unwrap();
        assert_eq!(bytes, 14);
        assert_eq!(std::fs::read(&output).unwrap(), b"col1,col2\n1,2\n");
    }
}
