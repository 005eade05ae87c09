//! Peer registry — authoritative record of registered peers
//!
//! Populated by REGISTER exchanges and refreshed by HEARTBEAT. Records
//! never expire on their own; a crashed peer simply goes stale until it
//! re-registers under the same id.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::protocol::{FileDescriptor, PeerLocation};

// ─────────────────────────────────────────────────────────────────
// Peer Record
// ─────────────────────────────────────────────────────────────────

/// One registered peer
#[derive(Debug, Clone)]
pub struct PeerRecord {
    /// Registry id chosen by the peer
    pub peer_id: String,

    /// Address where the peer serves GET_FILE requests
    pub host: String,
    pub port: u16,

    /// Files the peer currently advertises
    pub files: Vec<FileDescriptor>,

    /// Last REGISTER or HEARTBEAT from this peer
    pub last_seen: Instant,
}

// ─────────────────────────────────────────────────────────────────
// Peer Registry
// ─────────────────────────────────────────────────────────────────

/// Thread-safe registry of peers, keyed by peer id
pub struct PeerRegistry {
    peers: RwLock<HashMap<String, PeerRecord>>,
}

impl PeerRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self {
            peers: RwLock::new(HashMap::new()),
        }
    }

    /// Register a peer, overwriting any previous record under the same id
    pub fn register(
        &self,
        peer_id: &str,
        host: String,
        port: u16,
        files: Vec<FileDescriptor>,
    ) {
        let record = PeerRecord {
            peer_id: peer_id.to_string(),
            host,
            port,
            files,
            last_seen: Instant::now(),
        };
        self.peers.write().insert(peer_id.to_string(), record);
    }

    /// Refresh a peer's liveness, optionally replacing its file list
    ///
    /// Fails for ids that never registered; the record is left untouched.
    pub fn heartbeat(&self, peer_id: &str, files: Option<Vec<FileDescriptor>>) -> Result<()> {
        let mut peers = self.peers.write();
        let record = peers.get_mut(peer_id).ok_or(Error::UnknownPeer)?;

        record.last_seen = Instant::now();
        if let Some(files) = files {
            record.files = files;
        }
        Ok(())
    }

    /// Get a clone of a peer's record
    pub fn get(&self, peer_id: &str) -> Option<PeerRecord> {
        self.peers.read().get(peer_id).cloned()
    }

    /// A peer's advertised file list, or None if the id is unknown
    pub fn list_files(&self, peer_id: &str) -> Option<Vec<FileDescriptor>> {
        self.peers.read().get(peer_id).map(|p| p.files.clone())
    }

    /// All peers currently advertising a file with this exact name
    pub fn find_file(&self, filename: &str) -> Vec<PeerLocation> {
        self.peers
            .read()
            .values()
            .filter(|p| p.files.iter().any(|f| f.name == filename))
            .map(|p| PeerLocation {
                peer_id: p.peer_id.clone(),
                host: p.host.clone(),
                port: p.port,
            })
            .collect()
    }

    /// Get all registered peers
    pub fn all_peers(&self) -> Vec<PeerRecord> {
        self.peers.read().values().cloned().collect()
    }

    /// Get count of registered peers
    pub fn peer_count(&self) -> usize {
        self.peers.read().len()
    }

    /// Ids of peers not heard from within the given window
    pub fn stale_peers(&self, window: Duration) -> Vec<String> {
        self.peers
            .read()
            .iter()
            .filter(|(_, p)| p.last_seen.elapsed() > window)
            .map(|(id, _)| id.clone())
            .collect()
    }
}

impl Default for PeerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
