//! Coordinator discovery from the peer side
//!
//! Broadcasts DISCOVER_MASTER on the discovery port and waits a bounded
//! time for a MASTER_ANNOUNCE. The announce names the coordinator's TCP
//! endpoint; everything after discovery happens over TCP.

use std::time::Duration;

use tokio::net::UdpSocket;
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::protocol::{decode_datagram, encode_datagram, Message};

/// Broadcast for the coordinator and return its TCP address as host:port
pub async fn discover(
    peer_id: &str,
    peer_port: u16,
    discovery_port: u16,
    timeout: Duration,
) -> Result<String> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(|e| Error::connection_failed("0.0.0.0:0", e.to_string()))?;
    socket.set_broadcast(true)?;

    let request = Message::DiscoverMaster {
        peer_id: peer_id.to_string(),
        port: peer_port,
    };
    let bytes = encode_datagram(&request)?;
    socket
        .send_to(&bytes, ("255.255.255.255", discovery_port))
        .await?;
    debug!(discovery_port, "Sent discovery broadcast");

    let mut buf = vec![0u8; 4096];
    let deadline = tokio::time::Instant::now() + timeout;

    // Other broadcasts may land on this socket; keep reading until the
    // announce arrives or the deadline passes
    loop {
        let remaining = deadline
            .checked_duration_since(tokio::time::Instant::now())
            .unwrap_or(Duration::ZERO);
        let received = tokio::time::timeout(remaining, socket.recv_from(&mut buf))
            .await
            .map_err(|_| Error::DiscoveryTimeout {
                timeout_secs: timeout.as_secs(),
            })?;

        let (len, from) = received?;
        match decode_datagram(&buf[..len]) {
            Ok(Message::MasterAnnounce { master_ip, master_port }) => {
                let addr = format!("{}:{}", master_ip, master_port);
                info!(coordinator = %addr, "Coordinator discovered");
                return Ok(addr);
            }
            Ok(other) => {
                debug!(from = %from, tag = other.type_name(), "Ignoring datagram while discovering");
            }
            Err(e) => {
                debug!(from = %from, error = %e, "Ignoring malformed datagram while discovering");
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
