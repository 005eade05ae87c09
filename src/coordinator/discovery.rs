//! UDP discovery responder
//!
//! Listens for DISCOVER_MASTER broadcasts and answers each one with a
//! unicast MASTER_ANNOUNCE naming the coordinator's TCP endpoint. A
//! discovery exchange is answer-only: it never touches the registry, and
//! registration stays the peer's explicit next step.

use std::net::{IpAddr, Ipv4Addr};

use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::protocol::{decode_datagram, encode_datagram, Message};

/// Run the discovery responder until the process exits
pub async fn run_responder(
    discovery_port: u16,
    announce_host: String,
    announce_port: u16,
) -> Result<()> {
    let socket = UdpSocket::bind(("0.0.0.0", discovery_port))
        .await
        .map_err(|e| {
            Error::connection_failed(format!("0.0.0.0:{}", discovery_port), e.to_string())
        })?;

    info!(
        port = discovery_port,
        announce = %format!("{}:{}", announce_host, announce_port),
        "Discovery responder listening"
    );

    let mut buf = vec![0u8; 4096];
    loop {
        let (len, from) = match socket.recv_from(&mut buf).await {
            Ok(received) => received,
            Err(e) => {
                warn!(error = %e, "Discovery receive failed");
                continue;
            }
        };

        let msg = match decode_datagram(&buf[..len]) {
            Ok(msg) => msg,
            Err(e) => {
                debug!(from = %from, error = %e, "Ignoring malformed discovery datagram");
                continue;
            }
        };

        match msg {
            Message::DiscoverMaster { peer_id, port } => {
                debug!(peer_id = %peer_id, peer_port = port, from = %from, "Discovery request");

                let reply = Message::MasterAnnounce {
                    master_ip: announce_host.clone(),
                    master_port: announce_port,
                };
                match encode_datagram(&reply) {
                    Ok(bytes) => {
                        if let Err(e) = socket.send_to(&bytes, from).await {
                            warn!(to = %from, error = %e, "Failed to send announce");
                        }
                    }
                    Err(e) => warn!(error = %e, "Failed to encode announce"),
                }
            }
            other => {
                debug!(from = %from, tag = other.type_name(), "Ignoring non-discovery datagram");
            }
        }
    }
}

/// Best-effort local address autodetection for the announce host
///
/// Opens an unconnected UDP socket toward a routable address; no packet
/// is sent, the kernel just picks the outbound interface.
pub fn local_ip() -> IpAddr {
    std::net::UdpSocket::bind("0.0.0.0:0")
        .and_then(|s| {
            s.connect("8.8.8.8:80")?;
            s.local_addr()
        })
        .map(|addr| addr.ip())
        .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST))
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
