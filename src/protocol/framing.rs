//! Wire framing: length-prefixed JSON over TCP
//!
//! Wire format:  [4-byte big-endian length][JSON envelope]
//!
//! One envelope sent, one received, per logical exchange. UDP discovery
//! datagrams carry a single bare envelope with no length prefix.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use crate::error::{Error, Result};

use super::Message;

/// Upper bound on a framed envelope (task archives travel base64-encoded
/// inside the JSON)
pub const MAX_MESSAGE_SIZE: u32 = 64 * 1024 * 1024; // 64 MB

/// Read one length-prefixed envelope from a stream
pub async fn read_message<R: AsyncReadExt + Unpin>(reader: &mut R) -> Result<Message> {
    let len = reader
        .read_u32()
        .await
        .map_err(|e| Error::ConnectionLost(e.to_string()))?;
    if len > MAX_MESSAGE_SIZE {
        return Err(Error::ProtocolMalformed(format!(
            "message too large: {} bytes (max {})",
            len, MAX_MESSAGE_SIZE
        )));
    }

    let mut buf = vec![0u8; len as usize];
    reader
        .read_exact(&mut buf)
        .await
        .map_err(|e| Error::ConnectionLost(e.to_string()))?;

    Message::from_json(&buf)
}

/// Write one length-prefixed envelope to a stream
pub async fn write_message<W: AsyncWriteExt + Unpin>(writer: &mut W, msg: &Message) -> Result<()> {
    let json = msg.to_json()?;
    let len = json.len() as u32;

    writer.write_u32(len).await?;
    writer.write_all(&json).await?;
    writer.flush().await?;

    Ok(())
}

/// One-shot request/reply exchange: connect, send one envelope, wait for
/// one envelope back. Every peer↔coordinator operation is one exchange
/// over a fresh connection.
pub async fn exchange(addr: &str, request: &Message) -> Result<Message> {
    let mut stream = TcpStream::connect(addr)
        .await
        .map_err(|e| Error::connection_failed(addr, e.to_string()))?;

    write_message(&mut stream, request).await?;
    read_message(&mut stream).await
}

/// Encode an envelope for a UDP datagram (bare JSON, no prefix)
pub fn encode_datagram(msg: &Message) -> Result<Vec<u8>> {
    msg.to_json()
}

/// Decode an envelope from a UDP datagram
pub fn decode_datagram(buf: &[u8]) -> Result<Message> {
    Message::from_json(buf)
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn test_framed_roundtrip_over_tcp() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let msg = read_message(&mut stream).await.unwrap();
            write_message(&mut stream, &msg).await.unwrap();
        });

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let request = Message::FindFile {
            filename: "f.txt".to_string(),
        };
        write_message(&mut stream, &request).await.unwrap();
        let echoed = read_message(&mut stream).await.unwrap();

        match echoed {
            Message::FindFile { filename } => assert_eq!(filename, "f.txt"),
            other => panic!("Expected FindFile, got {}", other.type_name()),
        }

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            // Claim an absurd length, send nothing else
            stream.write_u32(MAX_MESSAGE_SIZE + 1).await.unwrap();
        });

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let err = read_message(&mut stream).await.unwrap_err();
        assert!(matches!(err, Error::ProtocolMalformed(_)));

        server.await.unwrap();
    }

    #[tokio::test]
    async fn test_closed_connection_is_transport_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            drop(stream);
        });

        let mut stream = TcpStream::connect(addr).await.unwrap();
        let err = read_message(&mut stream).await.unwrap_err();
        assert!(matches!(err, Error::ConnectionLost(_)));

        server.await.unwrap();
    }

    #[test]
    fn test_datagram_roundtrip() {
        let msg = Message::DiscoverMaster {
            peer_id: "peer-1".to_string(),
            port: 9001,
        };
        let buf = encode_datagram(&msg).unwrap();
        let parsed = decode_datagram(&buf).unwrap();
        match parsed {
            Message::DiscoverMaster { peer_id, port } => {
                assert_eq!(peer_id, "peer-1");
                assert_eq!(port, 9001);
            }
            other => panic!("Expected DiscoverMaster, got {}", other.type_name()),
        }
    }
}
