//! Protocol message definitions
//!
//! All message types for the coordination protocol. The wire envelope has
//! exactly two top-level fields: `type` (the action tag) and `data` (a
//! tag-dependent mapping), serialized as JSON.

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

// ─────────────────────────────────────────────────────────────────
// Shared Payload Types
// ─────────────────────────────────────────────────────────────────

/// A file advertised by a peer. Immutable once sent; produced by scanning
/// the peer's shared directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileDescriptor {
    /// File name relative to the peer's shared directory
    pub name: String,

    /// Lowercase hex SHA-256 digest of the file content
    pub checksum: String,
}

/// One holder of a file, as returned by FIND_FILE
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerLocation {
    pub peer_id: String,
    pub host: String,
    pub port: u16,
}

// ─────────────────────────────────────────────────────────────────
// Message Envelope (Discriminated Union)
// ─────────────────────────────────────────────────────────────────

/// All protocol messages
///
/// `host`/`port` on REGISTER are optional at the decode level so that a
/// request missing them still parses; the coordinator answers it with an
/// explicit ERROR instead of a decode failure.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Message {
    // ─── Discovery (UDP) ────────────────────────────────────────
    /// Peer broadcast looking for the coordinator
    DiscoverMaster { peer_id: String, port: u16 },

    /// Coordinator's answer to a discovery broadcast
    MasterAnnounce { master_ip: String, master_port: u16 },

    // ─── Peer → Coordinator ─────────────────────────────────────
    /// Peer registration (create or overwrite the registry record)
    Register {
        peer_id: String,
        #[serde(default)]
        host: Option<String>,
        #[serde(default)]
        port: Option<u16>,
        #[serde(default)]
        files: Option<Vec<FileDescriptor>>,
    },

    /// Liveness refresh; may carry an updated file list
    Heartbeat {
        peer_id: String,
        #[serde(default)]
        files: Option<Vec<FileDescriptor>>,
    },

    /// Ask for one unit of work
    RequestTask { peer_id: String },

    /// Submit an executed task's result archive
    SubmitResult {
        peer_id: String,
        result_name: String,
        /// Base64-encoded archive bytes
        result_data: String,
    },

    // ─── Coordinator → Peer ─────────────────────────────────────
    /// Registration accepted
    Registered {},

    /// Heartbeat accepted
    Alive {},

    /// One unit of work, removed from the queue at hand-out
    TaskPackage {
        task_name: String,
        /// Base64-encoded archive bytes
        task_data: String,
    },

    /// Queue is empty
    NoTasks {},

    /// Result persisted
    Ok {},

    /// Explicit failure reply
    Error { message: String },

    // ─── Client → Coordinator ───────────────────────────────────
    /// Ask for a peer's advertised file list
    ListFiles { target_peer_id: String },

    /// Ask which peers hold a file
    FindFile { filename: String },

    // ─── Coordinator → Client ───────────────────────────────────
    /// A peer's current file list
    FilesList {
        peer_id: String,
        files: Vec<FileDescriptor>,
    },

    /// LIST_FILES target is not in the registry
    PeerNotFound { peer_id: String },

    /// Peers holding the requested file
    FileLocation { peers: Vec<PeerLocation> },

    /// No registered peer advertises the file
    FileNotFound { filename: String },

    // ─── Client → Peer ──────────────────────────────────────────
    /// Request raw file bytes from the owning peer; the response is the
    /// unframed content, terminated by connection close
    GetFile { filename: String },
}

impl Message {
    /// Get the wire action tag
    pub fn type_name(&self) -> &'static str {
        match self {
            Message::DiscoverMaster { .. } => "DISCOVER_MASTER",
            Message::MasterAnnounce { .. } => "MASTER_ANNOUNCE",
            Message::Register { .. } => "REGISTER",
            Message::Registered {} => "REGISTERED",
            Message::Heartbeat { .. } => "HEARTBEAT",
            Message::Alive {} => "ALIVE",
            Message::Error { .. } => "ERROR",
            Message::RequestTask { .. } => "REQUEST_TASK",
            Message::TaskPackage { .. } => "TASK_PACKAGE",
            Message::NoTasks {} => "NO_TASKS",
            Message::SubmitResult { .. } => "SUBMIT_RESULT",
            Message::Ok {} => "OK",
            Message::ListFiles { .. } => "LIST_FILES",
            Message::FilesList { .. } => "FILES_LIST",
            Message::PeerNotFound { .. } => "PEER_NOT_FOUND",
            Message::FindFile { .. } => "FIND_FILE",
            Message::FileLocation { .. } => "FILE_LOCATION",
            Message::FileNotFound { .. } => "FILE_NOT_FOUND",
            Message::GetFile { .. } => "GET_FILE",
        }
    }

    /// Build an ERROR reply
    pub fn error(message: impl Into<String>) -> Self {
        Message::Error {
            message: message.into(),
        }
    }

    /// Serialize to JSON bytes
    pub fn to_json(&self) -> Result<Vec<u8>> {
        serde_json::to_vec(self).map_err(|e| Error::ProtocolMalformed(e.to_string()))
    }

    /// Deserialize from JSON bytes
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes).map_err(|e| Error::ProtocolMalformed(e.to_string()))
    }
}

// ─────────────────────────────────────────────────────────────────
// Payload Encoding
// ─────────────────────────────────────────────────────────────────

/// Encode raw archive bytes for transport
pub fn encode_payload(bytes: &[u8]) -> String {
    BASE64.encode(bytes)
}

/// Decode a transported archive payload
pub fn decode_payload(encoded: &str) -> Result<Vec<u8>> {
    BASE64
        .decode(encoded)
        .map_err(|e| Error::ProtocolMalformed(format!("invalid base64 payload: {}", e)))
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_message_serialize() {
        let msg = Message::Register {
            peer_id: "peer-1".to_string(),
            host: Some("127.0.0.1".to_string()),
            port: Some(9001),
            files: Some(vec![FileDescriptor {
                name: "f.txt".to_string(),
                checksum: "ab".repeat(32),
            }]),
        };

        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("\"type\":\"REGISTER\""));
        assert!(json.contains("\"data\""));
        assert!(json.contains("peer-1"));
        assert!(json.contains("f.txt"));
    }

    #[test]
    fn test_envelope_has_exactly_two_fields() {
        let msg = Message::FindFile {
            filename: "f.txt".to_string(),
        };
        let value: serde_json::Value = serde_json::to_value(&msg).unwrap();
        let obj = value.as_object().unwrap();
        assert_eq!(obj.len(), 2);
        assert!(obj.contains_key("type"));
        assert!(obj.contains_key("data"));
    }

    #[test]
    fn test_tag_spelling() {
        assert_eq!(Message::NoTasks {}.type_name(), "NO_TASKS");
        assert_eq!(Message::Ok {}.type_name(), "OK");

        let json = serde_json::to_string(&Message::NoTasks {}).unwrap();
        assert!(json.contains("\"NO_TASKS\""));
        let json = serde_json::to_string(&Message::Ok {}).unwrap();
        assert!(json.contains("\"OK\""));
        let json = serde_json::to_string(&Message::GetFile {
            filename: "a".into(),
        })
        .unwrap();
        assert!(json.contains("\"GET_FILE\""));
    }

    #[test]
    fn test_heartbeat_roundtrip() {
        let msg = Message::Heartbeat {
            peer_id: "peer-1".to_string(),
            files: None,
        };
        let bytes = msg.to_json().unwrap();
        let parsed = Message::from_json(&bytes).unwrap();

        match parsed {
            Message::Heartbeat { peer_id, files } => {
                assert_eq!(peer_id, "peer-1");
                assert!(files.is_none());
            }
            other => panic!("Expected Heartbeat, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_register_without_host_still_parses() {
        // The coordinator must see this request and answer ERROR,
        // not fail at decode time.
        let raw = r#"{"type":"REGISTER","data":{"peer_id":"p1"}}"#;
        let parsed = Message::from_json(raw.as_bytes()).unwrap();
        match parsed {
            Message::Register { peer_id, host, port, .. } => {
                assert_eq!(peer_id, "p1");
                assert!(host.is_none());
                assert!(port.is_none());
            }
            other => panic!("Expected Register, got {}", other.type_name()),
        }
    }

    #[test]
    fn test_malformed_envelope_rejected() {
        assert!(Message::from_json(b"{\"type\":\"NOT_A_TAG\",\"data\":{}}").is_err());
        assert!(Message::from_json(b"not json at all").is_err());
    }

    #[test]
    fn test_payload_encoding_roundtrip() {
        let data = b"\x00\x01binary archive bytes\xff";
        let encoded = encode_payload(data);
        let decoded = decode_payload(&encoded).unwrap();
        assert_eq!(decoded, data);

        assert!(decode_payload("!!! not base64 !!!").is_err());
    }

    #[test]
    fn test_task_package_message() {
        let msg = Message::TaskPackage {
            task_name: "job1.zip".to_string(),
            task_data: encode_payload(b"payload"),
        };
        let json = serde_json::to_string(&msg).unwrap();
        assert!(json.contains("TASK_PACKAGE"));
        assert!(json.contains("job1.zip"));
    }
}
