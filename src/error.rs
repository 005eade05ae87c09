//! Error types for edgemesh
//!
//! Provides structured error handling with:
//! - Numeric error codes for machine parsing
//! - User-friendly messages with suggestions
//! - Exit codes for CLI

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for edgemesh operations
pub type Result<T> = std::result::Result<T, Error>;

/// Numeric error codes for machine parsing and documentation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum ErrorCode {
    // Configuration errors (1xx)
    ConfigNotFound = 100,
    ConfigParseError = 101,
    ConfigValidation = 102,

    // IO errors (2xx)
    IoRead = 200,
    IoWrite = 201,
    IoPermission = 202,
    IoNotFound = 203,

    // Connection errors (3xx)
    ConnectionFailed = 300,
    ConnectionLost = 301,
    DiscoveryTimeout = 302,

    // Protocol errors (4xx)
    ProtocolMalformed = 400,
    ProtocolUnexpected = 401,

    // Registry errors (5xx)
    RegistrationInvalid = 500,
    UnknownPeer = 501,

    // Execution errors (6xx)
    ExecutionFailed = 600,
    ExecutionTimeout = 601,
    ArchiveInvalid = 602,
    EntryPointMissing = 603,

    // File errors (7xx)
    FileNotFound = 700,

    // Internal errors (9xx)
    InternalError = 900,
}

impl ErrorCode {
    /// Get the string code (e.g., "E100")
    pub fn as_str(&self) -> String {
        format!("E{}", *self as u16)
    }

    /// Get the exit code for CLI (maps to 1-125 range)
    pub fn exit_code(&self) -> i32 {
        match *self as u16 {
            100..=199 => 10, // Config errors
            200..=299 => 20, // IO errors
            300..=399 => 30, // Connection errors
            400..=499 => 40, // Protocol errors
            500..=599 => 50, // Registry errors
            600..=699 => 60, // Execution errors
            700..=799 => 70, // File errors
            900..=999 => 90, // Internal errors
            _ => 1,
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Main error type for edgemesh
#[derive(Error, Debug)]
pub enum Error {
    // ─────────────────────────────────────────────────────────────
    // Configuration Errors
    // ─────────────────────────────────────────────────────────────

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    // ─────────────────────────────────────────────────────────────
    // IO Errors
    // ─────────────────────────────────────────────────────────────

    /// File read error
    #[error("Failed to read file: {path}")]
    IoRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// File write error
    #[error("Failed to write file: {path}")]
    IoWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Generic IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML serialization error
    #[error("TOML serialization error: {0}")]
    Toml(#[from] toml::ser::Error),

    // ─────────────────────────────────────────────────────────────
    // Connection Errors
    // ─────────────────────────────────────────────────────────────

    /// Connection failed
    #[error("Failed to connect to {addr}: {message}")]
    ConnectionFailed { addr: String, message: String },

    /// Connection dropped mid-exchange
    #[error("Connection lost: {0}")]
    ConnectionLost(String),

    /// No MASTER_ANNOUNCE within the bounded wait
    #[error("Coordinator discovery timed out after {timeout_secs}s")]
    DiscoveryTimeout { timeout_secs: u64 },

    // ─────────────────────────────────────────────────────────────
    // Protocol Errors
    // ─────────────────────────────────────────────────────────────

    /// Malformed or undecodable envelope
    #[error("Malformed protocol message: {0}")]
    ProtocolMalformed(String),

    /// Decoded fine but the wrong message for this exchange
    #[error("Unexpected message {got} (expected {expected})")]
    ProtocolUnexpected { expected: String, got: String },

    // ─────────────────────────────────────────────────────────────
    // Registry Errors
    // ─────────────────────────────────────────────────────────────

    /// REGISTER without host or port
    #[error("missing host or port")]
    RegistrationInvalid,

    /// HEARTBEAT from an id never registered
    #[error("peer not registered")]
    UnknownPeer,

    // ─────────────────────────────────────────────────────────────
    // Execution Errors
    // ─────────────────────────────────────────────────────────────

    /// Task execution failed
    #[error("Task execution failed: {message}")]
    ExecutionFailed { task_name: String, message: String },

    /// Task deadline exceeded
    #[error("Task {task_name} timed out after {timeout_secs}s")]
    ExecutionTimeout { task_name: String, timeout_secs: u64 },

    /// Task archive could not be decoded
    #[error("Invalid task archive {task_name}: {message}")]
    ArchiveInvalid { task_name: String, message: String },

    /// Fixed-name entry point absent from the archive
    #[error("Task {task_name} has no entry point '{entry_point}'")]
    EntryPointMissing { task_name: String, entry_point: String },

    // ─────────────────────────────────────────────────────────────
    // File Errors
    // ─────────────────────────────────────────────────────────────

    /// No peer advertises the requested file
    #[error("File not found on any peer: {0}")]
    FileNotFound(String),

    // ─────────────────────────────────────────────────────────────
    // Internal Errors
    // ─────────────────────────────────────────────────────────────

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Get the numeric error code
    pub fn code(&self) -> ErrorCode {
        match self {
            Error::Config(_) => ErrorCode::ConfigValidation,

            Error::IoRead { .. } => ErrorCode::IoRead,
            Error::IoWrite { .. } => ErrorCode::IoWrite,
            Error::Io(e) => match e.kind() {
                std::io::ErrorKind::NotFound => ErrorCode::IoNotFound,
                std::io::ErrorKind::PermissionDenied => ErrorCode::IoPermission,
                _ => ErrorCode::IoRead,
            },
            Error::Toml(_) => ErrorCode::ConfigParseError,

            Error::ConnectionFailed { .. } => ErrorCode::ConnectionFailed,
            Error::ConnectionLost(_) => ErrorCode::ConnectionLost,
            Error::DiscoveryTimeout { .. } => ErrorCode::DiscoveryTimeout,

            Error::ProtocolMalformed(_) => ErrorCode::ProtocolMalformed,
            Error::ProtocolUnexpected { .. } => ErrorCode::ProtocolUnexpected,

            Error::RegistrationInvalid => ErrorCode::RegistrationInvalid,
            Error::UnknownPeer => ErrorCode::UnknownPeer,

            Error::ExecutionFailed { .. } => ErrorCode::ExecutionFailed,
            Error::ExecutionTimeout { .. } => ErrorCode::ExecutionTimeout,
            Error::ArchiveInvalid { .. } => ErrorCode::ArchiveInvalid,
            Error::EntryPointMissing { .. } => ErrorCode::EntryPointMissing,

            Error::FileNotFound(_) => ErrorCode::FileNotFound,

            Error::Internal(_) => ErrorCode::InternalError,
        }
    }

    /// Check if the error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ConnectionFailed { .. }
                | Error::ConnectionLost(_)
                | Error::DiscoveryTimeout { .. }
                | Error::Io(_)
                | Error::IoRead { .. }
                | Error::IoWrite { .. }
        )
    }

    /// Get the exit code for CLI
    pub fn exit_code(&self) -> i32 {
        self.code().exit_code()
    }

    /// Get a user-friendly suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            Error::Config(_) => Some(
                "Run 'edgemesh config validate' to see details, or 'edgemesh config init' to start fresh."
            ),
            Error::ConnectionFailed { .. } => Some(
                "Check that the coordinator is running and reachable on this network."
            ),
            Error::DiscoveryTimeout { .. } => Some(
                "No coordinator answered the broadcast. Verify the discovery port matches on both sides."
            ),
            Error::UnknownPeer => Some(
                "The coordinator does not know this peer. It will re-register on the next cycle."
            ),
            Error::FileNotFound(_) => Some(
                "No registered peer advertises this file. Check the name with 'edgemesh list-files <peer-id>'."
            ),
            _ => None,
        }
    }

    /// Format the error for terminal display with colors
    pub fn format_for_terminal(&self) -> String {
        let code = self.code();
        let suggestion = self.suggestion();

        let mut output = format!("\x1b[31mError [{}]\x1b[0m: {}\n", code.as_str(), self);

        if let Some(hint) = suggestion {
            output.push_str(&format!("\n\x1b[33mHint\x1b[0m: {}\n", hint));
        }

        output
    }

    /// Format the error for logging (no colors)
    pub fn format_for_log(&self) -> String {
        format!("[{}] {}", self.code().as_str(), self)
    }

    /// Create a connection failed error
    pub fn connection_failed(addr: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ConnectionFailed {
            addr: addr.into(),
            message: message.into(),
        }
    }

    /// Create an execution failed error
    pub fn execution_failed(task_name: impl Into<String>, message: impl Into<String>) -> Self {
        Error::ExecutionFailed {
            task_name: task_name.into(),
            message: message.into(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
