//! Shared-file utilities
//!
//! Scans a peer's shared directory into the `FileDescriptor` list sent
//! with REGISTER and HEARTBEAT, and computes the streaming SHA-256
//! checksums those descriptors carry.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use sha2::{Digest, Sha256};

use crate::error::{Error, Result};
use crate::protocol::FileDescriptor;

/// Compute the lowercase hex SHA-256 digest of a file
pub fn checksum(path: &Path) -> Result<String> {
    let mut file = File::open(path).map_err(|e| Error::IoRead {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut hasher = Sha256::new();
    let mut buf = [0u8; 4096];
    loop {
        let n = file.read(&mut buf).map_err(|e| Error::IoRead {
            path: path.to_path_buf(),
            source: e,
        })?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }

    Ok(hex::encode(hasher.finalize()))
}

/// Compute the lowercase hex SHA-256 digest of an in-memory buffer
pub fn checksum_bytes(bytes: &[u8]) -> String {
    hex::encode(Sha256::digest(bytes))
}

/// Scan a shared directory into advertised file descriptors
///
/// Only regular files at the top level are advertised; the list is sorted
/// by name so repeated scans of an unchanged directory produce identical
/// descriptors.
pub fn scan_shared_dir(dir: &Path) -> Result<Vec<FileDescriptor>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        files.push(FileDescriptor {
            name: name.to_string(),
            checksum: checksum(&path)?,
        });
    }

    files.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(files)
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
