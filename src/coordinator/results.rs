//! Result store — persists submitted result archives
//!
//! SUBMIT_RESULT payloads land as files in the coordinator's results
//! directory under the name the peer chose. Names are restricted to plain
//! file names so a peer cannot write outside the directory.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};

/// Writes result archives into a results directory
pub struct ResultStore {
    dir: PathBuf,
}

impl ResultStore {
    /// Create a store over a results directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The directory results are written to
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Persist one result archive. Overwrites a previous submission under
    /// the same name.
    pub fn store(&self, peer_id: &str, result_name: &str, data: &[u8]) -> Result<()> {
        if !is_plain_file_name(result_name) {
            return Err(Error::ProtocolMalformed(format!(
                "invalid result name: {:?}",
                result_name
            )));
        }

        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(result_name);
        std::fs::write(&path, data).map_err(|e| Error::IoWrite {
            path: path.clone(),
            source: e,
        })?;

        info!(
            peer_id = %peer_id,
            result = %result_name,
            bytes = data.len(),
            "Stored result archive"
        );
        Ok(())
    }
}

/// A single path component with no separators or traversal
fn is_plain_file_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains('/')
        && !name.contains('\\')
        && !name.contains('\0')
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
