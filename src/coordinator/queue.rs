//! Task queue backed by the coordinator's tasks directory
//!
//! Each regular file in the directory is one pending task archive. Handing
//! a task out removes its file, so a task is delivered to at most one
//! peer. The pick-read-delete sequence runs under a single lock to keep
//! concurrent REQUEST_TASK exchanges from drawing the same file.

use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::warn;

use crate::error::{Error, Result};

/// A task archive pulled from the queue
#[derive(Debug, Clone)]
pub struct TaskArchive {
    /// File name of the archive, used as the task name on the wire
    pub name: String,

    /// Raw archive bytes
    pub data: Vec<u8>,
}

/// Directory-backed task queue
pub struct TaskQueue {
    dir: PathBuf,
    // Serializes pick-read-delete so one archive goes to one peer
    lock: Mutex<()>,
}

impl TaskQueue {
    /// Create a queue over a tasks directory
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            lock: Mutex::new(()),
        }
    }

    /// The directory this queue draws from
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Number of pending task archives
    pub fn len(&self) -> usize {
        self.pending_names().map(|names| names.len()).unwrap_or(0)
    }

    /// Whether the queue has no pending tasks
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Take the next task off the queue, or None when it is empty
    ///
    /// Tasks are drawn in lexicographic file-name order. The archive file
    /// is deleted before this returns, so a peer that crashes mid-task
    /// takes the task with it.
    pub fn pop(&self) -> Result<Option<TaskArchive>> {
        let _guard = self.lock.lock();

        let names = self.pending_names()?;
        let Some(name) = names.into_iter().next() else {
            return Ok(None);
        };

        let path = self.dir.join(&name);
        let data = std::fs::read(&path).map_err(|e| Error::IoRead {
            path: path.clone(),
            source: e,
        })?;
        if let Err(e) = std::fs::remove_file(&path) {
            // Leaving the file behind risks double delivery on a later pop
            warn!(task = %name, error = %e, "Failed to remove handed-out task file");
            return Err(Error::Io(e));
        }

        Ok(Some(TaskArchive { name, data }))
    }

    /// Sorted names of pending archives
    fn pending_names(&self) -> Result<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let entry = entry?;
            if !entry.path().is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
