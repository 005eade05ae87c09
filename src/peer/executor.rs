//! Task executor
//!
//! Unpacks a task archive into a per-task working directory, runs its
//! entry-point script under a deadline, and packages the captured output
//! as the result archive submitted back to the coordinator.

use std::io::{Cursor, Write};
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{debug, info};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{Error, Result};

/// Result archive produced by a completed task
#[derive(Debug, Clone)]
pub struct TaskOutcome {
    /// Archive name submitted to the coordinator
    pub result_name: String,

    /// Raw result archive bytes
    pub result_data: Vec<u8>,
}

/// Runs task archives in a working directory
pub struct TaskExecutor {
    work_dir: PathBuf,
    entry_point: String,
    timeout: Duration,
}

impl TaskExecutor {
    pub fn new(work_dir: impl Into<PathBuf>, entry_point: impl Into<String>, timeout: Duration) -> Self {
        Self {
            work_dir: work_dir.into(),
            entry_point: entry_point.into(),
            timeout,
        }
    }

    /// Execute one task archive to completion
    ///
    /// The result archive is produced whether the script exits zero or
    /// not; a non-zero exit is the task's business, not a transport
    /// failure. Errors here mean the task could not be run at all.
    pub async fn execute(&self, task_name: &str, archive: &[u8]) -> Result<TaskOutcome> {
        let task_dir = self.unpack(task_name, archive)?;

        let entry = task_dir.join(&self.entry_point);
        if !entry.is_file() {
            return Err(Error::EntryPointMissing {
                task_name: task_name.to_string(),
                entry_point: self.entry_point.clone(),
            });
        }

        info!(task = %task_name, dir = %task_dir.display(), "Executing task");
        let child = Command::new("sh")
            .arg(&self.entry_point)
            .current_dir(&task_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::execution_failed(task_name, e.to_string()))?;

        // kill_on_drop reaps the child if the deadline fires
        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| Error::ExecutionTimeout {
                task_name: task_name.to_string(),
                timeout_secs: self.timeout.as_secs(),
            })?
            .map_err(|e| Error::execution_failed(task_name, e.to_string()))?;

        let exit_code = output.status.code().unwrap_or(-1);
        info!(
            task = %task_name,
            exit_code,
            stdout_bytes = output.stdout.len(),
            stderr_bytes = output.stderr.len(),
            "Task finished"
        );

        let result_name = format!("results_{}", task_name);
        let result_data = package_result(task_name, exit_code, &output.stdout, &output.stderr)?;

        Ok(TaskOutcome {
            result_name,
            result_data,
        })
    }

    /// Extract the archive into a fresh per-task directory
    fn unpack(&self, task_name: &str, archive: &[u8]) -> Result<PathBuf> {
        let stem = task_name.strip_suffix(".zip").unwrap_or(task_name);
        let task_dir = self.work_dir.join(stem);

        // A leftover directory from an earlier run of the same task name
        // would mix stale files into this run
        if task_dir.exists() {
            std::fs::remove_dir_all(&task_dir)?;
        }
        std::fs::create_dir_all(&task_dir)?;

        let mut zip = ZipArchive::new(Cursor::new(archive)).map_err(|e| Error::ArchiveInvalid {
            task_name: task_name.to_string(),
            message: e.to_string(),
        })?;
        zip.extract(&task_dir).map_err(|e| Error::ArchiveInvalid {
            task_name: task_name.to_string(),
            message: e.to_string(),
        })?;

        debug!(task = %task_name, files = zip.len(), "Unpacked task archive");
        Ok(task_dir)
    }
}

/// Build the result archive: captured output plus the exit code
fn package_result(
    task_name: &str,
    exit_code: i32,
    stdout: &[u8],
    stderr: &[u8],
) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = ZipWriter::new(&mut cursor);
        let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

        let internal = |e: zip::result::ZipError| {
            Error::execution_failed(task_name, format!("failed to package result: {}", e))
        };

        writer.start_file("stdout.txt", options).map_err(internal)?;
        writer.write_all(stdout)?;

        writer.start_file("stderr.txt", options).map_err(internal)?;
        writer.write_all(stderr)?;

        writer.start_file("exit_code.txt", options).map_err(internal)?;
        writer.write_all(exit_code.to_string().as_bytes())?;

        writer.finish().map_err(internal)?;
    }
    Ok(cursor.into_inner())
}

// ─────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────
