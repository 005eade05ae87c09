//! End-to-end integration: coordinator and peer as real processes
//!
//! Covers the whole task cycle: a task archive dropped into the
//! coordinator's queue is picked up by a polling peer, executed, and its
//! result archive lands in the coordinator's results directory. Also
//! exercises the peer's file server through the fetch subcommand.

use std::io::{Cursor, Read, Write};
use std::net::{TcpListener, TcpStream, UdpSocket};
use std::process::{Child, Command};
use std::time::{Duration, Instant};

use tempfile::TempDir;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

// ─────────────────────────────────────────────────────────────────
// Harness
// ─────────────────────────────────────────────────────────────────

struct NodeProcess(Child);

impl Drop for NodeProcess {
    fn drop(&mut self) {
        let _ = self.0.kill();
        let _ = self.0.wait();
    }
}

fn free_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

fn free_udp_port() -> u16 {
    let socket = UdpSocket::bind("127.0.0.1:0").unwrap();
    socket.local_addr().unwrap().port()
}

fn edgemesh() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin("edgemesh"))
}

fn wait_until_listening(port: u16) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while Instant::now() < deadline {
        if TcpStream::connect(("127.0.0.1", port)).is_ok() {
            return;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    panic!("process did not start listening on port {}", port);
}

fn make_task_archive(script: &str) -> Vec<u8> {
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = ZipWriter::new(&mut cursor);
        writer.start_file("run.sh", FileOptions::default()).unwrap();
        writer.write_all(script.as_bytes()).unwrap();
        writer.finish().unwrap();
    }
    cursor.into_inner()
}

fn read_archive_entry(archive: &[u8], name: &str) -> String {
    let mut zip = ZipArchive::new(Cursor::new(archive)).unwrap();
    let mut file = zip.by_name(name).unwrap();
    let mut content = String::new();
    file.read_to_string(&mut content).unwrap();
    content
}

// ─────────────────────────────────────────────────────────────────
// Full Task Cycle
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_task_flows_from_queue_to_results() {
    let dir = TempDir::new().unwrap();
    let tasks_dir = dir.path().join("tasks");
    let results_dir = dir.path().join("results");
    let shared_dir = dir.path().join("shared");
    let work_dir = dir.path().join("work");
    std::fs::create_dir_all(&tasks_dir).unwrap();

    let coordinator_port = free_port();
    let discovery_port = free_udp_port();
    let peer_port = free_port();

    // Queue a task before the peer starts polling
    std::fs::write(
        tasks_dir.join("job1.zip"),
        make_task_archive("echo task output\n"),
    )
    .unwrap();

    let _coordinator = NodeProcess(
        edgemesh()
            .arg("--quiet")
            .arg("coordinator")
            .env("EDGEMESH_COORDINATOR_PORT", coordinator_port.to_string())
            .env("EDGEMESH_DISCOVERY_PORT", discovery_port.to_string())
            .env("EDGEMESH_ADVERTISE_HOST", "127.0.0.1")
            .env("EDGEMESH_TASKS_DIR", tasks_dir.to_str().unwrap())
            .env("EDGEMESH_RESULTS_DIR", results_dir.to_str().unwrap())
            .spawn()
            .unwrap(),
    );
    wait_until_listening(coordinator_port);

    let _peer = NodeProcess(
        edgemesh()
            .arg("--quiet")
            .arg("peer")
            .arg("--coordinator")
            .arg(format!("127.0.0.1:{}", coordinator_port))
            .env("EDGEMESH_NODE_ID", "peer-e2e")
            .env("EDGEMESH_PEER_HOST", "127.0.0.1")
            .env("EDGEMESH_PEER_PORT", peer_port.to_string())
            .env("EDGEMESH_SHARED_DIR", shared_dir.to_str().unwrap())
            .env("EDGEMESH_WORK_DIR", work_dir.to_str().unwrap())
            .env("EDGEMESH_POLL_INTERVAL_SECS", "1")
            .env("EDGEMESH_HEARTBEAT_INTERVAL_SECS", "1")
            .spawn()
            .unwrap(),
    );

    // The peer polls every second; allow generous slack for startup
    let result_path = results_dir.join("results_job1.zip");
    let deadline = Instant::now() + Duration::from_secs(30);
    while Instant::now() < deadline && !result_path.exists() {
        std::thread::sleep(Duration::from_millis(200));
    }
    assert!(result_path.exists(), "result archive never arrived");

    // Single delivery: the queue entry is gone
    assert!(!tasks_dir.join("job1.zip").exists());

    let archive = std::fs::read(&result_path).unwrap();
    assert_eq!(read_archive_entry(&archive, "stdout.txt"), "task output\n");
    assert_eq!(read_archive_entry(&archive, "exit_code.txt"), "0");
}

// ─────────────────────────────────────────────────────────────────
// Fetch Through a Live Peer
// ─────────────────────────────────────────────────────────────────

#[test]
fn test_fetch_downloads_from_registered_peer() {
    let dir = TempDir::new().unwrap();
    let tasks_dir = dir.path().join("tasks");
    let results_dir = dir.path().join("results");
    let shared_dir = dir.path().join("shared");
    let work_dir = dir.path().join("work");
    std::fs::create_dir_all(&shared_dir).unwrap();
    std::fs::write(shared_dir.join("dataset.csv"), b"a,b\n1,2\n").unwrap();

    let coordinator_port = free_port();
    let discovery_port = free_udp_port();
    let peer_port = free_port();

    let _coordinator = NodeProcess(
        edgemesh()
            .arg("--quiet")
            .arg("coordinator")
            .env("EDGEMESH_COORDINATOR_PORT", coordinator_port.to_string())
            .env("EDGEMESH_DISCOVERY_PORT", discovery_port.to_string())
            .env("EDGEMESH_ADVERTISE_HOST", "127.0.0.1")
            .env("EDGEMESH_TASKS_DIR", tasks_dir.to_str().unwrap())
            .env("EDGEMESH_RESULTS_DIR", results_dir.to_str().unwrap())
            .spawn()
            .unwrap(),
    );
    wait_until_listening(coordinator_port);

    let _peer = NodeProcess(
        edgemesh()
            .arg("--quiet")
            .arg("peer")
            .arg("--coordinator")
            .arg(format!("127.0.0.1:{}", coordinator_port))
            .env("EDGEMESH_NODE_ID", "peer-files")
            .env("EDGEMESH_PEER_HOST", "127.0.0.1")
            .env("EDGEMESH_PEER_PORT", peer_port.to_string())
            .env("EDGEMESH_SHARED_DIR", shared_dir.to_str().unwrap())
            .env("EDGEMESH_WORK_DIR", work_dir.to_str().unwrap())
            .spawn()
            .unwrap(),
    );
    wait_until_listening(peer_port);
    // Registration happens right after the file server binds; give it a
    // moment before querying the index
    std::thread::sleep(Duration::from_millis(500));

    let output_path = dir.path().join("fetched.csv");
    let status = edgemesh()
        .arg("--quiet")
        .arg("fetch")
        .arg("dataset.csv")
        .arg("--output")
        .arg(output_path.to_str().unwrap())
        .arg("--coordinator")
        .arg(format!("127.0.0.1:{}", coordinator_port))
        .status()
        .unwrap();

    assert!(status.success());
    assert_eq!(std::fs::read(&output_path).unwrap(), b"a,b\n1,2\n");
}
