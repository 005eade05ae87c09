//! Configuration system for edgemesh
//!
//! Supports multiple configuration sources with the following precedence
//! (highest to lowest):
//! 1. CLI arguments
//! 2. Environment variables (EDGEMESH_* prefix)
//! 3. Configuration file (TOML)
//! 4. Default values

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Main node configuration, shared by every role
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeConfig {
    /// Node identity
    pub node: NodeSettings,

    /// Coordinator-role settings
    pub coordinator: CoordinatorSettings,

    /// Peer-role settings
    pub peer: PeerSettings,

    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Node identity settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct NodeSettings {
    /// Unique peer identifier (hostname-derived if not set)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    /// Human-readable node name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Coordinator-role settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoordinatorSettings {
    /// TCP port for registration and message exchange
    pub port: u16,

    /// UDP port for service discovery
    pub discovery_port: u16,

    /// Address advertised in MASTER_ANNOUNCE (empty = autodetect)
    pub advertise_host: String,

    /// Directory holding pending task archives
    pub tasks_dir: String,

    /// Directory where result archives are persisted
    pub results_dir: String,
}

/// Peer-role settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PeerSettings {
    /// Coordinator address ("host:port"); empty = discover via UDP broadcast
    pub coordinator_addr: String,

    /// Host advertised to the coordinator for direct file transfers
    pub host: String,

    /// TCP port of the peer's file-serving endpoint
    pub port: u16,

    /// Directory of files advertised to the network
    pub shared_dir: String,

    /// Scratch directory for task working areas
    pub work_dir: String,

    /// Fixed-name entry point expected inside every task archive
    pub entry_point: String,

    /// Seconds between heartbeats
    pub heartbeat_interval_secs: u64,

    /// Seconds between REQUEST_TASK polls (unconditional, not adaptive)
    pub poll_interval_secs: u64,

    /// Deadline for one task execution
    pub task_timeout_secs: u64,

    /// Bounded wait for a MASTER_ANNOUNCE before re-broadcasting
    pub discovery_timeout_secs: u64,
}

/// Logging settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level: trace, debug, info, warn, error
    pub level: String,

    /// Log file path (empty = no file logging)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,

    /// Number of rotated log files to keep
    pub max_files: u32,

    /// Enable JSON formatted logging
    pub json_format: bool,
}

// Default implementations

impl Default for NodeConfig {
    fn default() -> Self {
        Self {
            node: NodeSettings::default(),
            coordinator: CoordinatorSettings::default(),
            peer: PeerSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            port: 8000,
            discovery_port: 50000,
            advertise_host: String::new(),
            tasks_dir: "~/.edgemesh/tasks".to_string(),
            results_dir: "~/.edgemesh/results".to_string(),
        }
    }
}

impl Default for PeerSettings {
    fn default() -> Self {
        Self {
            coordinator_addr: String::new(),
            host: "127.0.0.1".to_string(),
            port: 9001,
            shared_dir: "~/.edgemesh/shared".to_string(),
            work_dir: "~/.edgemesh/work".to_string(),
            entry_point: "run.sh".to_string(),
            heartbeat_interval_secs: 10,
            poll_interval_secs: 5,
            task_timeout_secs: 300,
            discovery_timeout_secs: 5,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file: None,
            max_files: 5,
            json_format: false,
        }
    }
}

impl NodeConfig {
    /// Load configuration from file with environment variable overrides
    pub fn load(config_path: Option<&str>) -> Result<Self> {
        let mut config = Self::default();

        // 1. Load from config file if it exists
        let config_file = Self::find_config_file(config_path)?;
        if let Some(path) = config_file {
            debug!(path = %path.display(), "Loading configuration file");
            let content = fs::read_to_string(&path)
                .map_err(|e| Error::Config(format!("Failed to read config file: {}", e)))?;
            config = toml::from_str(&content)
                .map_err(|e| Error::Config(format!("Failed to parse config file: {}", e)))?;
            info!(path = %path.display(), "Configuration loaded from file");
        }

        // 2. Apply environment variable overrides
        config.apply_env_overrides();

        // 3. Expand paths
        config.expand_paths();

        // 4. Validate
        config.validate()?;

        Ok(config)
    }

    /// Find the configuration file to use
    fn find_config_file(explicit_path: Option<&str>) -> Result<Option<PathBuf>> {
        // If explicit path provided, use it (error if not found)
        if let Some(path) = explicit_path {
            let expanded = shellexpand::tilde(path);
            let path = PathBuf::from(expanded.as_ref());
            if path.exists() {
                return Ok(Some(path));
            } else {
                return Err(Error::Config(format!(
                    "Configuration file not found: {}",
                    path.display()
                )));
            }
        }

        // Search in standard locations
        let search_paths = [
            // Current directory
            PathBuf::from("edgemesh.toml"),
            // User config directory
            dirs::config_dir()
                .map(|p| p.join("edgemesh").join("edgemesh.toml"))
                .unwrap_or_default(),
            // Home directory
            dirs::home_dir()
                .map(|p| p.join(".edgemesh").join("edgemesh.toml"))
                .unwrap_or_default(),
            // System config (Linux)
            PathBuf::from("/etc/edgemesh/edgemesh.toml"),
        ];

        for path in &search_paths {
            if path.exists() {
                debug!(path = %path.display(), "Found configuration file");
                return Ok(Some(path.clone()));
            }
        }

        debug!("No configuration file found, using defaults");
        Ok(None)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        // Node settings
        if let Ok(val) = std::env::var("EDGEMESH_NODE_ID") {
            self.node.id = Some(val);
        }
        if let Ok(val) = std::env::var("EDGEMESH_NODE_NAME") {
            self.node.name = Some(val);
        }

        // Coordinator settings
        if let Ok(val) = std::env::var("EDGEMESH_COORDINATOR_PORT") {
            if let Ok(n) = val.parse() {
                self.coordinator.port = n;
            }
        }
        if let Ok(val) = std::env::var("EDGEMESH_DISCOVERY_PORT") {
            if let Ok(n) = val.parse() {
                self.coordinator.discovery_port = n;
            }
        }
        if let Ok(val) = std::env::var("EDGEMESH_ADVERTISE_HOST") {
            self.coordinator.advertise_host = val;
        }
        if let Ok(val) = std::env::var("EDGEMESH_TASKS_DIR") {
            self.coordinator.tasks_dir = val;
        }
        if let Ok(val) = std::env::var("EDGEMESH_RESULTS_DIR") {
            self.coordinator.results_dir = val;
        }

        // Peer settings
        if let Ok(val) = std::env::var("EDGEMESH_COORDINATOR_ADDR") {
            self.peer.coordinator_addr = val;
        }
        if let Ok(val) = std::env::var("EDGEMESH_PEER_HOST") {
            self.peer.host = val;
        }
        if let Ok(val) = std::env::var("EDGEMESH_PEER_PORT") {
            if let Ok(n) = val.parse() {
                self.peer.port = n;
            }
        }
        if let Ok(val) = std::env::var("EDGEMESH_SHARED_DIR") {
            self.peer.shared_dir = val;
        }
        if let Ok(val) = std::env::var("EDGEMESH_WORK_DIR") {
            self.peer.work_dir = val;
        }
        if let Ok(val) = std::env::var("EDGEMESH_ENTRY_POINT") {
            self.peer.entry_point = val;
        }
        if let Ok(val) = std::env::var("EDGEMESH_HEARTBEAT_INTERVAL_SECS") {
            if let Ok(n) = val.parse() {
                self.peer.heartbeat_interval_secs = n;
            }
        }
        if let Ok(val) = std::env::var("EDGEMESH_POLL_INTERVAL_SECS") {
            if let Ok(n) = val.parse() {
                self.peer.poll_interval_secs = n;
            }
        }
        if let Ok(val) = std::env::var("EDGEMESH_TASK_TIMEOUT_SECS") {
            if let Ok(n) = val.parse() {
                self.peer.task_timeout_secs = n;
            }
        }

        // Logging settings
        if let Ok(val) = std::env::var("EDGEMESH_LOG_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("EDGEMESH_LOG_FILE") {
            self.logging.file = Some(val);
        }
        if let Ok(val) = std::env::var("EDGEMESH_LOG_JSON") {
            self.logging.json_format = val.to_lowercase() == "true" || val == "1";
        }
    }

    /// Expand ~ and other path variables
    fn expand_paths(&mut self) {
        self.coordinator.tasks_dir = expand_path(&self.coordinator.tasks_dir);
        self.coordinator.results_dir = expand_path(&self.coordinator.results_dir);
        self.peer.shared_dir = expand_path(&self.peer.shared_dir);
        self.peer.work_dir = expand_path(&self.peer.work_dir);

        if let Some(ref file) = self.logging.file {
            self.logging.file = Some(expand_path(file));
        }
    }

    /// Validate the configuration
    fn validate(&self) -> Result<()> {
        if self.coordinator.port == self.coordinator.discovery_port {
            return Err(Error::Config(
                "coordinator port and discovery_port must differ".to_string(),
            ));
        }

        if !self.peer.coordinator_addr.is_empty()
            && self.peer.coordinator_addr.parse::<std::net::SocketAddr>().is_err()
        {
            return Err(Error::Config(format!(
                "peer.coordinator_addr must be host:port, got '{}'",
                self.peer.coordinator_addr
            )));
        }

        if self.peer.entry_point.is_empty() {
            return Err(Error::Config("peer.entry_point cannot be empty".to_string()));
        }

        if self.peer.heartbeat_interval_secs == 0 || self.peer.poll_interval_secs == 0 {
            return Err(Error::Config(
                "heartbeat and poll intervals must be at least 1 second".to_string(),
            ));
        }

        // Validate log level
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.to_lowercase().as_str()) {
            return Err(Error::Config(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    /// Resolve the node's peer id (explicit, else hostname, else random)
    pub fn peer_id(&self) -> String {
        if let Some(ref id) = self.node.id {
            return id.clone();
        }
        hostname::get()
            .ok()
            .and_then(|h| h.into_string().ok())
            .unwrap_or_else(|| format!("peer-{}", &uuid::Uuid::new_v4().to_string()[..8]))
    }

    /// Get the tasks directory as a PathBuf
    pub fn tasks_dir(&self) -> PathBuf {
        PathBuf::from(&self.coordinator.tasks_dir)
    }

    /// Get the results directory as a PathBuf
    pub fn results_dir(&self) -> PathBuf {
        PathBuf::from(&self.coordinator.results_dir)
    }

    /// Get the shared-files directory as a PathBuf
    pub fn shared_dir(&self) -> PathBuf {
        PathBuf::from(&self.peer.shared_dir)
    }

    /// Get the task scratch directory as a PathBuf
    pub fn work_dir(&self) -> PathBuf {
        PathBuf::from(&self.peer.work_dir)
    }
}

/// Expand ~ and environment variables in paths
fn expand_path(path: &str) -> String {
    shellexpand::full(path)
        .unwrap_or_else(|_| std::borrow::Cow::Borrowed(path))
        .into_owned()
}

/// Ensure a directory exists, creating it if necessary
pub fn ensure_dir(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path).map_err(|e| Error::IoWrite {
            path: path.to_path_buf(),
            source: e,
        })?;
        info!(path = %path.display(), "Created directory");
    }
    Ok(())
}

/// Initialize a new configuration file
pub fn init_config(path: Option<&str>, force: bool) -> Result<()> {
    let config_path = path
        .map(|p| PathBuf::from(expand_path(p)))
        .unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".edgemesh")
                .join("edgemesh.toml")
        });

    // Check if file exists
    if config_path.exists() && !force {
        return Err(Error::Config(format!(
            "Configuration file already exists: {}. Use --force to overwrite.",
            config_path.display()
        )));
    }

    // Create parent directories
    if let Some(parent) = config_path.parent() {
        fs::create_dir_all(parent)
            .map_err(|e| Error::Config(format!("Failed to create config directory: {}", e)))?;
    }

    // Generate default config with comments
    let config_content = generate_default_config();

    // Write the file
    fs::write(&config_path, config_content)
        .map_err(|e| Error::Config(format!("Failed to write config file: {}", e)))?;

    println!("Configuration file created: {}", config_path.display());
    Ok(())
}

/// Generate default configuration content with comments
fn generate_default_config() -> String {
    r#"# Edgemesh Configuration
# https://github.com/edgemesh/edgemesh

[node]
# Unique peer identifier (hostname-derived if not set)
# id = "peer-1"

# Human-readable node name
# name = "Living-room box"

[coordinator]
# TCP port for registration and message exchange
port = 8000

# UDP port for service discovery broadcasts
discovery_port = 50000

# Address advertised in MASTER_ANNOUNCE (empty = autodetect)
advertise_host = ""

# Directory holding pending task archives
tasks_dir = "~/.edgemesh/tasks"

# Directory where result archives are persisted
results_dir = "~/.edgemesh/results"

[peer]
# Coordinator address host:port (empty = discover via UDP broadcast)
coordinator_addr = ""

# Host advertised to the coordinator for direct file transfers
host = "127.0.0.1"

# TCP port of this peer's file-serving endpoint
port = 9001

# Directory of files advertised to the network
shared_dir = "~/.edgemesh/shared"

# Scratch directory for task working areas
work_dir = "~/.edgemesh/work"

# Entry point expected inside every task archive
entry_point = "run.sh"

# Seconds between heartbeats
heartbeat_interval_secs = 10

# Seconds between task polls
poll_interval_secs = 5

# Deadline for one task execution
task_timeout_secs = 300

# Bounded wait for a MASTER_ANNOUNCE before re-broadcasting
discovery_timeout_secs = 5

[logging]
# Log level: trace, debug, info, warn, error
level = "info"

# Log file path (comment out to disable file logging)
# file = "~/.edgemesh/logs/edgemesh.log"

# Number of rotated log files to keep
max_files = 5

# Enable JSON formatted logging
json_format = false
"#
    .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_default_config() {
        let config = NodeConfig::default();
        assert_eq!(config.coordinator.port, 8000);
        assert_eq!(config.coordinator.discovery_port, 50000);
        assert_eq!(config.peer.port, 9001);
        assert_eq!(config.peer.heartbeat_interval_secs, 10);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_env_override() {
        env::set_var("EDGEMESH_COORDINATOR_PORT", "8100");
        env::set_var("EDGEMESH_PEER_PORT", "9100");
        env::set_var("EDGEMESH_LOG_LEVEL", "debug");

        let mut config = NodeConfig::default();
        config.apply_env_overrides();

        assert_eq!(config.coordinator.port, 8100);
        assert_eq!(config.peer.port, 9100);
        assert_eq!(config.logging.level, "debug");

        env::remove_var("EDGEMESH_COORDINATOR_PORT");
        env::remove_var("EDGEMESH_PEER_PORT");
        env::remove_var("EDGEMESH_LOG_LEVEL");
    }

    #[test]
    fn test_validation_port_clash() {
        let mut config = NodeConfig::default();
        config.coordinator.discovery_port = config.coordinator.port;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_bad_coordinator_addr() {
        let mut config = NodeConfig::default();
        config.peer.coordinator_addr = "not-an-addr".to_string();
        assert!(config.validate().is_err());

        config.peer.coordinator_addr = "127.0.0.1:8000".to_string();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_invalid_log_level() {
        let mut config = NodeConfig::default();
        config.logging.level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_zero_interval() {
        let mut config = NodeConfig::default();
        config.peer.poll_interval_secs = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_path_expansion() {
        let mut config = NodeConfig::default();
        config.peer.shared_dir = "~/test/shared".to_string();
        config.expand_paths();

        assert!(!config.peer.shared_dir.contains('~'));
    }

    #[test]
    fn test_serialize_deserialize() {
        let config = NodeConfig::default();
        let toml_str = toml::to_string(&config).unwrap();
        let parsed: NodeConfig = toml::from_str(&toml_str).unwrap();

        assert_eq!(config.coordinator.port, parsed.coordinator.port);
        assert_eq!(config.peer.entry_point, parsed.peer.entry_point);
    }

    #[test]
    fn test_parse_config_file() {
        let config_str = r#"
[node]
id = "peer-7"

[coordinator]
port = 8200
discovery_port = 51000

[peer]
host = "192.168.1.20"
port = 9002
heartbeat_interval_secs = 3

[logging]
level = "debug"
"#;

        let config: NodeConfig = toml::from_str(config_str).unwrap();

        assert_eq!(config.node.id, Some("peer-7".to_string()));
        assert_eq!(config.coordinator.port, 8200);
        assert_eq!(config.coordinator.discovery_port, 51000);
        assert_eq!(config.peer.host, "192.168.1.20");
        assert_eq!(config.peer.heartbeat_interval_secs, 3);
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_peer_id_explicit() {
        let mut config = NodeConfig::default();
        config.node.id = Some("peer-x".to_string());
        assert_eq!(config.peer_id(), "peer-x");
    }

    #[test]
    fn test_generated_template_parses() {
        let parsed: NodeConfig = toml::from_str(&generate_default_config()).unwrap();
        assert_eq!(parsed.coordinator.port, 8000);
    }
}
