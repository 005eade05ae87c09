//! CLI argument parsing using clap v4
//!
//! Defines the command-line interface for the edgemesh node.

use clap::{Parser, Subcommand};

/// edgemesh - Local-network task distribution and file index
///
/// Runs either side of a small worker mesh: the coordinator that hands out
/// task archives and indexes peer files, or a peer agent that discovers the
/// coordinator, executes tasks, and serves its shared files.
#[derive(Parser, Debug)]
#[command(name = "edgemesh")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase logging verbosity (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the coordinator (registry, task queue, file index)
    Coordinator {
        /// Path to configuration file
        #[arg(short, long, env = "EDGEMESH_CONFIG")]
        config: Option<String>,
    },

    /// Run a peer agent (discover coordinator, execute tasks, serve files)
    Peer {
        /// Path to configuration file
        #[arg(short, long, env = "EDGEMESH_CONFIG")]
        config: Option<String>,

        /// Coordinator address (host:port), skips UDP discovery
        #[arg(long)]
        coordinator: Option<String>,
    },

    /// Ask the coordinator which peers hold a file
    Find {
        /// File name to look up
        filename: String,

        /// Path to configuration file
        #[arg(short, long, env = "EDGEMESH_CONFIG")]
        config: Option<String>,

        /// Coordinator address (host:port), skips UDP discovery
        #[arg(long)]
        coordinator: Option<String>,
    },

    /// Locate a file and download it from the owning peer
    Fetch {
        /// File name to download
        filename: String,

        /// Where to write the downloaded file (defaults to the file name)
        #[arg(short, long)]
        output: Option<String>,

        /// Path to configuration file
        #[arg(short, long, env = "EDGEMESH_CONFIG")]
        config: Option<String>,

        /// Coordinator address (host:port), skips UDP discovery
        #[arg(long)]
        coordinator: Option<String>,
    },

    /// List the files a registered peer advertises
    ListFiles {
        /// Registry id of the target peer
        peer_id: String,

        /// Path to configuration file
        #[arg(short, long, env = "EDGEMESH_CONFIG")]
        config: Option<String>,

        /// Coordinator address (host:port), skips UDP discovery
        #[arg(long)]
        coordinator: Option<String>,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },

    /// Display version and build information
    Version,
}

/// Configuration subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum ConfigSubcommand {
    /// Display the current configuration
    Show {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<String>,
    },

    /// Initialize a new configuration file
    Init {
        /// Path where to create the config file
        #[arg(short, long)]
        path: Option<String>,

        /// Overwrite existing configuration
        #[arg(short, long)]
        force: bool,
    },

    /// Validate a configuration file
    Validate {
        /// Path to configuration file to validate
        #[arg(short, long)]
        config: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn verify_cli() {
        // Verifies that the CLI definition is valid
        Cli::command().debug_assert();
    }

    #[test]
    fn test_coordinator_command() {
        let cli = Cli::parse_from(["edgemesh", "coordinator"]);
        match cli.command {
            Commands::Coordinator { config } => assert!(config.is_none()),
            _ => panic!("Expected Coordinator command"),
        }
    }

    #[test]
    fn test_peer_with_config() {
        let cli = Cli::parse_from(["edgemesh", "peer", "--config", "/path/to/edgemesh.toml"]);
        match cli.command {
            Commands::Peer { config, coordinator } => {
                assert_eq!(config, Some("/path/to/edgemesh.toml".to_string()));
                assert!(coordinator.is_none());
            }
            _ => panic!("Expected Peer command"),
        }
    }

    #[test]
    fn test_peer_with_coordinator_override() {
        let cli = Cli::parse_from(["edgemesh", "peer", "--coordinator", "10.0.0.5:8000"]);
        match cli.command {
            Commands::Peer { coordinator, .. } => {
                assert_eq!(coordinator, Some("10.0.0.5:8000".to_string()));
            }
            _ => panic!("Expected Peer command"),
        }
    }

    #[test]
    fn test_find_command() {
        let cli = Cli::parse_from(["edgemesh", "find", "dataset.csv"]);
        match cli.command {
            Commands::Find { filename, .. } => assert_eq!(filename, "dataset.csv"),
            _ => panic!("Expected Find command"),
        }
    }

    #[test]
    fn test_fetch_with_output() {
        let cli = Cli::parse_from(["edgemesh", "fetch", "dataset.csv", "--output", "/tmp/d.csv"]);
        match cli.command {
            Commands::Fetch { filename, output, .. } => {
                assert_eq!(filename, "dataset.csv");
                assert_eq!(output, Some("/tmp/d.csv".to_string()));
            }
            _ => panic!("Expected Fetch command"),
        }
    }

    #[test]
    fn test_list_files_command() {
        let cli = Cli::parse_from(["edgemesh", "list-files", "peer-1"]);
        match cli.command {
            Commands::ListFiles { peer_id, .. } => assert_eq!(peer_id, "peer-1"),
            _ => panic!("Expected ListFiles command"),
        }
    }

    #[test]
    fn test_verbose_flags() {
        let cli = Cli::parse_from(["edgemesh", "-vv", "version"]);
        assert_eq!(cli.verbose, 2);
        assert!(!cli.quiet);
    }

    #[test]
    fn test_quiet_flag() {
        let cli = Cli::parse_from(["edgemesh", "--quiet", "version"]);
        assert!(cli.quiet);
    }

    #[test]
    fn test_config_show() {
        let cli = Cli::parse_from(["edgemesh", "config", "show"]);
        match cli.command {
            Commands::Config { subcommand: ConfigSubcommand::Show { config } } => {
                assert!(config.is_none());
            }
            _ => panic!("Expected Config Show command"),
        }
    }

    #[test]
    fn test_config_init() {
        let cli = Cli::parse_from(["edgemesh", "config", "init", "--force"]);
        match cli.command {
            Commands::Config { subcommand: ConfigSubcommand::Init { path, force } } => {
                assert!(path.is_none());
                assert!(force);
            }
            _ => panic!("Expected Config Init command"),
        }
    }
}
