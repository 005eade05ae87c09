//! edgemesh - Local-network task distribution and file index
//!
//! Entry point for the edgemesh binary. One executable runs either role:
//! the coordinator that hands out task archives and indexes peer files,
//! or a peer agent that executes tasks and serves its shared directory.
//! The one-shot subcommands (find, fetch, list-files) talk to a running
//! coordinator and exit.

mod cli;
mod client;
mod config;
mod coordinator;
mod error;
mod files;
mod logging;
mod peer;
mod protocol;
mod version;

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::info;

use crate::cli::{Cli, Commands, ConfigSubcommand};
use crate::config::NodeConfig;
use crate::error::{Error, Result};
use crate::logging::LogGuards;

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprint!("{}", e.format_for_terminal());
        std::process::exit(e.exit_code());
    }
}

fn run(cli: Cli) -> Result<()> {
    // Commands that don't need full logging
    match &cli.command {
        Commands::Version => {
            version::print_version();
            return Ok(());
        }
        Commands::Config { subcommand } => {
            logging::init_simple(tracing::Level::WARN)?;
            return handle_config_command(subcommand.clone());
        }
        _ => {}
    }

    let config_path = match &cli.command {
        Commands::Coordinator { config }
        | Commands::Peer { config, .. }
        | Commands::Find { config, .. }
        | Commands::Fetch { config, .. }
        | Commands::ListFiles { config, .. } => config.clone(),
        _ => None,
    };
    let config = NodeConfig::load(config_path.as_deref())?;

    // The guards must be kept alive for the lifetime of the program
    let _log_guards: LogGuards = logging::init_logging(&config.logging, cli.verbose, cli.quiet)?;

    let build = version::build_info();
    info!(
        version = %build.full_version(),
        target = %build.target,
        profile = %build.profile,
        "Starting edgemesh"
    );

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .thread_name("edgemesh")
        .build()
        .map_err(|e| Error::Internal(format!("Failed to create async runtime: {}", e)))?;

    match cli.command {
        Commands::Coordinator { .. } => runtime.block_on(coordinator::run(&config)),

        Commands::Peer { coordinator, .. } => runtime.block_on(async {
            let agent = peer::PeerAgent::new(&config, coordinator).await?;
            agent.run(&config).await
        }),

        Commands::Find {
            filename,
            coordinator,
            ..
        } => runtime.block_on(async {
            let addr = resolve_coordinator(&config, coordinator).await?;
            let peers = client::find_file(&addr, &filename).await?;
            println!("Peers holding '{}':", filename);
            for peer in peers {
                println!("  {} at {}:{}", peer.peer_id, peer.host, peer.port);
            }
            Ok(())
        }),

        Commands::Fetch {
            filename,
            output,
            coordinator,
            ..
        } => runtime.block_on(async {
            let addr = resolve_coordinator(&config, coordinator).await?;
            let output = PathBuf::from(output.unwrap_or_else(|| filename.clone()));
            let bytes = client::fetch_file(&addr, &filename, &output).await?;
            println!("Saved '{}' to {} ({} bytes)", filename, output.display(), bytes);
            Ok(())
        }),

        Commands::ListFiles {
            peer_id,
            coordinator,
            ..
        } => runtime.block_on(async {
            let addr = resolve_coordinator(&config, coordinator).await?;
            let files = client::list_files(&addr, &peer_id).await?;
            println!("Files advertised by '{}':", peer_id);
            for file in files {
                println!("  {}  {}", file.checksum, file.name);
            }
            Ok(())
        }),

        Commands::Version | Commands::Config { .. } => unreachable!(),
    }
}

/// Resolve the coordinator address for a one-shot client command:
/// explicit flag, configured address, then UDP discovery
async fn resolve_coordinator(config: &NodeConfig, flag: Option<String>) -> Result<String> {
    if let Some(addr) = flag {
        return Ok(addr);
    }
    if !config.peer.coordinator_addr.is_empty() {
        return Ok(config.peer.coordinator_addr.clone());
    }

    peer::discover(
        &config.peer_id(),
        config.peer.port,
        config.coordinator.discovery_port,
        Duration::from_secs(config.peer.discovery_timeout_secs),
    )
    .await
}

/// Handle configuration subcommands
fn handle_config_command(subcommand: ConfigSubcommand) -> Result<()> {
    match subcommand {
        ConfigSubcommand::Show { config } => {
            let cfg = NodeConfig::load(config.as_deref())?;
            println!("{}", toml::to_string_pretty(&cfg)?);
        }
        ConfigSubcommand::Init { path, force } => {
            config::init_config(path.as_deref(), force)?;
        }
        ConfigSubcommand::Validate { config } => {
            let path = config.as_deref();
            match NodeConfig::load(path) {
                Ok(_) => {
                    println!("Configuration is valid.");
                }
                Err(e) => {
                    eprint!("{}", e.format_for_terminal());
                    std::process::exit(e.exit_code());
                }
            }
        }
    }

    Ok(())
}
