// src/bin/main.rs

use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use localnet::config::{default_home, default_log_dir, default_pid_file};
use localnet::topology::{DEFAULT_NETWORK_PORT, DEFAULT_RPC_PORT};
use localnet::{
    launch, Immediate, LaunchConfig, LaunchReport, NetworkTopology, NodeBinary, PortPlan, Result,
    TcpProbe,
};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Spawns a local multi-node network from a node binary
#[derive(Debug, Parser)]
#[clap(name = "localnet")]
struct Cli {
    /// Node binary, or a directory containing `neard` (e.g. target/release)
    #[clap(long)]
    binary_path: PathBuf,
    /// Home path for configs, keys and chain data, defaults to ~/.near/localnet
    #[clap(long)]
    home: Option<PathBuf>,
    #[clap(long, default_value_t = 4)]
    num_nodes: usize,
    #[clap(long, default_value_t = 1)]
    num_shards: usize,
    /// Remove previous node data if it exists
    #[clap(long, action)]
    overwrite: bool,
    /// Show node debug output, optionally for a single target
    #[clap(long, num_args = 0..=1, default_missing_value = "")]
    verbose: Option<String>,
    /// First rpc port, node i listens on rpc_port + i
    #[clap(long, default_value_t = DEFAULT_RPC_PORT)]
    rpc_port: u16,
    /// First network port, node i listens on network_port + i
    #[clap(long, default_value_t = DEFAULT_NETWORK_PORT)]
    network_port: u16,
    /// Node log directory, defaults to ~/.nearup/localnet-logs
    #[clap(long)]
    log_dir: Option<PathBuf>,
    /// Process registry file, defaults to ~/.nearup/node.pid
    #[clap(long)]
    pid_file: Option<PathBuf>,
    /// Wait up to SECS for node0's rpc port before spawning its peers
    #[clap(long, value_name = "SECS")]
    wait_for_boot_node: Option<u64>,
    /// Turns on debug logging for the launcher itself
    #[clap(long, action)]
    debug: bool,
}

impl Cli {
    fn launch_config(&self) -> Result<LaunchConfig> {
        let home = self.home.clone().unwrap_or_else(default_home);
        let topology = NetworkTopology::new(self.num_nodes, self.num_shards, home)?;

        let mut config = LaunchConfig::new(topology);
        config.ports = PortPlan::new(self.rpc_port, self.network_port);
        config.overwrite = self.overwrite;
        config.verbose = self.verbose.clone();
        config.log_dir = self.log_dir.clone().unwrap_or_else(default_log_dir);
        config.pid_file = self.pid_file.clone().unwrap_or_else(default_pid_file);
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "localnet=debug" } else { "localnet=info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .compact()
        .init();

    match run(&cli).await {
        Ok(report) => {
            print_summary(&report);
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: &Cli) -> Result<LaunchReport> {
    let binary = NodeBinary::locate(&cli.binary_path)?;
    let config = cli.launch_config()?;
    info!(binary = %binary.path().display(), nodes = config.topology.node_count(), "launching local network");

    match cli.wait_for_boot_node {
        Some(secs) => launch(&config, &binary, &TcpProbe::new(Duration::from_secs(secs))).await,
        None => launch(&config, &binary, &Immediate).await,
    }
}

fn print_summary(report: &LaunchReport) {
    println!("Local network was spawned successfully.");
    for (handle, addresses) in report.handles.iter().zip(&report.addresses) {
        println!(
            "  node{} pid {} rpc {} network {}",
            handle.node_index(),
            handle.pid(),
            addresses.rpc,
            addresses.network
        );
    }
    println!("Check logs at: {}", report.log_dir.display());
    println!("Process registry: {}", report.pid_file.display());
    if let Some(rpc) = report.addresses.first() {
        let port = rpc.rpc.rsplit(':').next().unwrap_or_default();
        println!("Check network status at http://127.0.0.1:{port}/status");
    }
}
