//! Launch-wide settings, threaded explicitly through every phase.

use std::path::PathBuf;

use crate::error::Result;
use crate::topology::{NetworkTopology, PortPlan};

/// Host peers use to reach the boot node.
pub const BOOT_HOST: &str = "127.0.0.1";

/// Everything one launch needs besides the node binary itself.
#[derive(Clone, Debug)]
pub struct LaunchConfig {
    pub topology: NetworkTopology,
    pub ports: PortPlan,
    /// Remove an existing home tree before initializing.
    pub overwrite: bool,
    /// Forwarded to each node as `--verbose <target>`. An empty target
    /// enables debug output for every target.
    pub verbose: Option<String>,
    pub boot_host: String,
    /// Recreated on every launch, one `node{i}.log` per node.
    pub log_dir: PathBuf,
    /// Process registry read by external status/stop tooling.
    pub pid_file: PathBuf,
}

impl LaunchConfig {
    /// Defaults matching the standalone launcher: ports 3030/24567, logs and
    /// registry under `~/.nearup`.
    pub fn new(topology: NetworkTopology) -> Self {
        Self {
            topology,
            ports: PortPlan::default(),
            overwrite: false,
            verbose: None,
            boot_host: BOOT_HOST.to_string(),
            log_dir: default_log_dir(),
            pid_file: default_pid_file(),
        }
    }

    pub fn log_path(&self, index: usize) -> PathBuf {
        self.log_dir.join(format!("node{index}.log"))
    }

    pub fn validate(&self) -> Result<()> {
        self.ports.check(self.topology.node_count())
    }
}

/// Best-effort home directory lookup, falling back to the working directory.
pub fn user_home() -> PathBuf {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("."))
}

pub fn default_home() -> PathBuf {
    user_home().join(".near").join("localnet")
}

pub fn default_log_dir() -> PathBuf {
    user_home().join(".nearup").join("localnet-logs")
}

pub fn default_pid_file() -> PathBuf {
    user_home().join(".nearup").join("node.pid")
}
