use std::io::ErrorKind;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::{Path, PathBuf};

use tracing::info;

use crate::bootstrap::{resolve_public_key, BootDescriptor};
use crate::config::LaunchConfig;
use crate::error::{LocalnetError, Result};
use crate::launcher::NodeLauncher;
use crate::provision::{assign_addresses, NodeAddresses};
use crate::registry::{PidRegistry, ProcessRecord};
use crate::supervisor::{ProcessHandle, ProcessSupervisor, ReadinessProbe};
use crate::workspace::{Prepared, WorkspaceManager};
use crate::NETWORK_LABEL;

/// Outcome of a successful launch.
#[derive(Debug)]
pub struct LaunchReport {
    pub prepared: Prepared,
    pub addresses: Vec<NodeAddresses>,
    pub boot: BootDescriptor,
    /// One per node, in spawn order.
    pub handles: Vec<ProcessHandle>,
    pub log_dir: PathBuf,
    pub pid_file: PathBuf,
}

impl LaunchReport {
    pub fn pids(&self) -> Vec<u32> {
        self.handles.iter().map(ProcessHandle::pid).collect()
    }
}

/// Provisions the workspace and spawns every node.
///
/// All file edits complete before the first spawn, so any configuration or
/// identity failure leaves no process running. After that, a failure stops
/// the loop; nodes already started keep running and stay in the registry.
pub async fn launch<L, P>(config: &LaunchConfig, launcher: &L, probe: &P) -> Result<LaunchReport>
where
    L: NodeLauncher,
    P: ReadinessProbe,
{
    config.validate()?;
    let topology = &config.topology;

    let prepared = WorkspaceManager::new(launcher)
        .prepare(topology, config.overwrite)
        .await?;
    let addresses = assign_addresses(topology, &config.ports).await?;

    let identity = resolve_public_key(topology).await?;
    let boot = BootDescriptor::new(
        identity.public_key,
        config.boot_host.clone(),
        config.ports.network_port(0)?,
    );

    reset_log_dir(&config.log_dir).await?;

    let supervisor = ProcessSupervisor::new(launcher, config.verbose.clone());
    let mut registry = PidRegistry::create(&config.pid_file).await?;
    let mut handles = Vec::with_capacity(topology.node_count());

    for index in 0..topology.node_count() {
        let peer_boot = (index > 0).then_some(&boot);
        let handle = supervisor
            .spawn(
                index,
                &topology.node_home(index),
                peer_boot,
                &config.log_path(index),
            )
            .await?;
        registry
            .append(&ProcessRecord::new(handle.pid(), handle.name(), NETWORK_LABEL))
            .await?;

        if index == 0 && topology.node_count() > 1 {
            let rpc_addr = SocketAddr::from((Ipv4Addr::LOCALHOST, config.ports.rpc_port(0)?));
            probe.wait_ready(&handle, rpc_addr).await?;
        }
        handles.push(handle);
    }
    registry.close().await?;

    info!(
        nodes = handles.len(),
        logs = %config.log_dir.display(),
        registry = %config.pid_file.display(),
        "local network spawned"
    );

    Ok(LaunchReport {
        prepared,
        addresses,
        boot,
        handles,
        log_dir: config.log_dir.clone(),
        pid_file: config.pid_file.clone(),
    })
}

/// Empties the log directory, creating it if needed.
async fn reset_log_dir(dir: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(dir).await {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(LocalnetError::filesystem(dir, e)),
    }
    tokio::fs::create_dir_all(dir)
        .await
        .map_err(|e| LocalnetError::filesystem(dir, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reset_log_dir_clears_old_logs() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("logs");
        std::fs::create_dir_all(&logs).unwrap();
        std::fs::write(logs.join("node0.log"), "old").unwrap();

        reset_log_dir(&logs).await.unwrap();

        assert!(logs.is_dir());
        assert!(!logs.join("node0.log").exists());
    }

    #[tokio::test]
    async fn reset_log_dir_creates_missing_parents() {
        let dir = tempfile::tempdir().unwrap();
        let logs = dir.path().join("a").join("b");

        reset_log_dir(&logs).await.unwrap();
        assert!(logs.is_dir());
    }
}
