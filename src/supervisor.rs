//! Node process spawning.
//!
//! Children are started and left running: nothing here waits for them to
//! become ready, watches them afterwards or retries a failed start. The only
//! hook between spawns is [`ReadinessProbe`], called once after the boot node
//! has started and before any peer is spawned.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::process::Child;
use tokio::time::{sleep, timeout, Instant};
use tracing::{debug, info};

use crate::bootstrap::BootDescriptor;
use crate::error::{LocalnetError, Result};
use crate::launcher::{NodeLauncher, RunRequest};

/// A spawned, detached node.
#[derive(Debug)]
pub struct ProcessHandle {
    node_index: usize,
    pid: u32,
    name: String,
    log_path: PathBuf,
    child: Option<Child>,
}

impl ProcessHandle {
    pub fn node_index(&self) -> usize {
        self.node_index
    }

    pub fn pid(&self) -> u32 {
        self.pid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Hands the OS child over to a caller that wants to supervise it.
    pub fn into_child(self) -> Option<Child> {
        self.child
    }
}

pub struct ProcessSupervisor<'a, L> {
    launcher: &'a L,
    verbose: Option<String>,
}

impl<'a, L: NodeLauncher> ProcessSupervisor<'a, L> {
    pub fn new(launcher: &'a L, verbose: Option<String>) -> Self {
        Self { launcher, verbose }
    }

    /// Starts node `node_index` in run mode. `boot` is `None` only for the
    /// boot node itself.
    pub async fn spawn(
        &self,
        node_index: usize,
        node_home: &Path,
        boot: Option<&BootDescriptor>,
        log_path: &Path,
    ) -> Result<ProcessHandle> {
        let request = RunRequest {
            node_index,
            home: node_home.to_path_buf(),
            verbose: self.verbose.clone(),
            boot_nodes: boot.map(ToString::to_string),
            log_path: log_path.to_path_buf(),
        };
        let spawned = self.launcher.run(&request).await?;

        let name = match self.launcher.process_name(spawned.pid).await {
            Some(name) => name,
            None => self.launcher.program_name(),
        };
        info!(node = node_index, pid = spawned.pid, %name, log = %log_path.display(), "spawned node");

        Ok(ProcessHandle {
            node_index,
            pid: spawned.pid,
            name,
            log_path: request.log_path,
            child: spawned.child,
        })
    }
}

/// Decides when peers may be spawned after the boot node has started.
#[async_trait]
pub trait ReadinessProbe: Send + Sync {
    async fn wait_ready(&self, boot_node: &ProcessHandle, rpc_addr: SocketAddr) -> Result<()>;
}

/// Does not wait: peers are spawned right after the boot node and are
/// expected to retry their initial connection themselves.
#[derive(Clone, Copy, Debug, Default)]
pub struct Immediate;

#[async_trait]
impl ReadinessProbe for Immediate {
    async fn wait_ready(&self, _boot_node: &ProcessHandle, _rpc_addr: SocketAddr) -> Result<()> {
        Ok(())
    }
}

/// Polls the boot node's rpc port until it accepts a TCP connection.
#[derive(Clone, Copy, Debug)]
pub struct TcpProbe {
    pub timeout: Duration,
    pub interval: Duration,
}

impl TcpProbe {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            interval: Duration::from_millis(250),
        }
    }
}

#[async_trait]
impl ReadinessProbe for TcpProbe {
    async fn wait_ready(&self, boot_node: &ProcessHandle, rpc_addr: SocketAddr) -> Result<()> {
        let started = Instant::now();
        let poll = async {
            loop {
                match TcpStream::connect(rpc_addr).await {
                    Ok(_) => return,
                    Err(e) => debug!(pid = boot_node.pid(), %rpc_addr, "boot node not ready: {e}"),
                }
                sleep(self.interval).await;
            }
        };

        timeout(self.timeout, poll)
            .await
            .map_err(|_| LocalnetError::Readiness {
                addr: rpc_addr,
                waited: started.elapsed(),
            })?;
        info!(%rpc_addr, waited = ?started.elapsed(), "boot node is accepting connections");
        Ok(())
    }
}
