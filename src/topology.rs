use std::path::{Path, PathBuf};

use crate::error::{LocalnetError, Result};

// File names produced by the node binary's init mode
pub const CONFIG_FILE: &str = "config.json";
pub const NODE_KEY_FILE: &str = "node_key.json";

pub const DEFAULT_RPC_PORT: u16 = 3030;
pub const DEFAULT_NETWORK_PORT: u16 = 24567;

/// Shape of the simulated network and where it lives on disk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NetworkTopology {
    node_count: usize,
    shard_count: usize,
    home: PathBuf,
}

impl NetworkTopology {
    pub fn new(node_count: usize, shard_count: usize, home: impl Into<PathBuf>) -> Result<Self> {
        if node_count == 0 {
            return Err(LocalnetError::Topology("node count must be at least 1".into()));
        }
        if shard_count == 0 {
            return Err(LocalnetError::Topology("shard count must be at least 1".into()));
        }
        Ok(Self {
            node_count,
            shard_count,
            home: home.into(),
        })
    }

    pub fn node_count(&self) -> usize {
        self.node_count
    }

    pub fn shard_count(&self) -> usize {
        self.shard_count
    }

    pub fn home(&self) -> &Path {
        &self.home
    }

    /// `home/node{index}`
    pub fn node_home(&self, index: usize) -> PathBuf {
        self.home.join(format!("node{index}"))
    }

    pub fn config_path(&self, index: usize) -> PathBuf {
        self.node_home(index).join(CONFIG_FILE)
    }

    /// Key file of the boot node (node 0).
    pub fn boot_key_path(&self) -> PathBuf {
        self.node_home(0).join(NODE_KEY_FILE)
    }
}

/// Base ports from which every node's addresses are derived by index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortPlan {
    pub rpc_base: u16,
    pub net_base: u16,
}

impl Default for PortPlan {
    fn default() -> Self {
        Self {
            rpc_base: DEFAULT_RPC_PORT,
            net_base: DEFAULT_NETWORK_PORT,
        }
    }
}

impl PortPlan {
    pub fn new(rpc_base: u16, net_base: u16) -> Self {
        Self { rpc_base, net_base }
    }

    pub fn rpc_port(&self, index: usize) -> Result<u16> {
        offset_port(self.rpc_base, index)
    }

    pub fn network_port(&self, index: usize) -> Result<u16> {
        offset_port(self.net_base, index)
    }

    /// Fails if the last node's ports would not fit in `u16`.
    pub fn check(&self, node_count: usize) -> Result<()> {
        let last = node_count.saturating_sub(1);
        self.rpc_port(last)?;
        self.network_port(last)?;
        Ok(())
    }
}

fn offset_port(base: u16, index: usize) -> Result<u16> {
    u16::try_from(index)
        .ok()
        .and_then(|offset| base.checked_add(offset))
        .ok_or_else(|| {
            LocalnetError::Topology(format!("port {base} + {index} is out of range"))
        })
}
