//! Per-node address assignment.
//!
//! Config files are merged, never replaced: only `rpc.addr`, `network.addr`
//! and `archive` change, every other field (at any level) round-trips.

use std::path::Path;

use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::{LocalnetError, Result};
use crate::topology::{NetworkTopology, PortPlan};

/// Address all services bind to.
pub const BIND_HOST: &str = "0.0.0.0";

/// Sections that must be objects; their `addr` is (re)assigned.
const ENDPOINT_SECTIONS: [&str; 2] = ["rpc", "network"];

/// A node's `config.json`, kept as the node wrote it.
///
/// Key order survives a load/save cycle, and only the assigned keys are
/// touched: a missing `addr` or a `null` archive flag is simply overwritten.
#[derive(Clone, Debug, PartialEq)]
pub struct NodeConfig {
    fields: Map<String, Value>,
}

/// Addresses assigned to one node.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NodeAddresses {
    pub rpc: String,
    pub network: String,
}

impl NodeConfig {
    pub async fn load(node: usize, path: &Path) -> Result<Self> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| config_error(node, path, e))?;
        let fields: Map<String, Value> =
            serde_json::from_str(&raw).map_err(|e| config_error(node, path, e))?;

        for section in ENDPOINT_SECTIONS {
            if !fields.get(section).is_some_and(Value::is_object) {
                return Err(config_error(
                    node,
                    path,
                    format!("`{section}` section is missing or not an object"),
                ));
            }
        }
        Ok(Self { fields })
    }

    pub async fn save(&self, node: usize, path: &Path) -> Result<()> {
        let raw =
            serde_json::to_string_pretty(&self.fields).map_err(|e| config_error(node, path, e))?;
        tokio::fs::write(path, raw)
            .await
            .map_err(|e| config_error(node, path, e))
    }

    pub fn rpc_addr(&self) -> Option<&str> {
        self.endpoint_addr("rpc")
    }

    pub fn network_addr(&self) -> Option<&str> {
        self.endpoint_addr("network")
    }

    pub fn archive(&self) -> bool {
        self.fields.get("archive").and_then(Value::as_bool).unwrap_or(false)
    }

    fn endpoint_addr(&self, section: &str) -> Option<&str> {
        self.fields.get(section)?.get("addr")?.as_str()
    }

    fn assign(&mut self, addresses: &NodeAddresses) {
        for (section, addr) in ENDPOINT_SECTIONS.iter().zip([&addresses.rpc, &addresses.network]) {
            if let Some(Value::Object(endpoint)) = self.fields.get_mut(*section) {
                endpoint.insert("addr".into(), Value::String(addr.clone()));
            }
        }
        self.fields.insert("archive".into(), Value::Bool(true));
    }
}

fn config_error(node: usize, path: &Path, reason: impl ToString) -> LocalnetError {
    LocalnetError::ConfigFormat {
        node,
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}

/// Addresses node `index` should listen on.
pub fn addresses_for(ports: &PortPlan, index: usize) -> Result<NodeAddresses> {
    Ok(NodeAddresses {
        rpc: format!("{BIND_HOST}:{}", ports.rpc_port(index)?),
        network: format!("{BIND_HOST}:{}", ports.network_port(index)?),
    })
}

/// Rewrites every node's config with its addresses and `archive = true`.
///
/// Stops at the first failing node; nodes already rewritten keep their edits.
pub async fn assign_addresses(
    topology: &NetworkTopology,
    ports: &PortPlan,
) -> Result<Vec<NodeAddresses>> {
    ports.check(topology.node_count())?;

    let mut assigned = Vec::with_capacity(topology.node_count());
    for index in 0..topology.node_count() {
        let path = topology.config_path(index);
        let addresses = addresses_for(ports, index)?;

        let mut config = NodeConfig::load(index, &path).await?;
        config.assign(&addresses);
        config.save(index, &path).await?;

        debug!(node = index, rpc = %addresses.rpc, network = %addresses.network, "assigned addresses");
        assigned.push(addresses);
    }

    info!(nodes = assigned.len(), "provisioned node configs");
    Ok(assigned)
}
