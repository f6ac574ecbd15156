use std::fmt;

use serde::Deserialize;
use tracing::info;

use crate::error::{LocalnetError, Result};
use crate::topology::NetworkTopology;

/// Public identity of the boot node, read from its key file.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct Identity {
    pub public_key: String,
}

/// Reads node 0's public key. Without it no other node can be bootstrapped.
pub async fn resolve_public_key(topology: &NetworkTopology) -> Result<Identity> {
    let path = topology.boot_key_path();
    let identity_error = |reason: String| LocalnetError::Identity {
        path: path.clone(),
        reason,
    };

    let raw = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| identity_error(e.to_string()))?;
    let identity: Identity =
        serde_json::from_str(&raw).map_err(|e| identity_error(e.to_string()))?;
    if identity.public_key.is_empty() {
        return Err(identity_error("public_key is empty".into()));
    }

    info!(public_key = %identity.public_key, "resolved boot node identity");
    Ok(identity)
}

/// `public_key@host:port`, handed to every peer as its initial contact.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BootDescriptor {
    pub public_key: String,
    pub host: String,
    pub port: u16,
}

impl BootDescriptor {
    pub fn new(public_key: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        Self {
            public_key: public_key.into(),
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for BootDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}:{}", self.public_key, self.host, self.port)
    }
}
