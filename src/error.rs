//! Error type shared by every launch phase.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Fatal launch errors. Every variant aborts the whole run.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum LocalnetError {
    /// The node binary could not be located.
    #[error("node binary not found: {0}")]
    Environment(String),

    /// Creating, removing or writing a file or directory failed.
    #[error("filesystem error at {}: {source}", .path.display())]
    Filesystem {
        /// Path the operation was applied to.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The binary's init mode failed to start or exited nonzero.
    #[error("workspace initialization failed: {0}")]
    Init(String),

    /// A node's config file is missing, unparseable or unwritable.
    #[error("config for node{node} at {}: {reason}", .path.display())]
    ConfigFormat {
        /// Index of the node whose config failed.
        node: usize,
        /// Path of the config file.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// Node 0's key file is missing or unparseable.
    #[error("node0 identity at {}: {reason}", .path.display())]
    Identity {
        /// Path of the key file.
        path: PathBuf,
        /// What went wrong.
        reason: String,
    },

    /// The OS refused to start a node process.
    #[error("failed to spawn node{node}: {source}")]
    Spawn {
        /// Index of the node that failed to start.
        node: usize,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The boot node did not accept connections in time.
    #[error("boot node not reachable at {addr} after {waited:?}")]
    Readiness {
        /// Address that was probed.
        addr: SocketAddr,
        /// How long the probe waited.
        waited: Duration,
    },

    /// Node/shard counts or ports are out of range.
    #[error("invalid topology: {0}")]
    Topology(String),

    /// A registry line could not be parsed.
    #[error("malformed registry line {line}: {reason}")]
    Registry {
        /// 1-based line number.
        line: usize,
        /// What went wrong.
        reason: String,
    },
}

impl LocalnetError {
    /// Wraps an I/O error with the path it happened at.
    pub fn filesystem(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Filesystem {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }
}

pub type Result<T, E = LocalnetError> = std::result::Result<T, E>;
