//! Provisions and launches a multi-node network on a single machine.
//!
//! A launch runs in strictly ordered phases:
//!
//! 1. [`workspace`] makes sure the home tree exists, wiping or initializing it,
//! 2. [`provision`] assigns per-node rpc/network addresses and the archive flag,
//! 3. [`bootstrap`] reads node 0's identity and builds the boot descriptor,
//! 4. [`supervisor`] spawns one node process per index, recording each one in
//!    the [`registry`].
//!
//! Every file mutation happens before the first process exists, so a failure in
//! phases 1–3 leaves no running node behind. [`orchestrator::launch`] wires the
//! phases together.

pub mod bootstrap;
pub mod config;
pub mod error;
pub mod launcher;
pub mod orchestrator;
pub mod provision;
pub mod registry;
pub mod supervisor;
pub mod topology;
pub mod workspace;

pub use bootstrap::{BootDescriptor, Identity};
pub use config::LaunchConfig;
pub use error::{LocalnetError, Result};
pub use launcher::{InitRequest, NodeBinary, NodeLauncher, RunRequest, SpawnedProcess};
pub use orchestrator::{launch, LaunchReport};
pub use provision::{NodeAddresses, NodeConfig};
pub use registry::{PidRegistry, ProcessRecord};
pub use supervisor::{Immediate, ProcessHandle, ProcessSupervisor, ReadinessProbe, TcpProbe};
pub use topology::{NetworkTopology, PortPlan};
pub use workspace::{Prepared, WorkspaceManager};

/// Label written next to every process spawned by this crate.
pub const NETWORK_LABEL: &str = "localnet";
