use std::io::ErrorKind;
use std::path::Path;

use tracing::info;

use crate::error::{LocalnetError, Result};
use crate::launcher::{InitRequest, NodeLauncher, CHAIN_ID};
use crate::topology::NetworkTopology;

/// What [`WorkspaceManager::prepare`] did to the home tree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Prepared {
    /// An existing tree was kept as-is.
    Reused,
    /// No tree existed; init mode created one.
    Created,
    /// The existing tree was removed and regenerated.
    Recreated,
}

/// Owns the home directory tree holding every node's data.
pub struct WorkspaceManager<'a, L> {
    launcher: &'a L,
}

impl<'a, L: NodeLauncher> WorkspaceManager<'a, L> {
    pub fn new(launcher: &'a L) -> Self {
        Self { launcher }
    }

    /// Makes sure `home/node0..node{N-1}` exist.
    ///
    /// With `overwrite` an existing tree is removed first. An existing tree
    /// without `overwrite` is assumed to be provisioned already.
    pub async fn prepare(&self, topology: &NetworkTopology, overwrite: bool) -> Result<Prepared> {
        let home = topology.home();
        let mut removed = false;

        if overwrite && exists(home).await? {
            info!(home = %home.display(), "removing old data");
            tokio::fs::remove_dir_all(home)
                .await
                .map_err(|e| LocalnetError::filesystem(home, e))?;
            removed = true;
        }

        if exists(home).await? {
            info!(home = %home.display(), "reusing existing workspace");
            return Ok(Prepared::Reused);
        }

        self.launcher
            .init(&InitRequest {
                home: home.to_path_buf(),
                chain_id: CHAIN_ID.to_string(),
                shards: topology.shard_count(),
                validators: topology.node_count(),
            })
            .await?;

        Ok(if removed {
            Prepared::Recreated
        } else {
            Prepared::Created
        })
    }
}

async fn exists(path: &Path) -> Result<bool> {
    match tokio::fs::metadata(path).await {
        Ok(_) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(LocalnetError::filesystem(path, e)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::launcher::{RunRequest, SpawnedProcess};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Lays out empty node directories, remembering each init call.
    #[derive(Default)]
    struct DirInit {
        calls: Mutex<Vec<InitRequest>>,
    }

    #[async_trait]
    impl NodeLauncher for DirInit {
        async fn init(&self, request: &InitRequest) -> Result<()> {
            for i in 0..request.validators {
                std::fs::create_dir_all(request.home.join(format!("node{i}"))).unwrap();
            }
            self.calls.lock().unwrap().push(request.clone());
            Ok(())
        }

        async fn run(&self, _request: &RunRequest) -> Result<SpawnedProcess> {
            unreachable!("workspace preparation never runs nodes")
        }

        fn program_name(&self) -> String {
            "dir-init".into()
        }
    }

    #[tokio::test]
    async fn creates_missing_home() {
        let dir = tempfile::tempdir().unwrap();
        let topology = NetworkTopology::new(3, 2, dir.path().join("home")).unwrap();
        let launcher = DirInit::default();

        let prepared = WorkspaceManager::new(&launcher)
            .prepare(&topology, false)
            .await
            .unwrap();

        assert_eq!(prepared, Prepared::Created);
        let calls = launcher.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].shards, 2);
        assert_eq!(calls[0].validators, 3);
        assert_eq!(calls[0].chain_id, "testnet");
        assert!(topology.node_home(2).is_dir());
    }

    #[tokio::test]
    async fn reuses_existing_home() {
        let dir = tempfile::tempdir().unwrap();
        let topology = NetworkTopology::new(2, 1, dir.path()).unwrap();
        std::fs::write(dir.path().join("keep"), "x").unwrap();
        let launcher = DirInit::default();

        let prepared = WorkspaceManager::new(&launcher)
            .prepare(&topology, false)
            .await
            .unwrap();

        assert_eq!(prepared, Prepared::Reused);
        assert!(launcher.calls.lock().unwrap().is_empty());
        assert!(dir.path().join("keep").exists());
    }

    #[tokio::test]
    async fn overwrite_wipes_then_initializes() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("home");
        std::fs::create_dir_all(home.join("stale")).unwrap();
        let topology = NetworkTopology::new(1, 1, &home).unwrap();
        let launcher = DirInit::default();

        let prepared = WorkspaceManager::new(&launcher)
            .prepare(&topology, true)
            .await
            .unwrap();

        assert_eq!(prepared, Prepared::Recreated);
        assert!(!home.join("stale").exists());
        assert!(home.join("node0").is_dir());
        assert_eq!(launcher.calls.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn failed_removal_aborts_before_init() {
        let dir = tempfile::tempdir().unwrap();
        let home = dir.path().join("home");
        std::fs::write(&home, "not a directory").unwrap();
        let topology = NetworkTopology::new(2, 1, &home).unwrap();
        let launcher = DirInit::default();

        let err = WorkspaceManager::new(&launcher)
            .prepare(&topology, true)
            .await
            .unwrap_err();

        assert!(matches!(err, LocalnetError::Filesystem { .. }));
        assert!(launcher.calls.lock().unwrap().is_empty());
        assert!(home.is_file());
    }

    #[tokio::test]
    async fn init_failure_propagates() {
        struct Failing;

        #[async_trait]
        impl NodeLauncher for Failing {
            async fn init(&self, _request: &InitRequest) -> Result<()> {
                Err(LocalnetError::Init("exited with exit status: 1".into()))
            }

            async fn run(&self, _request: &RunRequest) -> Result<SpawnedProcess> {
                unreachable!()
            }

            fn program_name(&self) -> String {
                "failing".into()
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let topology = NetworkTopology::new(1, 1, dir.path().join("home")).unwrap();
        let err = WorkspaceManager::new(&Failing)
            .prepare(&topology, false)
            .await
            .unwrap_err();
        assert!(matches!(err, LocalnetError::Init(_)));
    }
}
