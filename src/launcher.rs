//! The seam between orchestration and the external node binary.
//!
//! [`NodeLauncher`] covers the two ways the binary is invoked: a blocking
//! `init` that lays out the home tree, and a non-blocking `run` that starts
//! one long-lived node. [`NodeBinary`] is the real implementation; tests plug
//! in recording fakes.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use sysinfo::{Pid, ProcessesToUpdate, System};
use tokio::process::{Child, Command};
use tracing::{debug, info};

use crate::error::{LocalnetError, Result};

/// File name looked up when a directory is given as the binary location.
pub const BINARY_NAME: &str = "neard";

/// Chain id passed to init mode.
pub const CHAIN_ID: &str = "testnet";

/// Arguments for the binary's init mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct InitRequest {
    pub home: PathBuf,
    pub chain_id: String,
    pub shards: usize,
    pub validators: usize,
}

impl InitRequest {
    /// `--home <home> <chain_id> --shards <S> --v <N>`
    pub fn args(&self) -> Vec<OsString> {
        vec![
            "--home".into(),
            self.home.clone().into(),
            self.chain_id.clone().into(),
            "--shards".into(),
            self.shards.to_string().into(),
            "--v".into(),
            self.validators.to_string().into(),
        ]
    }
}

/// Arguments for starting one node in run mode.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RunRequest {
    pub node_index: usize,
    pub home: PathBuf,
    pub verbose: Option<String>,
    pub boot_nodes: Option<String>,
    /// Receives both stdout and stderr.
    pub log_path: PathBuf,
}

impl RunRequest {
    /// `--home <home> [--verbose <target>] run [--boot-nodes <descriptor>]`
    pub fn args(&self) -> Vec<OsString> {
        let mut args: Vec<OsString> = vec!["--home".into(), self.home.clone().into()];
        if let Some(target) = &self.verbose {
            args.push("--verbose".into());
            args.push(target.into());
        }
        args.push("run".into());
        if let Some(boot_nodes) = &self.boot_nodes {
            args.push("--boot-nodes".into());
            args.push(boot_nodes.into());
        }
        args
    }
}

/// A freshly started node process.
#[derive(Debug)]
pub struct SpawnedProcess {
    pub pid: u32,
    /// Present when the launcher owns a real child. Dropping it does not
    /// stop the process.
    pub child: Option<Child>,
}

impl SpawnedProcess {
    pub fn new(pid: u32, child: Option<Child>) -> Self {
        Self { pid, child }
    }
}

#[async_trait]
pub trait NodeLauncher: Send + Sync {
    /// Runs init mode to completion.
    async fn init(&self, request: &InitRequest) -> Result<()>;

    /// Starts a node and returns as soon as it has a pid.
    async fn run(&self, request: &RunRequest) -> Result<SpawnedProcess>;

    /// Name the OS reports for `pid`, if it can be determined.
    async fn process_name(&self, pid: u32) -> Option<String> {
        tokio::task::spawn_blocking(move || os_process_name(pid))
            .await
            .ok()
            .flatten()
    }

    /// Fallback process name.
    fn program_name(&self) -> String;
}

/// Asks the OS for the name of `pid`. Blocking; `None` if no such process.
pub fn os_process_name(pid: u32) -> Option<String> {
    let pid = Pid::from_u32(pid);
    let mut system = System::new();
    system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

    let name = system.process(pid)?.name().to_string_lossy().into_owned();
    (!name.is_empty()).then_some(name)
}

/// The node binary on disk.
#[derive(Clone, Debug)]
pub struct NodeBinary {
    path: PathBuf,
}

impl NodeBinary {
    /// Resolves the binary location.
    ///
    /// A directory is joined with [`BINARY_NAME`], an existing file is used
    /// as-is and a bare name is searched for on `PATH`.
    pub fn locate(location: impl AsRef<Path>) -> Result<Self> {
        let location = location.as_ref();
        let candidate = if location.is_dir() {
            location.join(BINARY_NAME)
        } else {
            location.to_path_buf()
        };

        if candidate.is_file() {
            return Ok(Self { path: candidate });
        }
        if candidate.components().count() == 1 {
            if let Ok(path) = which::which(&candidate) {
                return Ok(Self { path });
            }
        }
        Err(LocalnetError::Environment(candidate.display().to_string()))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn command(&self, args: Vec<OsString>) -> Command {
        let mut command = Command::new(&self.path);
        command.args(args).env("RUST_BACKTRACE", "1");
        command
    }
}

#[async_trait]
impl NodeLauncher for NodeBinary {
    async fn init(&self, request: &InitRequest) -> Result<()> {
        info!(
            home = %request.home.display(),
            shards = request.shards,
            validators = request.validators,
            "initializing workspace"
        );

        let status = self
            .command(request.args())
            .stdin(Stdio::null())
            .status()
            .await
            .map_err(|e| LocalnetError::Init(format!("{}: {e}", self.path.display())))?;

        if !status.success() {
            return Err(LocalnetError::Init(format!(
                "{} exited with {status}",
                self.path.display()
            )));
        }
        Ok(())
    }

    async fn run(&self, request: &RunRequest) -> Result<SpawnedProcess> {
        let log = tokio::fs::File::create(&request.log_path)
            .await
            .map_err(|e| LocalnetError::filesystem(&request.log_path, e))?
            .into_std()
            .await;
        let log_err = log
            .try_clone()
            .map_err(|e| LocalnetError::filesystem(&request.log_path, e))?;

        let args = request.args();
        debug!(node = request.node_index, ?args, "starting node");

        let child = self
            .command(args)
            .stdin(Stdio::null())
            .stdout(log)
            .stderr(log_err)
            .spawn()
            .map_err(|source| LocalnetError::Spawn {
                node: request.node_index,
                source,
            })?;

        let pid = child.id().ok_or_else(|| LocalnetError::Spawn {
            node: request.node_index,
            source: std::io::Error::other("process exited before reporting a pid"),
        })?;
        Ok(SpawnedProcess::new(pid, Some(child)))
    }

    fn program_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| BINARY_NAME.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn run_request(boot_nodes: Option<&str>, verbose: Option<&str>) -> RunRequest {
        RunRequest {
            node_index: 1,
            home: PathBuf::from("/h/node1"),
            verbose: verbose.map(String::from),
            boot_nodes: boot_nodes.map(String::from),
            log_path: PathBuf::from("/logs/node1.log"),
        }
    }

    #[test]
    fn init_args() {
        let request = InitRequest {
            home: PathBuf::from("/h"),
            chain_id: CHAIN_ID.into(),
            shards: 2,
            validators: 4,
        };
        assert_eq!(
            request.args(),
            ["--home", "/h", "testnet", "--shards", "2", "--v", "4"]
                .map(OsString::from)
                .to_vec()
        );
    }

    #[test]
    fn run_args_for_boot_node() {
        assert_eq!(
            run_request(None, None).args(),
            ["--home", "/h/node1", "run"].map(OsString::from).to_vec()
        );
    }

    #[test]
    fn run_args_for_peer() {
        assert_eq!(
            run_request(Some("pk@127.0.0.1:24567"), Some("")).args(),
            [
                "--home",
                "/h/node1",
                "--verbose",
                "",
                "run",
                "--boot-nodes",
                "pk@127.0.0.1:24567"
            ]
            .map(OsString::from)
            .to_vec()
        );
    }

    #[test]
    fn locate_missing_binary() {
        let dir = tempfile::tempdir().unwrap();
        let err = NodeBinary::locate(dir.path()).unwrap_err();
        assert!(matches!(err, LocalnetError::Environment(_)));

        let err = NodeBinary::locate("definitely-not-a-node-binary-4821").unwrap_err();
        assert!(matches!(err, LocalnetError::Environment(_)));
    }

    #[test]
    fn locate_joins_binary_name_for_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(BINARY_NAME), "").unwrap();

        let binary = NodeBinary::locate(dir.path()).unwrap();
        assert_eq!(binary.path(), dir.path().join("neard"));
        assert_eq!(binary.program_name(), "neard");
    }

    #[test]
    fn os_knows_the_current_process() {
        let name = os_process_name(std::process::id()).unwrap();
        assert!(!name.is_empty());
    }

    #[test]
    fn unknown_pid_has_no_name() {
        assert_eq!(os_process_name(u32::MAX), None);
    }

    #[cfg(unix)]
    mod process {
        use super::*;
        use std::os::unix::fs::PermissionsExt;

        fn script(dir: &Path, body: &str) -> NodeBinary {
            let path = dir.join(BINARY_NAME);
            std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
            NodeBinary::locate(dir).unwrap()
        }

        fn init_request(home: &Path) -> InitRequest {
            InitRequest {
                home: home.to_path_buf(),
                chain_id: CHAIN_ID.into(),
                shards: 1,
                validators: 2,
            }
        }

        #[tokio::test]
        async fn init_waits_for_exit() {
            let dir = tempfile::tempdir().unwrap();
            let marker = dir.path().join("ran");
            let binary = script(dir.path(), &format!("touch {}", marker.display()));

            binary.init(&init_request(dir.path())).await.unwrap();
            assert!(marker.exists());
        }

        #[tokio::test]
        async fn init_nonzero_exit_is_fatal() {
            let dir = tempfile::tempdir().unwrap();
            let binary = script(dir.path(), "exit 3");

            let err = binary.init(&init_request(dir.path())).await.unwrap_err();
            assert!(matches!(err, LocalnetError::Init(_)));
        }

        #[tokio::test]
        async fn run_redirects_output_to_log() {
            let dir = tempfile::tempdir().unwrap();
            let binary = script(dir.path(), "echo \"$@\"; echo oops >&2");
            let log_path = dir.path().join("node0.log");

            let spawned = binary
                .run(&RunRequest {
                    node_index: 0,
                    home: dir.path().join("node0"),
                    verbose: None,
                    boot_nodes: Some("pk@127.0.0.1:24567".into()),
                    log_path: log_path.clone(),
                })
                .await
                .unwrap();
            assert!(spawned.pid > 0);

            let status = spawned.child.unwrap().wait().await.unwrap();
            assert!(status.success());

            let log = std::fs::read_to_string(&log_path).unwrap();
            assert!(log.contains("run --boot-nodes pk@127.0.0.1:24567"));
            assert!(log.contains("oops"));
        }
    }
}
