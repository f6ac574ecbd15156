//! Durable record of spawned processes, one `pid | name | label` line each.
//!
//! The file is consumed by external status/stop tooling. Records are flushed
//! as they are appended; an interrupted launch leaves only the records written
//! so far and nothing repairs that afterwards.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{LocalnetError, Result};

const SEPARATOR: &str = " | ";

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ProcessRecord {
    pub pid: u32,
    pub name: String,
    pub label: String,
}

impl ProcessRecord {
    pub fn new(pid: u32, name: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            pid,
            name: name.into(),
            label: label.into(),
        }
    }
}

impl fmt::Display for ProcessRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{SEPARATOR}{}{SEPARATOR}{}", self.pid, self.name, self.label)
    }
}

impl FromStr for ProcessRecord {
    type Err = String;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut fields = line.splitn(3, '|').map(str::trim);
        let (Some(pid), Some(name), Some(label)) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(format!("expected 3 fields in {line:?}"));
        };
        let pid = pid
            .parse::<u32>()
            .map_err(|e| format!("invalid pid {pid:?}: {e}"))?;
        Ok(Self::new(pid, name, label))
    }
}

/// Append handle over the registry file.
pub struct PidRegistry {
    path: PathBuf,
    file: File,
    records: usize,
}

impl PidRegistry {
    /// Creates the file, truncating any previous registry.
    pub async fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| LocalnetError::filesystem(parent, e))?;
        }
        let file = File::create(&path)
            .await
            .map_err(|e| LocalnetError::filesystem(&path, e))?;
        Ok(Self {
            path,
            file,
            records: 0,
        })
    }

    pub async fn append(&mut self, record: &ProcessRecord) -> Result<()> {
        let line = format!("{record}\n");
        self.file
            .write_all(line.as_bytes())
            .await
            .map_err(|e| LocalnetError::filesystem(&self.path, e))?;
        self.file
            .flush()
            .await
            .map_err(|e| LocalnetError::filesystem(&self.path, e))?;
        self.records += 1;
        debug!(pid = record.pid, registry = %self.path.display(), "recorded process");
        Ok(())
    }

    /// Syncs the file and returns how many records were written.
    pub async fn close(self) -> Result<usize> {
        self.file
            .sync_all()
            .await
            .map_err(|e| LocalnetError::filesystem(&self.path, e))?;
        Ok(self.records)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Parses every non-empty line of a registry file.
    pub async fn load(path: impl AsRef<Path>) -> Result<Vec<ProcessRecord>> {
        let path = path.as_ref();
        let raw = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| LocalnetError::filesystem(path, e))?;

        raw.lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(i, line)| {
                line.parse().map_err(|reason| LocalnetError::Registry {
                    line: i + 1,
                    reason,
                })
            })
            .collect()
    }
}
