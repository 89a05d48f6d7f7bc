//! Driver for directories of environment JSON files.
//!
//! Every `*.json` file below the root is a container. A file may hold
//! several shells; each becomes its own document whose content is the
//! shell plus the submodels it references.

use crate::driver::{Container, ResourceDriver};
use crate::walker::{checksum, ContainerWalker};
use crate::ScanError;
use chrono::{DateTime, Utc};
use shellhub_core::content::AssetAdministrationShell;
use shellhub_core::{Document, Environment};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tracing::debug;

/// Checksum of a container that exists but cannot be read. Never equal to
/// a stored checksum, so the container is re-read and its failure reported.
const UNREADABLE: &str = "";

pub struct FileSystemDriver {
    source: String,
    root: PathBuf,
}

impl FileSystemDriver {
    pub fn new(source: &str, root: impl Into<PathBuf>) -> Self {
        Self {
            source: source.to_string(),
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Container address of `path`: root-relative, `/`-separated.
    fn address_of(&self, path: &Path) -> String {
        let relative = path.strip_prefix(&self.root).unwrap_or(path);
        relative
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/")
    }

    fn path_of(&self, address: &str) -> PathBuf {
        address
            .split('/')
            .fold(self.root.clone(), |path, part| path.join(part))
    }

    fn parse(&self, path: &Path, bytes: &[u8]) -> Result<Environment, ScanError> {
        serde_json::from_slice(bytes).map_err(|e| ScanError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Environment restricted to one shell and the submodels it references.
pub fn shell_environment(env: &Environment, shell: &AssetAdministrationShell) -> Environment {
    Environment {
        shells: vec![shell.clone()],
        submodels: env.submodels_of(shell).cloned().collect(),
    }
}

impl ResourceDriver for FileSystemDriver {
    fn open(&mut self) -> Result<(), ScanError> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(ScanError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not a directory", self.root.display()),
            )))
        }
    }

    fn close(&mut self) {}

    fn enumerate(&mut self) -> Result<Vec<Container>, ScanError> {
        let walk = ContainerWalker::new(&self.root).walk()?;
        if walk.is_incomplete() {
            return Err(ScanError::Incomplete(walk.failures.join("; ")));
        }
        debug!(
            source = %self.source,
            containers = walk.files.len(),
            unreadable = walk.unreadable.len(),
            "Enumerated containers"
        );

        let readable = walk.files.into_iter().map(|file| Container {
            address: self.address_of(&file.path),
            checksum: file.checksum,
            last_modified: DateTime::<Utc>::from(file.modified),
        });
        let unreadable = walk.unreadable.into_iter().map(|path| Container {
            address: self.address_of(&path),
            checksum: UNREADABLE.to_string(),
            last_modified: DateTime::<Utc>::from(SystemTime::UNIX_EPOCH),
        });
        Ok(readable.chain(unreadable).collect())
    }

    fn read_container(&mut self, container: &Container) -> Result<Vec<Document>, ScanError> {
        let path = self.path_of(&container.address);
        let bytes = std::fs::read(&path)?;
        let metadata = std::fs::metadata(&path)?;
        let env = self.parse(&path, &bytes)?;
        let crc = checksum(&bytes);
        let last_modified = metadata
            .modified()
            .map(DateTime::<Utc>::from)
            .unwrap_or(container.last_modified);
        let read_only = metadata.permissions().readonly();

        Ok(env
            .shells
            .iter()
            .map(|shell| {
                let info = &shell.asset_information;
                Document {
                    source: self.source.clone(),
                    id: shell.id.clone(),
                    id_short: shell.id_short.clone().unwrap_or_else(|| shell.id.clone()),
                    asset_id: info.global_asset_id.clone(),
                    checksum: crc.clone(),
                    last_modified,
                    address: container.address.clone(),
                    read_only,
                    online: true,
                    thumbnail: info.default_thumbnail.as_ref().map(|t| t.path.clone()),
                    content: Some(Arc::new(shell_environment(&env, shell))),
                }
            })
            .collect())
    }

    fn read_environment(&mut self, document: &Document) -> Result<Environment, ScanError> {
        let path = self.path_of(&document.address);
        let bytes = std::fs::read(&path)?;
        let env = self.parse(&path, &bytes)?;
        let shell = env.shell(&document.id).ok_or_else(|| {
            ScanError::Driver(format!(
                "shell {} not found in {}",
                document.id, document.address
            ))
        })?;
        Ok(shell_environment(&env, shell))
    }
}
