//! Directory walker that finds environment container files.

use crate::ScanError;
use ignore::{WalkBuilder, WalkState};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::mpsc;
use std::time::SystemTime;
use tracing::{debug, warn};

/// A container file found under a source directory.
#[derive(Debug, Clone)]
pub struct ContainerFile {
    /// Absolute path to the file
    pub path: PathBuf,
    pub modified: SystemTime,
    /// Hex SHA-256 of the file content
    pub checksum: String,
}

/// Everything a walk found.
#[derive(Debug, Default)]
pub struct ContainerWalk {
    /// Readable containers, sorted by path
    pub files: Vec<ContainerFile>,
    /// Containers that exist but could not be read, sorted
    pub unreadable: Vec<PathBuf>,
    /// Directories that could not be listed
    pub failures: Vec<String>,
}

impl ContainerWalk {
    /// True if some directory could not be listed, so absent containers
    /// may still exist.
    pub fn is_incomplete(&self) -> bool {
        !self.failures.is_empty()
    }
}

enum Found {
    File(ContainerFile),
    Unreadable(PathBuf),
    Failed(String),
}

/// Walks a directory tree for container files, respecting ignore files.
pub struct ContainerWalker {
    root: PathBuf,
    extensions: Vec<String>,
}

impl ContainerWalker {
    /// Walker over `*.json` environment files.
    pub fn new(root: &Path) -> Self {
        Self::with_extensions(root, &["json"])
    }

    pub fn with_extensions(root: &Path, extensions: &[&str]) -> Self {
        Self {
            root: root.to_path_buf(),
            extensions: extensions.iter().map(|e| e.to_ascii_lowercase()).collect(),
        }
    }

    fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| self.extensions.iter().any(|x| x.eq_ignore_ascii_case(e)))
    }

    /// Walk the tree and collect every container.
    ///
    /// Files that cannot be read and directories that cannot be listed are
    /// reported in the result; only a missing root is an error.
    pub fn walk(&self) -> Result<ContainerWalk, ScanError> {
        if !self.root.is_dir() {
            return Err(ScanError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("{} is not a directory", self.root.display()),
            )));
        }

        let (tx, rx) = mpsc::channel();

        let walker = WalkBuilder::new(&self.root)
            .hidden(true)
            .git_ignore(true)
            .git_exclude(true)
            .ignore(true)
            .parents(false)
            .build_parallel();

        walker.run(|| {
            let tx = tx.clone();
            Box::new(move |result| {
                match result {
                    Ok(entry) => {
                        let is_file = entry.file_type().is_some_and(|ft| ft.is_file());
                        if is_file && self.accepts(entry.path()) {
                            let found = match read_container_file(entry.path()) {
                                Ok(file) => Found::File(file),
                                Err(e) => {
                                    warn!(path = %entry.path().display(), error = %e, "Unreadable container");
                                    Found::Unreadable(entry.path().to_path_buf())
                                }
                            };
                            let _ = tx.send(found);
                        }
                    }
                    Err(e) if e.io_error().is_some() => {
                        warn!(error = %e, "Cannot list directory");
                        let _ = tx.send(Found::Failed(e.to_string()));
                    }
                    Err(e) => {
                        debug!(error = %e, "Walk error");
                    }
                }
                WalkState::Continue
            })
        });

        drop(tx);

        let mut walk = ContainerWalk::default();
        for found in rx {
            match found {
                Found::File(file) => walk.files.push(file),
                Found::Unreadable(path) => walk.unreadable.push(path),
                Found::Failed(message) => walk.failures.push(message),
            }
        }
        walk.files.sort_by(|a, b| a.path.cmp(&b.path));
        walk.unreadable.sort();
        Ok(walk)
    }
}

fn read_container_file(path: &Path) -> std::io::Result<ContainerFile> {
    let metadata = std::fs::metadata(path)?;
    let bytes = std::fs::read(path)?;
    Ok(ContainerFile {
        path: path.to_path_buf(),
        modified: metadata.modified().unwrap_or(SystemTime::UNIX_EPOCH),
        checksum: checksum(&bytes),
    })
}

/// Hex SHA-256 of `bytes`.
pub fn checksum(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
