//! Resource drivers: the seam between the orchestrator and a source's
//! protocol.
//!
//! Drivers are synchronous and run on scan worker threads, never on the
//! async runtime.

use crate::filesystem::FileSystemDriver;
use crate::ScanError;
use chrono::{DateTime, Utc};
use shellhub_core::{Document, Environment, ScanDiagnostics, ScanEvent, Source, SourceKind};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

/// One unit of content in a source: a file, an archive, a remote entry.
#[derive(Debug, Clone, PartialEq)]
pub struct Container {
    /// Driver-specific address, stored on each document it holds
    pub address: String,
    pub checksum: String,
    pub last_modified: DateTime<Utc>,
}

/// Access to the containers of one source.
pub trait ResourceDriver: Send {
    fn open(&mut self) -> Result<(), ScanError>;

    fn close(&mut self);

    /// Every container currently present.
    fn enumerate(&mut self) -> Result<Vec<Container>, ScanError>;

    /// Documents held by a container, with their content loaded.
    fn read_container(&mut self, container: &Container) -> Result<Vec<Document>, ScanError>;

    /// Content of one document, addressed by its stored metadata.
    fn read_environment(&mut self, document: &Document) -> Result<Environment, ScanError>;

    /// Diff the source against `listing` and emit one event per change.
    ///
    /// Containers whose checksum matches every listed document are not
    /// read. A container that fails to read keeps its listed documents and
    /// is reported as a warning; only an enumeration failure fails the scan.
    fn scan(
        &mut self,
        listing: &[Document],
        emit: &mut dyn FnMut(ScanEvent),
    ) -> Result<ScanDiagnostics, ScanError> {
        let mut diagnostics = ScanDiagnostics::default();

        let mut by_address: HashMap<&str, Vec<&Document>> = HashMap::new();
        for document in listing {
            by_address
                .entry(document.address.as_str())
                .or_default()
                .push(document);
        }

        let containers = self.enumerate()?;
        let mut seen: HashSet<&str> = HashSet::new();

        for container in &containers {
            seen.insert(container.address.as_str());
            let known = by_address
                .get(container.address.as_str())
                .map(Vec::as_slice)
                .unwrap_or_default();

            if !known.is_empty() && known.iter().all(|d| d.checksum == container.checksum) {
                continue;
            }

            let documents = match self.read_container(container) {
                Ok(documents) => documents,
                Err(e) => {
                    warn!(address = %container.address, error = %e, "Skipping unreadable container");
                    diagnostics
                        .warnings
                        .push(format!("{}: {}", container.address, e));
                    continue;
                }
            };

            let ids: HashSet<&str> = documents.iter().map(|d| d.id.as_str()).collect();
            for old in known.iter().filter(|d| !ids.contains(d.id.as_str())) {
                diagnostics.removed += 1;
                emit(ScanEvent::Removed {
                    document: (*old).clone(),
                    source: old.source.clone(),
                });
            }

            for document in documents {
                match known.iter().find(|d| d.id == document.id) {
                    Some(old) if !old.differs_from(&document) => {}
                    Some(_) => {
                        diagnostics.changed += 1;
                        emit(ScanEvent::Changed(document));
                    }
                    None => {
                        diagnostics.added += 1;
                        emit(ScanEvent::Added(document));
                    }
                }
            }
        }

        for (address, documents) in &by_address {
            if seen.contains(address) {
                continue;
            }
            debug!(address, "Container disappeared");
            for document in documents {
                diagnostics.removed += 1;
                emit(ScanEvent::Removed {
                    document: (*document).clone(),
                    source: document.source.clone(),
                });
            }
        }

        Ok(diagnostics)
    }
}

/// Opens a driver for a source.
pub trait DriverFactory: Send + Sync {
    fn create(&self, source: &Source) -> Result<Box<dyn ResourceDriver>, ScanError>;
}

/// Drivers shipped with Shellhub.
///
/// Local directories are read directly; remote API and industrial-protocol
/// sources need an external driver and fail their scans until one is
/// registered.
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinDrivers;

impl DriverFactory for BuiltinDrivers {
    fn create(&self, source: &Source) -> Result<Box<dyn ResourceDriver>, ScanError> {
        match (source.kind, source.local_path()) {
            (SourceKind::FileSystem, Some(root)) => {
                Ok(Box::new(FileSystemDriver::new(&source.name, root)))
            }
            (kind, _) => Err(ScanError::Unsupported(kind)),
        }
    }
}
