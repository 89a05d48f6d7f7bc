//! Shellhub Scanner
//!
//! This crate keeps the document index in sync with its sources:
//! - Task registry correlating in-flight scans and loads with their owner
//! - Scan orchestrator with one actor per source and self-rescheduling scans
//! - Isolated scan workers on dedicated threads
//! - Resource drivers, including a driver for local directories
//! - Directory watching with debounced scan requests
//! - Driver-backed content loading for the cache and hierarchy resolver

pub mod driver;
mod error;
mod filesystem;
mod loader;
mod orchestrator;
mod registry;
mod walker;
pub mod watcher;
mod worker;

pub use driver::{BuiltinDrivers, Container, DriverFactory, ResourceDriver};
pub use error::ScanError;
pub use filesystem::{shell_environment, FileSystemDriver};
pub use loader::DriverContentLoader;
pub use orchestrator::{
    Orchestrator, OrchestratorHandle, OrchestratorStatus, ResetOutcome, ScanContext, SourceStatus,
};
pub use registry::{OwnerId, Task, TaskKind, TaskRegistry};
pub use walker::{checksum, ContainerFile, ContainerWalk, ContainerWalker};
pub use watcher::SourceWatcher;
pub use worker::{spawn_scan, ScanJob};
