//! Shellhub Core Components
//!
//! Shared data model for the Shellhub daemon: documents, sources and
//! cursors, the asset administration shell content model and its
//! flattening, scan events, configuration, metrics and the notification
//! fan-out.

pub mod content;
mod config;
mod document;
mod error;
mod event;
mod fanout;
mod flatten;
mod metrics;

pub use config::{CacheConfig, DaemonConfig, PagingConfig, ScanConfig};
pub use content::Environment;
pub use document::{Cursor, Direction, DocKey, Document, Page, Source, SourceKind};
pub use error::CoreError;
pub use event::{
    IndexChange, LiveUpdate, LiveValue, Notification, ScanDiagnostics, ScanEvent, TaskId,
};
pub use fanout::{Channel, NotificationHub, Subscription};
pub use flatten::{ElementValue, FlatElement, FlatEntry, Flatten};
pub use metrics::{LatencyTracker, Metrics, MetricsSnapshot};
