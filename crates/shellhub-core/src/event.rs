//! Scan events and change notifications.

use crate::document::{Document, Source};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Process-unique identifier of an in-flight task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Summary reported by a scan execution when it finishes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScanDiagnostics {
    pub added: usize,
    pub changed: usize,
    pub removed: usize,
    pub duration_ms: u64,
    /// Per-document problems that did not abort the scan
    #[serde(default)]
    pub warnings: Vec<String>,
    /// Whole-scan failure, if the scan could not complete
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
}

impl ScanDiagnostics {
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            failure: Some(message.into()),
            ..Default::default()
        }
    }

    pub fn is_failure(&self) -> bool {
        self.failure.is_some()
    }
}

/// Output of an isolated scan execution, consumed by the orchestrator.
#[derive(Debug, Clone, PartialEq)]
pub enum ScanEvent {
    Added(Document),
    Changed(Document),
    Removed { document: Document, source: String },
    End {
        task_id: TaskId,
        diagnostics: ScanDiagnostics,
    },
}

impl ScanEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ScanEvent::Added(_) => "added",
            ScanEvent::Changed(_) => "changed",
            ScanEvent::Removed { .. } => "removed",
            ScanEvent::End { .. } => "end",
        }
    }
}

/// Message pushed on the index-change channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum IndexChange {
    Added { document: Document },
    Changed { document: Document },
    Removed { document: Document },
    Reset,
    EndpointAdded { endpoint: Source },
    EndpointRemoved { endpoint: Source },
}

/// One value of a live document update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveValue {
    /// Submodel the element belongs to
    pub submodel: String,
    /// idShort path inside the submodel
    pub path: String,
    pub value: String,
}

/// Message pushed on a per-document live-value channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LiveUpdate {
    pub source: String,
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub values: Vec<LiveValue>,
}

/// Anything delivered through the notification fan-out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "channel", rename_all = "snake_case")]
pub enum Notification {
    Index(IndexChange),
    Live(LiveUpdate),
}
