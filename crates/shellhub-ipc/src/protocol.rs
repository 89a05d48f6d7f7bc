//! IPC protocol definitions for Shellhub daemon communication.
//!
//! Uses MessagePack for efficient serialization over Unix sockets. Structs
//! are encoded as maps so optional fields can be skipped.

use serde::{Deserialize, Serialize};
use shellhub_core::{Channel, Cursor, Document, Environment, MetricsSnapshot, Notification, Page, Source};
use shellhub_index::{Filter, HierarchyNode};
use shellhub_scanner::{OrchestratorStatus, ResetOutcome};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Request from a client to the daemon
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Request {
    /// Ping for health check
    Ping,

    /// Get daemon status
    Status,

    ListEndpoints,

    GetEndpoint { name: String },

    /// Register a source and scan it immediately
    AddEndpoint { endpoint: Source },

    /// Remove a source with all its documents
    RemoveEndpoint { name: String },

    /// One page of documents; no cursor means the first page
    Page {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        cursor: Option<Cursor>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        filter: Option<Filter>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        language: Option<String>,
    },

    /// Look a document up by id or asset id
    Find {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
        id: String,
    },

    GetDocument { source: String, id: String },

    /// Materialized content of a document, loaded on demand
    GetContent { source: String, id: String },

    /// Descendant tree of a document
    GetHierarchy { source: String, id: String },

    DeleteDocument { source: String, id: String },

    /// Scan a source now
    Rescan { source: String },

    /// Drop everything and restore the default sources
    Reset,

    /// Turn the connection into a notification stream
    Subscribe { channel: Channel },

    /// Graceful shutdown
    Shutdown,
}

impl Request {
    /// Action name, as it appears on the wire.
    pub fn action(&self) -> &'static str {
        match self {
            Request::Ping => "ping",
            Request::Status => "status",
            Request::ListEndpoints => "list_endpoints",
            Request::GetEndpoint { .. } => "get_endpoint",
            Request::AddEndpoint { .. } => "add_endpoint",
            Request::RemoveEndpoint { .. } => "remove_endpoint",
            Request::Page { .. } => "page",
            Request::Find { .. } => "find",
            Request::GetDocument { .. } => "get_document",
            Request::GetContent { .. } => "get_content",
            Request::GetHierarchy { .. } => "get_hierarchy",
            Request::DeleteDocument { .. } => "delete_document",
            Request::Rescan { .. } => "rescan",
            Request::Reset => "reset",
            Request::Subscribe { .. } => "subscribe",
            Request::Shutdown => "shutdown",
        }
    }
}

/// Response from daemon to client
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Response {
    /// Success with optional data
    Ok {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        data: Option<ResponseData>,
    },

    /// Acknowledgment for requests without a result
    Ack,

    /// Error response
    Error { code: ErrorCode, message: String },
}

impl Response {
    /// Create a success response with no data
    pub fn ok() -> Self {
        Response::Ok { data: None }
    }

    /// Create a success response with data
    pub fn ok_with(data: ResponseData) -> Self {
        Response::Ok { data: Some(data) }
    }

    /// Create an acknowledgment response
    pub fn ack() -> Self {
        Response::Ack
    }

    /// Create an error response
    pub fn error(code: ErrorCode, message: impl Into<String>) -> Self {
        Response::Error {
            code,
            message: message.into(),
        }
    }
}

/// Response data variants
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseData {
    /// Pong response
    Pong { timestamp: i64 },

    /// Daemon status
    Status(Box<DaemonStatus>),

    Endpoints { endpoints: Vec<Source> },

    Endpoint { endpoint: Source },

    /// Whether a delete found anything to delete
    Removed { removed: bool },

    Page { page: Page },

    /// Lookup result; `None` when nothing matched
    Document {
        #[serde(default)]
        document: Option<Document>,
    },

    Content { content: Arc<Environment> },

    Hierarchy { root: HierarchyNode },

    Reset { outcome: ResetOutcome },

    /// First frame of a notification stream
    Subscribed { channel: Channel },

    /// One pushed notification
    Notification { notification: Notification },
}

/// Snapshot returned by the `status` request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonStatus {
    pub version: String,
    pub uptime_secs: u64,
    pub endpoints: usize,
    pub documents: usize,
    #[serde(default)]
    pub documents_by_source: BTreeMap<String, usize>,
    pub cached_documents: usize,
    /// Open notification channels
    pub channels: usize,
    pub metrics: MetricsSnapshot,
    pub orchestrator: OrchestratorStatus,
}

/// Error codes for error responses
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    /// Request format is invalid
    InvalidRequest,
    /// Document or source does not exist
    NotFound,
    /// A source with this name already exists
    Conflict,
    /// Malformed or unsupported source locator
    Configuration,
    /// Backing store failure; the operation was rolled back
    Storage,
    /// Content could not be loaded from its source
    Unavailable,
    /// Internal daemon error
    InternalError,
    /// Daemon is shutting down
    ShuttingDown,
}

#[cfg(test)]
mod tests {
    use super::*;
    use shellhub_core::{DocKey, IndexChange, SourceKind};

    #[test]
    fn test_request_serialization() {
        let req = Request::Find {
            source: None,
            id: "urn:asset:pump".to_string(),
        };

        let json = serde_json::to_string(&req).unwrap();
        assert!(json.contains(&format!("\"action\":\"{}\"", req.action())));
        assert!(!json.contains("source"));

        let msgpack = rmp_serde::to_vec_named(&req).unwrap();
        let decoded: Request = rmp_serde::from_slice(&msgpack).unwrap();
        if let Request::Find { source, id } = decoded {
            assert!(source.is_none());
            assert_eq!(id, "urn:asset:pump");
        } else {
            panic!("Decoded wrong variant");
        }
    }

    #[test]
    fn test_page_request_with_cursor_and_filter() {
        let req = Request::Page {
            cursor: Some(Cursor::next(DocKey::new("A", "x"), 10)),
            filter: Some(
                serde_json::from_value(serde_json::json!({ "op": "text", "text": "pump" }))
                    .unwrap(),
            ),
            language: Some("en".to_string()),
        };

        let msgpack = rmp_serde::to_vec_named(&req).unwrap();
        let decoded: Request = rmp_serde::from_slice(&msgpack).unwrap();
        if let Request::Page { cursor, language, .. } = decoded {
            let cursor = cursor.unwrap();
            assert_eq!(cursor.limit, 10);
            assert_eq!(cursor.key, Some(DocKey::new("A", "x")));
            assert_eq!(language.as_deref(), Some("en"));
        } else {
            panic!("Decoded wrong variant");
        }
    }

    #[test]
    fn test_document_response_skips_absent_fields() {
        let document = Document::new("A", "x", "X", "crc1");
        let resp = Response::ok_with(ResponseData::Document {
            document: Some(document.clone()),
        });

        let msgpack = rmp_serde::to_vec_named(&resp).unwrap();
        let decoded: Response = rmp_serde::from_slice(&msgpack).unwrap();
        if let Response::Ok {
            data: Some(ResponseData::Document { document: Some(d) }),
        } = decoded
        {
            assert_eq!(d, document);
        } else {
            panic!("Decoded wrong response variant");
        }
    }

    #[test]
    fn test_notification_frame() {
        let resp = Response::ok_with(ResponseData::Notification {
            notification: Notification::Index(IndexChange::EndpointAdded {
                endpoint: Source::new("A", "/data/a", SourceKind::FileSystem),
            }),
        });

        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["data"]["type"], "notification");
        assert_eq!(json["data"]["notification"]["type"], "EndpointAdded");

        let msgpack = rmp_serde::to_vec_named(&resp).unwrap();
        let decoded: Response = rmp_serde::from_slice(&msgpack).unwrap();
        assert!(matches!(
            decoded,
            Response::Ok {
                data: Some(ResponseData::Notification { .. })
            }
        ));
    }

    #[test]
    fn test_error_response() {
        let resp = Response::error(ErrorCode::Conflict, "Endpoint already exists: A");
        let json = serde_json::to_string(&resp).unwrap();
        assert!(json.contains("\"status\":\"error\""));
        assert!(json.contains("\"code\":\"conflict\""));
    }
}
