//! Document, source and cursor types shared by every Shellhub component.

use crate::content::Environment;
use crate::CoreError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Composite identity of a document: (source name, document id).
///
/// Ordering is lexicographic on `source` first, then `id`, which is the
/// total order the index pages over.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocKey {
    pub source: String,
    pub id: String,
}

impl DocKey {
    pub fn new(source: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            id: id.into(),
        }
    }
}

impl fmt::Display for DocKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.source, self.id)
    }
}

/// Metadata record for one asset administration shell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    /// Name of the source the document lives in
    pub source: String,
    /// Shell identifier, unique within the source
    pub id: String,
    /// Human-readable short name
    pub id_short: String,
    /// Global asset id; an alternate lookup key, not unique across sources
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub asset_id: Option<String>,
    /// Content checksum as reported by the resource driver
    pub checksum: String,
    /// Last modification time of the underlying container
    pub last_modified: DateTime<Utc>,
    /// Driver-specific address of the content inside the source
    pub address: String,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub online: bool,
    /// Reference to a thumbnail inside the container
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    /// Fully materialized environment, absent unless explicitly loaded
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<Arc<Environment>>,
}

impl Document {
    /// Create a document with the mandatory metadata; everything else defaults.
    pub fn new(
        source: impl Into<String>,
        id: impl Into<String>,
        id_short: impl Into<String>,
        checksum: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            id: id.into(),
            id_short: id_short.into(),
            asset_id: None,
            checksum: checksum.into(),
            last_modified: Utc::now(),
            address: String::new(),
            read_only: false,
            online: false,
            thumbnail: None,
            content: None,
        }
    }

    pub fn key(&self) -> DocKey {
        DocKey::new(&self.source, &self.id)
    }

    pub fn with_asset_id(mut self, asset_id: impl Into<String>) -> Self {
        self.asset_id = Some(asset_id.into());
        self
    }

    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    pub fn with_content(mut self, content: Environment) -> Self {
        self.content = Some(Arc::new(content));
        self
    }

    /// Clone of the metadata with the content dropped.
    pub fn without_content(&self) -> Self {
        Self {
            content: None,
            ..self.clone()
        }
    }

    /// Whether `other` describes a different revision of the same document.
    ///
    /// Content is ignored; only the metadata a scan can observe is compared.
    pub fn differs_from(&self, other: &Document) -> bool {
        self.checksum != other.checksum
            || self.id_short != other.id_short
            || self.asset_id != other.asset_id
            || self.address != other.address
            || self.thumbnail != other.thumbnail
            || self.read_only != other.read_only
            || self.online != other.online
    }
}

/// Protocol family used to reach a source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Directory of environment files on a local filesystem
    FileSystem,
    /// Remote repository API reachable over HTTP(S)
    Http,
    /// Industrial protocol gateway (OPC UA)
    OpcUa,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SourceKind::FileSystem => "file_system",
            SourceKind::Http => "http",
            SourceKind::OpcUa => "opc_ua",
        };
        f.write_str(name)
    }
}

/// A named external repository of documents (a.k.a. endpoint).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    /// Unique name
    pub name: String,
    /// Locator (directory path or URL)
    pub url: String,
    pub kind: SourceKind,
    /// Version tag of the information model served by the source
    #[serde(default = "default_version")]
    pub version: String,
}

fn default_version() -> String {
    "v3".to_string()
}

impl Source {
    pub fn new(name: impl Into<String>, url: impl Into<String>, kind: SourceKind) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            kind,
            version: default_version(),
        }
    }

    /// Check that the name and locator are usable for the source kind.
    ///
    /// Runs before the source is stored, so a malformed locator never
    /// reaches the scan orchestrator.
    pub fn validate(&self) -> Result<(), CoreError> {
        if self.name.trim().is_empty() {
            return Err(CoreError::Configuration("source name is empty".to_string()));
        }

        let url = self.url.trim();
        let valid = match self.kind {
            SourceKind::FileSystem => {
                let path = url.strip_prefix("file://").unwrap_or(url);
                std::path::Path::new(path).is_absolute()
            }
            SourceKind::Http => {
                (url.starts_with("http://") || url.starts_with("https://"))
                    && url.split("://").nth(1).is_some_and(|rest| !rest.is_empty())
            }
            SourceKind::OpcUa => url
                .strip_prefix("opc.tcp://")
                .is_some_and(|rest| !rest.is_empty()),
        };

        if valid {
            Ok(())
        } else {
            Err(CoreError::Configuration(format!(
                "unsupported locator '{}' for {} source '{}'",
                self.url, self.kind, self.name
            )))
        }
    }

    /// Filesystem path of a `FileSystem` source.
    pub fn local_path(&self) -> Option<std::path::PathBuf> {
        match self.kind {
            SourceKind::FileSystem => {
                let url = self.url.trim();
                Some(url.strip_prefix("file://").unwrap_or(url).into())
            }
            _ => None,
        }
    }
}

/// Paging direction requested by a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    /// The very first page
    First,
    /// Items strictly after the cursor key
    Next,
    /// Items strictly before the cursor key
    Previous,
    /// The very last page
    Last,
}

/// Opaque pagination token.
///
/// Callers outside the index should treat it as uninterpreted and pass it
/// back unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub direction: Direction,
    pub limit: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<DocKey>,
}

impl Cursor {
    pub fn first(limit: usize) -> Self {
        Self {
            direction: Direction::First,
            limit,
            key: None,
        }
    }

    pub fn last(limit: usize) -> Self {
        Self {
            direction: Direction::Last,
            limit,
            key: None,
        }
    }

    pub fn next(key: DocKey, limit: usize) -> Self {
        Self {
            direction: Direction::Next,
            limit,
            key: Some(key),
        }
    }

    pub fn previous(key: DocKey, limit: usize) -> Self {
        Self {
            direction: Direction::Previous,
            limit,
            key: Some(key),
        }
    }

    /// Whether the cursor reads towards the end of the collection.
    pub fn is_forward(&self) -> bool {
        match self.direction {
            Direction::First => true,
            Direction::Next => true,
            Direction::Previous | Direction::Last => false,
        }
    }
}

/// One page of documents in ascending key order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub previous: Option<Cursor>,
    pub items: Vec<Document>,
    pub next: Option<Cursor>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_doc_key_ordering_is_source_first() {
        let mut keys = vec![
            DocKey::new("b", "a"),
            DocKey::new("a", "z"),
            DocKey::new("a", "b"),
        ];
        keys.sort();
        assert_eq!(
            keys,
            vec![
                DocKey::new("a", "b"),
                DocKey::new("a", "z"),
                DocKey::new("b", "a"),
            ]
        );
    }

    #[test]
    fn test_differs_from_ignores_content_and_time() {
        let a = Document::new("src", "x", "X", "crc1");
        let mut b = a.clone().with_content(Environment::default());
        b.last_modified = Utc::now();
        assert!(!a.differs_from(&b));

        b.checksum = "crc2".to_string();
        assert!(a.differs_from(&b));
    }

    #[test]
    fn test_source_validation() {
        assert!(Source::new("local", "/data/shells", SourceKind::FileSystem)
            .validate()
            .is_ok());
        assert!(Source::new("local", "file:///data", SourceKind::FileSystem)
            .validate()
            .is_ok());
        assert!(Source::new("local", "relative/dir", SourceKind::FileSystem)
            .validate()
            .is_err());
        assert!(Source::new("api", "https://repo.example.com", SourceKind::Http)
            .validate()
            .is_ok());
        assert!(Source::new("api", "ftp://repo", SourceKind::Http)
            .validate()
            .is_err());
        assert!(Source::new("plc", "opc.tcp://10.0.0.1:4840", SourceKind::OpcUa)
            .validate()
            .is_ok());
        assert!(Source::new(" ", "/data", SourceKind::FileSystem)
            .validate()
            .is_err());
    }

    #[test]
    fn test_local_path_strips_scheme() {
        let source = Source::new("local", "file:///data/shells", SourceKind::FileSystem);
        assert_eq!(
            source.local_path(),
            Some(std::path::PathBuf::from("/data/shells"))
        );
        let http = Source::new("api", "http://host", SourceKind::Http);
        assert_eq!(http.local_path(), None);
    }

    #[test]
    fn test_cursor_direction() {
        assert!(Cursor::first(10).is_forward());
        assert!(Cursor::next(DocKey::new("a", "b"), 10).is_forward());
        assert!(!Cursor::previous(DocKey::new("a", "b"), 10).is_forward());
        assert!(!Cursor::last(10).is_forward());
    }

    #[test]
    fn test_document_json_omits_absent_content() {
        let doc = Document::new("src", "urn:x", "X", "crc");
        let json = serde_json::to_string(&doc).unwrap();
        assert!(!json.contains("content"));
        let parsed: Document = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, doc);
    }
}
