//! Synchronous SQLite store behind the document index.
//!
//! Every mutation runs in its own transaction: either the document row and
//! its element rows are written together, or nothing is.

use crate::filter::{CompiledFilter, Filter};
use crate::IndexError;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use rusqlite::types::{Type, Value};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};
use shellhub_core::{
    Cursor, Direction, DocKey, Document, ElementValue, Environment, Page, Source, SourceKind,
};
use std::path::Path;
use tracing::debug;

const DOCUMENT_COLUMNS: &str = "d.source, d.id, d.id_short, d.asset_id, d.checksum, \
     d.last_modified, d.address, d.read_only, d.online, d.thumbnail";

/// Strictly-after and strictly-before keyset predicates on (source, id).
const AFTER_KEY: &str = "(d.source > ? OR (d.source = ? AND d.id > ?))";
const BEFORE_KEY: &str = "(d.source < ? OR (d.source = ? AND d.id < ?))";

/// SQLite-backed store of sources, documents and flattened elements.
pub struct Store {
    conn: Mutex<Connection>,
}

impl Store {
    /// Open (or create) a store backed by a file on disk.
    pub fn open(path: &Path) -> Result<Self, IndexError> {
        let conn = Connection::open(path)?;
        crate::schema::initialize(&conn)?;
        debug!(path = %path.display(), "Opened index database");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory store.
    pub fn open_in_memory() -> Result<Self, IndexError> {
        let conn = Connection::open_in_memory()?;
        crate::schema::initialize(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Run `f` inside a transaction, rolling back if it fails.
    fn write<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, IndexError>,
    ) -> Result<T, IndexError> {
        let conn = self.conn.lock();
        let tx = conn.unchecked_transaction()?;
        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                let _ = tx.rollback();
                Err(e)
            }
        }
    }

    // ---- sources ----

    pub fn list_endpoints(&self) -> Result<Vec<Source>, IndexError> {
        let conn = self.conn.lock();
        let mut stmt =
            conn.prepare("SELECT name, url, kind, version FROM sources ORDER BY name")?;
        let sources = stmt
            .query_map([], source_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(sources)
    }

    pub fn get_endpoint(&self, name: &str) -> Result<Option<Source>, IndexError> {
        let conn = self.conn.lock();
        let source = conn
            .query_row(
                "SELECT name, url, kind, version FROM sources WHERE name = ?1",
                params![name],
                source_from_row,
            )
            .optional()?;
        Ok(source)
    }

    /// Store a source. Returns `false` if one with that name already exists.
    pub fn add_endpoint(&self, source: &Source) -> Result<bool, IndexError> {
        source.validate()?;
        self.write(|conn| insert_source(conn, source))
    }

    /// Remove a source together with all of its documents and elements.
    pub fn remove_endpoint(&self, name: &str) -> Result<bool, IndexError> {
        self.write(|conn| {
            let documents = conn.execute("DELETE FROM documents WHERE source = ?1", params![name])?;
            let removed = conn.execute("DELETE FROM sources WHERE name = ?1", params![name])?;
            debug!(source = name, documents, "Removed endpoint");
            Ok(removed > 0)
        })
    }

    /// Insert `defaults` into an index that has no sources yet.
    pub fn seed(&self, defaults: &[Source]) -> Result<usize, IndexError> {
        self.write(|conn| {
            let existing: i64 = conn.query_row("SELECT COUNT(*) FROM sources", [], |r| r.get(0))?;
            if existing > 0 {
                return Ok(0);
            }
            let mut seeded = 0;
            for source in defaults {
                if insert_source(conn, source)? {
                    seeded += 1;
                }
            }
            Ok(seeded)
        })
    }

    /// Delete every document, element and source, then re-seed `defaults`.
    pub fn reset(&self, defaults: &[Source]) -> Result<(), IndexError> {
        self.write(|conn| {
            conn.execute_batch(
                "DELETE FROM elements; DELETE FROM documents; DELETE FROM sources;",
            )?;
            for source in defaults {
                insert_source(conn, source)?;
            }
            Ok(())
        })
    }

    // ---- documents ----

    /// Insert a document, or overwrite the existing one with the same key.
    ///
    /// Returns `true` if the key was not present before.
    pub fn add(&self, document: &Document) -> Result<bool, IndexError> {
        self.write(|conn| upsert_document(conn, document))
    }

    /// Update a document in place. Returns `true` if the key existed.
    ///
    /// An update for an unknown key inserts it, so replayed events converge.
    pub fn update(&self, document: &Document) -> Result<bool, IndexError> {
        self.write(|conn| upsert_document(conn, document).map(|inserted| !inserted))
    }

    pub fn remove(&self, source: &str, id: &str) -> Result<bool, IndexError> {
        self.write(|conn| {
            let removed = conn.execute(
                "DELETE FROM documents WHERE source = ?1 AND id = ?2",
                params![source, id],
            )?;
            Ok(removed > 0)
        })
    }

    pub fn get(&self, source: &str, id: &str) -> Result<Option<Document>, IndexError> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents d WHERE d.source = ?1 AND d.id = ?2"
        );
        let document = conn
            .query_row(&sql, params![source, id], document_from_row)
            .optional()?;
        Ok(document)
    }

    /// Match `id_or_asset_id` against ids and asset ids, optionally within
    /// one source. Id matches win over asset id matches, then key order.
    pub fn find(
        &self,
        source: Option<&str>,
        id_or_asset_id: &str,
    ) -> Result<Option<Document>, IndexError> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents d \
             WHERE (?1 IS NULL OR d.source = ?1) AND (d.id = ?2 OR d.asset_id = ?2) \
             ORDER BY (d.id = ?2) DESC, d.source, d.id LIMIT 1"
        );
        let document = conn
            .query_row(&sql, params![source, id_or_asset_id], document_from_row)
            .optional()?;
        Ok(document)
    }

    pub fn count(&self, source: Option<&str>) -> Result<usize, IndexError> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM documents WHERE (?1 IS NULL OR source = ?1)",
            params![source],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }

    /// Every document of one source, in id order.
    pub fn container_documents(&self, source: &str) -> Result<Vec<Document>, IndexError> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {DOCUMENT_COLUMNS} FROM documents d WHERE d.source = ?1 ORDER BY d.id"
        );
        let mut stmt = conn.prepare(&sql)?;
        let documents = stmt
            .query_map(params![source], document_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(documents)
    }

    // ---- paging ----

    /// One page of documents in (source, id) order.
    ///
    /// The paging side is decided by fetching `limit + 1` rows; the other
    /// side by an `EXISTS` query. Callers clamp `cursor.limit` to the
    /// configured bounds; any value is safe here.
    pub fn page(
        &self,
        cursor: &Cursor,
        filter: Option<&Filter>,
        language: Option<&str>,
    ) -> Result<Page, IndexError> {
        let compiled = CompiledFilter::compile(filter, language);
        let limit = cursor.limit.max(1);
        let conn = self.conn.lock();

        let pivot = match (cursor.direction, &cursor.key) {
            (Direction::Next, Some(key)) => Some((AFTER_KEY, key)),
            (Direction::Previous, Some(key)) => Some((BEFORE_KEY, key)),
            _ => None,
        };
        let forward = cursor.is_forward();

        let mut items = select_page(&conn, &compiled, pivot, forward, limit.saturating_add(1))?;
        let more = items.len() > limit;
        items.truncate(limit);
        if !forward {
            items.reverse();
        }

        let (Some(first), Some(last)) = (items.first(), items.last()) else {
            return empty_page(&conn, &compiled, cursor, limit);
        };

        let (previous, next) = if forward {
            let previous = cursor.direction == Direction::Next
                && exists_beyond(&conn, &compiled, BEFORE_KEY, &first.key())?;
            (previous, more)
        } else {
            let next = cursor.direction == Direction::Previous
                && exists_beyond(&conn, &compiled, AFTER_KEY, &last.key())?;
            (more, next)
        };

        let previous = previous.then(|| Cursor::previous(first.key(), limit));
        let next = next.then(|| Cursor::next(last.key(), limit));
        Ok(Page {
            previous,
            items,
            next,
        })
    }
}

/// A page past either end keeps a way back to the nearest non-empty page.
fn empty_page(
    conn: &Connection,
    compiled: &CompiledFilter,
    cursor: &Cursor,
    limit: usize,
) -> Result<Page, IndexError> {
    let any = !select_page(conn, compiled, None, true, 1)?.is_empty();
    let page = match cursor.direction {
        Direction::Next if any => Page {
            previous: Some(Cursor::last(limit)),
            ..Default::default()
        },
        Direction::Previous if any => Page {
            next: Some(Cursor::first(limit)),
            ..Default::default()
        },
        _ => Page::default(),
    };
    Ok(page)
}

fn select_page(
    conn: &Connection,
    compiled: &CompiledFilter,
    pivot: Option<(&str, &DocKey)>,
    ascending: bool,
    fetch: usize,
) -> Result<Vec<Document>, IndexError> {
    let mut params: Vec<Value> = Vec::new();
    let keyset = match pivot {
        Some((predicate, key)) => {
            push_key(&mut params, key);
            predicate
        }
        None => "1",
    };
    params.extend(compiled.params.iter().cloned());
    params.push(Value::Integer(i64::try_from(fetch).unwrap_or(i64::MAX)));

    let order = if ascending { "ASC" } else { "DESC" };
    let sql = format!(
        "SELECT {DOCUMENT_COLUMNS} FROM documents d WHERE {keyset} AND ({}) \
         ORDER BY d.source {order}, d.id {order} LIMIT ?",
        compiled.sql
    );
    let mut stmt = conn.prepare(&sql)?;
    let documents = stmt
        .query_map(params_from_iter(params.iter()), document_from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(documents)
}

fn exists_beyond(
    conn: &Connection,
    compiled: &CompiledFilter,
    predicate: &str,
    key: &DocKey,
) -> Result<bool, IndexError> {
    let mut params: Vec<Value> = Vec::new();
    push_key(&mut params, key);
    params.extend(compiled.params.iter().cloned());

    let sql = format!(
        "SELECT EXISTS (SELECT 1 FROM documents d WHERE {predicate} AND ({}))",
        compiled.sql
    );
    let exists: bool = conn.query_row(&sql, params_from_iter(params.iter()), |row| row.get(0))?;
    Ok(exists)
}

fn push_key(params: &mut Vec<Value>, key: &DocKey) {
    params.push(Value::Text(key.source.clone()));
    params.push(Value::Text(key.source.clone()));
    params.push(Value::Text(key.id.clone()));
}

fn insert_source(conn: &Connection, source: &Source) -> Result<bool, IndexError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO sources (name, url, kind, version) VALUES (?1, ?2, ?3, ?4)",
        params![
            source.name,
            source.url,
            source.kind.to_string(),
            source.version
        ],
    )?;
    Ok(inserted > 0)
}

/// Write the document row, refreshing its elements when content is loaded.
///
/// Without content, elements are kept for an unchanged checksum and dropped
/// otherwise, so filters never match a revision the index no longer holds.
fn upsert_document(conn: &Connection, document: &Document) -> Result<bool, IndexError> {
    let existing: Option<(i64, String)> = conn
        .query_row(
            "SELECT uid, checksum FROM documents WHERE source = ?1 AND id = ?2",
            params![document.source, document.id],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;

    let uid: i64 = conn.query_row(
        "INSERT INTO documents (source, id, id_short, asset_id, checksum, last_modified, \
                                address, read_only, online, thumbnail) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10) \
         ON CONFLICT (source, id) DO UPDATE SET \
             id_short = excluded.id_short, asset_id = excluded.asset_id, \
             checksum = excluded.checksum, last_modified = excluded.last_modified, \
             address = excluded.address, read_only = excluded.read_only, \
             online = excluded.online, thumbnail = excluded.thumbnail \
         RETURNING uid",
        params![
            document.source,
            document.id,
            document.id_short,
            document.asset_id,
            document.checksum,
            document.last_modified.to_rfc3339(),
            document.address,
            document.read_only,
            document.online,
            document.thumbnail,
        ],
        |row| row.get(0),
    )?;

    match (&document.content, &existing) {
        (Some(content), _) => {
            conn.execute("DELETE FROM elements WHERE doc_uid = ?1", params![uid])?;
            insert_elements(conn, uid, content)?;
        }
        (None, Some((_, checksum))) if *checksum != document.checksum => {
            conn.execute("DELETE FROM elements WHERE doc_uid = ?1", params![uid])?;
        }
        _ => {}
    }

    Ok(existing.is_none())
}

fn insert_elements(conn: &Connection, uid: i64, content: &Environment) -> Result<(), IndexError> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO elements (doc_uid, submodel_id, model_type, id_short, path, semantic_id, \
                               lang, s_value, n_value, i_value, b_value, d_value) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
    )?;

    for entry in content.flatten() {
        let element = entry.item.element;
        let semantic_id = element
            .semantic_id()
            .and_then(|r| r.first_key())
            .map(|k| k.value.as_str());
        let mut values = entry.item.values().into_iter().map(Some).collect::<Vec<_>>();
        if values.is_empty() {
            values.push(None);
        }

        for value in values {
            let row = ElementRow::from(value);
            stmt.execute(params![
                uid,
                entry.item.submodel.id,
                element.kind().as_str(),
                element.id_short(),
                entry.path,
                semantic_id,
                row.lang,
                row.s_value,
                row.n_value,
                row.i_value,
                row.b_value,
                row.d_value,
            ])?;
        }
    }
    Ok(())
}

/// Typed columns of one element row.
#[derive(Default)]
struct ElementRow {
    lang: Option<String>,
    s_value: Option<String>,
    n_value: Option<f64>,
    i_value: Option<i64>,
    b_value: Option<bool>,
    d_value: Option<String>,
}

impl From<Option<ElementValue>> for ElementRow {
    fn from(value: Option<ElementValue>) -> Self {
        let Some(value) = value else {
            return Self::default();
        };
        match value {
            ElementValue::Text(s) => Self {
                s_value: Some(s),
                ..Default::default()
            },
            ElementValue::LangText { language, text } => Self {
                lang: Some(language),
                s_value: Some(text),
                ..Default::default()
            },
            ElementValue::Integer(i) => Self {
                n_value: Some(i as f64),
                i_value: Some(i),
                ..Default::default()
            },
            ElementValue::Number(n) => Self {
                n_value: Some(n),
                ..Default::default()
            },
            ElementValue::Boolean(b) => Self {
                b_value: Some(b),
                ..Default::default()
            },
            ElementValue::Date(d) => Self {
                d_value: Some(d),
                ..Default::default()
            },
        }
    }
}

fn source_from_row(row: &Row<'_>) -> rusqlite::Result<Source> {
    let kind: String = row.get(2)?;
    let kind = parse_kind(&kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            Type::Text,
            format!("unknown source kind '{kind}'").into(),
        )
    })?;
    Ok(Source {
        name: row.get(0)?,
        url: row.get(1)?,
        kind,
        version: row.get(3)?,
    })
}

fn parse_kind(kind: &str) -> Option<SourceKind> {
    match kind {
        "file_system" => Some(SourceKind::FileSystem),
        "http" => Some(SourceKind::Http),
        "opc_ua" => Some(SourceKind::OpcUa),
        _ => None,
    }
}

fn document_from_row(row: &Row<'_>) -> rusqlite::Result<Document> {
    let last_modified: String = row.get(5)?;
    let last_modified = DateTime::parse_from_rfc3339(&last_modified)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(5, Type::Text, Box::new(e)))?;

    Ok(Document {
        source: row.get(0)?,
        id: row.get(1)?,
        id_short: row.get(2)?,
        asset_id: row.get(3)?,
        checksum: row.get(4)?,
        last_modified,
        address: row.get(6)?,
        read_only: row.get(7)?,
        online: row.get(8)?,
        thumbnail: row.get(9)?,
        content: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{DocField, ElementPredicate, TextOp, ValuePredicate};
    use shellhub_core::content::{DataType, Property, Submodel, SubmodelElement};

    fn store_with(keys: &[(&str, &str)]) -> Store {
        let store = Store::open_in_memory().unwrap();
        for (source, id) in keys {
            store
                .add(&Document::new(*source, *id, id.to_uppercase(), "crc"))
                .unwrap();
        }
        store
    }

    fn ids(page: &Page) -> Vec<String> {
        page.items.iter().map(|d| d.key().to_string()).collect()
    }

    fn content(value: &str) -> Environment {
        Environment {
            shells: vec![],
            submodels: vec![Submodel {
                id: "urn:sm".to_string(),
                id_short: Some("Nameplate".to_string()),
                semantic_id: None,
                submodel_elements: vec![SubmodelElement::Property(Property {
                    id_short: Some("Manufacturer".to_string()),
                    semantic_id: None,
                    value_type: DataType::String,
                    value: Some(value.to_string()),
                })],
            }],
        }
    }

    #[test]
    fn test_endpoint_crud() {
        let store = Store::open_in_memory().unwrap();
        let source = Source::new("A", "/data/a", SourceKind::FileSystem);
        assert!(store.add_endpoint(&source).unwrap());
        assert!(!store.add_endpoint(&source).unwrap());
        assert_eq!(store.get_endpoint("A").unwrap(), Some(source.clone()));
        assert_eq!(store.list_endpoints().unwrap(), vec![source]);
        assert!(store.remove_endpoint("A").unwrap());
        assert!(!store.remove_endpoint("A").unwrap());
        assert_eq!(store.get_endpoint("A").unwrap(), None);
    }

    #[test]
    fn test_invalid_endpoint_rejected_before_storage() {
        let store = Store::open_in_memory().unwrap();
        let bad = Source::new("bad", "relative", SourceKind::FileSystem);
        assert!(matches!(
            store.add_endpoint(&bad),
            Err(IndexError::Core(_))
        ));
        assert!(store.list_endpoints().unwrap().is_empty());
    }

    #[test]
    fn test_remove_endpoint_cascades() {
        let store = store_with(&[("A", "x"), ("A", "y"), ("B", "z")]);
        store
            .add_endpoint(&Source::new("A", "/a", SourceKind::FileSystem))
            .unwrap();
        store
            .add(&Document::new("A", "w", "W", "crc").with_content(content("ACME")))
            .unwrap();

        store.remove_endpoint("A").unwrap();
        assert_eq!(store.count(Some("A")).unwrap(), 0);
        assert_eq!(store.count(None).unwrap(), 1);

        let conn = store.conn.lock();
        let elements: i64 = conn
            .query_row("SELECT COUNT(*) FROM elements", [], |r| r.get(0))
            .unwrap();
        assert_eq!(elements, 0);
    }

    #[test]
    fn test_add_reports_insert_and_update_reports_existing() {
        let store = Store::open_in_memory().unwrap();
        let doc = Document::new("A", "x", "X", "crc1");
        assert!(store.add(&doc).unwrap());
        assert!(!store.add(&doc).unwrap());

        let changed = Document {
            checksum: "crc2".to_string(),
            ..doc.clone()
        };
        assert!(store.update(&changed).unwrap());
        assert_eq!(store.get("A", "x").unwrap().unwrap().checksum, "crc2");
    }

    #[test]
    fn test_find_by_id_or_asset_id() {
        let store = Store::open_in_memory().unwrap();
        store
            .add(&Document::new("A", "urn:shell:1", "One", "c").with_asset_id("urn:asset:1"))
            .unwrap();
        store
            .add(&Document::new("B", "urn:asset:1", "Other", "c"))
            .unwrap();

        let by_asset = store.find(Some("A"), "urn:asset:1").unwrap().unwrap();
        assert_eq!(by_asset.id, "urn:shell:1");

        // Across sources an id match wins over an asset id match.
        let global = store.find(None, "urn:asset:1").unwrap().unwrap();
        assert_eq!(global.source, "B");

        assert!(store.find(Some("C"), "urn:asset:1").unwrap().is_none());
    }

    #[test]
    fn test_forward_paging_cursors() {
        let store = store_with(&[("A", "a"), ("A", "b"), ("A", "c"), ("B", "a"), ("B", "b")]);

        let first = store.page(&Cursor::first(2), None, None).unwrap();
        assert_eq!(ids(&first), vec!["A/a", "A/b"]);
        assert!(first.previous.is_none());
        let next = first.next.clone().unwrap();
        assert_eq!(next.key, Some(DocKey::new("A", "b")));

        let second = store.page(&next, None, None).unwrap();
        assert_eq!(ids(&second), vec!["A/c", "B/a"]);
        assert_eq!(
            second.previous,
            Some(Cursor::previous(DocKey::new("A", "c"), 2))
        );

        let third = store.page(&second.next.unwrap(), None, None).unwrap();
        assert_eq!(ids(&third), vec!["B/b"]);
        assert!(third.next.is_none());

        let back = store.page(&third.previous.unwrap(), None, None).unwrap();
        assert_eq!(ids(&back), vec!["A/c", "B/a"]);
    }

    #[test]
    fn test_exact_multiple_has_no_dangling_next() {
        let store = store_with(&[("A", "a"), ("A", "b")]);
        let page = store.page(&Cursor::first(2), None, None).unwrap();
        assert_eq!(page.items.len(), 2);
        assert!(page.next.is_none());
    }

    #[test]
    fn test_unbounded_limit_returns_everything() {
        let store = store_with(&[("A", "a"), ("A", "b"), ("B", "c")]);
        let page = store.page(&Cursor::first(usize::MAX), None, None).unwrap();
        assert_eq!(ids(&page), vec!["A/a", "A/b", "B/c"]);
        assert!(page.next.is_none());

        let last = store.page(&Cursor::last(usize::MAX), None, None).unwrap();
        assert_eq!(ids(&last), vec!["A/a", "A/b", "B/c"]);
        assert!(last.previous.is_none());
    }

    #[test]
    fn test_last_page_and_backward() {
        let store = store_with(&[("A", "a"), ("A", "b"), ("A", "c")]);
        let last = store.page(&Cursor::last(2), None, None).unwrap();
        assert_eq!(ids(&last), vec!["A/b", "A/c"]);
        assert!(last.next.is_none());

        let before = store.page(&last.previous.unwrap(), None, None).unwrap();
        assert_eq!(ids(&before), vec!["A/a"]);
        assert!(before.previous.is_none());
        assert_eq!(before.next, Some(Cursor::next(DocKey::new("A", "a"), 2)));
    }

    #[test]
    fn test_empty_pages() {
        let empty = Store::open_in_memory().unwrap();
        assert_eq!(
            empty.page(&Cursor::first(10), None, None).unwrap(),
            Page::default()
        );

        let store = store_with(&[("A", "a")]);
        let past_end = store
            .page(&Cursor::next(DocKey::new("Z", "z"), 5), None, None)
            .unwrap();
        assert!(past_end.items.is_empty());
        assert_eq!(past_end.previous, Some(Cursor::last(5)));
    }

    #[test]
    fn test_filtered_paging_dedupes_element_matches() {
        let store = Store::open_in_memory().unwrap();
        let mut env = content("ACME");
        env.submodels[0]
            .submodel_elements
            .push(SubmodelElement::Property(Property {
                id_short: Some("Brand".to_string()),
                semantic_id: None,
                value_type: DataType::String,
                value: Some("ACME".to_string()),
            }));
        store
            .add(&Document::new("A", "x", "X", "c").with_content(env))
            .unwrap();
        store
            .add(&Document::new("A", "y", "Y", "c").with_content(content("Other")))
            .unwrap();

        let filter = Filter::Element(ElementPredicate {
            value: Some(ValuePredicate::Text {
                op: TextOp::Eq,
                value: "ACME".to_string(),
            }),
            ..Default::default()
        });
        let page = store.page(&Cursor::first(10), Some(&filter), None).unwrap();
        assert_eq!(ids(&page), vec!["A/x"]);

        let by_field = Filter::Field {
            field: DocField::IdShort,
            cmp: TextOp::StartsWith,
            value: "Y".to_string(),
        };
        let page = store.page(&Cursor::first(10), Some(&by_field), None).unwrap();
        assert_eq!(ids(&page), vec!["A/y"]);
    }

    #[test]
    fn test_update_refreshes_elements_with_document() {
        let store = Store::open_in_memory().unwrap();
        store
            .add(&Document::new("A", "x", "X", "crc1").with_content(content("Old")))
            .unwrap();
        store
            .update(&Document::new("A", "x", "X", "crc2").with_content(content("New")))
            .unwrap();

        let old = Filter::Text {
            text: "Old".to_string(),
        };
        let new = Filter::Text {
            text: "New".to_string(),
        };
        assert!(store
            .page(&Cursor::first(5), Some(&old), None)
            .unwrap()
            .items
            .is_empty());
        assert_eq!(
            store
                .page(&Cursor::first(5), Some(&new), None)
                .unwrap()
                .items
                .len(),
            1
        );

        // A content-less update with a new checksum drops stale elements.
        store
            .update(&Document::new("A", "x", "X", "crc3"))
            .unwrap();
        assert!(store
            .page(&Cursor::first(5), Some(&new), None)
            .unwrap()
            .items
            .is_empty());
    }

    #[test]
    fn test_reset_reseeds_defaults() {
        let store = store_with(&[("A", "x")]);
        store
            .add_endpoint(&Source::new("A", "/a", SourceKind::FileSystem))
            .unwrap();
        let defaults = vec![Source::new("D", "/d", SourceKind::FileSystem)];

        store.reset(&defaults).unwrap();
        assert_eq!(store.list_endpoints().unwrap(), defaults);
        assert_eq!(store.count(None).unwrap(), 0);
    }

    #[test]
    fn test_seed_only_into_empty_index() {
        let store = Store::open_in_memory().unwrap();
        let defaults = vec![Source::new("D", "/d", SourceKind::FileSystem)];
        assert_eq!(store.seed(&defaults).unwrap(), 1);
        assert_eq!(
            store
                .seed(&[Source::new("E", "/e", SourceKind::FileSystem)])
                .unwrap(),
            0
        );
        assert_eq!(store.list_endpoints().unwrap().len(), 1);
    }
}
