//! Table layout and connection setup.

use rusqlite::Connection;

/// Applied to every connection before use.
const PRAGMAS: &str = "
    PRAGMA journal_mode = WAL;
    PRAGMA synchronous = NORMAL;
    PRAGMA busy_timeout = 5000;
    PRAGMA foreign_keys = ON;
";

/// Documents are keyed by (source, id) with a synthetic `uid` that the
/// element view hangs off. Elements carry one typed column per value class
/// so filters never need to deserialize content.
const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS sources (
        name    TEXT PRIMARY KEY NOT NULL,
        url     TEXT NOT NULL,
        kind    TEXT NOT NULL,
        version TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS documents (
        uid           INTEGER PRIMARY KEY AUTOINCREMENT,
        source        TEXT NOT NULL,
        id            TEXT NOT NULL,
        id_short      TEXT NOT NULL,
        asset_id      TEXT,
        checksum      TEXT NOT NULL,
        last_modified TEXT NOT NULL,
        address       TEXT NOT NULL,
        read_only     INTEGER NOT NULL DEFAULT 0,
        online        INTEGER NOT NULL DEFAULT 0,
        thumbnail     TEXT,
        UNIQUE (source, id)
    );

    CREATE INDEX IF NOT EXISTS idx_documents_asset_id ON documents (asset_id);

    CREATE TABLE IF NOT EXISTS elements (
        doc_uid      INTEGER NOT NULL REFERENCES documents (uid) ON DELETE CASCADE,
        submodel_id  TEXT NOT NULL,
        model_type   TEXT NOT NULL,
        id_short     TEXT,
        path         TEXT NOT NULL,
        semantic_id  TEXT,
        lang         TEXT,
        s_value      TEXT,
        n_value      REAL,
        i_value      INTEGER,
        b_value      INTEGER,
        d_value      TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_elements_doc ON elements (doc_uid);
    CREATE INDEX IF NOT EXISTS idx_elements_semantic_id ON elements (semantic_id);
";

/// Configure a freshly opened connection and create missing tables.
pub fn initialize(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(PRAGMAS)?;
    conn.execute_batch(SCHEMA)
}
