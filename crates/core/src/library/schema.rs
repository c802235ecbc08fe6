//! Database schema and version check.

use std::path::Path;

use rusqlite::{Connection, OptionalExtension};

use super::error::LibraryError;

/// Version written to `db_meta` on creation and required on open.
pub const SCHEMA_VERSION: i64 = 1;

pub(crate) const SCHEMA_SQL: &str = r#"
CREATE TABLE db_meta (
    id INTEGER PRIMARY KEY,
    version INTEGER NOT NULL
);

CREATE TABLE workplaces (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE items (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    workplace_id INTEGER REFERENCES workplaces(id) ON DELETE CASCADE,
    md5 TEXT NOT NULL,
    path TEXT,
    source TEXT,
    name TEXT,
    format TEXT,
    format_subtype TEXT,
    sample_rate INTEGER,
    channels INTEGER,
    duration REAL,
    peak_level REAL
);

CREATE UNIQUE INDEX idx_items_library_md5 ON items(md5) WHERE workplace_id IS NULL;
CREATE INDEX idx_items_name ON items(name);

CREATE TABLE tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE,
    item_count INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE item_tags (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    tag_id INTEGER NOT NULL REFERENCES tags(id) ON DELETE CASCADE,
    UNIQUE(item_id, tag_id)
);

CREATE INDEX idx_item_tags_tag ON item_tags(tag_id);

CREATE TABLE custom_keys (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL UNIQUE
);

CREATE TABLE item_custom_values (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id INTEGER NOT NULL REFERENCES items(id) ON DELETE CASCADE,
    key_id INTEGER NOT NULL REFERENCES custom_keys(id) ON DELETE CASCADE,
    value TEXT,
    UNIQUE(item_id, key_id)
);

CREATE VIRTUAL TABLE fts USING fts4(content);

CREATE TRIGGER items_fts_delete AFTER DELETE ON items
BEGIN
    DELETE FROM fts WHERE docid = old.id;
END;
"#;

pub(crate) fn enable_foreign_keys(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")
}

/// Create every table and the initial rows on an empty database.
pub(crate) fn create_schema(conn: &mut Connection) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    tx.execute_batch(SCHEMA_SQL)?;
    tx.execute(
        "INSERT INTO db_meta (id, version) VALUES (1, ?)",
        [SCHEMA_VERSION],
    )?;
    tx.execute(
        "INSERT INTO tags (name, item_count) VALUES ('/', 0)",
        [],
    )?;
    tx.commit()
}

/// Read `db_meta` and compare with [`SCHEMA_VERSION`].
pub(crate) fn check_version(conn: &Connection, path: &Path) -> Result<(), LibraryError> {
    let version: Option<i64> = conn
        .query_row("SELECT version FROM db_meta WHERE id = 1", [], |row| row.get(0))
        .optional()
        .map_err(|e| LibraryError::invalid_database(path, e))?;
    match version {
        None => Err(LibraryError::invalid_database(path, "no db_meta data")),
        Some(found) if found != SCHEMA_VERSION => Err(LibraryError::VersionMismatch {
            found,
            expected: SCHEMA_VERSION,
        }),
        Some(_) => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh() -> Connection {
        let mut conn = Connection::open_in_memory().unwrap();
        enable_foreign_keys(&conn).unwrap();
        create_schema(&mut conn).unwrap();
        conn
    }

    #[test]
    fn test_fresh_schema_passes_version_check() {
        let conn = fresh();
        check_version(&conn, Path::new(":memory:")).unwrap();
        let root_count: i64 = conn
            .query_row("SELECT item_count FROM tags WHERE name = '/'", [], |r| r.get(0))
            .unwrap();
        assert_eq!(root_count, 0);
    }

    #[test]
    fn test_version_mismatch() {
        let conn = fresh();
        conn.execute("UPDATE db_meta SET version = 99", []).unwrap();
        assert!(matches!(
            check_version(&conn, Path::new(":memory:")),
            Err(LibraryError::VersionMismatch { found: 99, expected: SCHEMA_VERSION })
        ));
    }

    #[test]
    fn test_missing_meta() {
        let conn = Connection::open_in_memory().unwrap();
        assert!(matches!(
            check_version(&conn, Path::new(":memory:")),
            Err(LibraryError::InvalidDatabase { .. })
        ));
        conn.execute_batch("CREATE TABLE db_meta (id INTEGER PRIMARY KEY, version INTEGER)")
            .unwrap();
        assert!(matches!(
            check_version(&conn, Path::new(":memory:")),
            Err(LibraryError::InvalidDatabase { .. })
        ));
    }

    #[test]
    fn test_fts_row_follows_item_delete() {
        let conn = fresh();
        conn.execute("INSERT INTO items (md5, name) VALUES ('abc', 'x')", [])
            .unwrap();
        let id = conn.last_insert_rowid();
        conn.execute(
            "INSERT INTO fts (docid, content) VALUES (?, 'x ~~~')",
            [id],
        )
        .unwrap();
        conn.execute("DELETE FROM items WHERE id = ?", [id]).unwrap();
        let left: i64 = conn
            .query_row("SELECT COUNT(*) FROM fts", [], |r| r.get(0))
            .unwrap();
        assert_eq!(left, 0);
    }

    #[test]
    fn test_library_md5_is_unique() {
        let conn = fresh();
        conn.execute("INSERT INTO items (md5) VALUES ('abc')", []).unwrap();
        assert!(conn.execute("INSERT INTO items (md5) VALUES ('abc')", []).is_err());
    }
}
