//! The on-disk library: database, blob store and temporary exports.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OpenFlags, OptionalExtension, Transaction};
use tracing::{debug, info, warn};

use super::blob::{object_path, pretty_file_name};
use super::cleanup::CleanupScheduler;
use super::error::LibraryError;
use super::schema::{check_version, create_schema, enable_foreign_keys};
use super::types::{ImportConflict, ImportFailure, ImportReport, TagInfo};
use crate::metadata::{expand_tags, leaf_tags, FieldValue, FixedField, Metadata};
use crate::metrics::{IMPORTS_TOTAL, SEARCHES_TOTAL};
use crate::search::{CompletionQuery, SearchQuery, SqlOptions, SqlQuery, FTS_DELIMITER, ROOT_TAG};

/// Database file name inside the library directory.
pub const DATABASE_FILE: &str = "database.db";

/// Prefix of per-instance temporary directories: `tmp.<pid>.<seq>`.
pub const TMP_DIR_PREFIX: &str = "tmp.";

static TMP_SEQ: AtomicU32 = AtomicU32::new(0);

fn field_to_sql(value: Option<FieldValue>) -> Value {
    match value {
        None => Value::Null,
        Some(FieldValue::Integer(i)) => Value::Integer(i),
        Some(FieldValue::Float(x)) => Value::Real(x),
        Some(FieldValue::Text(s)) => Value::Text(s),
    }
}

fn sql_to_field(value: Value) -> Option<FieldValue> {
    match value {
        Value::Integer(i) => Some(FieldValue::Integer(i)),
        Value::Real(x) => Some(FieldValue::Float(x)),
        Value::Text(s) => Some(FieldValue::Text(s)),
        Value::Null | Value::Blob(_) => None,
    }
}

/// Full-text document: `"<value> ~~~"` for every indexable value and tag.
pub fn fts_document(metadata: &Metadata, tags: &BTreeSet<String>) -> String {
    metadata
        .indexable_values()
        .iter()
        .chain(tags.iter())
        .map(|value| format!("{} {}", value, FTS_DELIMITER))
        .collect::<Vec<_>>()
        .join(" ")
}

/// A sample library rooted at one directory.
///
/// Holds the database connection, a private temporary directory for export
/// aliases and the scheduler that cleans those up. Every operation on a
/// closed library returns [`LibraryError::Closed`].
pub struct Library {
    base_path: PathBuf,
    db_path: PathBuf,
    tmp_dir: PathBuf,
    conn: Mutex<Option<Connection>>,
    cleanup: CleanupScheduler,
}

impl Library {
    /// Open the library at `base_path`, creating it when it does not exist.
    pub fn open(base_path: impl AsRef<Path>) -> Result<Self, LibraryError> {
        let base_path = base_path.as_ref().to_path_buf();
        let db_path = base_path.join(DATABASE_FILE);

        let conn = if db_path.exists() {
            Self::open_database(&db_path)?
        } else {
            Self::create_database(&base_path, &db_path)?
        };

        let tmp_dir = base_path.join(format!(
            "{}{}.{}",
            TMP_DIR_PREFIX,
            process::id(),
            TMP_SEQ.fetch_add(1, Ordering::SeqCst)
        ));
        fs::create_dir_all(&tmp_dir).map_err(|e| LibraryError::open(&tmp_dir, e))?;
        let cleanup = CleanupScheduler::new().map_err(|e| LibraryError::open(&db_path, e))?;

        Ok(Self {
            base_path,
            db_path,
            tmp_dir,
            conn: Mutex::new(Some(conn)),
            cleanup,
        })
    }

    fn open_database(db_path: &Path) -> Result<Connection, LibraryError> {
        info!(target: "library", path = %db_path.display(), "Opening database");
        let conn = Connection::open_with_flags(
            db_path,
            OpenFlags::SQLITE_OPEN_READ_WRITE | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| LibraryError::open(db_path, e))?;
        enable_foreign_keys(&conn).map_err(|e| LibraryError::invalid_database(db_path, e))?;
        check_version(&conn, db_path)?;
        Ok(conn)
    }

    fn create_database(base_path: &Path, db_path: &Path) -> Result<Connection, LibraryError> {
        info!(target: "library", path = %db_path.display(), "Creating new database");
        fs::create_dir_all(base_path).map_err(|e| LibraryError::open(base_path, e))?;

        let created = Connection::open(db_path).and_then(|mut conn| {
            enable_foreign_keys(&conn)?;
            create_schema(&mut conn)?;
            Ok(conn)
        });
        created.map_err(|e| {
            for leftover in [db_path.to_path_buf(), db_path.with_extension("db-journal")] {
                if let Err(err) = fs::remove_file(&leftover) {
                    debug!(target: "library", path = %leftover.display(), error = %err, "Nothing to remove");
                }
            }
            LibraryError::open(db_path, e)
        })
    }

    fn lock(&self) -> MutexGuard<'_, Option<Connection>> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` with the open connection.
    pub(crate) fn with_connection<T>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<T, LibraryError>,
    ) -> Result<T, LibraryError> {
        let mut guard = self.lock();
        let conn = guard.as_mut().ok_or(LibraryError::Closed)?;
        f(conn)
    }

    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    pub fn database_path(&self) -> &Path {
        &self.db_path
    }

    pub fn tmp_dir(&self) -> &Path {
        &self.tmp_dir
    }

    pub fn is_closed(&self) -> bool {
        self.lock().is_none()
    }

    /// Number of library items.
    pub fn item_count(&self) -> Result<i64, LibraryError> {
        self.with_connection(|conn| {
            Ok(conn.query_row(
                "SELECT COUNT(*) FROM items WHERE workplace_id IS NULL",
                [],
                |row| row.get(0),
            )?)
        })
    }

    /// Store a new item and return its id.
    ///
    /// With `copy`, the file at the metadata path is copied into the blob
    /// store and the stored path is cleared. The checksum must not be in the
    /// library yet.
    pub fn import_file(&self, metadata: &Metadata, copy: bool) -> Result<i64, LibraryError> {
        let result = self.import_one(metadata, copy);
        let label = match &result {
            Ok(_) => "imported",
            Err(LibraryError::Conflict { .. }) => "conflict",
            Err(_) => "failed",
        };
        IMPORTS_TOTAL.with_label_values(&[label]).inc();
        result
    }

    fn import_one(&self, metadata: &Metadata, copy: bool) -> Result<i64, LibraryError> {
        let md5 = metadata
            .md5()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LibraryError::InvalidItem("md5 is required for import".into()))?;
        let path = metadata
            .path()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LibraryError::InvalidItem("path is required for import".into()))?;

        self.with_connection(|conn| {
            let tx = conn.transaction()?;

            let existing: Option<Option<String>> = tx
                .query_row(
                    "SELECT name FROM items WHERE md5 = ? AND workplace_id IS NULL LIMIT 1",
                    [md5],
                    |row| row.get(0),
                )
                .optional()?;
            if let Some(existing_name) = existing {
                return Err(LibraryError::Conflict {
                    md5: md5.to_string(),
                    existing_name: existing_name.unwrap_or_default(),
                });
            }

            let mut record = metadata.clone();
            record.set_source(Some(format!("file:{}", path)));
            if copy {
                record.set_path(None);
            }

            let item_id = insert_item(&tx, &record)?;
            let tags = expand_tags(metadata.tags());
            insert_tags(&tx, item_id, &tags)?;
            insert_custom_values(&tx, item_id, &record)?;
            tx.execute(
                "INSERT INTO fts (docid, content) VALUES (?, ?)",
                params![item_id, fts_document(&record, &tags)],
            )?;

            let blob = if copy {
                let target = object_path(&self.base_path, md5, record.format());
                if let Some(parent) = target.parent() {
                    fs::create_dir_all(parent)?;
                }
                if let Err(e) = fs::copy(path, &target) {
                    remove_blob(&target);
                    return Err(e.into());
                }
                Some(target)
            } else {
                None
            };

            if let Err(e) = tx.commit() {
                if let Some(blob) = blob {
                    remove_blob(&blob);
                }
                return Err(e.into());
            }

            info!(target: "library", item_id, %md5, %path, "Imported file");
            Ok(item_id)
        })
    }

    /// Import many items, continuing past conflicts and per-file failures.
    ///
    /// Only a closed library or a fatal error stops the batch.
    pub fn import_files<I>(&self, items: I, copy: bool) -> Result<ImportReport, LibraryError>
    where
        I: IntoIterator<Item = Metadata>,
    {
        let mut report = ImportReport::default();
        for metadata in items {
            let path = metadata.path().unwrap_or_default().to_string();
            match self.import_file(&metadata, copy) {
                Ok(id) => report.imported.push((path, id)),
                Err(LibraryError::Conflict { md5, existing_name }) => {
                    warn!(target: "library", %path, %md5, %existing_name, "Already in library, skipping");
                    report.conflicts.push(ImportConflict {
                        path,
                        md5,
                        existing_name,
                    });
                }
                Err(e) if e.is_fatal() || matches!(e, LibraryError::Closed) => return Err(e),
                Err(e) => {
                    warn!(target: "library", %path, error = %e, "Import failed, skipping");
                    report.failed.push(ImportFailure {
                        path,
                        reason: e.to_string(),
                    });
                }
            }
        }
        Ok(report)
    }

    /// Items matching `query`.
    pub fn get_items(
        &self,
        query: &SearchQuery,
        options: &SqlOptions,
    ) -> Result<Vec<Metadata>, LibraryError> {
        SEARCHES_TOTAL.with_label_values(&["items"]).inc();
        self.fetch_items(&query.as_sql(options))
    }

    /// Items from a raw statement selecting the default item columns.
    pub fn get_items_sql(&self, query: &SqlQuery) -> Result<Vec<Metadata>, LibraryError> {
        SEARCHES_TOTAL.with_label_values(&["raw"]).inc();
        self.fetch_items(query)
    }

    fn fetch_items(&self, query: &SqlQuery) -> Result<Vec<Metadata>, LibraryError> {
        debug!(target: "library", sql = %query.sql, "Running query");
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&query.sql)?;
            let rows = stmt.query_map(params_from_iter(query.params.iter()), |row| {
                let id: i64 = row.get(0)?;
                let mut metadata = Metadata::new();
                for (i, field) in FixedField::ALL.into_iter().enumerate() {
                    metadata.set(field, sql_to_field(row.get(i + 2)?));
                }
                Ok((id, metadata))
            })?;
            let items = rows.collect::<Result<Vec<_>, _>>()?;

            let mut tag_stmt = conn.prepare(
                "SELECT t.name FROM item_tags it JOIN tags t ON t.id = it.tag_id \
                 WHERE it.item_id = ?",
            )?;
            let mut custom_stmt = conn.prepare(
                "SELECT ck.name, icv.value FROM item_custom_values icv \
                 JOIN custom_keys ck ON ck.id = icv.key_id WHERE icv.item_id = ?",
            )?;

            let mut result = Vec::with_capacity(items.len());
            for (id, mut metadata) in items {
                let tags = tag_stmt
                    .query_map([id], |row| row.get::<_, String>(0))?
                    .collect::<Result<BTreeSet<_>, _>>()?;
                metadata.set_tags(leaf_tags(&tags));

                let values = custom_stmt.query_map([id], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
                })?;
                for value in values {
                    let (key, value) = value?;
                    metadata.set_custom(&key, value.unwrap_or_default());
                }
                result.push(metadata);
            }
            Ok(result)
        })
    }

    /// Completion suggestions for the partial word in `query`.
    pub fn get_completions(
        &self,
        query: &CompletionQuery,
        limit: usize,
    ) -> Result<Vec<String>, LibraryError> {
        SEARCHES_TOTAL.with_label_values(&["completions"]).inc();
        let sql = query.as_sql(&SqlOptions::default().with_limit(limit));
        debug!(target: "library", sql = %sql.sql, "Running completion query");
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(&sql.sql)?;
            let rows = stmt
                .query_map(params_from_iter(sql.params.iter()), |row| {
                    Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(query.collect(rows.iter().map(|(o, c)| (o.as_str(), c.as_str()))))
        })
    }

    /// All tags with their item counts, by name. Includes `/`.
    pub fn get_tags(&self) -> Result<Vec<TagInfo>, LibraryError> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare("SELECT name, item_count FROM tags ORDER BY name")?;
            let tags = stmt
                .query_map([], |row| {
                    Ok(TagInfo {
                        name: row.get(0)?,
                        item_count: row.get(1)?,
                    })
                })?
                .collect::<Result<Vec<_>, _>>()?;
            Ok(tags)
        })
    }

    /// Blob path of an item.
    pub fn get_library_object_path(&self, metadata: &Metadata) -> Result<PathBuf, LibraryError> {
        let md5 = metadata
            .md5()
            .filter(|s| !s.is_empty())
            .ok_or_else(|| LibraryError::InvalidItem("md5 is required".into()))?;
        Ok(object_path(&self.base_path, md5, metadata.format()))
    }

    /// A temporary, human-readable alias of the blob, removed after `timeout`.
    ///
    /// The alias is a hard link when possible and a copy otherwise. Asking
    /// again for the same item reuses the alias and restarts its timer.
    pub fn get_pretty_path(
        &self,
        metadata: &Metadata,
        timeout: Duration,
    ) -> Result<PathBuf, LibraryError> {
        if self.is_closed() {
            return Err(LibraryError::Closed);
        }
        let source = self.get_library_object_path(metadata)?;
        let md5 = metadata.md5().unwrap_or_default();
        let dir = self.tmp_dir.join(md5);
        let alias = dir.join(pretty_file_name(metadata.name(), md5, metadata.format()));

        self.cleanup.schedule(alias.clone(), timeout);
        if alias.exists() {
            return Ok(alias);
        }

        fs::create_dir_all(&dir)?;
        if let Err(e) = fs::hard_link(&source, &alias) {
            debug!(target: "library", error = %e, "Hard link failed, copying");
            fs::copy(&source, &alias)?;
        }
        Ok(alias)
    }

    /// Release the database and remove the temporary directory.
    ///
    /// Closing twice is a no-op.
    pub fn close(&self) {
        let Some(conn) = self.lock().take() else {
            return;
        };
        self.cleanup.shutdown();
        if let Err((_, e)) = conn.close() {
            warn!(target: "library", error = %e, "Error closing database");
        }
        if let Err(e) = fs::remove_dir_all(&self.tmp_dir) {
            warn!(target: "library", path = %self.tmp_dir.display(), error = %e, "Cannot remove temporary directory");
        }
        info!(target: "library", path = %self.base_path.display(), "Library closed");
    }
}

impl Drop for Library {
    fn drop(&mut self) {
        self.close();
    }
}

/// Drop a blob written by an import that did not complete.
fn remove_blob(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => debug!(target: "library", path = %path.display(), "Removed partial blob"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            warn!(target: "library", path = %path.display(), error = %err, "Cannot remove blob")
        }
    }
}

fn insert_item(tx: &Transaction<'_>, record: &Metadata) -> Result<i64, LibraryError> {
    let columns: Vec<&str> = FixedField::ALL.iter().map(|f| f.name()).collect();
    let sql = format!(
        "INSERT INTO items ({}) VALUES ({})",
        columns.join(", "),
        vec!["?"; columns.len()].join(", ")
    );
    let values: Vec<Value> = FixedField::ALL
        .iter()
        .map(|f| field_to_sql(record.get(*f)))
        .collect();
    tx.execute(&sql, params_from_iter(values))?;
    Ok(tx.last_insert_rowid())
}

/// Link `tags` to the item and bump their counters, plus the `/` counter.
fn insert_tags(tx: &Transaction<'_>, item_id: i64, tags: &BTreeSet<String>) -> Result<(), LibraryError> {
    let mut upsert = tx.prepare(
        "INSERT INTO tags (name, item_count) VALUES (?, 1) \
         ON CONFLICT(name) DO UPDATE SET item_count = item_count + 1 \
         RETURNING id",
    )?;
    let mut link = tx.prepare("INSERT INTO item_tags (item_id, tag_id) VALUES (?, ?)")?;

    upsert.query_row([ROOT_TAG], |row| row.get::<_, i64>(0))?;
    for tag in tags {
        let tag_id: i64 = upsert.query_row([tag], |row| row.get(0))?;
        link.execute([item_id, tag_id])?;
    }
    Ok(())
}

fn insert_custom_values(
    tx: &Transaction<'_>,
    item_id: i64,
    record: &Metadata,
) -> Result<(), LibraryError> {
    let mut upsert = tx.prepare(
        "INSERT INTO custom_keys (name) VALUES (?) \
         ON CONFLICT(name) DO UPDATE SET name = excluded.name \
         RETURNING id",
    )?;
    let mut insert = tx.prepare(
        "INSERT INTO item_custom_values (item_id, key_id, value) VALUES (?, ?, ?)",
    )?;
    for (key, value) in record.custom() {
        let key_id: i64 = upsert.query_row([key], |row| row.get(0))?;
        insert.execute(params![item_id, key_id, value])?;
    }
    Ok(())
}
