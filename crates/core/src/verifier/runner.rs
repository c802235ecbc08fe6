//! The verification run.

use std::collections::HashMap;
use std::fs;
use std::path::Path;
use std::process;

use rusqlite::{params_from_iter, OptionalExtension, Transaction, TransactionBehavior};
use tracing::{debug, error, info, warn};

use super::types::{Answer, Progress, Question, QuestionKind, VerifyObserver, VerifyReport, STAGES};
use crate::analyzer::checksum_file;
use crate::library::{blob_extension, object_path, Library, LibraryError, DATABASE_FILE, TMP_DIR_PREFIX};
use crate::metrics::VERIFIER_ISSUES;
use crate::search::ROOT_TAG;

/// Items deleted per statement.
const DELETE_BATCH: usize = 10;

/// Number of two-level blob directories, used for stage 2 progress.
const BLOB_DIRS: u32 = 0x1000;

/// Item count a tag should have, for use in statements over `tags`.
const ACTUAL_TAG_COUNT: &str = "CASE WHEN tags.name = '/' \
     THEN (SELECT COUNT(*) FROM items WHERE workplace_id IS NULL) \
     ELSE (SELECT COUNT(*) FROM item_tags it JOIN items i ON i.id = it.item_id \
           WHERE it.tag_id = tags.id AND i.workplace_id IS NULL) END";

fn is_lower_hex(name: &str, len: usize) -> bool {
    name.len() == len && name.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

fn is_database_file(name: &str) -> bool {
    name.strip_prefix(DATABASE_FILE)
        .is_some_and(|rest| matches!(rest, "" | "-journal" | "-wal" | "-shm"))
}

/// Process id of a `tmp.<pid>[.<seq>]` directory name.
fn tmp_dir_pid(name: &str) -> Option<u32> {
    let rest = name.strip_prefix(TMP_DIR_PREFIX)?;
    let (pid, seq) = match rest.split_once('.') {
        Some((pid, seq)) => (pid, Some(seq)),
        None => (rest, None),
    };
    if seq.is_some_and(|s| s.is_empty() || !s.chars().all(|c| c.is_ascii_digit())) {
        return None;
    }
    pid.parse().ok()
}

/// Split `<32 hex>.<ext>` into checksum and extension.
fn parse_blob_name(name: &str) -> Option<(&str, &str)> {
    let (md5, ext) = name.split_once('.')?;
    let ext_ok = !ext.is_empty() && ext.chars().all(|c| c.is_alphanumeric() || c == '_');
    (is_lower_hex(md5, 32) && ext_ok).then_some((md5, ext))
}

fn sorted_entries(dir: &Path) -> Result<Vec<fs::DirEntry>, LibraryError> {
    let mut entries = fs::read_dir(dir)?.collect::<Result<Vec<_>, _>>()?;
    entries.sort_by_key(|entry| entry.file_name());
    Ok(entries)
}

/// Observer plumbing and running totals of one run.
struct Session<'o> {
    observer: &'o mut dyn VerifyObserver,
    progress: Progress,
    saved: HashMap<QuestionKind, Answer>,
    report: VerifyReport,
}

impl<'o> Session<'o> {
    fn new(observer: &'o mut dyn VerifyObserver) -> Self {
        Self {
            observer,
            progress: Progress {
                stage: 0,
                stages: STAGES,
                stage_name: "",
                percent: 0,
                error: None,
            },
            saved: HashMap::new(),
            report: VerifyReport::default(),
        }
    }

    fn next_stage(&mut self, name: &'static str) {
        info!(target: "verifier", stage = self.progress.stage + 1, "{}", name);
        self.progress.stage += 1;
        self.progress.stage_name = name;
        self.progress.percent = 0;
        self.progress.error = None;
        self.observer.progress(&self.progress);
    }

    fn set_percent(&mut self, percent: f64) {
        let percent = percent.clamp(0.0, 100.0) as u8;
        if percent > self.progress.percent {
            self.progress.percent = percent;
            self.observer.progress(&self.progress);
        }
    }

    fn report_error(&mut self, kind: &str, message: String) {
        warn!(target: "verifier", "{}", message);
        VERIFIER_ISSUES.with_label_values(&[kind]).inc();
        self.report.issues += 1;
        self.progress.error = Some(message);
        self.observer.progress(&self.progress);
        self.progress.error = None;
    }

    /// Report a problem and ask whether to repair it.
    fn ask(&mut self, kind: QuestionKind, message: String) -> bool {
        warn!(target: "verifier", "{}", message);
        VERIFIER_ISSUES.with_label_values(&[kind.as_str()]).inc();
        self.report.issues += 1;
        self.progress.error = Some(message.clone());
        self.observer.progress(&self.progress);

        let answer = match self.saved.get(&kind) {
            Some(answer) => *answer,
            None => {
                let answer = self.observer.ask(&Question { kind, message });
                if answer.is_saved() {
                    self.saved.insert(kind, answer);
                }
                answer
            }
        };
        debug!(target: "verifier", ?kind, ?answer, "Answered");
        self.progress.error = None;
        answer.is_yes()
    }
}

/// Checks a library for inconsistencies and repairs what the observer agrees to.
pub struct LibraryVerifier<'a> {
    library: &'a Library,
}

impl<'a> LibraryVerifier<'a> {
    pub fn new(library: &'a Library) -> Self {
        Self { library }
    }

    /// Run all stages in one exclusive transaction.
    pub fn verify<O: VerifyObserver>(&self, observer: &mut O) -> Result<VerifyReport, LibraryError> {
        self.library.with_connection(|conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Exclusive)?;
            let mut session = Session::new(observer);
            self.check_items(&tx, &mut session)?;
            self.check_files(&tx, &mut session)?;
            self.check_item_tags(&tx, &mut session)?;
            tx.commit()?;
            info!(target: "verifier", issues = session.report.issues, "Verification finished");
            Ok(session.report)
        })
    }

    fn check_items(&self, tx: &Transaction<'_>, session: &mut Session<'_>) -> Result<(), LibraryError> {
        session.next_stage("Checking items");

        let counter: Option<i64> = tx
            .query_row("SELECT item_count FROM tags WHERE name = ?", [ROOT_TAG], |row| row.get(0))
            .optional()?;
        if counter.is_none() {
            session.report_error("missing_root_tag", "Missing '/' tag for total item count".into());
        }

        let mut stmt = tx.prepare(
            "SELECT id, name, md5, format FROM items WHERE workplace_id IS NULL ORDER BY id",
        )?;
        let items = stmt
            .query_map([], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let total = items.len().max(1) as f64;
        let mut to_delete = Vec::new();
        for (i, (id, name, md5, format)) in items.iter().enumerate() {
            session.set_percent(100.0 * (i + 1) as f64 / total);
            let blob = object_path(self.library.base_path(), md5, format.as_deref());
            if blob.exists() {
                continue;
            }
            let message = format!(
                "Item #{} {:?}: file {} missing",
                id,
                name.as_deref().unwrap_or_default(),
                blob.display()
            );
            if session.ask(QuestionKind::RemoveMissingItem, message) {
                to_delete.push(*id);
            }
        }
        session.report.items_checked = items.len();

        if let Some(counter) = counter {
            if counter != items.len() as i64 {
                session.report_error(
                    "item_counter",
                    format!("Item counter is wrong: says {} instead of {}", counter, items.len()),
                );
            }
        }

        for ids in to_delete.chunks(DELETE_BATCH) {
            debug!(target: "verifier", ?ids, "Removing items");
            let sql = format!(
                "DELETE FROM items WHERE id IN ({})",
                vec!["?"; ids.len()].join(", ")
            );
            tx.execute(&sql, params_from_iter(ids))?;
        }
        session.report.items_removed += to_delete.len();
        session.set_percent(100.0);
        Ok(())
    }

    fn check_files(&self, tx: &Transaction<'_>, session: &mut Session<'_>) -> Result<(), LibraryError> {
        session.next_stage("Checking files");

        for entry in sorted_entries(self.library.base_path())? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            let file_type = entry.file_type()?;

            if file_type.is_file() {
                if !is_database_file(&name) {
                    warn!(target: "verifier", path = %path.display(), "Unexpected file");
                }
            } else if !file_type.is_dir() {
                warn!(target: "verifier", path = %path.display(), "Unexpected special file");
            } else if is_lower_hex(&name, 1) {
                self.check_prefix_dir(tx, session, &name)?;
            } else if let Some(pid) = tmp_dir_pid(&name) {
                if pid == process::id() {
                    continue;
                }
                let message = format!("Unexpected (stale?) temporary directory: {}", path.display());
                if session.ask(QuestionKind::RemoveStaleTmpDir, message) {
                    match fs::remove_dir_all(&path) {
                        Ok(()) => session.report.dirs_removed += 1,
                        Err(e) => {
                            error!(target: "verifier", path = %path.display(), error = %e, "Could not remove")
                        }
                    }
                }
            } else {
                warn!(target: "verifier", path = %path.display(), "Unexpected directory");
            }
        }

        session.set_percent(100.0);
        Ok(())
    }

    fn check_prefix_dir(
        &self,
        tx: &Transaction<'_>,
        session: &mut Session<'_>,
        first: &str,
    ) -> Result<(), LibraryError> {
        let dir = self.library.base_path().join(first);
        for entry in sorted_entries(&dir)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            if !entry.file_type()?.is_dir() {
                warn!(target: "verifier", path = %path.display(), "Unexpected file");
                continue;
            }
            if !is_lower_hex(&name, 2) {
                warn!(target: "verifier", path = %path.display(), "Unexpected directory");
                continue;
            }
            if let Ok(number) = u32::from_str_radix(&format!("{}{}", first, name), 16) {
                session.set_percent(100.0 * number as f64 / BLOB_DIRS as f64);
            }
            self.check_blob_dir(tx, session, first, &name)?;
        }
        Ok(())
    }

    fn check_blob_dir(
        &self,
        tx: &Transaction<'_>,
        session: &mut Session<'_>,
        first: &str,
        second: &str,
    ) -> Result<(), LibraryError> {
        let dir = self.library.base_path().join(first).join(second);
        for entry in sorted_entries(&dir)? {
            let name = entry.file_name().to_string_lossy().into_owned();
            let path = entry.path();
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                warn!(target: "verifier", path = %path.display(), "Unexpected directory");
                continue;
            }
            if !file_type.is_file() {
                warn!(target: "verifier", path = %path.display(), "Unexpected special file");
                continue;
            }
            let Some((md5, ext)) = parse_blob_name(&name) else {
                warn!(target: "verifier", path = %path.display(), "Unexpected file (bad filename)");
                continue;
            };
            if &md5[..1] != first || &md5[1..3] != second {
                warn!(target: "verifier", path = %path.display(), "Unexpected (misplaced) file");
                continue;
            }

            let row: Option<(i64, Option<String>)> = tx
                .query_row(
                    "SELECT id, format FROM items WHERE md5 = ? AND workplace_id IS NULL",
                    [md5],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((item_id, format)) = row else {
                let message = format!("File {} not in the database", path.display());
                if session.ask(QuestionKind::RemoveUnknownFile, message) {
                    remove_file(&path, session);
                }
                continue;
            };

            let problem = match checksum_file(&path) {
                Ok(sum) if sum == md5 => None,
                Ok(_) => Some(format!("File {} checksum mismatch", path.display())),
                Err(e) => {
                    error!(target: "verifier", path = %path.display(), error = %e, "Cannot read file");
                    Some(format!("File {} unreadable", path.display()))
                }
            };
            if let Some(message) = problem {
                if session.ask(QuestionKind::RemoveInvalidItem, message) && remove_file(&path, session) {
                    tx.execute("DELETE FROM items WHERE id = ?", [item_id])?;
                    session.report.items_removed += 1;
                }
                continue;
            }

            if blob_extension(format.as_deref()) != format!(".{}", ext) {
                let message = format!(
                    "File {} extension does not match file format from the library {:?}",
                    path.display(),
                    format.unwrap_or_default()
                );
                if session.ask(QuestionKind::RemoveUnknownFile, message) {
                    remove_file(&path, session);
                }
            }
        }
        Ok(())
    }

    fn check_item_tags(&self, tx: &Transaction<'_>, session: &mut Session<'_>) -> Result<(), LibraryError> {
        session.next_stage("Checking item tags");

        let missing_tags = distinct_ids(
            tx,
            "SELECT DISTINCT tag_id FROM item_tags WHERE tag_id NOT IN (SELECT id FROM tags)",
        )?;
        session.set_percent(25.0);
        if !missing_tags.is_empty()
            && session.ask(
                QuestionKind::FixBrokenTagAssignments,
                format!("Missing item tags: {:?}", missing_tags),
            )
        {
            session.report.links_removed += tx.execute(
                "DELETE FROM item_tags WHERE tag_id NOT IN (SELECT id FROM tags)",
                [],
            )?;
        }

        let missing_items = distinct_ids(
            tx,
            "SELECT DISTINCT item_id FROM item_tags WHERE item_id NOT IN (SELECT id FROM items)",
        )?;
        session.set_percent(50.0);
        if !missing_items.is_empty()
            && session.ask(
                QuestionKind::FixBrokenTagAssignments,
                format!("Missing tag items: {:?}", missing_items),
            )
        {
            session.report.links_removed += tx.execute(
                "DELETE FROM item_tags WHERE item_id NOT IN (SELECT id FROM items)",
                [],
            )?;
        }

        let broken_values: i64 = tx.query_row(
            "SELECT COUNT(*) FROM item_custom_values \
             WHERE item_id NOT IN (SELECT id FROM items) \
             OR key_id NOT IN (SELECT id FROM custom_keys)",
            [],
            |row| row.get(0),
        )?;
        session.set_percent(75.0);
        if broken_values > 0
            && session.ask(
                QuestionKind::FixBrokenCustomValues,
                format!("{} custom values without item or key", broken_values),
            )
        {
            session.report.links_removed += tx.execute(
                "DELETE FROM item_custom_values \
                 WHERE item_id NOT IN (SELECT id FROM items) \
                 OR key_id NOT IN (SELECT id FROM custom_keys)",
                [],
            )?;
        }

        if session.report.items_removed > 0 {
            recount_tags(tx)?;
            session.report.tag_counts_fixed = true;
        } else {
            let mut stmt = tx.prepare(&format!(
                "SELECT name, item_count, {} AS actual FROM tags \
                 WHERE item_count != actual ORDER BY name",
                ACTUAL_TAG_COUNT
            ))?;
            let wrong = stmt
                .query_map([], |row| {
                    Ok(format!(
                        "{} says {} instead of {}",
                        row.get::<_, String>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, i64>(2)?
                    ))
                })?
                .collect::<Result<Vec<_>, _>>()?;
            if !wrong.is_empty()
                && session.ask(
                    QuestionKind::FixTagCounts,
                    format!("Wrong tag counts: {}", wrong.join(", ")),
                )
            {
                recount_tags(tx)?;
                session.report.tag_counts_fixed = true;
            }
        }

        session.set_percent(100.0);
        Ok(())
    }
}

fn remove_file(path: &Path, session: &mut Session<'_>) -> bool {
    match fs::remove_file(path) {
        Ok(()) => {
            session.report.files_removed += 1;
            true
        }
        Err(e) => {
            error!(target: "verifier", path = %path.display(), error = %e, "Cannot remove");
            false
        }
    }
}

fn distinct_ids(tx: &Transaction<'_>, sql: &str) -> Result<Vec<i64>, LibraryError> {
    let mut stmt = tx.prepare(sql)?;
    let ids = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(ids)
}

fn recount_tags(tx: &Transaction<'_>) -> Result<(), LibraryError> {
    info!(target: "verifier", "Recounting tags");
    tx.execute(
        "INSERT OR IGNORE INTO tags (name, item_count) VALUES (?, 0)",
        [ROOT_TAG],
    )?;
    tx.execute(
        &format!("UPDATE tags SET item_count = {}", ACTUAL_TAG_COUNT),
        [],
    )?;
    Ok(())
}
