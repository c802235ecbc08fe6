//! Verifier integration tests.
//!
//! These tests break a library on purpose and check what the verifier
//! reports and repairs:
//! - Missing and unknown blobs
//! - Checksum and extension mismatches
//! - Stale temporary directories
//! - Broken tag links and wrong counters
//! - Saved answers

use std::fs;

use rusqlite::Connection;
use tempfile::TempDir;

use sampledrawer_core::{
    library::{object_path, Library, DATABASE_FILE},
    search::{SearchQuery, SqlOptions},
    testing::{fixtures, ScriptedObserver},
    verifier::{Answer, LibraryVerifier, QuestionKind, VerifyReport, STAGES},
};

struct TestHarness {
    library: Library,
    dir: TempDir,
}

impl TestHarness {
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let library = Library::open(dir.path().join("library")).expect("Failed to open library");
        Self { library, dir }
    }

    fn import(&self, name: &str, tags: &[&str]) -> sampledrawer_core::Metadata {
        fixtures::import_sample(&self.library, self.dir.path(), name, name.as_bytes(), tags, true).0
    }

    fn verify(&self, observer: &mut ScriptedObserver) -> VerifyReport {
        LibraryVerifier::new(&self.library)
            .verify(observer)
            .expect("verification failed")
    }

    /// A second connection without foreign key enforcement.
    fn raw_connection(&self) -> Connection {
        let conn = Connection::open(self.library.base_path().join(DATABASE_FILE)).unwrap();
        conn.execute_batch("PRAGMA foreign_keys = OFF;").unwrap();
        conn
    }

    fn names(&self) -> Vec<String> {
        self.library
            .get_items(&SearchQuery::parse(""), &SqlOptions::default())
            .unwrap()
            .iter()
            .map(|m| m.name().unwrap_or_default().to_string())
            .collect()
    }

    fn tag_count(&self, name: &str) -> Option<i64> {
        self.library
            .get_tags()
            .unwrap()
            .into_iter()
            .find(|t| t.name == name)
            .map(|t| t.item_count)
    }
}

fn kinds(observer: &ScriptedObserver) -> Vec<QuestionKind> {
    observer.questions.iter().map(|q| q.kind).collect()
}

#[test]
fn test_clean_library_has_no_issues() {
    let harness = TestHarness::new();
    harness.import("kick", &["drums"]);
    harness.import("snare", &["/kit/snare"]);

    let mut observer = ScriptedObserver::new(Answer::No);
    let report = harness.verify(&mut observer);

    assert_eq!(report.issues, 0);
    assert_eq!(report.items_checked, 2);
    assert!(observer.questions.is_empty());
    assert!(observer.errors().is_empty());

    let stages: Vec<usize> = observer.progress.iter().map(|p| p.stage).collect();
    assert_eq!(stages.first(), Some(&1));
    assert_eq!(stages.last(), Some(&STAGES));
    for stage in 1..=STAGES {
        let percents: Vec<u8> = observer
            .progress
            .iter()
            .filter(|p| p.stage == stage)
            .map(|p| p.percent)
            .collect();
        assert_eq!(percents.first(), Some(&0));
        assert_eq!(percents.last(), Some(&100));
        assert!(percents.windows(2).all(|w| w[0] < w[1]));
    }
}

#[test]
fn test_missing_blob_removes_item_on_yes() {
    let harness = TestHarness::new();
    let kick = harness.import("kick", &["drums"]);
    harness.import("snare", &["drums"]);
    fs::remove_file(harness.library.get_library_object_path(&kick).unwrap()).unwrap();

    let mut observer = ScriptedObserver::new(Answer::Yes);
    let report = harness.verify(&mut observer);

    assert_eq!(kinds(&observer), vec![QuestionKind::RemoveMissingItem]);
    assert!(observer.questions[0].message.contains("kick"));
    assert_eq!(report.items_removed, 1);
    assert!(report.tag_counts_fixed);
    assert_eq!(harness.names(), vec!["snare"]);
    assert_eq!(harness.tag_count("/"), Some(1));
    assert_eq!(harness.tag_count("drums"), Some(1));
}

#[test]
fn test_missing_blob_kept_on_no() {
    let harness = TestHarness::new();
    let kick = harness.import("kick", &[]);
    fs::remove_file(harness.library.get_library_object_path(&kick).unwrap()).unwrap();

    let mut observer = ScriptedObserver::new(Answer::No);
    let report = harness.verify(&mut observer);

    assert_eq!(report.issues, 1);
    assert_eq!(report.items_removed, 0);
    assert_eq!(harness.names(), vec!["kick"]);
}

#[test]
fn test_always_answer_is_saved() {
    let harness = TestHarness::new();
    for name in ["a", "b", "c"] {
        let item = harness.import(name, &[]);
        fs::remove_file(harness.library.get_library_object_path(&item).unwrap()).unwrap();
    }

    let mut observer = ScriptedObserver::with_script([Answer::Always], Answer::No);
    let report = harness.verify(&mut observer);

    assert_eq!(kinds(&observer), vec![QuestionKind::RemoveMissingItem]);
    assert_eq!(report.issues, 3);
    assert_eq!(report.items_removed, 3);
    assert!(harness.names().is_empty());
    assert_eq!(harness.tag_count("/"), Some(0));
}

#[test]
fn test_never_answer_is_saved() {
    let harness = TestHarness::new();
    for name in ["a", "b"] {
        let item = harness.import(name, &[]);
        fs::remove_file(harness.library.get_library_object_path(&item).unwrap()).unwrap();
    }

    let mut observer = ScriptedObserver::with_script([Answer::Never], Answer::Yes);
    let report = harness.verify(&mut observer);

    assert_eq!(observer.questions.len(), 1);
    assert_eq!(report.items_removed, 0);
    assert_eq!(harness.names().len(), 2);
}

#[test]
fn test_unknown_blob_is_removed() {
    let harness = TestHarness::new();
    harness.import("kick", &[]);
    let md5 = format!("{:x}", md5::compute(b"orphan"));
    let orphan = object_path(harness.library.base_path(), &md5, Some("WAV"));
    fs::create_dir_all(orphan.parent().unwrap()).unwrap();
    fs::write(&orphan, b"orphan").unwrap();

    let mut observer = ScriptedObserver::new(Answer::Yes);
    let report = harness.verify(&mut observer);

    assert_eq!(kinds(&observer), vec![QuestionKind::RemoveUnknownFile]);
    assert_eq!(report.files_removed, 1);
    assert!(!orphan.exists());
    assert_eq!(harness.names(), vec!["kick"]);
}

#[test]
fn test_checksum_mismatch_removes_item_and_file() {
    let harness = TestHarness::new();
    let kick = harness.import("kick", &["drums"]);
    let blob = harness.library.get_library_object_path(&kick).unwrap();
    fs::write(&blob, b"corrupted").unwrap();

    let mut observer = ScriptedObserver::new(Answer::Yes);
    let report = harness.verify(&mut observer);

    assert_eq!(kinds(&observer), vec![QuestionKind::RemoveInvalidItem]);
    assert!(observer.questions[0].message.contains("checksum mismatch"));
    assert!(!blob.exists());
    assert_eq!(report.items_removed, 1);
    assert!(harness.names().is_empty());
    assert_eq!(harness.tag_count("drums"), Some(0));
}

#[test]
fn test_extension_mismatch() {
    let harness = TestHarness::new();
    let kick = harness.import("kick", &[]);
    let blob = harness.library.get_library_object_path(&kick).unwrap();
    let renamed = blob.with_extension("aiff");
    fs::copy(&blob, &renamed).unwrap();

    let mut observer = ScriptedObserver::new(Answer::Yes);
    harness.verify(&mut observer);

    assert_eq!(kinds(&observer), vec![QuestionKind::RemoveUnknownFile]);
    assert!(!renamed.exists());
    assert!(blob.exists());
}

#[test]
fn test_stale_tmp_dir() {
    let harness = TestHarness::new();
    let stale = harness.library.base_path().join(format!("tmp.{}.0", u32::MAX));
    fs::create_dir_all(stale.join("abc")).unwrap();

    let mut observer = ScriptedObserver::new(Answer::Yes);
    let report = harness.verify(&mut observer);

    assert_eq!(kinds(&observer), vec![QuestionKind::RemoveStaleTmpDir]);
    assert_eq!(report.dirs_removed, 1);
    assert!(!stale.exists());
    assert!(harness.library.tmp_dir().exists());
}

#[test]
fn test_unexpected_entries_are_only_logged() {
    let harness = TestHarness::new();
    let base = harness.library.base_path();
    fs::write(base.join("notes.txt"), b"x").unwrap();
    fs::create_dir_all(base.join("misc")).unwrap();
    fs::create_dir_all(base.join("a").join("zz")).unwrap();
    fs::create_dir_all(base.join("b").join("cd")).unwrap();
    fs::write(base.join("b").join("cd").join("not-a-blob.txt"), b"x").unwrap();

    let mut observer = ScriptedObserver::new(Answer::Yes);
    let report = harness.verify(&mut observer);

    assert_eq!(report.issues, 0);
    assert!(base.join("notes.txt").exists());
    assert!(base.join("b").join("cd").join("not-a-blob.txt").exists());
}

#[test]
fn test_broken_tag_links_are_fixed() {
    let harness = TestHarness::new();
    harness.import("kick", &["drums"]);
    {
        let conn = harness.raw_connection();
        conn.execute(
            "INSERT INTO item_tags (item_id, tag_id) VALUES ((SELECT id FROM items LIMIT 1), 9999)",
            [],
        )
        .unwrap();
        conn.execute("INSERT INTO item_tags (item_id, tag_id) VALUES (8888, 1)", [])
            .unwrap();
    }

    let mut observer = ScriptedObserver::new(Answer::Yes);
    let report = harness.verify(&mut observer);

    assert_eq!(
        kinds(&observer),
        vec![
            QuestionKind::FixBrokenTagAssignments,
            QuestionKind::FixBrokenTagAssignments
        ]
    );
    assert_eq!(report.links_removed, 2);

    let mut observer = ScriptedObserver::new(Answer::Yes);
    assert_eq!(harness.verify(&mut observer).issues, 0);
}

#[test]
fn test_broken_custom_values_are_fixed() {
    let harness = TestHarness::new();
    harness.import("kick", &[]);
    {
        let conn = harness.raw_connection();
        conn.execute(
            "INSERT INTO item_custom_values (item_id, key_id, value) VALUES (7777, 1, 'x')",
            [],
        )
        .unwrap();
    }

    let mut observer = ScriptedObserver::new(Answer::Yes);
    let report = harness.verify(&mut observer);

    assert_eq!(kinds(&observer), vec![QuestionKind::FixBrokenCustomValues]);
    assert_eq!(report.links_removed, 1);
}

#[test]
fn test_wrong_counters() {
    let harness = TestHarness::new();
    harness.import("kick", &["drums"]);
    {
        let conn = harness.raw_connection();
        conn.execute("UPDATE tags SET item_count = 5 WHERE name IN ('/', 'drums')", [])
            .unwrap();
    }

    let mut observer = ScriptedObserver::new(Answer::Yes);
    let report = harness.verify(&mut observer);

    assert!(observer
        .errors()
        .iter()
        .any(|e| e.contains("Item counter is wrong")));
    assert_eq!(kinds(&observer), vec![QuestionKind::FixTagCounts]);
    assert!(report.tag_counts_fixed);
    assert_eq!(harness.tag_count("/"), Some(1));
    assert_eq!(harness.tag_count("drums"), Some(1));
}
