//! Search integration tests.
//!
//! These tests run compiled queries against a real library:
//! - Tag include/exclude groups and the root tag
//! - Fixed and custom field comparisons
//! - Free-text search
//! - Completion suggestions

use rusqlite::types::Value;
use tempfile::TempDir;

use sampledrawer_core::{
    library::Library,
    metadata::Metadata,
    search::{CompletionQuery, Scope, SearchQuery, SqlOptions, SqlQuery, ITEM_COLUMNS},
    testing::fixtures,
};

struct TestLibrary {
    library: Library,
    _dir: TempDir,
}

impl TestLibrary {
    /// kick: drums, /loops/808, bpm 120
    /// snare: drums, bpm 90
    /// deep pad: ambient
    fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let library = Library::open(dir.path().join("library")).expect("Failed to open library");

        let samples: [(&str, &[&str], Option<&str>); 3] = [
            ("kick", &["drums", "/loops/808"], Some("120")),
            ("snare", &["drums"], Some("90")),
            ("deep pad", &["ambient"], None),
        ];
        for (name, tags, bpm) in samples {
            let path = fixtures::write_sample(dir.path(), name, name.as_bytes());
            let mut metadata = fixtures::sample_metadata(&path, name, tags);
            if let Some(bpm) = bpm {
                metadata.set_custom("bpm", bpm);
            }
            library.import_file(&metadata, false).expect("import failed");
        }

        Self { library, _dir: dir }
    }

    fn search_with(&self, query: &str, options: &SqlOptions) -> Vec<String> {
        let items = self
            .library
            .get_items(&SearchQuery::parse(query), options)
            .expect("query failed");
        names(&items)
    }

    fn search(&self, query: &str) -> Vec<String> {
        self.search_with(query, &SqlOptions::default())
    }

    fn complete(&self, text: &str) -> Vec<String> {
        let query = CompletionQuery::from_text(text).expect("nothing to complete");
        self.library
            .get_completions(&query, 20)
            .expect("completion failed")
    }
}

fn names(items: &[Metadata]) -> Vec<String> {
    items
        .iter()
        .map(|m| m.name().unwrap_or_default().to_string())
        .collect()
}

#[test]
fn test_empty_query_lists_everything_by_name() {
    let lib = TestLibrary::new();
    assert_eq!(lib.search(""), vec!["deep pad", "kick", "snare"]);
}

#[test]
fn test_tag_include_is_or() {
    let lib = TestLibrary::new();
    assert_eq!(lib.search("?drums"), vec!["kick", "snare"]);
    assert_eq!(lib.search("?ambient ?/loops"), vec!["deep pad", "kick"]);
    assert_eq!(lib.search("+ambient"), vec!["deep pad"]);
}

#[test]
fn test_tag_exclude() {
    let lib = TestLibrary::new();
    assert_eq!(lib.search("-drums"), vec!["deep pad"]);
    assert_eq!(lib.search("?drums -/loops/808"), vec!["snare"]);
    assert_eq!(lib.search("-drums -ambient"), Vec::<String>::new());
}

#[test]
fn test_root_tag() {
    let lib = TestLibrary::new();
    assert_eq!(lib.search("?/"), vec!["deep pad", "kick", "snare"]);
    assert!(lib.search("-/").is_empty());
    assert!(lib.search("?drums -/").is_empty());
}

#[test]
fn test_bad_tokens_are_dropped() {
    let lib = TestLibrary::new();
    assert_eq!(lib.search("?drums !!! %%"), vec!["kick", "snare"]);
    assert_eq!(lib.search("?drums \"unbalanced"), lib.search("?drums unbalanced"));
}

#[test]
fn test_fixed_field_comparisons() {
    let lib = TestLibrary::new();
    assert_eq!(lib.search("_format=WAV").len(), 3);
    assert_eq!(lib.search("_name=kick"), vec!["kick"]);
    assert_eq!(lib.search("_name!=kick"), vec!["deep pad", "snare"]);
}

#[test]
fn test_custom_field_comparisons() {
    let lib = TestLibrary::new();
    assert_eq!(lib.search("bpm=120"), vec!["kick"]);
    assert_eq!(lib.search("bpm>100"), vec!["kick"]);
    assert_eq!(lib.search("bpm<=100"), vec!["snare"]);
    assert_eq!(lib.search("bpm>=90 bpm<=120"), vec!["kick", "snare"]);
    assert!(lib.search("mood=dark").is_empty());
}

#[test]
fn test_free_text() {
    let lib = TestLibrary::new();
    assert_eq!(lib.search("pad"), vec!["deep pad"]);
    assert_eq!(lib.search("\"deep pad\""), vec!["deep pad"]);
    assert_eq!(lib.search("sn*"), vec!["snare"]);
    assert_eq!(lib.search("drums kick"), vec!["kick"]);
    assert_eq!(lib.search("120"), vec!["kick"]);
}

#[test]
fn test_limit_and_scope() {
    let lib = TestLibrary::new();
    assert_eq!(
        lib.search_with("", &SqlOptions::default().with_limit(1)),
        vec!["deep pad"]
    );
    assert_eq!(
        lib.search_with("?drums", &SqlOptions::default().with_scope(Scope::All)),
        vec!["kick", "snare"]
    );
    assert!(lib
        .search_with("", &SqlOptions::default().with_scope(Scope::Workplace(1)))
        .is_empty());
}

#[test]
fn test_raw_sql() {
    let lib = TestLibrary::new();
    let columns: Vec<String> = ITEM_COLUMNS.iter().map(|c| format!("item.{c}")).collect();
    let query = SqlQuery::new(
        format!(
            "SELECT {} FROM items item WHERE item.name LIKE ? ORDER BY item.name",
            columns.join(", ")
        ),
        vec![Value::Text("%a%".into())],
    );
    let items = lib.library.get_items_sql(&query).unwrap();
    assert_eq!(names(&items), vec!["deep pad", "snare"]);
    assert!(items[1].tags().contains("drums"));
    assert_eq!(items[1].custom()["bpm"], "90");
}

#[test]
fn test_completion_single_word() {
    let lib = TestLibrary::new();
    assert_eq!(lib.complete("d"), vec!["deep", "drums"]);
    assert_eq!(lib.complete("?drums d"), vec!["drums"]);
    assert_eq!(lib.complete("ki"), vec!["kick"]);
    assert!(lib.complete("zz").is_empty());
}

#[test]
fn test_completion_quoted_phrase() {
    let lib = TestLibrary::new();
    let query = CompletionQuery::from_text("?ambient \"deep p").unwrap();
    let suggestions = lib.library.get_completions(&query, 20).unwrap();
    assert_eq!(suggestions, vec!["deep pad"]);
    assert_eq!(query.complete(&suggestions[0]), "?ambient \"deep pad\"");
}

#[test]
fn test_completion_next_word_after_space() {
    let lib = TestLibrary::new();
    assert_eq!(lib.complete("\"deep "), vec!["deep pad"]);
}
