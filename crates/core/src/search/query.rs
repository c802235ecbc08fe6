//! Parsed search queries.

use tracing::{debug, warn};

use crate::metrics::DROPPED_QUERY_TOKENS;

use super::condition::{parse_token, Condition};
use super::sql::{QueryBuilder, SqlOptions, SqlQuery};
use super::tokenize::split_lenient;

/// An ordered list of conditions. Parsing never fails: tokens that make no
/// sense are dropped with a warning.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchQuery {
    conditions: Vec<Condition>,
}

impl SearchQuery {
    pub fn new(conditions: Vec<Condition>) -> Self {
        Self { conditions }
    }

    pub fn parse(text: &str) -> Self {
        let parts = split_lenient(text);
        debug!(target: "search", ?parts, "Split query");
        let mut conditions = Vec::with_capacity(parts.len());
        for part in &parts {
            match parse_token(part) {
                Some(cond) => conditions.push(cond),
                None => {
                    warn!(target: "search", "Cannot understand query {:?}", part);
                    DROPPED_QUERY_TOKENS.inc();
                }
            }
        }
        Self { conditions }
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn add_conditions(&mut self, conditions: impl IntoIterator<Item = Condition>) {
        self.conditions.extend(conditions);
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    /// Render back to query text that parses to the same conditions.
    pub fn as_string(&self) -> String {
        self.conditions
            .iter()
            .map(Condition::as_string)
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub(crate) fn compile_into(&self, builder: &mut QueryBuilder, options: &SqlOptions) {
        builder.scope(options.scope);
        builder.conditions(&self.conditions);
    }

    pub fn as_sql(&self, options: &SqlOptions) -> SqlQuery {
        let mut builder = QueryBuilder::new();
        self.compile_into(&mut builder, options);
        builder.build(options)
    }
}

impl std::fmt::Display for SearchQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_string())
    }
}

#[cfg(test)]
mod tests {
    use rusqlite::types::Value;

    use super::*;
    use crate::search::{Scope, ITEM_COLUMNS};

    fn text(v: &str) -> Value {
        Value::Text(v.to_string())
    }

    fn all() -> SqlOptions {
        SqlOptions {
            scope: Scope::All,
            order_by: None,
            limit: None,
            ..SqlOptions::default()
        }
    }

    #[test]
    fn test_parse_drops_bad_tokens() {
        let query = SearchQuery::parse("?drums !!! _bogus=1 kick");
        assert_eq!(
            query.conditions(),
            &[
                Condition::TagInclude("drums".into()),
                Condition::Text("_bogus=1".into()),
                Condition::Text("kick".into()),
            ]
        );
    }

    #[test]
    fn test_unbalanced_quote_falls_back() {
        let query = SearchQuery::parse(r#""deep house"#);
        assert_eq!(
            query.conditions(),
            &[Condition::Text("deep".into()), Condition::Text("house".into())]
        );
    }

    #[test]
    fn test_as_string_round_trip() {
        let query = SearchQuery::parse(r#"?/a/b -x "key sig"=Cm "two words" bpm>=90"#);
        assert_eq!(SearchQuery::parse(&query.as_string()), query);
    }

    #[test]
    fn test_default_sql() {
        let sql = SearchQuery::default().as_sql(&SqlOptions::default());
        let columns: Vec<String> = ITEM_COLUMNS.iter().map(|c| format!("item.{c}")).collect();
        assert_eq!(
            sql.sql,
            format!(
                "SELECT {} FROM items item WHERE item.workplace_id IS NULL \
                 ORDER BY item.name LIMIT 100",
                columns.join(", ")
            )
        );
        assert!(sql.params.is_empty());
    }

    #[test]
    fn test_tag_groups() {
        let sql = SearchQuery::parse("?b ?a -c").as_sql(&all());
        assert!(sql.sql.contains("item.id IN (SELECT it.item_id"));
        assert!(sql.sql.contains("item.id NOT IN (SELECT it.item_id"));
        assert_eq!(sql.params, vec![text("a"), text("b"), text("c")]);
    }

    #[test]
    fn test_root_tags() {
        let sql = SearchQuery::parse("?/ ?a").as_sql(&all());
        assert!(!sql.sql.contains("WHERE"));
        assert!(sql.params.is_empty());

        let sql = SearchQuery::parse("-/ ?a").as_sql(&all());
        assert!(sql.sql.contains("WHERE FALSE AND item.id IN"));
        assert_eq!(sql.params, vec![text("a")]);
    }

    #[test]
    fn test_fixed_comparison_coerces() {
        let sql = SearchQuery::parse("_sample_rate>=44100 _format==WAV").as_sql(&all());
        assert!(sql.sql.contains("item.sample_rate >= ? AND item.format = ?"));
        assert_eq!(sql.params, vec![Value::Integer(44100), text("WAV")]);
    }

    #[test]
    fn test_custom_aliases_are_unique() {
        let sql = SearchQuery::parse("bpm>100 mood=dark name=kick").as_sql(&all());
        for alias in ["icv0", "ck0", "icv1", "ck1", "icv2", "ck2"] {
            assert!(sql.sql.contains(&format!("{alias}.")), "{alias} missing");
        }
        assert!(sql.sql.contains("CAST(icv0.value AS REAL) > ?"));
        assert!(sql.sql.contains("(item.name = ? OR EXISTS"));
        assert_eq!(
            sql.params,
            vec![
                text("bpm"),
                Value::Real(100.0),
                text("mood"),
                text("dark"),
                text("kick"),
                text("name"),
                text("kick"),
            ]
        );
    }

    #[test]
    fn test_free_text_group() {
        let sql = SearchQuery::parse(r#"kick* "deep house" OR a-b"#).as_sql(&all());
        assert!(sql.sql.contains("item.id IN (SELECT docid FROM fts WHERE fts MATCH ?)"));
        assert_eq!(sql.params, vec![text(r#"kick* "deep house" "OR" "a-b""#)]);
    }

    #[test]
    fn test_scope_and_columns() {
        let options = SqlOptions::default()
            .with_scope(Scope::Workplace(3))
            .with_columns(["id", "count(*)"])
            .with_limit(5);
        let sql = SearchQuery::parse("?x").as_sql(&options);
        assert!(sql.sql.starts_with("SELECT item.id, count(*) FROM items item WHERE item.workplace_id = ? AND"));
        assert!(sql.sql.ends_with("LIMIT 5"));
        assert_eq!(sql.params, vec![Value::Integer(3), text("x")]);
    }
}
