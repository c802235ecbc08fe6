//! Compilation of conditions into parameterized SQL.

use std::collections::BTreeSet;

use rusqlite::types::Value;
use tracing::debug;

use crate::metadata::{FieldValue, FixedField};

use super::condition::{Condition, Group, KeyTarget, MetadataCondition, ROOT_TAG};

/// Item columns in schema order. Rows read back into metadata select these.
pub const ITEM_COLUMNS: [&str; 12] = [
    "id",
    "workplace_id",
    "md5",
    "path",
    "source",
    "name",
    "format",
    "format_subtype",
    "sample_rate",
    "channels",
    "duration",
    "peak_level",
];

/// Which rows of `items` a query may see.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Scope {
    /// Library items only (`workplace_id IS NULL`).
    #[default]
    Library,
    Workplace(i64),
    All,
}

/// Shape of the compiled statement.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlOptions {
    /// Bare names are qualified with `item.`; expressions are kept verbatim.
    /// `None` selects every item column.
    pub columns: Option<Vec<String>>,
    pub order_by: Option<String>,
    pub limit: Option<usize>,
    pub scope: Scope,
}

impl Default for SqlOptions {
    fn default() -> Self {
        Self {
            columns: None,
            order_by: Some("item.name".to_string()),
            limit: Some(100),
            scope: Scope::Library,
        }
    }
}

impl SqlOptions {
    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    pub fn with_scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn with_columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.columns = Some(columns.into_iter().map(Into::into).collect());
        self
    }
}

/// A statement and its bound parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub sql: String,
    pub params: Vec<Value>,
}

impl SqlQuery {
    pub fn new(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Self {
            sql: sql.into(),
            params,
        }
    }
}

fn qualify(column: &str) -> String {
    if column.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        format!("item.{}", column)
    } else {
        column.to_string()
    }
}

fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// Accumulates joins, WHERE terms and parameters of one statement.
///
/// Table aliases are numbered per statement so repeated subqueries never
/// collide.
#[derive(Debug, Default)]
pub(crate) struct QueryBuilder {
    joins: Vec<String>,
    clauses: Vec<String>,
    params: Vec<Value>,
    next_alias: usize,
}

impl QueryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next alias number for this statement.
    pub fn alias(&mut self) -> usize {
        let n = self.next_alias;
        self.next_alias += 1;
        n
    }

    pub fn join(&mut self, join: impl Into<String>) {
        self.joins.push(join.into());
    }

    pub fn clause(&mut self, clause: impl Into<String>, params: impl IntoIterator<Item = Value>) {
        self.clauses.push(clause.into());
        self.params.extend(params);
    }

    pub fn scope(&mut self, scope: Scope) {
        match scope {
            Scope::Library => self.clause("item.workplace_id IS NULL", []),
            Scope::Workplace(id) => {
                self.clause("item.workplace_id = ?", [Value::Integer(id)])
            }
            Scope::All => {}
        }
    }

    /// Add every condition: ungrouped ones in order, then one term per group.
    pub fn conditions(&mut self, conditions: &[Condition]) {
        let mut groups: Vec<(Group, Vec<&Condition>)> = Vec::new();
        for cond in conditions {
            match cond.group() {
                None => {
                    if let Condition::Metadata(meta) = cond {
                        self.metadata(meta);
                    }
                }
                Some(group) => match groups.iter_mut().find(|(g, _)| *g == group) {
                    Some((_, members)) => members.push(cond),
                    None => groups.push((group, vec![cond])),
                },
            }
        }
        for (group, members) in groups {
            match group {
                Group::TagInclude => self.tag_include(&members),
                Group::TagExclude => self.tag_exclude(&members),
                Group::Text => self.text(&members),
            }
        }
    }

    fn tag_names<'a>(members: &[&'a Condition]) -> BTreeSet<&'a str> {
        members
            .iter()
            .filter_map(|cond| match cond {
                Condition::TagInclude(tag) | Condition::TagExclude(tag) => Some(tag.as_str()),
                _ => None,
            })
            .collect()
    }

    fn tag_membership(tags: &BTreeSet<&str>) -> String {
        format!(
            "(SELECT it.item_id FROM item_tags it JOIN tags t ON t.id = it.tag_id \
             WHERE t.name IN ({}))",
            placeholders(tags.len())
        )
    }

    fn tag_include(&mut self, members: &[&Condition]) {
        let tags = Self::tag_names(members);
        if tags.contains(ROOT_TAG) {
            return;
        }
        let clause = format!("item.id IN {}", Self::tag_membership(&tags));
        self.clause(clause, tags.iter().map(|t| Value::Text(t.to_string())));
    }

    fn tag_exclude(&mut self, members: &[&Condition]) {
        let tags = Self::tag_names(members);
        if tags.contains(ROOT_TAG) {
            self.clause("FALSE", []);
            return;
        }
        let clause = format!("item.id NOT IN {}", Self::tag_membership(&tags));
        self.clause(clause, tags.iter().map(|t| Value::Text(t.to_string())));
    }

    fn metadata(&mut self, cond: &MetadataCondition) {
        let mut params = Vec::new();
        let clause = match cond.target() {
            KeyTarget::Fixed(field) => fixed_comparison(field, cond, &mut params),
            KeyTarget::Custom(key) => self.custom_comparison(&key, cond, &mut params),
            KeyTarget::Either(field, key) => {
                let fixed = fixed_comparison(field, cond, &mut params);
                let custom = self.custom_comparison(&key, cond, &mut params);
                format!("({} OR {})", fixed, custom)
            }
        };
        self.clause(clause, params);
    }

    fn custom_comparison(
        &mut self,
        key: &str,
        cond: &MetadataCondition,
        params: &mut Vec<Value>,
    ) -> String {
        let n = self.alias();
        let (icv, ck) = (format!("icv{}", n), format!("ck{}", n));
        params.push(Value::Text(key.to_string()));
        let number = cond
            .value
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|_| cond.op.is_ordering());
        let comparison = match number {
            Some(x) => {
                params.push(Value::Real(x));
                format!("CAST({}.value AS REAL) {} ?", icv, cond.op)
            }
            None => {
                params.push(Value::Text(cond.value.clone()));
                format!("{}.value {} ?", icv, cond.op)
            }
        };
        format!(
            "EXISTS (SELECT 1 FROM item_custom_values {icv} \
             JOIN custom_keys {ck} ON {ck}.id = {icv}.key_id \
             WHERE {icv}.item_id = item.id AND {ck}.name = ? COLLATE NOCASE AND {comparison})"
        )
    }

    fn text(&mut self, members: &[&Condition]) {
        let terms: Vec<String> = members
            .iter()
            .filter_map(|cond| match cond {
                Condition::Text(text) => Some(fts_term(text)),
                _ => None,
            })
            .collect();
        if terms.is_empty() {
            return;
        }
        self.clause(
            "item.id IN (SELECT docid FROM fts WHERE fts MATCH ?)",
            [Value::Text(terms.join(" "))],
        );
    }

    pub fn build(self, options: &SqlOptions) -> SqlQuery {
        let columns = match &options.columns {
            Some(columns) if !columns.is_empty() => {
                columns.iter().map(|c| qualify(c)).collect::<Vec<_>>()
            }
            _ => ITEM_COLUMNS.iter().map(|c| qualify(c)).collect(),
        };
        let mut sql = format!("SELECT {} FROM items item", columns.join(", "));
        for join in &self.joins {
            sql.push(' ');
            sql.push_str(join);
        }
        if !self.clauses.is_empty() {
            sql.push_str(" WHERE ");
            sql.push_str(&self.clauses.join(" AND "));
        }
        if let Some(order_by) = &options.order_by {
            sql.push_str(" ORDER BY ");
            sql.push_str(order_by);
        }
        if let Some(limit) = options.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }
        debug!(target: "search", %sql, params = self.params.len(), "Compiled query");
        SqlQuery {
            sql,
            params: self.params,
        }
    }
}

fn fixed_comparison(field: FixedField, cond: &MetadataCondition, params: &mut Vec<Value>) -> String {
    let value = match FieldValue::from(cond.value.as_str()).coerce(field) {
        Ok(FieldValue::Integer(i)) => Value::Integer(i),
        Ok(FieldValue::Float(x)) => Value::Real(x),
        _ => Value::Text(cond.value.clone()),
    };
    params.push(value);
    format!("item.{} {} ?", field.name(), cond.op)
}

fn is_operator_word(term: &str) -> bool {
    matches!(term, "AND" | "OR" | "NOT" | "NEAR")
}

/// A free-text term as it goes into the MATCH string.
pub(crate) fn fts_term(text: &str) -> String {
    let body = text.strip_suffix('*').unwrap_or(text);
    let plain = !body.is_empty()
        && body.chars().all(|c| c.is_alphanumeric() || c == '_')
        && !is_operator_word(text);
    if plain {
        text.to_string()
    } else {
        format!("\"{}\"", text.replace('"', ""))
    }
}
