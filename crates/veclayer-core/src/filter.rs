//! Metadata filter AST and its translations.
//!
//! A [`MetadataFilter`] is a recursive boolean expression. Within one node
//! every predicate must hold (they are AND-ed together with the `and`
//! children); `or` children contribute a single disjunction. A filter with
//! no predicates anywhere matches every document.
//!
//! Two pure translations are provided:
//!
//! - [`MetadataFilter::to_document_filter`] produces a Mongo-style JSON
//!   filter for document-store backends.
//! - [`MetadataFilter::to_sql`] produces a parameterized SQL fragment over a
//!   JSONB `metadata` column for relational backends.
//!
//! [`MetadataFilter::matches`] evaluates the filter in-process with the same
//! semantics the SQL translation has inside PostgreSQL.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::Metadata;

/// Name of the JSONB column the SQL translation addresses.
pub const METADATA_COLUMN: &str = "metadata";

/// Boolean predicate tree over document metadata.
///
/// Maps are keyed by metadata field name. `BTreeMap` keeps translation
/// output (and therefore bound parameter order) deterministic.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetadataFilter {
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub equals: BTreeMap<String, Value>,
    #[serde(rename = "in", skip_serializing_if = "BTreeMap::is_empty")]
    pub one_of: BTreeMap<String, Vec<Value>>,
    #[serde(rename = "not_in", skip_serializing_if = "BTreeMap::is_empty")]
    pub none_of: BTreeMap<String, Vec<Value>>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub greater_than: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub greater_or_equal: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub less_than: BTreeMap<String, f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub less_or_equal: BTreeMap<String, f64>,
    /// Substring match on the field's text value.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub contains: BTreeMap<String, String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub and: Vec<MetadataFilter>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub or: Vec<MetadataFilter>,
}

impl MetadataFilter {
    /// An empty filter (matches everything).
    pub fn new() -> Self {
        Self::default()
    }

    /// Conjunction of `filters`.
    pub fn and(filters: impl IntoIterator<Item = MetadataFilter>) -> Self {
        Self {
            and: filters.into_iter().collect(),
            ..Self::default()
        }
    }

    /// Disjunction of `filters`.
    pub fn or(filters: impl IntoIterator<Item = MetadataFilter>) -> Self {
        Self {
            or: filters.into_iter().collect(),
            ..Self::default()
        }
    }

    pub fn equals(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.equals.insert(field.into(), value.into());
        self
    }

    pub fn one_of<V: Into<Value>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.one_of
            .insert(field.into(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn none_of<V: Into<Value>>(
        mut self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        self.none_of
            .insert(field.into(), values.into_iter().map(Into::into).collect());
        self
    }

    pub fn greater_than(mut self, field: impl Into<String>, value: f64) -> Self {
        self.greater_than.insert(field.into(), value);
        self
    }

    pub fn greater_or_equal(mut self, field: impl Into<String>, value: f64) -> Self {
        self.greater_or_equal.insert(field.into(), value);
        self
    }

    pub fn less_than(mut self, field: impl Into<String>, value: f64) -> Self {
        self.less_than.insert(field.into(), value);
        self
    }

    pub fn less_or_equal(mut self, field: impl Into<String>, value: f64) -> Self {
        self.less_or_equal.insert(field.into(), value);
        self
    }

    pub fn contains(mut self, field: impl Into<String>, term: impl Into<String>) -> Self {
        self.contains.insert(field.into(), term.into());
        self
    }

    /// True when no predicate appears anywhere in the tree.
    pub fn is_empty(&self) -> bool {
        self.equals.is_empty()
            && self.one_of.is_empty()
            && self.none_of.is_empty()
            && self.greater_than.is_empty()
            && self.greater_or_equal.is_empty()
            && self.less_than.is_empty()
            && self.less_or_equal.is_empty()
            && self.contains.is_empty()
            && self.and.iter().all(MetadataFilter::is_empty)
            && self.or_is_unconstrained()
    }

    /// An `or` list constrains nothing when it is empty or when any branch
    /// is itself unconstrained.
    fn or_is_unconstrained(&self) -> bool {
        self.or.is_empty() || self.or.iter().any(MetadataFilter::is_empty)
    }

    // -----------------------------------------------------------------------
    // In-process evaluation
    // -----------------------------------------------------------------------

    /// Evaluate the filter against a metadata map.
    pub fn matches(&self, metadata: &Metadata) -> bool {
        let text = |field: &str| metadata.get(field).and_then(value_text);
        let number = |field: &str| metadata.get(field).and_then(Value::as_f64);

        let equals_ok = self.equals.iter().all(|(field, expected)| match expected {
            Value::Null => metadata.get(field).map_or(true, Value::is_null),
            Value::Array(_) | Value::Object(_) => metadata.get(field) == Some(expected),
            _ => scalar_eq(metadata.get(field), expected),
        });
        let in_ok = self.one_of.iter().all(|(field, values)| {
            values.iter().any(|v| scalar_eq(metadata.get(field), v))
        });
        let not_in_ok = self.none_of.iter().all(|(field, values)| {
            let mut candidates = values.iter().filter(|v| is_scalar(v)).peekable();
            if candidates.peek().is_none() {
                return true;
            }
            text(field).is_some() && candidates.all(|v| !scalar_eq(metadata.get(field), v))
        });
        let cmp_ok = |preds: &BTreeMap<String, f64>, cmp: fn(f64, f64) -> bool| {
            preds
                .iter()
                .all(|(field, bound)| number(field).is_some_and(|n| cmp(n, *bound)))
        };
        let contains_ok = self
            .contains
            .iter()
            .all(|(field, term)| text(field).is_some_and(|t| t.contains(term.as_str())));

        equals_ok
            && in_ok
            && not_in_ok
            && cmp_ok(&self.greater_than, |a, b| a > b)
            && cmp_ok(&self.greater_or_equal, |a, b| a >= b)
            && cmp_ok(&self.less_than, |a, b| a < b)
            && cmp_ok(&self.less_or_equal, |a, b| a <= b)
            && contains_ok
            && self.and.iter().all(|f| f.matches(metadata))
            && (self.or_is_unconstrained() || self.or.iter().any(|f| f.matches(metadata)))
    }

    // -----------------------------------------------------------------------
    // Document-store JSON filter
    // -----------------------------------------------------------------------

    /// Translate into a Mongo-style JSON filter.
    ///
    /// `equals`/`in`/`not_in`/`contains` become `$eq`/`$in`/`$nin`/`$contains`
    /// under the field key; numeric comparisons and `and` children are
    /// collected under a top-level `$and`; `or` children under `$or`. An
    /// empty filter translates to `{}`.
    pub fn to_document_filter(&self) -> Value {
        let mut out = Map::new();
        let mut conjuncts: Vec<Value> = Vec::new();

        let field_op = |out: &mut Map<String, Value>, field: &str, op: &str, value: Value| {
            let entry = out
                .entry(field.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(ops) = entry {
                ops.insert(op.to_string(), value);
            }
        };

        for (field, value) in &self.equals {
            field_op(&mut out, field, "$eq", value.clone());
        }
        for (field, values) in &self.one_of {
            field_op(&mut out, field, "$in", Value::Array(values.clone()));
        }
        for (field, values) in &self.none_of {
            field_op(&mut out, field, "$nin", Value::Array(values.clone()));
        }
        for (field, term) in &self.contains {
            field_op(&mut out, field, "$contains", Value::String(term.clone()));
        }

        let comparisons = [
            ("$gt", &self.greater_than),
            ("$gte", &self.greater_or_equal),
            ("$lt", &self.less_than),
            ("$lte", &self.less_or_equal),
        ];
        for (op, preds) in comparisons {
            for (field, bound) in preds {
                conjuncts.push(json!({ field.as_str(): { op: bound } }));
            }
        }

        conjuncts.extend(
            self.and
                .iter()
                .filter(|f| !f.is_empty())
                .map(MetadataFilter::to_document_filter),
        );
        if !conjuncts.is_empty() {
            out.insert("$and".to_string(), Value::Array(conjuncts));
        }

        if !self.or_is_unconstrained() {
            let branches = self.or.iter().map(MetadataFilter::to_document_filter).collect();
            out.insert("$or".to_string(), Value::Array(branches));
        }

        Value::Object(out)
    }

    // -----------------------------------------------------------------------
    // SQL fragment
    // -----------------------------------------------------------------------

    /// Translate into a parameterized predicate over the JSONB metadata column.
    ///
    /// Placeholders are numbered from `start_index` (`$start_index`,
    /// `$start_index + 1`, ...) so the fragment can be spliced into a larger
    /// statement. Field names are sanitized and embedded as path literals;
    /// every value travels as a bound parameter.
    pub fn to_sql(&self, start_index: usize) -> SqlFilter {
        let mut writer = SqlWriter {
            next: start_index,
            params: Vec::new(),
        };
        let clause = writer.node(self).unwrap_or_default();
        SqlFilter {
            clause,
            params: writer.params,
        }
    }
}

/// A value bound to a placeholder of a [`SqlFilter`].
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Text(String),
    Number(f64),
    Json(Value),
}

/// Output of [`MetadataFilter::to_sql`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFilter {
    /// Boolean SQL expression; empty when the filter matches everything.
    pub clause: String,
    /// Values for the placeholders, in placeholder order.
    pub params: Vec<SqlParam>,
}

impl SqlFilter {
    pub fn is_empty(&self) -> bool {
        self.clause.is_empty()
    }

    /// `" WHERE <clause>"`, or an empty string.
    pub fn where_clause(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", self.clause)
        }
    }

    /// `" AND <clause>"`, or an empty string.
    pub fn and_clause(&self) -> String {
        if self.is_empty() {
            String::new()
        } else {
            format!(" AND {}", self.clause)
        }
    }
}

struct SqlWriter {
    next: usize,
    params: Vec<SqlParam>,
}

impl SqlWriter {
    fn bind(&mut self, param: SqlParam) -> String {
        let placeholder = format!("${}", self.next);
        self.next += 1;
        self.params.push(param);
        placeholder
    }

    fn bind_all(&mut self, params: impl IntoIterator<Item = SqlParam>) -> String {
        params
            .into_iter()
            .map(|p| self.bind(p))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn node(&mut self, filter: &MetadataFilter) -> Option<String> {
        let mut conds: Vec<String> = Vec::new();

        for (field, value) in &filter.equals {
            let field = sanitize_field(field);
            let cond = match value {
                Value::Null => format!("({} IS NULL)", text_path(&field)),
                Value::Array(_) | Value::Object(_) => {
                    let p = self.bind(SqlParam::Json(value.clone()));
                    format!("({} = {p}::jsonb)", json_path(&field))
                }
                Value::Number(n) => {
                    let p = self.bind(SqlParam::Number(n.as_f64().unwrap_or(f64::NAN)));
                    format!("({} = {p})", numeric_path(&field))
                }
                _ => {
                    let p = self.bind(SqlParam::Text(value_text(value).unwrap_or_default()));
                    format!("({} = {p})", text_path(&field))
                }
            };
            conds.push(cond);
        }

        for (field, values) in &filter.one_of {
            let field = sanitize_field(field);
            let (texts, numbers) = split_scalars(values);
            let mut alternatives = Vec::new();
            if !texts.is_empty() {
                let list = self.bind_all(texts.into_iter().map(SqlParam::Text));
                alternatives.push(format!("{} IN ({list})", text_path(&field)));
            }
            if !numbers.is_empty() {
                let list = self.bind_all(numbers.into_iter().map(SqlParam::Number));
                alternatives.push(format!("{} IN ({list})", numeric_path(&field)));
            }
            if alternatives.is_empty() {
                conds.push("FALSE".to_string());
            } else {
                conds.push(format!("({})", alternatives.join(" OR ")));
            }
        }

        // A missing field never satisfies not_in; a non-numeric field is
        // never equal to a numeric candidate.
        for (field, values) in &filter.none_of {
            let field = sanitize_field(field);
            let (texts, numbers) = split_scalars(values);
            if texts.is_empty() && numbers.is_empty() {
                continue;
            }
            let mut parts = Vec::new();
            if texts.is_empty() {
                parts.push(format!("{} IS NOT NULL", text_path(&field)));
            } else {
                let list = self.bind_all(texts.into_iter().map(SqlParam::Text));
                parts.push(format!("{} NOT IN ({list})", text_path(&field)));
            }
            if !numbers.is_empty() {
                let list = self.bind_all(numbers.into_iter().map(SqlParam::Number));
                parts.push(format!("COALESCE({} NOT IN ({list}), TRUE)", numeric_path(&field)));
            }
            conds.push(format!("({})", parts.join(" AND ")));
        }

        let comparisons = [
            (">", &filter.greater_than),
            (">=", &filter.greater_or_equal),
            ("<", &filter.less_than),
            ("<=", &filter.less_or_equal),
        ];
        for (op, preds) in comparisons {
            for (field, bound) in preds {
                let field = sanitize_field(field);
                let p = self.bind(SqlParam::Number(*bound));
                conds.push(format!("({} {op} {p})", numeric_path(&field)));
            }
        }

        for (field, term) in &filter.contains {
            let field = sanitize_field(field);
            let p = self.bind(SqlParam::Text(format!("%{}%", escape_like(term))));
            conds.push(format!("({} LIKE {p})", text_path(&field)));
        }

        for child in &filter.and {
            if let Some(cond) = self.node(child) {
                conds.push(cond);
            }
        }

        if !filter.or_is_unconstrained() {
            let branches: Vec<String> = filter.or.iter().filter_map(|f| self.node(f)).collect();
            match branches.len() {
                0 => {}
                1 => conds.extend(branches),
                _ => conds.push(format!("({})", branches.join(" OR "))),
            }
        }

        match conds.len() {
            0 => None,
            1 => conds.pop(),
            _ => Some(format!("({})", conds.join(" AND "))),
        }
    }
}

/// Strip every character that is not ASCII alphanumeric or `_`.
///
/// Field names become part of the SQL text (JSON path literals cannot be
/// bound), so this is the only thing standing between user input and the
/// statement.
pub fn sanitize_field(field: &str) -> String {
    field
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '_')
        .collect()
}

/// Escape `\`, `%` and `_` for use inside a LIKE pattern.
pub fn escape_like(term: &str) -> String {
    let mut out = String::with_capacity(term.len());
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn text_path(field: &str) -> String {
    format!("{METADATA_COLUMN}->>'{field}'")
}

fn json_path(field: &str) -> String {
    format!("{METADATA_COLUMN}->'{field}'")
}

/// Numeric view of a field; NULL for non-numbers so casts never fail.
fn numeric_path(field: &str) -> String {
    format!(
        "(CASE WHEN jsonb_typeof({json}) = 'number' THEN ({text})::float8 END)",
        json = json_path(field),
        text = text_path(field),
    )
}

fn is_scalar(value: &Value) -> bool {
    matches!(value, Value::String(_) | Value::Number(_) | Value::Bool(_))
}

/// Scalar equality as the SQL translation evaluates it: numbers compare
/// numerically against numeric fields, everything else by text.
fn scalar_eq(actual: Option<&Value>, expected: &Value) -> bool {
    match expected {
        Value::Number(n) => actual
            .and_then(Value::as_f64)
            .zip(n.as_f64())
            .is_some_and(|(a, b)| a == b),
        _ => match (actual.and_then(value_text), value_text(expected)) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        },
    }
}

/// Split an `in`/`not_in` list into text and numeric candidates; other
/// values are dropped.
fn split_scalars(values: &[Value]) -> (Vec<String>, Vec<f64>) {
    let mut texts = Vec::new();
    let mut numbers = Vec::new();
    for value in values {
        match value {
            Value::Number(n) => numbers.extend(n.as_f64()),
            other => texts.extend(value_text(other)),
        }
    }
    (texts, numbers)
}

/// Text rendering of a scalar, matching what `->>` yields in PostgreSQL.
fn value_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
