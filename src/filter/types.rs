use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::borrow::Cow;
use std::collections::BTreeMap;

/// One row of a collection, keyed by column name
pub type Record = serde_json::Map<String, Value>;

/// Allow-listed exact-match filters: field name -> raw value (possibly comma-separated)
pub type FilterParams = BTreeMap<String, String>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

impl SortDirection {
    pub fn to_sql(&self) -> &'static str {
        match self {
            SortDirection::Asc => "ASC",
            SortDirection::Desc => "DESC",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub column: String,
    pub sort: SortDirection,
}

/// A single predicate recorded on a `CollectionQuery`
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Case-insensitive substring match in any of the columns
    AnyContains { columns: Vec<String>, needle: String },
    /// Column rendered as text equals the value
    Eq { column: String, value: String },
    /// Column rendered as text is one of the values
    In { column: String, values: Vec<String> },
}

#[derive(Debug, Clone)]
pub struct SqlResult {
    pub query: String,
    pub params: Vec<Value>,
}

/// Render a JSON value the way Postgres renders `column::text`.
/// Null, arrays and objects never take part in equality filters.
pub fn value_as_text(value: &Value) -> Option<Cow<'_, str>> {
    match value {
        Value::String(s) => Some(Cow::Borrowed(s.as_str())),
        Value::Number(n) => Some(Cow::Owned(n.to_string())),
        Value::Bool(b) => Some(Cow::Borrowed(if *b { "true" } else { "false" })),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Split a raw filter value on commas, trimming entries and dropping empty ones
pub fn split_filter_value(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
