use serde_json::Value;
use std::ops::Range;

use super::error::FilterError;
use super::params::page_offset;
use super::types::{split_filter_value, Condition, FilterParams, OrderBy, SortDirection, SqlResult};

/// Lazily-built collection query. Nothing runs until a `DataStore` executes it;
/// the `apply_*` functions only record conditions on it.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionQuery {
    table: String,
    conditions: Vec<Condition>,
    order: Vec<OrderBy>,
    range: Option<Range<usize>>,
}

impl CollectionQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            conditions: vec![],
            order: vec![],
            range: None,
        }
    }

    /// Exact match on one column, used for tenant scoping
    pub fn eq(mut self, column: impl Into<String>, value: impl Into<String>) -> Self {
        self.conditions.push(Condition::Eq { column: column.into(), value: value.into() });
        self
    }

    pub fn order_by(mut self, column: impl Into<String>, sort: SortDirection) -> Self {
        self.order.push(OrderBy { column: column.into(), sort });
        self
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn conditions(&self) -> &[Condition] {
        &self.conditions
    }

    pub fn order(&self) -> &[OrderBy] {
        &self.order
    }

    pub fn range(&self) -> Option<Range<usize>> {
        self.range.clone()
    }

    /// Render to parameterized SQL. Each row comes back as one `record` jsonb column.
    pub fn to_sql(&self) -> Result<SqlResult, FilterError> {
        validate_identifier(&self.table).map_err(FilterError::InvalidTableName)?;

        let mut params: Vec<Value> = vec![];
        let mut clauses: Vec<String> = vec![];

        for condition in &self.conditions {
            match condition {
                Condition::AnyContains { columns, needle } => {
                    params.push(Value::String(format!("%{}%", escape_like(needle))));
                    let slot = params.len();
                    let parts = columns
                        .iter()
                        .map(|c| Ok(format!("{} ILIKE ${}", quote_column(c)?, slot)))
                        .collect::<Result<Vec<_>, FilterError>>()?;
                    clauses.push(format!("({})", parts.join(" OR ")));
                }
                Condition::Eq { column, value } => {
                    params.push(Value::String(value.clone()));
                    clauses.push(format!("{}::text = ${}", quote_column(column)?, params.len()));
                }
                Condition::In { column, values } => {
                    if values.is_empty() {
                        clauses.push("1=0".to_string());
                        continue;
                    }
                    let slots: Vec<String> = values
                        .iter()
                        .map(|v| {
                            params.push(Value::String(v.clone()));
                            format!("${}", params.len())
                        })
                        .collect();
                    clauses.push(format!("{}::text IN ({})", quote_column(column)?, slots.join(", ")));
                }
            }
        }

        let order_clause = if self.order.is_empty() {
            String::new()
        } else {
            let parts = self
                .order
                .iter()
                .map(|o| Ok(format!("{} {}", quote_column(&o.column)?, o.sort.to_sql())))
                .collect::<Result<Vec<_>, FilterError>>()?;
            format!("ORDER BY {}", parts.join(", "))
        };

        let limit_clause = match &self.range {
            Some(range) => format!("LIMIT {} OFFSET {}", range.end.saturating_sub(range.start), range.start),
            None => String::new(),
        };

        let query = [
            format!("SELECT to_jsonb(t) AS record FROM \"{}\" AS t", self.table),
            if clauses.is_empty() { String::new() } else { format!("WHERE {}", clauses.join(" AND ")) },
            order_clause,
            limit_clause,
        ]
        .into_iter()
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(" ");

        Ok(SqlResult { query, params })
    }
}

/// Add a case-insensitive "contains `q` in any of `columns`" condition.
/// Empty `q` or no columns leaves the query untouched.
pub fn apply_search(query: CollectionQuery, q: &str, columns: &[&str]) -> CollectionQuery {
    if q.is_empty() || columns.is_empty() {
        return query;
    }
    let mut query = query;
    query.conditions.push(Condition::AnyContains {
        columns: columns.iter().map(|c| c.to_string()).collect(),
        needle: q.to_string(),
    });
    query
}

/// Add one equality (single value) or membership (comma-separated values) test per field
pub fn apply_filters(query: CollectionQuery, filters: &FilterParams) -> CollectionQuery {
    let mut query = query;
    for (field, raw) in filters {
        let mut values = split_filter_value(raw);
        match values.len() {
            0 => {}
            1 => query.conditions.push(Condition::Eq {
                column: field.clone(),
                value: values.remove(0),
            }),
            _ => query.conditions.push(Condition::In { column: field.clone(), values }),
        }
    }
    query
}

/// Restrict to records `[(page-1)*limit, (page-1)*limit + limit)`
pub fn apply_pagination(query: CollectionQuery, page: u32, limit: u32) -> CollectionQuery {
    let start = page_offset(page, limit);
    let mut query = query;
    query.range = Some(start..start.saturating_add(limit as usize));
    query
}

fn quote_column(column: &str) -> Result<String, FilterError> {
    validate_identifier(column).map_err(FilterError::InvalidColumn)?;
    Ok(format!("t.\"{}\"", column))
}

fn validate_identifier(name: &str) -> Result<(), String> {
    let mut chars = name.chars();
    match chars.next() {
        None => Err("name cannot be empty".to_string()),
        Some(first) if !(first.is_ascii_alphabetic() || first == '_') => {
            Err(format!("invalid name format: {}", name))
        }
        Some(_) if !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') => {
            Err(format!("invalid name format: {}", name))
        }
        Some(_) => Ok(()),
    }
}

// LIKE metacharacters must match literally so ILIKE agrees with a plain substring test
fn escape_like(needle: &str) -> String {
    let mut out = String::with_capacity(needle.len());
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
