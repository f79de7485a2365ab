//! In-memory counterparts of `apply_search`, `apply_filters` and `apply_pagination`.
//!
//! Used when rows come back from a fixed RPC that cannot filter server-side
//! (the agent path). Both sides must select the same records in the same order.

use serde_json::Value;

use super::params::page_offset;
use super::types::{split_filter_value, value_as_text, FilterParams, Record};

/// Keep records where any of `keys` holds a string containing `q`, ignoring case.
/// Empty `q` returns the input unchanged.
pub fn filter_in_memory(records: Vec<Record>, q: &str, keys: &[&str]) -> Vec<Record> {
    if q.is_empty() || keys.is_empty() {
        return records;
    }
    let needle = q.to_lowercase();
    records
        .into_iter()
        .filter(|record| {
            keys.iter().any(|key| match record.get(*key) {
                Some(Value::String(s)) => s.to_lowercase().contains(&needle),
                _ => false,
            })
        })
        .collect()
}

/// Keep records whose text value equals the filter value, or one of the
/// comma-separated values when several are given
pub fn filter_by_fields_in_memory(records: Vec<Record>, filters: &FilterParams) -> Vec<Record> {
    let wanted: Vec<(&str, Vec<String>)> = filters
        .iter()
        .map(|(field, raw)| (field.as_str(), split_filter_value(raw)))
        .filter(|(_, values)| !values.is_empty())
        .collect();

    if wanted.is_empty() {
        return records;
    }

    records
        .into_iter()
        .filter(|record| {
            wanted.iter().all(|(field, values)| {
                record
                    .get(*field)
                    .and_then(value_as_text)
                    .map(|text| values.iter().any(|v| v.as_str() == &*text))
                    .unwrap_or(false)
            })
        })
        .collect()
}

/// Slice out records `[(page-1)*limit, (page-1)*limit + limit)`; past the end yields nothing
pub fn paginate_in_memory(records: Vec<Record>, page: u32, limit: u32) -> Vec<Record> {
    records
        .into_iter()
        .skip(page_offset(page, limit))
        .take(limit as usize)
        .collect()
}
