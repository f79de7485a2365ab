use std::ops::Range;

use crate::config::ListConfig;

use super::types::FilterParams;

/// Parsed `page` / `limit` / `q` of a list request. Never fails: bad input
/// falls back to the defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListQueryParams {
    pub page: u32,
    pub limit: u32,
    pub q: String,
}

impl ListQueryParams {
    pub fn parse(query: Option<&str>, list: &ListConfig) -> Self {
        let mut page = None;
        let mut limit = None;
        let mut q = None;

        // First occurrence wins
        for (key, value) in pairs(query) {
            match &*key {
                "page" if page.is_none() => page = Some(value.into_owned()),
                "limit" if limit.is_none() => limit = Some(value.into_owned()),
                "q" if q.is_none() => q = Some(value.into_owned()),
                _ => {}
            }
        }

        let page = match page.as_deref().and_then(parse_int) {
            Some(p) if p >= 1 => p.min(u32::MAX as i64) as u32,
            _ => 1,
        };

        let max_limit = list.max_limit.max(1) as i64;
        let limit = match limit.as_deref().and_then(parse_int) {
            Some(l) => l.clamp(1, max_limit) as u32,
            None => list.default_limit.clamp(1, max_limit as u32),
        };

        Self {
            page,
            limit,
            q: q.map(|s| s.trim().to_string()).unwrap_or_default(),
        }
    }

    /// Index of the first record of this page
    pub fn offset(&self) -> usize {
        page_offset(self.page, self.limit)
    }

    /// Half-open record range covered by this page
    pub fn range(&self) -> Range<usize> {
        let start = self.offset();
        start..start.saturating_add(self.limit as usize)
    }
}

impl Default for ListQueryParams {
    fn default() -> Self {
        Self::parse(None, &ListConfig::default())
    }
}

/// Parse `page`, `limit` and `q` with the stock limits (default 50, max 200)
pub fn parse_list_params(query: Option<&str>) -> ListQueryParams {
    ListQueryParams::parse(query, &ListConfig::default())
}

/// Collect exact-match filters for the allow-listed fields only.
/// Unknown parameters are ignored so callers can never filter on arbitrary columns.
pub fn parse_filter_params(query: Option<&str>, recognized: &[&str]) -> FilterParams {
    let mut filters = FilterParams::new();
    for (key, value) in pairs(query) {
        if !recognized.contains(&&*key) || filters.contains_key(&*key) {
            continue;
        }
        if value.trim().is_empty() {
            continue;
        }
        filters.insert(key.into_owned(), value.into_owned());
    }
    filters
}

pub(crate) fn page_offset(page: u32, limit: u32) -> usize {
    (page.max(1) as usize - 1).saturating_mul(limit as usize)
}

fn pairs(query: Option<&str>) -> url::form_urlencoded::Parse<'_> {
    url::form_urlencoded::parse(query.unwrap_or("").trim_start_matches('?').as_bytes())
}

fn parse_int(raw: &str) -> Option<i64> {
    raw.trim().parse::<i64>().ok()
}
