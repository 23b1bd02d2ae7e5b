//! List query parameters: filters, full-text search, sorting, pagination and includes.

use crate::document::{lookup, value_to_text, Record};
use crate::error::AppError;
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;

/// Limit used by `_page` when `_limit` is absent.
pub const DEFAULT_PAGE_LIMIT: usize = 10;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
    Gte,
    Lte,
    Like,
}

#[derive(Clone, Debug)]
pub struct Filter {
    pub field: String,
    pub op: FilterOp,
    pub value: String,
    like: Option<Regex>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

/// Page-style and slice-style are mutually exclusive; page wins when both are given.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Pagination {
    Page { page: usize, limit: usize },
    Slice { start: usize, end: Option<usize>, limit: Option<usize> },
}

#[derive(Clone, Debug, Default)]
pub struct ListQuery {
    pub filters: Vec<Filter>,
    pub q: Option<String>,
    pub sort: Vec<SortKey>,
    pub pagination: Option<Pagination>,
    pub embed: Vec<String>,
    pub expand: Vec<String>,
}

/// Result of a list query: the requested slice plus the filtered total.
#[derive(Clone, Debug, PartialEq)]
pub struct Page {
    pub items: Vec<Record>,
    pub total: usize,
    pub pagination: Option<Pagination>,
}

fn parse_usize(key: &str, v: &str) -> Result<usize, AppError> {
    v.trim()
        .parse()
        .map_err(|_| AppError::BadRequest(format!("{} must be a non-negative integer", key)))
}

fn split_list(v: &str) -> impl Iterator<Item = String> + '_ {
    v.split(',').map(str::trim).filter(|s| !s.is_empty()).map(String::from)
}

impl Filter {
    pub fn new(field: &str, op: FilterOp, value: &str) -> Result<Self, AppError> {
        let like = match op {
            FilterOp::Like => Some(
                Regex::new(&format!("(?i){}", value))
                    .map_err(|e| AppError::BadRequest(format!("invalid _like pattern for {}: {}", field, e)))?,
            ),
            _ => None,
        };
        Ok(Filter {
            field: field.to_string(),
            op,
            value: value.to_string(),
            like,
        })
    }

    fn matches(&self, record: &Record) -> bool {
        let found = lookup(record, &self.field);
        match self.op {
            FilterOp::Eq => found.map(|v| text_eq(v, &self.value)).unwrap_or(false),
            FilterOp::Ne => !found.map(|v| text_eq(v, &self.value)).unwrap_or(false),
            FilterOp::Gte => found
                .map(|v| compare_to_text(v, &self.value) != Some(Ordering::Less))
                .unwrap_or(false),
            FilterOp::Lte => found
                .map(|v| compare_to_text(v, &self.value) != Some(Ordering::Greater))
                .unwrap_or(false),
            FilterOp::Like => match (found.and_then(value_to_text), &self.like) {
                (Some(text), Some(re)) => re.is_match(&text),
                _ => false,
            },
        }
    }
}

/// Scalars compare by textual form; arrays match when any element does.
fn text_eq(value: &Value, expected: &str) -> bool {
    match value {
        Value::Array(items) => items.iter().any(|v| text_eq(v, expected)),
        other => value_to_text(other).as_deref() == Some(expected),
    }
}

fn compare_to_text(value: &Value, expected: &str) -> Option<Ordering> {
    if let (Some(a), Ok(b)) = (value.as_f64(), expected.parse::<f64>()) {
        return a.partial_cmp(&b);
    }
    value_to_text(value).map(|text| text.as_str().cmp(expected))
}

fn contains_text(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(s) => s.to_lowercase().contains(needle),
        Value::Array(items) => items.iter().any(|v| contains_text(v, needle)),
        Value::Object(map) => map.values().any(|v| contains_text(v, needle)),
        _ => false,
    }
}

fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => match (a, b) {
            (Value::Number(x), Value::Number(y)) => x
                .as_f64()
                .partial_cmp(&y.as_f64())
                .unwrap_or(Ordering::Equal),
            (Value::String(x), Value::String(y)) => x.cmp(y),
            (Value::Bool(x), Value::Bool(y)) => x.cmp(y),
            _ => value_to_text(a).cmp(&value_to_text(b)),
        },
    }
}

impl ListQuery {
    /// Build from raw query pairs. Reserved names drive search, sort, paging and includes;
    /// `_` (cache buster) and `callback` are ignored; any other key is a filter.
    pub fn from_params(params: &[(String, String)]) -> Result<Self, AppError> {
        let mut query = ListQuery::default();
        let mut sort_fields: Vec<String> = Vec::new();
        let mut orders: Vec<String> = Vec::new();
        let (mut page, mut limit, mut start, mut end) = (None, None, None, None);

        for (k, v) in params {
            match k.as_str() {
                "q" => query.q = Some(v.to_lowercase()).filter(|s| !s.is_empty()),
                "_sort" => sort_fields.extend(split_list(v)),
                "_order" => orders.extend(split_list(v)),
                "_page" => page = Some(parse_usize(k, v)?),
                "_limit" => limit = Some(parse_usize(k, v)?),
                "_start" => start = Some(parse_usize(k, v)?),
                "_end" => end = Some(parse_usize(k, v)?),
                "_embed" => query.embed.extend(split_list(v)),
                "_expand" => query.expand.extend(split_list(v)),
                "_" | "callback" => {}
                _ => {
                    let (field, op) = [
                        ("_gte", FilterOp::Gte),
                        ("_lte", FilterOp::Lte),
                        ("_ne", FilterOp::Ne),
                        ("_like", FilterOp::Like),
                    ]
                    .iter()
                    .find_map(|(suffix, op)| k.strip_suffix(suffix).map(|f| (f, *op)))
                    .unwrap_or((k.as_str(), FilterOp::Eq));
                    if field.is_empty() {
                        continue;
                    }
                    query.filters.push(Filter::new(field, op, v)?);
                }
            }
        }

        for (i, field) in sort_fields.into_iter().enumerate() {
            let (field, mut descending) = match field.strip_prefix('-') {
                Some(f) => (f.to_string(), true),
                None => (field, false),
            };
            if let Some(order) = orders.get(i) {
                descending = order.eq_ignore_ascii_case("desc");
            }
            query.sort.push(SortKey { field, descending });
        }

        query.pagination = match (page, start, end, limit) {
            (Some(page), _, _, limit) => Some(Pagination::Page {
                page: page.max(1),
                limit: limit.unwrap_or(DEFAULT_PAGE_LIMIT),
            }),
            (None, None, None, None) => None,
            (None, start, end, limit) => Some(Pagination::Slice {
                start: start.unwrap_or(0),
                end,
                limit,
            }),
        };
        Ok(query)
    }

    /// Filters are AND-ed across fields; repeated conditions on the same field and operator are OR-ed.
    pub fn matches(&self, record: &Record) -> bool {
        let mut groups: Vec<(&str, FilterOp, Vec<&Filter>)> = Vec::new();
        for f in &self.filters {
            match groups.iter_mut().find(|(field, op, _)| *field == f.field && *op == f.op) {
                Some((_, _, members)) => members.push(f),
                None => groups.push((f.field.as_str(), f.op, vec![f])),
            }
        }
        let filtered = groups.iter().all(|(_, op, members)| match op {
            FilterOp::Ne => members.iter().all(|f| f.matches(record)),
            _ => members.iter().any(|f| f.matches(record)),
        });
        filtered
            && self
                .q
                .as_deref()
                .map(|needle| record.values().any(|v| contains_text(v, needle)))
                .unwrap_or(true)
    }

    pub fn apply<'a, I>(&self, records: I) -> Page
    where
        I: IntoIterator<Item = &'a Record>,
    {
        let mut items: Vec<Record> = records.into_iter().filter(|r| self.matches(r)).cloned().collect();
        if !self.sort.is_empty() {
            items.sort_by(|a, b| {
                self.sort
                    .iter()
                    .map(|key| {
                        let ord = compare_values(lookup(a, &key.field), lookup(b, &key.field));
                        if key.descending {
                            ord.reverse()
                        } else {
                            ord
                        }
                    })
                    .find(|ord| *ord != Ordering::Equal)
                    .unwrap_or(Ordering::Equal)
            });
        }
        let total = items.len();
        let items = match self.pagination {
            None => items,
            Some(Pagination::Page { page, limit }) => items
                .into_iter()
                .skip((page - 1).saturating_mul(limit))
                .take(limit)
                .collect(),
            Some(Pagination::Slice { start, end, limit }) => {
                let end = end.or_else(|| limit.map(|l| start.saturating_add(l))).unwrap_or(total);
                items
                    .into_iter()
                    .skip(start)
                    .take(end.saturating_sub(start))
                    .collect()
            }
        };
        Page {
            items,
            total,
            pagination: self.pagination,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn records() -> Vec<Record> {
        json!([
            {"id": 1, "title": "Hello world", "views": 10, "author": {"name": "ann"}},
            {"id": 2, "title": "Second", "views": 50, "author": {"name": "bob"}},
            {"id": 3, "title": "third hello", "views": 30, "author": {"name": "ann"}},
            {"id": 4, "title": "Fourth", "views": 20}
        ])
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v.as_object().unwrap().clone())
        .collect()
    }

    fn params(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    fn ids(page: &Page) -> Vec<i64> {
        page.items.iter().map(|r| r["id"].as_i64().unwrap()).collect()
    }

    #[test]
    fn filters_by_exact_match_and_operators() {
        let rs = records();
        let q = ListQuery::from_params(&params(&[("views_gte", "20"), ("views_lte", "40")])).unwrap();
        assert_eq!(ids(&q.apply(&rs)), vec![3, 4]);

        let q = ListQuery::from_params(&params(&[("author.name", "ann")])).unwrap();
        assert_eq!(ids(&q.apply(&rs)), vec![1, 3]);

        let q = ListQuery::from_params(&params(&[("id_ne", "1"), ("id_ne", "2")])).unwrap();
        assert_eq!(ids(&q.apply(&rs)), vec![3, 4]);

        let q = ListQuery::from_params(&params(&[("id", "1"), ("id", "4")])).unwrap();
        assert_eq!(ids(&q.apply(&rs)), vec![1, 4]);

        let q = ListQuery::from_params(&params(&[("title_like", "^hel")])).unwrap();
        assert_eq!(ids(&q.apply(&rs)), vec![1]);
    }

    #[test]
    fn full_text_search_scans_nested_strings() {
        let rs = records();
        let q = ListQuery::from_params(&params(&[("q", "HELLO")])).unwrap();
        assert_eq!(ids(&q.apply(&rs)), vec![1, 3]);
        let q = ListQuery::from_params(&params(&[("q", "bob")])).unwrap();
        assert_eq!(ids(&q.apply(&rs)), vec![2]);
    }

    #[test]
    fn sorts_by_multiple_keys() {
        let rs = records();
        let q = ListQuery::from_params(&params(&[("_sort", "views"), ("_order", "desc")])).unwrap();
        assert_eq!(ids(&q.apply(&rs)), vec![2, 3, 4, 1]);
        let q = ListQuery::from_params(&params(&[("_sort", "author.name,-id")])).unwrap();
        assert_eq!(ids(&q.apply(&rs)), vec![3, 1, 2, 4]);
    }

    #[test]
    fn page_style_takes_precedence_over_slice() {
        let rs = records();
        let q = ListQuery::from_params(&params(&[("_page", "2"), ("_limit", "3"), ("_start", "0")])).unwrap();
        assert_eq!(q.pagination, Some(Pagination::Page { page: 2, limit: 3 }));
        let page = q.apply(&rs);
        assert_eq!(ids(&page), vec![4]);
        assert_eq!(page.total, 4);

        let q = ListQuery::from_params(&params(&[("_start", "1"), ("_end", "3")])).unwrap();
        assert_eq!(ids(&q.apply(&rs)), vec![2, 3]);
        let q = ListQuery::from_params(&params(&[("_start", "2"), ("_limit", "1")])).unwrap();
        assert_eq!(ids(&q.apply(&rs)), vec![3]);
    }

    #[test]
    fn rejects_bad_numbers_and_patterns() {
        assert!(ListQuery::from_params(&params(&[("_page", "x")])).is_err());
        assert!(ListQuery::from_params(&params(&[("title_like", "(")])).is_err());
    }

    #[test]
    fn underscore_fields_filter_unless_reserved() {
        let rs: Vec<Record> = [json!({"_id": 1, "title": "a"}), json!({"_id": 2, "title": "b"})]
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect();
        let q = ListQuery::from_params(&params(&[("_id", "2"), ("_", "1697500000000")])).unwrap();
        assert_eq!(q.filters.len(), 1);
        let page = q.apply(&rs);
        assert_eq!(page.items.len(), 1);
        assert_eq!(page.items[0]["title"], json!("b"));

        let q = ListQuery::from_params(&params(&[("_id_ne", "2"), ("callback", "cb")])).unwrap();
        assert_eq!(q.apply(&rs).items[0]["_id"], json!(1));
    }

    #[test]
    fn collects_includes() {
        let q = ListQuery::from_params(&params(&[("_embed", "comments,likes"), ("_expand", "user")])).unwrap();
        assert_eq!(q.embed, vec!["comments", "likes"]);
        assert_eq!(q.expand, vec!["user"]);
    }
}
