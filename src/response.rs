//! Response helpers: plain JSON bodies plus the list headers clients paginate with.

use crate::service::{Page, Pagination};
use axum::{
    http::{header, HeaderValue, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;

/// Total number of matching records before pagination.
pub const TOTAL_COUNT_HEADER: &str = "x-total-count";

pub fn success_one_ok<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(data)).into_response()
}

/// 201 with a `Location` header pointing at the new record.
pub fn created<T: Serialize>(location: &str, data: T) -> Response {
    let mut res = (StatusCode::CREATED, Json(data)).into_response();
    if let Ok(v) = HeaderValue::from_str(location) {
        res.headers_mut().insert(header::LOCATION, v);
    }
    res
}

/// List body with `X-Total-Count` and, for page-style pagination, a `Link` header.
pub fn success_many(page: Page, uri: &Uri) -> Response {
    let total = page.total;
    let link = match page.pagination {
        Some(Pagination::Page { page: current, limit }) => Some(page_links(uri, current, limit, total)),
        _ => None,
    };
    let data: Vec<Value> = page.items.into_iter().map(Value::Object).collect();
    let mut res = (StatusCode::OK, Json(data)).into_response();
    res.headers_mut().insert(TOTAL_COUNT_HEADER, HeaderValue::from(total));
    if let Some(link) = link.filter(|l| !l.is_empty()) {
        if let Ok(v) = HeaderValue::from_str(&link) {
            res.headers_mut().insert(header::LINK, v);
        }
    }
    res
}

fn with_page(uri: &Uri, page: usize) -> String {
    let mut pairs: Vec<String> = uri
        .query()
        .unwrap_or("")
        .split('&')
        .filter(|p| !p.is_empty() && !p.starts_with("_page="))
        .map(String::from)
        .collect();
    pairs.push(format!("_page={}", page));
    format!("{}?{}", uri.path(), pairs.join("&"))
}

/// RFC 8288 links for first / prev / next / last pages.
pub fn page_links(uri: &Uri, current: usize, limit: usize, total: usize) -> String {
    let last = if limit == 0 { 1 } else { total.div_ceil(limit).max(1) };
    let mut links = vec![format!("<{}>; rel=\"first\"", with_page(uri, 1))];
    if current > 1 {
        links.push(format!("<{}>; rel=\"prev\"", with_page(uri, (current - 1).min(last))));
    }
    if current < last {
        links.push(format!("<{}>; rel=\"next\"", with_page(uri, current + 1)));
    }
    links.push(format!("<{}>; rel=\"last\"", with_page(uri, last)));
    links.join(", ")
}
