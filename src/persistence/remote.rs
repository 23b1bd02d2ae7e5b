//! Remote document over HTTP(S). Fetched once; never written back.

use crate::config::validate_document;
use crate::document::Document;
use crate::error::SourceError;
use serde_json::Value;

pub async fn fetch(url: &str) -> Result<Document, SourceError> {
    tracing::info!(url, "fetching remote database");
    let response = reqwest::get(url)
        .await
        .map_err(|e| SourceError::unavailable(url, e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(SourceError::unavailable(url, format!("HTTP {}", status)));
    }
    let value: Value = response
        .json()
        .await
        .map_err(|e| SourceError::unavailable(url, format!("invalid JSON: {}", e)))?;
    let doc = Document::from_value(value)
        .ok_or_else(|| SourceError::unavailable(url, "top-level value must be an object"))?;
    validate_document(&doc, url)?;
    Ok(doc)
}
