//! Local JSON file: read (creating `{}` when missing) and coalesced atomic writes.

use crate::config::{validate_document, validate_source_path};
use crate::document::Document;
use crate::error::{PersistError, SourceError};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;

/// Parse and validate document text. `name` is used in error messages.
pub fn parse_document(text: &str, name: &str) -> Result<Document, SourceError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| SourceError::invalid(name, format!("invalid JSON: {}", e)))?;
    let doc = Document::from_value(value)
        .ok_or_else(|| SourceError::invalid(name, "top-level value must be an object"))?;
    validate_document(&doc, name)?;
    Ok(doc)
}

/// Read the backing file, creating it with `{}` when it does not exist yet.
pub async fn read_or_create(path: &Path) -> Result<Document, SourceError> {
    validate_source_path(path)?;
    let name = path.display().to_string();
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        tokio::fs::write(path, "{}")
            .await
            .map_err(|e| SourceError::invalid(&name, format!("cannot create file: {}", e)))?;
        tracing::info!(path = %name, "created empty database file");
    }
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| SourceError::invalid(&name, e.to_string()))?;
    parse_document(&text, &name)
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}

/// Serialize to a sibling temp file, then rename over the target. Returns the written text.
pub async fn write_document(path: &Path, doc: &Document) -> Result<String, PersistError> {
    let text = doc.to_pretty_json()?;
    let tmp = temp_path(path);
    let flush_err = |source| PersistError::Flush {
        path: path.to_path_buf(),
        source,
    };
    tokio::fs::write(&tmp, &text).await.map_err(flush_err)?;
    tokio::fs::rename(&tmp, path).await.map_err(flush_err)?;
    Ok(text)
}

/// Background writer for the backing file. Requests made while a write is in flight
/// collapse into one follow-up write of the newest document.
pub struct FileSink {
    path: PathBuf,
    tx: watch::Sender<Arc<Document>>,
    last_written: Arc<Mutex<Option<String>>>,
    write_lock: Arc<tokio::sync::Mutex<()>>,
}

impl FileSink {
    /// Start the writer task. Must be called inside a tokio runtime.
    pub fn spawn(path: PathBuf, initial: Arc<Document>) -> Self {
        let (tx, mut rx) = watch::channel(initial);
        let last_written = Arc::new(Mutex::new(None));
        let write_lock = Arc::new(tokio::sync::Mutex::new(()));
        let sink = FileSink {
            path: path.clone(),
            tx,
            last_written: last_written.clone(),
            write_lock: write_lock.clone(),
        };
        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let doc = rx.borrow_and_update().clone();
                let _guard = write_lock.lock().await;
                match write_document(&path, &doc).await {
                    Ok(text) => {
                        *last_written.lock().unwrap_or_else(PoisonError::into_inner) = Some(text);
                        tracing::debug!(path = %path.display(), "flushed");
                    }
                    // The in-memory document stays authoritative; the next mutation retries.
                    Err(e) => tracing::error!(error = %e, "flush failed"),
                }
            }
        });
        sink
    }

    /// Schedule a write of `doc`. Never blocks.
    pub fn request(&self, doc: Arc<Document>) {
        self.tx.send_replace(doc);
    }

    /// Write `doc` now, serialized with the background writer.
    pub async fn write_now(&self, doc: &Document) -> Result<(), PersistError> {
        let _guard = self.write_lock.lock().await;
        let text = write_document(&self.path, doc).await?;
        *self.last_written.lock().unwrap_or_else(PoisonError::into_inner) = Some(text);
        Ok(())
    }

    /// Whether `text` is exactly what this sink last wrote (a watcher echo of our own flush).
    pub fn is_own_write(&self, text: &str) -> bool {
        self.last_written
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_deref()
            == Some(text)
    }
}
