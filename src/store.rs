//! The live document. Reads clone an `Arc` snapshot; writes are serialized, build a new
//! document and swap it in, then schedule a flush to the backing file.

use crate::config::ResourceOptions;
use crate::document::{Document, Record};
use crate::error::{AppError, PersistError};
use crate::persistence::FileSink;
use crate::service::{CrudService, ListQuery, Page};
use serde_json::Value;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

pub struct Store {
    current: RwLock<Arc<Document>>,
    writer: tokio::sync::Mutex<()>,
    revision: AtomicU64,
    options: ResourceOptions,
    sink: Option<FileSink>,
}

impl Store {
    /// In-memory only: mutations are never persisted (remote and seed sources, read-only tests).
    pub fn in_memory(doc: Document, options: ResourceOptions) -> Self {
        Store {
            current: RwLock::new(Arc::new(doc)),
            writer: tokio::sync::Mutex::new(()),
            revision: AtomicU64::new(0),
            options,
            sink: None,
        }
    }

    /// Backed by `sink`; every successful mutation schedules a flush.
    pub fn with_sink(doc: Document, options: ResourceOptions, sink: FileSink) -> Self {
        Store {
            sink: Some(sink),
            ..Store::in_memory(doc, options)
        }
    }

    pub fn options(&self) -> &ResourceOptions {
        &self.options
    }

    pub fn sink(&self) -> Option<&FileSink> {
        self.sink.as_ref()
    }

    /// Consistent view for the duration of one request.
    pub fn snapshot(&self) -> Arc<Document> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Bumped by every swap. Read before loading a file so a reload can tell whether it is stale.
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    fn swap(&self, doc: Arc<Document>) {
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = doc;
        self.revision.fetch_add(1, Ordering::AcqRel);
    }

    /// Records of a collection; unknown names read as empty.
    pub fn read(&self, collection: &str) -> Vec<Record> {
        self.snapshot().records(collection).cloned().collect()
    }

    pub fn query(&self, collection: &str, query: &ListQuery) -> Page {
        CrudService::list(&self.snapshot(), &self.options, collection, query)
    }

    pub fn get_by_id(&self, collection: &str, id: &str) -> Option<Record> {
        CrudService::read(&self.snapshot(), &self.options, collection, id)
    }

    /// Apply `f` to a private copy of the document under the writer lock. The copy replaces
    /// the live document only when `f` succeeds.
    pub async fn mutate<T, F>(&self, f: F) -> Result<T, AppError>
    where
        F: FnOnce(&mut Document, &ResourceOptions) -> Result<T, AppError>,
    {
        let _writer = self.writer.lock().await;
        let mut doc = (*self.snapshot()).clone();
        let out = f(&mut doc, &self.options)?;
        let doc = Arc::new(doc);
        self.swap(doc.clone());
        if let Some(sink) = &self.sink {
            sink.request(doc);
        }
        Ok(out)
    }

    pub async fn create(&self, collection: &str, record: Record) -> Result<Record, AppError> {
        self.mutate(|doc, opts| CrudService::create(doc, opts, collection, record))
            .await
    }

    pub async fn update(&self, collection: &str, id: &str, record: Record, merge: bool) -> Result<Record, AppError> {
        self.mutate(|doc, opts| CrudService::update(doc, opts, collection, id, record, merge))
            .await
    }

    pub async fn delete(&self, collection: &str, id: &str) -> Result<Record, AppError> {
        let (removed, cascaded) = self
            .mutate(|doc, opts| CrudService::delete(doc, opts, collection, id))
            .await?;
        tracing::debug!(collection, id, cascaded, "deleted");
        Ok(removed)
    }

    pub async fn write_singleton(&self, name: &str, body: Value, merge: bool) -> Result<Value, AppError> {
        self.mutate(|doc, _| CrudService::write_singleton(doc, name, body, merge))
            .await
    }

    /// Swap in `doc`, parsed from `text` on disk, unless the store moved on since `seen` or the
    /// content is our own flush or already live. Not flushed back. Returns whether it swapped.
    pub async fn replace_if_changed(&self, doc: Document, text: &str, seen: u64) -> bool {
        let _writer = self.writer.lock().await;
        if self.revision() != seen {
            return false;
        }
        if self.sink.as_ref().is_some_and(|s| s.is_own_write(text)) {
            return false;
        }
        if *self.snapshot() == doc {
            return false;
        }
        self.swap(Arc::new(doc));
        true
    }

    /// Write the current document now, bypassing the coalescing queue.
    pub async fn flush(&self) -> Result<(), PersistError> {
        match &self.sink {
            Some(sink) => sink.write_now(&self.snapshot()).await,
            None => Ok(()),
        }
    }
}
