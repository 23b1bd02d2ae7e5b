//! Watches the backing file and the routes file; external edits reload the store or the
//! rewrite table. Bursts of events are debounced into one reload.

use crate::config::parse_routes;
use crate::error::PersistError;
use crate::persistence::parse_document;
use crate::rewrite::{RouteRewriter, SharedRewriter};
use crate::store::Store;
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum FileEvent {
    Database,
    Routes,
}

/// Keeps the OS watcher alive; dropping it stops watching.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
}

/// Absolute path with a canonical parent, so it compares equal to paths in OS events.
fn absolute(path: &Path) -> PathBuf {
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    let parent = parent.canonicalize().unwrap_or(parent);
    match path.file_name() {
        Some(name) => parent.join(name),
        None => parent,
    }
}

fn is_target(event_path: &Path, target: &Path) -> bool {
    if event_path == target {
        return true;
    }
    event_path.file_name() == target.file_name() && event_path.parent().map(absolute_dir) == target.parent().map(Path::to_path_buf)
}

fn absolute_dir(dir: &Path) -> PathBuf {
    dir.canonicalize().unwrap_or_else(|_| dir.to_path_buf())
}

/// Start watching. `database` is the backing file (absent for remote and seed sources);
/// `routes` is the route-rewrite file with the table it feeds.
pub fn spawn_watcher(
    store: Arc<Store>,
    database: Option<PathBuf>,
    routes: Option<(PathBuf, SharedRewriter)>,
    debounce: Duration,
) -> Result<FileWatcher, notify::Error> {
    let database = database.map(|p| absolute(&p));
    let routes = routes.map(|(p, r)| (absolute(&p), r));
    let targets: Vec<(PathBuf, FileEvent)> = database
        .iter()
        .map(|p| (p.clone(), FileEvent::Database))
        .chain(routes.iter().map(|(p, _)| (p.clone(), FileEvent::Routes)))
        .collect();

    let (tx, rx) = mpsc::unbounded_channel::<FileEvent>();
    let callback_targets = targets.clone();
    let mut watcher = notify::recommended_watcher(move |res: Result<Event, notify::Error>| match res {
        Ok(event) => {
            if matches!(event.kind, EventKind::Access(_)) {
                return;
            }
            for (target, kind) in &callback_targets {
                if event.paths.iter().any(|p| is_target(p, target)) {
                    let _ = tx.send(*kind);
                }
            }
        }
        Err(e) => tracing::warn!(error = %e, "watch error"),
    })?;

    // Editors often save by writing a new file and renaming it over the old one, which
    // drops a watch on the file itself; watching the directory survives that.
    let mut dirs: BTreeSet<PathBuf> = BTreeSet::new();
    for (target, _) in &targets {
        if let Some(dir) = target.parent() {
            dirs.insert(dir.to_path_buf());
        }
    }
    for dir in &dirs {
        watcher.watch(dir, RecursiveMode::NonRecursive)?;
        tracing::info!(dir = %dir.display(), "watching");
    }

    tokio::spawn(run_reloads(rx, store, database, routes, debounce));
    Ok(FileWatcher { _watcher: watcher })
}

async fn run_reloads(
    mut rx: mpsc::UnboundedReceiver<FileEvent>,
    store: Arc<Store>,
    database: Option<PathBuf>,
    routes: Option<(PathBuf, SharedRewriter)>,
    debounce: Duration,
) {
    while let Some(first) = rx.recv().await {
        let mut pending = BTreeSet::from([first]);
        let mut closed = false;
        loop {
            match tokio::time::timeout(debounce, rx.recv()).await {
                Ok(Some(event)) => {
                    pending.insert(event);
                }
                Ok(None) => {
                    closed = true;
                    break;
                }
                Err(_) => break,
            }
        }
        for event in pending {
            let result = match (event, &database, &routes) {
                (FileEvent::Database, Some(path), _) => reload_database(&store, path).await.map(|_| ()),
                (FileEvent::Routes, _, Some((path, rewriter))) => reload_routes(rewriter, path).await,
                _ => Ok(()),
            };
            if let Err(e) = result {
                tracing::error!(error = %e, "reload failed; keeping previous state");
            }
        }
        if closed {
            break;
        }
    }
}

/// Re-read the backing file and swap it in. Returns whether the store changed.
/// Invalid content and echoes of our own flushes leave the store untouched.
pub async fn reload_database(store: &Store, path: &Path) -> Result<bool, PersistError> {
    let seen = store.revision();
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| PersistError::WatchReload {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
    if store.sink().map(|s| s.is_own_write(&text)).unwrap_or(false) {
        return Ok(false);
    }
    let doc = parse_document(&text, &path.display().to_string()).map_err(|e| PersistError::WatchReload {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    if !store.replace_if_changed(doc, &text, seen).await {
        return Ok(false);
    }
    tracing::info!(path = %path.display(), "reloaded database");
    Ok(true)
}

/// Recompile the routes file and swap the rewrite table. Invalid rules keep the old table.
pub async fn reload_routes(rewriter: &SharedRewriter, path: &Path) -> Result<(), PersistError> {
    let invalid = |reason: String| PersistError::WatchReload {
        path: path.to_path_buf(),
        reason,
    };
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| invalid(e.to_string()))?;
    let rules = parse_routes(&text).map_err(|e| invalid(e.to_string()))?;
    let compiled = RouteRewriter::compile(&rules).map_err(|e| invalid(e.to_string()))?;
    rewriter.replace(compiled);
    tracing::info!(path = %path.display(), rules = rules.len(), "reloaded routes");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResourceOptions;
    use crate::document::Document;
    use crate::persistence::FileSink;
    use serde_json::json;

    fn write(path: &Path, value: serde_json::Value) {
        std::fs::write(path, value.to_string()).unwrap();
    }

    #[tokio::test]
    async fn malformed_file_keeps_previous_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        let store = Store::in_memory(Document::from_value(json!({"posts": []})).unwrap(), ResourceOptions::default());

        std::fs::write(&path, "{ \"posts\": [").unwrap();
        assert!(reload_database(&store, &path).await.is_err());
        assert!(store.snapshot().is_collection("posts"));

        write(&path, json!({"foo": []}));
        assert!(reload_database(&store, &path).await.unwrap());
        assert!(store.snapshot().is_collection("foo"));
        assert!(!reload_database(&store, &path).await.unwrap());
    }

    #[tokio::test]
    async fn own_flushes_are_not_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        let doc = Document::from_value(json!({"posts": []})).unwrap();
        let sink = FileSink::spawn(path.clone(), Arc::new(doc.clone()));
        let store = Store::with_sink(doc, ResourceOptions::default(), sink);
        store
            .create("posts", json!({"title": "x"}).as_object().unwrap().clone())
            .await
            .unwrap();
        store.flush().await.unwrap();
        assert!(!reload_database(&store, &path).await.unwrap());
    }

    #[tokio::test]
    async fn routes_reload_swaps_table_and_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("routes.json");
        let rewriter = SharedRewriter::default();

        write(&path, json!({"/api/*": "/$1"}));
        reload_routes(&rewriter, &path).await.unwrap();
        assert_eq!(rewriter.current().rewrite("/api/posts").as_deref(), Some("/posts"));

        std::fs::write(&path, "not json").unwrap();
        assert!(reload_routes(&rewriter, &path).await.is_err());
        assert!(rewriter.current().rewrite("/api/posts").is_some());
    }

    #[tokio::test]
    async fn external_edit_is_picked_up_by_the_watcher() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        write(&path, json!({"posts": []}));
        let store = Arc::new(Store::in_memory(
            Document::from_value(json!({"posts": []})).unwrap(),
            ResourceOptions::default(),
        ));
        let _watcher = spawn_watcher(store.clone(), Some(path.clone()), None, Duration::from_millis(50)).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;

        write(&path, json!({"foo": [{"id": 1}]}));
        let mut reloaded = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(50)).await;
            if store.snapshot().is_collection("foo") {
                reloaded = true;
                break;
            }
        }
        assert!(reloaded);
    }
}
