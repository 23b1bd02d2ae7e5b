//! Point-in-time copies of the document, written next to (never over) the backing file.

use crate::document::Document;
use crate::error::PersistError;
use std::path::{Path, PathBuf};

#[derive(Clone, Debug)]
pub struct SnapshotService {
    dir: PathBuf,
}

impl SnapshotService {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        SnapshotService { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Write `<dir>/db-<unix millis>.json`, creating the directory if needed.
    pub async fn save(&self, doc: &Document) -> Result<PathBuf, PersistError> {
        let text = doc.to_pretty_json()?;
        let snapshot_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| PersistError::Snapshot { path, source }
        };
        tokio::fs::create_dir_all(&self.dir)
            .await
            .map_err(snapshot_err(&self.dir))?;
        let mut millis = chrono::Utc::now().timestamp_millis();
        let mut path = self.dir.join(format!("db-{}.json", millis));
        // Two snapshots in the same millisecond must not overwrite each other.
        while tokio::fs::try_exists(&path).await.unwrap_or(false) {
            millis += 1;
            path = self.dir.join(format!("db-{}.json", millis));
        }
        tokio::fs::write(&path, text).await.map_err(snapshot_err(&path))?;
        tracing::info!(path = %path.display(), "saved snapshot");
        Ok(path)
    }
}
