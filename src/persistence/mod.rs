//! Where the document comes from and where it goes back to.

pub mod file;
pub mod remote;
pub mod seed;

pub use file::{parse_document, read_or_create, write_document, FileSink};
pub use seed::{ScriptSeed, SeedProvider, StaticSeed};

use crate::document::Document;
use crate::error::SourceError;
use std::path::{Path, PathBuf};

/// Startup source, resolved from the shape of the command-line argument.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Source {
    /// Local JSON file; the only persistent source.
    File(PathBuf),
    /// `http(s)://` URL, fetched once.
    Remote(String),
    /// Seed script whose export becomes the document.
    Script(PathBuf),
}

impl Source {
    pub fn resolve(arg: &str) -> Self {
        let lower = arg.to_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return Source::Remote(arg.to_string());
        }
        let path = PathBuf::from(arg);
        match path.extension().and_then(|e| e.to_str()) {
            Some("js") | Some("cjs") | Some("mjs") => Source::Script(path),
            _ => Source::File(path),
        }
    }

    /// Backing file that mutations are flushed to, if any.
    pub fn file_path(&self) -> Option<&Path> {
        match self {
            Source::File(p) => Some(p),
            _ => None,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Source::File(p) | Source::Script(p) => p.display().to_string(),
            Source::Remote(url) => url.clone(),
        }
    }
}

pub async fn load(source: &Source) -> Result<Document, SourceError> {
    let doc = match source {
        Source::File(path) => read_or_create(path).await?,
        Source::Remote(url) => remote::fetch(url).await?,
        Source::Script(path) => load_seed(&ScriptSeed::new(path.clone())).await?,
    };
    tracing::info!(
        source = %source.name(),
        resources = doc.names().count(),
        "loaded database"
    );
    Ok(doc)
}

pub async fn load_seed(provider: &dyn SeedProvider) -> Result<Document, SourceError> {
    let doc = provider.produce().await?;
    crate::config::validate_document(&doc, &provider.name())?;
    Ok(doc)
}
