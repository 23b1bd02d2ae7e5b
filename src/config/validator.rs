//! Startup validation: the backing path must be usable and every collection must be routable.

use crate::document::Document;
use crate::error::SourceError;
use std::path::Path;

/// Checks that `path` can hold the backing file: its parent exists and is a directory,
/// and the path itself is not a directory.
pub fn validate_source_path(path: &Path) -> Result<(), SourceError> {
    let name = path.display().to_string();
    if path.is_dir() {
        return Err(SourceError::invalid(name, "path is a directory"));
    }
    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => return Ok(()),
    };
    // Walk up to the first existing ancestor: any file along the way blocks the path.
    for ancestor in parent.ancestors() {
        if ancestor.as_os_str().is_empty() {
            break;
        }
        if ancestor.exists() {
            if !ancestor.is_dir() {
                return Err(SourceError::invalid(
                    name,
                    format!("{} is not a directory", ancestor.display()),
                ));
            }
            break;
        }
    }
    if !parent.is_dir() {
        return Err(SourceError::invalid(name, "parent directory does not exist"));
    }
    Ok(())
}

/// Every top-level key becomes a single path segment, so it must be non-empty and free of
/// URL delimiters.
pub fn validate_document(document: &Document, source_name: &str) -> Result<(), SourceError> {
    for name in document.names() {
        if name.is_empty() {
            return Err(SourceError::invalid(source_name, "empty resource name"));
        }
        if let Some(c) = name.chars().find(|c| matches!(c, '/' | '?' | '#' | '\\')) {
            return Err(SourceError::invalid(
                source_name,
                format!("resource name {:?} contains {:?}", name, c),
            ));
        }
    }
    Ok(())
}
