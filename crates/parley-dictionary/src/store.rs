//! Document persistence.
//!
//! The dictionary is stored as a single JSON document. Writes go to a
//! temporary file in the same directory which then replaces the target, so
//! a crash mid-write leaves the previous document intact.

use std::io::Write;
use std::path::Path;

use tempfile::NamedTempFile;

use crate::error::DictionaryError;
use crate::types::DictionaryDocument;

/// Read the document at `path`.
///
/// Returns `Ok(None)` when the file does not exist.
pub fn read_document(path: &Path) -> Result<Option<DictionaryDocument>, DictionaryError> {
    let content = match std::fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    let document: DictionaryDocument = serde_json::from_str(&content)?;
    Ok(Some(document))
}

/// Atomically replace the document at `path`.
pub fn write_document(path: &Path, document: &DictionaryDocument) -> Result<(), DictionaryError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let body = serde_json::to_vec_pretty(document)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&body)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| DictionaryError::Persist(e.error.to_string()))?;

    tracing::debug!(path = %path.display(), bytes = body.len(), "Dictionary document written");
    Ok(())
}
