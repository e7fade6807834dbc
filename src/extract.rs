//! Template identifier extraction.
//!
//! Templates declare their logical name with a top-level `id:` field. The
//! scan is line based rather than a full YAML parse: the first line whose
//! trimmed text starts with `id:` wins, and its value is everything after
//! the first colon. Files without a usable declaration fall back to their
//! base name.

use std::path::Path;

use crate::models::{CorpusFile, IdentifierSource};

const ID_KEY: &str = "id:";

/// Returns the declared identifier in `contents`, if any.
///
/// An empty value (`id:` with nothing after it) counts as no declaration.
pub fn extract_identifier_from_str(contents: &str) -> Option<String> {
    for line in contents.lines() {
        let line = line.trim();
        if let Some(rest) = line.strip_prefix(ID_KEY) {
            let value = rest.trim();
            if value.is_empty() {
                return None;
            }
            return Some(value.to_string());
        }
    }
    None
}

/// Reads `path` and extracts its declared identifier.
///
/// Read and decode failures are logged and reported as `None`; they never
/// abort ingestion.
pub fn extract_identifier(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(contents) => extract_identifier_from_str(&contents),
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "failed to extract template id");
            None
        }
    }
}

/// Base name of `relative_path` with one recognised suffix removed.
pub fn fallback_identifier(relative_path: &str, suffixes: &[String]) -> String {
    let base = relative_path
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(relative_path);
    suffixes
        .iter()
        .find_map(|suffix| base.strip_suffix(suffix.as_str()))
        .filter(|stem| !stem.is_empty())
        .unwrap_or(base)
        .to_string()
}

/// Declared identifier of `file`, or its file-name fallback.
pub fn resolve_identifier(file: &CorpusFile, suffixes: &[String]) -> (String, IdentifierSource) {
    match extract_identifier(&file.path) {
        Some(id) => (id, IdentifierSource::Declared),
        None => {
            let id = fallback_identifier(&file.relative_path, suffixes);
            tracing::debug!(path = %file.relative_path, id = %id, "no declared id, using file name");
            (id, IdentifierSource::FileName)
        }
    }
}
