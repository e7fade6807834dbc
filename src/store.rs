//! Ingestion store: copies delta files into a flat output directory named
//! after their identifiers.
//!
//! Output names are `<sanitize(identifier)>.yaml`. Existing files with the
//! same name are overwritten, so ingesting the same template twice (for
//! example from overlapping history windows) leaves a single, up-to-date
//! copy.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::extract::resolve_identifier;
use crate::models::{Collision, CorpusFile, DeltaSet, IngestedRecord};
use crate::sanitize::sanitize;

const OUTPUT_EXTENSION: &str = "yaml";

pub struct IngestStore {
    output_dir: PathBuf,
    suffixes: Vec<String>,
}

impl IngestStore {
    pub fn new(output_dir: impl Into<PathBuf>, suffixes: Vec<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            suffixes,
        }
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Copy every file in `delta` into the store.
    ///
    /// Failures are recorded per file and never stop the batch. Records are
    /// returned sorted by output path.
    pub fn ingest(&self, delta: &DeltaSet) -> Vec<IngestedRecord> {
        self.ingest_with(delta, |_, _| {})
    }

    /// Like [`ingest`](Self::ingest), calling `on_record(n, record)` after
    /// each file (1-based `n`).
    pub fn ingest_with<F>(&self, delta: &DeltaSet, mut on_record: F) -> Vec<IngestedRecord>
    where
        F: FnMut(usize, &IngestedRecord),
    {
        let dir_error = std::fs::create_dir_all(&self.output_dir).err().map(|e| {
            tracing::error!(dir = %self.output_dir.display(), error = %e, "cannot create output directory");
            format!("create {}: {}", self.output_dir.display(), e)
        });

        let mut records = Vec::with_capacity(delta.len());
        for (i, file) in delta.files.iter().enumerate() {
            let mut record = self.plan(file);
            let error = match &dir_error {
                Some(e) => Some(e.clone()),
                None => self.write(file, &mut record),
            };
            record.error = error;
            on_record(i + 1, &record);
            records.push(record);
        }

        records.sort_by(|a, b| a.output_path.cmp(&b.output_path));
        records
    }

    /// Records `ingest` would produce, without touching the filesystem.
    pub fn dry_run(&self, delta: &DeltaSet) -> Vec<IngestedRecord> {
        let mut records: Vec<IngestedRecord> = delta
            .files
            .iter()
            .map(|file| {
                let mut record = self.plan(file);
                record.replaced_existing = record.output_path.exists();
                record
            })
            .collect();
        records.sort_by(|a, b| a.output_path.cmp(&b.output_path));
        records
    }

    fn plan(&self, file: &CorpusFile) -> IngestedRecord {
        let (identifier, identifier_source) = resolve_identifier(file, &self.suffixes);
        let output_name = sanitize(&identifier);
        let output_path = self
            .output_dir
            .join(format!("{}.{}", output_name, OUTPUT_EXTENSION));

        IngestedRecord {
            source_path: file.relative_path.clone(),
            identifier,
            identifier_source,
            output_name,
            output_path,
            replaced_existing: false,
            error: None,
        }
    }

    fn write(&self, file: &CorpusFile, record: &mut IngestedRecord) -> Option<String> {
        record.replaced_existing = record.output_path.exists();
        match std::fs::copy(&file.path, &record.output_path) {
            Ok(_) => {
                tracing::debug!(
                    source = %file.relative_path,
                    output = %record.output_path.display(),
                    replaced = record.replaced_existing,
                    "template saved"
                );
                None
            }
            Err(e) => {
                tracing::warn!(source = %file.relative_path, error = %e, "failed to save template");
                Some(e.to_string())
            }
        }
    }
}

/// Output names claimed by more than one source file in `records`.
///
/// The store keeps last-write-wins semantics; this only surfaces the
/// silent overwrites so they show up in the cycle report.
pub fn find_collisions(records: &[IngestedRecord]) -> Vec<Collision> {
    let mut by_name: BTreeMap<&str, Vec<String>> = BTreeMap::new();
    for record in records {
        by_name
            .entry(record.output_name.as_str())
            .or_default()
            .push(record.source_path.clone());
    }

    by_name
        .into_iter()
        .filter(|(_, sources)| sources.len() > 1)
        .map(|(name, mut source_paths)| {
            source_paths.sort();
            Collision {
                output_name: name.to_string(),
                source_paths,
            }
        })
        .collect()
}
