//! Core data types that flow through a sync cycle.
//!
//! A [`SnapshotSource`](crate::snapshot::SnapshotSource) produces a
//! [`CorpusState`], the delta computer turns it into a [`DeltaSet`], and the
//! ingestion store reports one [`IngestedRecord`] per delta file.

use serde::Serialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// A template file inside the mirrored corpus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusFile {
    /// Path relative to the corpus root, `/`-separated.
    pub relative_path: String,
    /// Absolute (or cwd-relative) location on disk.
    pub path: PathBuf,
}

impl CorpusFile {
    pub fn new(root: &Path, relative_path: &str) -> Self {
        Self {
            relative_path: relative_path.to_string(),
            path: root.join(relative_path),
        }
    }
}

/// All qualifying template paths present in the corpus at one point in time.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    pub paths: BTreeSet<String>,
}

impl Snapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn contains(&self, path: &str) -> bool {
        self.paths.contains(path)
    }
}

impl<S: Into<String>> FromIterator<S> for Snapshot {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            paths: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// What a source reports for the current cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CorpusChanges {
    /// Full enumeration; diffed against the persisted baseline.
    Snapshot(Snapshot),
    /// Files added or modified inside the history window; already a delta.
    Changes(BTreeSet<String>),
}

/// Output of [`SnapshotSource::acquire`](crate::snapshot::SnapshotSource::acquire).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusState {
    /// Directory every path in `changes` is relative to.
    pub root: PathBuf,
    pub changes: CorpusChanges,
}

impl CorpusState {
    pub fn snapshot(root: impl Into<PathBuf>, snapshot: Snapshot) -> Self {
        Self {
            root: root.into(),
            changes: CorpusChanges::Snapshot(snapshot),
        }
    }

    pub fn changes(root: impl Into<PathBuf>, paths: BTreeSet<String>) -> Self {
        Self {
            root: root.into(),
            changes: CorpusChanges::Changes(paths),
        }
    }

    /// Number of paths the source reported.
    pub fn file_count(&self) -> usize {
        match &self.changes {
            CorpusChanges::Snapshot(s) => s.len(),
            CorpusChanges::Changes(c) => c.len(),
        }
    }
}

/// Files that need ingesting this cycle, sorted by relative path.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeltaSet {
    pub root: PathBuf,
    pub files: Vec<CorpusFile>,
}

impl DeltaSet {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn relative_paths(&self) -> impl Iterator<Item = &str> {
        self.files.iter().map(|f| f.relative_path.as_str())
    }
}

/// Where a resolved identifier came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierSource {
    /// An `id:` declaration inside the file.
    Declared,
    /// The file's base name with its suffix stripped.
    FileName,
}

/// Result of materializing one delta file into the output store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IngestedRecord {
    pub source_path: String,
    pub identifier: String,
    pub identifier_source: IdentifierSource,
    pub output_name: String,
    pub output_path: PathBuf,
    /// An earlier file with the same output name was overwritten.
    pub replaced_existing: bool,
    pub error: Option<String>,
}

impl IngestedRecord {
    pub fn success(&self) -> bool {
        self.error.is_none()
    }
}

/// An output name claimed by more than one source file in a single batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Collision {
    pub output_name: String,
    pub source_paths: Vec<String>,
}
