//! Delta computation: which files need ingesting this cycle.

use crate::models::{CorpusChanges, CorpusFile, CorpusState, DeltaSet, Snapshot};

/// Files that are new since `prior` (enumeration) or reported by the
/// history window (history).
///
/// Enumeration is a plain set difference, so content changes to a known path
/// go unnoticed. `prior = None` means no baseline: every current file is new.
///
/// History paths are filtered to files that still exist under the root;
/// ones deleted later in the window are dropped here instead of failing
/// during ingestion.
pub fn compute_delta(state: &CorpusState, prior: Option<&Snapshot>) -> DeltaSet {
    let mut files: Vec<CorpusFile> = match &state.changes {
        CorpusChanges::Snapshot(current) => current
            .paths
            .iter()
            .filter(|p| prior.map_or(true, |prior| !prior.contains(p)))
            .map(|p| CorpusFile::new(&state.root, p))
            .collect(),
        CorpusChanges::Changes(changed) => changed
            .iter()
            .map(|p| CorpusFile::new(&state.root, p))
            .filter(|f| {
                let exists = f.path.is_file();
                if !exists {
                    tracing::debug!(path = %f.relative_path, "changed file no longer in corpus, skipping");
                }
                exists
            })
            .collect(),
    };
    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    DeltaSet {
        root: state.root.clone(),
        files,
    }
}

/// Snapshot to persist as the next cycle's baseline, if the mode keeps one.
pub fn new_baseline(state: &CorpusState) -> Option<&Snapshot> {
    match &state.changes {
        CorpusChanges::Snapshot(current) => Some(current),
        CorpusChanges::Changes(_) => None,
    }
}
