//! Sync cycle orchestration.
//!
//! One cycle is `acquire → delta → ingest → persist`:
//!
//! - [`run_cycle`] does the first three steps against any
//!   [`SnapshotSource`] and returns the baseline to persist. It never
//!   touches the state file.
//! - [`run_sync`] wraps it with the state file: load the previous baseline,
//!   run the cycle, save the new baseline.
//!
//! Any failure before the save leaves the previous baseline in place, so the
//! next cycle simply redoes the work.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt::Write as _;

use crate::config::Config;
use crate::delta::{compute_delta, new_baseline};
use crate::models::{Collision, IngestedRecord, Snapshot};
use crate::progress::{CycleProgressEvent, CycleProgressReporter};
use crate::snapshot::{source_from_config, SnapshotSource, SourceMode};
use crate::state::StateFile;
use crate::store::{find_collisions, IngestStore};

/// Which stage of a cycle failed. None of these are fatal to the watch loop.
#[derive(Debug, thiserror::Error)]
pub enum CycleError {
    /// Download, clone/pull, or enumeration of the mirror failed.
    #[error("corpus unavailable: {0:#}")]
    Transport(anyhow::Error),
    /// The state file exists but could not be read.
    #[error("failed to load state: {0:#}")]
    StateLoad(anyhow::Error),
    /// The new baseline could not be written.
    #[error("failed to persist state: {0:#}")]
    Persistence(anyhow::Error),
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Compute the delta and planned output names without writing anything.
    pub dry_run: bool,
}

/// Summary of one cycle.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub source: String,
    pub mode: &'static str,
    pub started_at: DateTime<Utc>,
    pub corpus_files: usize,
    pub delta_files: usize,
    pub records: Vec<IngestedRecord>,
    pub collisions: Vec<Collision>,
    pub baseline_saved: bool,
    pub dry_run: bool,
}

impl CycleReport {
    pub fn saved(&self) -> usize {
        self.records.iter().filter(|r| r.success()).count()
    }

    pub fn failed(&self) -> usize {
        self.records.len() - self.saved()
    }

    /// Human-readable summary for stdout.
    pub fn render_summary(&self) -> String {
        let mut out = String::new();
        let label = if self.dry_run { " (dry-run)" } else { "" };
        let _ = writeln!(out, "sync {}{}", self.source, label);
        let _ = writeln!(out, "  mode: {}", self.mode);
        let _ = writeln!(out, "  corpus files: {}", self.corpus_files);
        let _ = writeln!(out, "  new or changed: {}", self.delta_files);

        if self.records.is_empty() {
            let _ = writeln!(out, "  no new templates");
        } else {
            let verb = if self.dry_run { "would save" } else { "saved" };
            let _ = writeln!(out, "  {}: {}", verb, self.saved());
            let _ = writeln!(out, "  failed: {}", self.failed());
            for record in self.records.iter().filter(|r| r.success()) {
                let _ = writeln!(out, "    {}", record.output_path.display());
            }
            for record in self.records.iter().filter(|r| !r.success()) {
                let _ = writeln!(
                    out,
                    "    FAILED {}: {}",
                    record.source_path,
                    record.error.as_deref().unwrap_or("unknown error")
                );
            }
        }

        for collision in &self.collisions {
            let _ = writeln!(
                out,
                "  collision: {}.yaml <- {}",
                collision.output_name,
                collision.source_paths.join(", ")
            );
        }
        if self.baseline_saved {
            let _ = writeln!(out, "  baseline: saved");
        }
        let _ = writeln!(out, "ok");
        out
    }
}

/// Result of [`run_cycle`]: the report plus the baseline the caller should
/// persist (enumeration sources only).
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub report: CycleReport,
    pub baseline: Option<Snapshot>,
}

/// Acquire the corpus, diff it against `prior`, and ingest the delta.
///
/// `prior` is ignored by history sources. The returned baseline is the
/// current snapshot minus any path whose ingestion failed, so failed files
/// are picked up again next cycle.
pub fn run_cycle(
    source: &dyn SnapshotSource,
    store: &IngestStore,
    prior: Option<&Snapshot>,
    reporter: &dyn CycleProgressReporter,
    options: SyncOptions,
) -> Result<CycleOutcome, CycleError> {
    let started_at = Utc::now();
    let name = source.name().to_string();

    reporter.report(CycleProgressEvent::Fetching {
        source: name.clone(),
    });
    let state = source.acquire().map_err(CycleError::Transport)?;
    let corpus_files = state.file_count();
    reporter.report(CycleProgressEvent::SnapshotBuilt {
        source: name.clone(),
        files: corpus_files as u64,
    });

    let delta = compute_delta(&state, prior);
    reporter.report(CycleProgressEvent::DeltaComputed {
        source: name.clone(),
        new: delta.len() as u64,
    });
    tracing::info!(
        source = %name,
        corpus_files,
        delta = delta.len(),
        "delta computed"
    );

    let total = delta.len() as u64;
    let records = if options.dry_run {
        store.dry_run(&delta)
    } else {
        store.ingest_with(&delta, |n, _| {
            reporter.report(CycleProgressEvent::Ingesting {
                source: name.clone(),
                n: n as u64,
                total,
            });
        })
    };

    let collisions = find_collisions(&records);
    for collision in &collisions {
        tracing::warn!(
            output = %collision.output_name,
            sources = ?collision.source_paths,
            "several templates map to the same output name; last write wins"
        );
    }

    let failed: BTreeSet<&str> = records
        .iter()
        .filter(|r| !r.success())
        .map(|r| r.source_path.as_str())
        .collect();
    let baseline = new_baseline(&state).map(|current| {
        current
            .paths
            .iter()
            .filter(|p| !failed.contains(p.as_str()))
            .cloned()
            .collect::<Snapshot>()
    });

    let report = CycleReport {
        source: name,
        mode: source.mode().as_str(),
        started_at,
        corpus_files,
        delta_files: delta.len(),
        records,
        collisions,
        baseline_saved: false,
        dry_run: options.dry_run,
    };

    Ok(CycleOutcome { report, baseline })
}

/// Run one full cycle for `config`, including state load and save.
pub fn run_sync(
    config: &Config,
    reporter: &dyn CycleProgressReporter,
    options: SyncOptions,
) -> Result<CycleReport, CycleError> {
    let source = source_from_config(config).map_err(CycleError::Transport)?;
    let store = IngestStore::new(&config.output.dir, config.corpus.suffixes.clone());
    let state_file = StateFile::new(&config.state.path);
    run_sync_with(source.as_ref(), &store, &state_file, reporter, options)
}

/// [`run_sync`] with explicit collaborators.
pub fn run_sync_with(
    source: &dyn SnapshotSource,
    store: &IngestStore,
    state_file: &StateFile,
    reporter: &dyn CycleProgressReporter,
    options: SyncOptions,
) -> Result<CycleReport, CycleError> {
    let loaded = match source.mode() {
        SourceMode::Enumeration => {
            let loaded = state_file.load().map_err(CycleError::StateLoad)?;
            tracing::info!(
                path = %state_file.path().display(),
                state = %loaded.describe(),
                "loaded baseline"
            );
            Some(loaded)
        }
        SourceMode::History => None,
    };
    let prior = loaded.as_ref().and_then(|l| l.baseline());

    let CycleOutcome {
        mut report,
        baseline,
    } = run_cycle(source, store, prior, reporter, options)?;

    if let Some(baseline) = baseline.filter(|_| !options.dry_run) {
        state_file
            .save(&baseline)
            .map_err(CycleError::Persistence)?;
        report.baseline_saved = true;
        reporter.report(CycleProgressEvent::StateSaved {
            source: report.source.clone(),
            entries: baseline.len() as u64,
        });
    }

    tracing::info!(
        source = %report.source,
        saved = report.saved(),
        failed = report.failed(),
        "cycle finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CorpusMode;
    use crate::connector_dir::DirectorySource;
    use crate::models::CorpusState;
    use crate::progress::{CyclePhase, NoProgress};
    use crate::state::StateLoad;
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;
    use tempfile::TempDir;

    fn suffixes() -> Vec<String> {
        vec![".yaml".to_string(), ".yml".to_string()]
    }

    struct Fixture {
        _tmp: TempDir,
        corpus: std::path::PathBuf,
        store: IngestStore,
        state: StateFile,
    }

    fn fixture() -> Fixture {
        let tmp = TempDir::new().unwrap();
        let corpus = tmp.path().join("corpus");
        fs::create_dir_all(&corpus).unwrap();
        let store = IngestStore::new(tmp.path().join("out"), suffixes());
        let state = StateFile::new(tmp.path().join("old_files.txt"));
        Fixture {
            _tmp: tmp,
            corpus,
            store,
            state,
        }
    }

    fn write_template(root: &Path, rel: &str, body: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, body).unwrap();
    }

    /// Source that replays a fixed state (or a fixed failure).
    struct FixedSource {
        mode: SourceMode,
        state: Option<CorpusState>,
    }

    impl SnapshotSource for FixedSource {
        fn name(&self) -> &str {
            "fixed"
        }
        fn mode(&self) -> SourceMode {
            self.mode
        }
        fn acquire(&self) -> anyhow::Result<CorpusState> {
            self.state
                .clone()
                .ok_or_else(|| anyhow::anyhow!("network unreachable"))
        }
    }

    #[derive(Default)]
    struct RecordingProgress {
        phases: Mutex<Vec<CyclePhase>>,
    }

    impl CycleProgressReporter for RecordingProgress {
        fn report(&self, event: CycleProgressEvent) {
            let mut phases = self.phases.lock().unwrap();
            if phases.last() != Some(&event.phase()) {
                phases.push(event.phase());
            }
        }
    }

    #[test]
    fn first_run_ingests_everything_then_nothing() {
        let fx = fixture();
        write_template(&fx.corpus, "http/a.yaml", "id: alpha\n");
        write_template(&fx.corpus, "dns/b.yml", "id: beta\n");
        let source = DirectorySource::new(&fx.corpus, suffixes());

        let first =
            run_sync_with(&source, &fx.store, &fx.state, &NoProgress, SyncOptions::default())
                .unwrap();
        assert_eq!(first.delta_files, 2);
        assert_eq!(first.saved(), 2);
        assert!(first.baseline_saved);
        assert!(fx.store.output_dir().join("alpha.yaml").exists());
        assert_eq!(
            fx.state.load().unwrap(),
            StateLoad::Loaded(Snapshot::from_iter(["dns/b.yml", "http/a.yaml"]))
        );

        let second =
            run_sync_with(&source, &fx.store, &fx.state, &NoProgress, SyncOptions::default())
                .unwrap();
        assert_eq!(second.delta_files, 0);
        assert!(second.records.is_empty());

        write_template(&fx.corpus, "http/c.yaml", "id: gamma\n");
        let third =
            run_sync_with(&source, &fx.store, &fx.state, &NoProgress, SyncOptions::default())
                .unwrap();
        assert_eq!(third.delta_files, 1);
        assert_eq!(third.records[0].identifier, "gamma");
    }

    #[test]
    fn reset_state_behaves_like_first_run() {
        let fx = fixture();
        write_template(&fx.corpus, "a.yaml", "id: a\n");
        let source = DirectorySource::new(&fx.corpus, suffixes());

        run_sync_with(&source, &fx.store, &fx.state, &NoProgress, SyncOptions::default()).unwrap();
        fx.state.reset().unwrap();
        let again =
            run_sync_with(&source, &fx.store, &fx.state, &NoProgress, SyncOptions::default())
                .unwrap();
        assert_eq!(again.delta_files, 1);
    }

    #[test]
    fn one_unreadable_file_out_of_five() {
        let fx = fixture();
        for name in ["a", "b", "c", "d"] {
            write_template(&fx.corpus, &format!("{}.yaml", name), &format!("id: {}\n", name));
        }
        // Listed in the snapshot but gone by the time it is copied.
        let snapshot = Snapshot::from_iter(["a.yaml", "b.yaml", "c.yaml", "d.yaml", "e.yaml"]);
        let source = FixedSource {
            mode: SourceMode::Enumeration,
            state: Some(CorpusState::snapshot(&fx.corpus, snapshot)),
        };

        let report =
            run_sync_with(&source, &fx.store, &fx.state, &NoProgress, SyncOptions::default())
                .unwrap();
        assert_eq!(report.records.len(), 5);
        assert_eq!(report.saved(), 4);
        assert_eq!(report.failed(), 1);
        assert!(report.baseline_saved);

        let baseline = fx.state.load().unwrap();
        let baseline = baseline.baseline().unwrap();
        assert_eq!(baseline.len(), 4);
        assert!(!baseline.contains("e.yaml"), "failed file must be retried");
    }

    #[test]
    fn transport_failure_leaves_state_untouched() {
        let fx = fixture();
        fx.state.save(&Snapshot::from_iter(["keep.yaml"])).unwrap();
        let source = FixedSource {
            mode: SourceMode::Enumeration,
            state: None,
        };

        let err = run_sync_with(&source, &fx.store, &fx.state, &NoProgress, SyncOptions::default())
            .unwrap_err();
        assert!(matches!(err, CycleError::Transport(_)));
        assert!(err.to_string().contains("network unreachable"));
        assert_eq!(
            fx.state.load().unwrap(),
            StateLoad::Loaded(Snapshot::from_iter(["keep.yaml"]))
        );
    }

    #[test]
    fn persistence_failure_is_reported() {
        let fx = fixture();
        write_template(&fx.corpus, "a.yaml", "id: a\n");
        // The state file's parent is a regular file, so the save cannot succeed.
        let blocker = fx.corpus.join("not-a-dir");
        fs::write(&blocker, "x").unwrap();
        let state = StateFile::new(blocker.join("old_files.txt"));
        let source = DirectorySource::new(&fx.corpus, suffixes());

        let err = run_sync_with(&source, &fx.store, &state, &NoProgress, SyncOptions::default())
            .unwrap_err();
        assert!(matches!(err, CycleError::Persistence(_)));
        // Ingestion already happened; only the baseline is missing.
        assert!(fx.store.output_dir().join("a.yaml").exists());
    }

    #[test]
    fn history_mode_is_idempotent_across_overlapping_windows() {
        let fx = fixture();
        write_template(&fx.corpus, "http/x.yaml", "id: x\nv: 1\n");
        let changed: BTreeSet<String> = ["http/x.yaml".to_string()].into_iter().collect();
        let source = FixedSource {
            mode: SourceMode::History,
            state: Some(CorpusState::changes(&fx.corpus, changed)),
        };

        run_sync_with(&source, &fx.store, &fx.state, &NoProgress, SyncOptions::default()).unwrap();
        write_template(&fx.corpus, "http/x.yaml", "id: x\nv: 2\n");
        let second =
            run_sync_with(&source, &fx.store, &fx.state, &NoProgress, SyncOptions::default())
                .unwrap();

        assert!(second.records[0].replaced_existing);
        assert!(!second.baseline_saved);
        assert!(!fx.state.path().exists(), "history mode keeps no baseline");
        let outputs: Vec<_> = fs::read_dir(fx.store.output_dir()).unwrap().collect();
        assert_eq!(outputs.len(), 1);
        assert_eq!(
            fs::read_to_string(fx.store.output_dir().join("x.yaml")).unwrap(),
            "id: x\nv: 2\n"
        );
    }

    #[test]
    fn dry_run_writes_nothing() {
        let fx = fixture();
        write_template(&fx.corpus, "a.yaml", "id: a\n");
        let source = DirectorySource::new(&fx.corpus, suffixes());

        let report = run_sync_with(
            &source,
            &fx.store,
            &fx.state,
            &NoProgress,
            SyncOptions { dry_run: true },
        )
        .unwrap();
        assert_eq!(report.records.len(), 1);
        assert!(!report.baseline_saved);
        assert!(!fx.state.path().exists());
        assert!(!fx.store.output_dir().exists());
        assert!(report.render_summary().contains("would save: 1"));
    }

    #[test]
    fn phases_follow_the_cycle_state_machine() {
        let fx = fixture();
        write_template(&fx.corpus, "a.yaml", "id: a\n");
        write_template(&fx.corpus, "b.yaml", "id: b\n");
        let source = DirectorySource::new(&fx.corpus, suffixes());
        let progress = RecordingProgress::default();

        run_sync_with(&source, &fx.store, &fx.state, &progress, SyncOptions::default()).unwrap();
        assert_eq!(
            *progress.phases.lock().unwrap(),
            vec![
                CyclePhase::Fetching,
                CyclePhase::SnapshotBuilt,
                CyclePhase::DeltaComputed,
                CyclePhase::Ingesting,
                CyclePhase::StateSaved,
            ]
        );
    }

    #[test]
    fn run_sync_uses_config_paths() {
        let tmp = TempDir::new().unwrap();
        let corpus = tmp.path().join("templates");
        write_template(&corpus, "cves/CVE-1.yaml", "id: CVE-1\n");

        let mut config = Config::default();
        config.corpus.mode = CorpusMode::Directory;
        config.corpus.root = Some(corpus);
        config.output.dir = tmp.path().join("pocs");
        config.state.path = tmp.path().join("state/old_files.txt");

        let report = run_sync(&config, &NoProgress, SyncOptions::default()).unwrap();
        assert_eq!(report.saved(), 1);
        assert!(tmp.path().join("pocs/CVE-1.yaml").exists());
        assert!(tmp.path().join("state/old_files.txt").exists());
        let summary = report.render_summary();
        assert!(summary.contains("saved: 1"));
        assert!(summary.ends_with("ok\n"));
    }
}
