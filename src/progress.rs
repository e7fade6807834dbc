//! Cycle progress reporting.
//!
//! A cycle walks `FETCHING → SNAPSHOT_BUILT → DELTA_COMPUTED → INGESTING →
//! STATE_SAVED`. Each transition is reported as a [`CycleProgressEvent`].
//! Progress goes to **stderr** so the stdout summary stays parseable.

use std::io::Write;

/// Phase of a sync cycle.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CyclePhase {
    /// Source is refreshing the mirror (download, clone/pull).
    Fetching,
    /// Current corpus state is known.
    SnapshotBuilt,
    /// Delta set computed against the baseline.
    DeltaComputed,
    /// Delta files are being copied into the output store.
    Ingesting,
    /// New baseline persisted. History mode never reaches this phase.
    StateSaved,
}

impl CyclePhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            CyclePhase::Fetching => "fetching",
            CyclePhase::SnapshotBuilt => "snapshot_built",
            CyclePhase::DeltaComputed => "delta_computed",
            CyclePhase::Ingesting => "ingesting",
            CyclePhase::StateSaved => "state_saved",
        }
    }
}

/// A single progress event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CycleProgressEvent {
    Fetching { source: String },
    SnapshotBuilt { source: String, files: u64 },
    DeltaComputed { source: String, new: u64 },
    Ingesting { source: String, n: u64, total: u64 },
    StateSaved { source: String, entries: u64 },
}

impl CycleProgressEvent {
    pub fn phase(&self) -> CyclePhase {
        match self {
            CycleProgressEvent::Fetching { .. } => CyclePhase::Fetching,
            CycleProgressEvent::SnapshotBuilt { .. } => CyclePhase::SnapshotBuilt,
            CycleProgressEvent::DeltaComputed { .. } => CyclePhase::DeltaComputed,
            CycleProgressEvent::Ingesting { .. } => CyclePhase::Ingesting,
            CycleProgressEvent::StateSaved { .. } => CyclePhase::StateSaved,
        }
    }
}

/// Receives progress events from [`crate::ingest::run_cycle`].
pub trait CycleProgressReporter: Send + Sync {
    fn report(&self, event: CycleProgressEvent);
}

/// Human-friendly progress on stderr: "sync archive  ingesting  12 / 1,034 files".
pub struct StderrProgress;

impl CycleProgressReporter for StderrProgress {
    fn report(&self, event: CycleProgressEvent) {
        let line = match &event {
            CycleProgressEvent::Fetching { source } => format!("sync {}  fetching...\n", source),
            CycleProgressEvent::SnapshotBuilt { source, files } => {
                format!("sync {}  {} files in corpus\n", source, format_number(*files))
            }
            CycleProgressEvent::DeltaComputed { source, new } => {
                format!("sync {}  {} new or changed\n", source, format_number(*new))
            }
            CycleProgressEvent::Ingesting { source, n, total } => format!(
                "sync {}  ingesting  {} / {} files\n",
                source,
                format_number(*n),
                format_number(*total)
            ),
            CycleProgressEvent::StateSaved { source, entries } => format!(
                "sync {}  baseline saved ({} entries)\n",
                source,
                format_number(*entries)
            ),
        };
        let _ = std::io::stderr().lock().write_all(line.as_bytes());
        let _ = std::io::stderr().lock().flush();
    }
}

/// Machine-readable progress: one JSON object per line on stderr.
pub struct JsonProgress;

impl CycleProgressReporter for JsonProgress {
    fn report(&self, event: CycleProgressEvent) {
        let phase = event.phase().as_str();
        let obj = match &event {
            CycleProgressEvent::Fetching { source } => serde_json::json!({
                "event": "progress",
                "source": source,
                "phase": phase
            }),
            CycleProgressEvent::SnapshotBuilt { source, files } => serde_json::json!({
                "event": "progress",
                "source": source,
                "phase": phase,
                "files": files
            }),
            CycleProgressEvent::DeltaComputed { source, new } => serde_json::json!({
                "event": "progress",
                "source": source,
                "phase": phase,
                "new": new
            }),
            CycleProgressEvent::Ingesting { source, n, total } => serde_json::json!({
                "event": "progress",
                "source": source,
                "phase": phase,
                "n": n,
                "total": total
            }),
            CycleProgressEvent::StateSaved { source, entries } => serde_json::json!({
                "event": "progress",
                "source": source,
                "phase": phase,
                "entries": entries
            }),
        };
        if let Ok(line) = serde_json::to_string(&obj) {
            let _ = writeln!(std::io::stderr().lock(), "{}", line);
            let _ = std::io::stderr().lock().flush();
        }
    }
}

/// No-op reporter when progress is disabled.
pub struct NoProgress;

impl CycleProgressReporter for NoProgress {
    fn report(&self, _event: CycleProgressEvent) {}
}

fn format_number(n: u64) -> String {
    let s = n.to_string();
    let mut result = String::with_capacity(s.len() + (s.len() - 1) / 3);
    let chars: Vec<char> = s.chars().rev().collect();
    for (i, c) in chars.iter().enumerate() {
        if i > 0 && i % 3 == 0 {
            result.push(',');
        }
        result.push(*c);
    }
    result.chars().rev().collect()
}

/// Progress mode for the CLI: off, human (stderr), or JSON (stderr).
#[derive(Clone, Copy, Debug, Eq, PartialEq, clap::ValueEnum)]
pub enum ProgressMode {
    Off,
    Human,
    Json,
}

impl ProgressMode {
    /// Default: human progress when stderr is a TTY, otherwise off.
    pub fn default_for_tty() -> Self {
        if atty::is(atty::Stream::Stderr) {
            ProgressMode::Human
        } else {
            ProgressMode::Off
        }
    }

    pub fn reporter(&self) -> Box<dyn CycleProgressReporter> {
        match self {
            ProgressMode::Off => Box::new(NoProgress),
            ProgressMode::Human => Box::new(StderrProgress),
            ProgressMode::Json => Box::new(JsonProgress),
        }
    }
}
