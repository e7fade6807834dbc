//! Persisted enumeration baseline.
//!
//! The state file is plain UTF-8 text, one corpus-relative path per line,
//! no header. Writes go to `<path>.tmp` first and are renamed over the real
//! file, so a crash mid-write leaves either the old or the new baseline.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::models::Snapshot;

/// Result of reading the state file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StateLoad {
    /// No state file yet (first run).
    Missing,
    /// State file present; may be empty after a reset.
    Loaded(Snapshot),
}

impl StateLoad {
    /// The baseline to diff against. Missing and empty both mean "none".
    pub fn baseline(&self) -> Option<&Snapshot> {
        match self {
            StateLoad::Missing => None,
            StateLoad::Loaded(snapshot) => Some(snapshot),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            StateLoad::Missing => "missing".to_string(),
            StateLoad::Loaded(s) if s.is_empty() => "empty".to_string(),
            StateLoad::Loaded(s) => format!("{} entries", s.len()),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StateFile {
    path: PathBuf,
}

impl StateFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self.path.clone().into_os_string();
        name.push(".tmp");
        PathBuf::from(name)
    }

    pub fn load(&self) -> Result<StateLoad> {
        if !self.path.exists() {
            return Ok(StateLoad::Missing);
        }
        let content = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read state file: {}", self.path.display()))?;
        let snapshot = content
            .lines()
            .map(|line| line.strip_suffix('\r').unwrap_or(line))
            .filter(|line| !line.is_empty())
            .collect::<Snapshot>();
        Ok(StateLoad::Loaded(snapshot))
    }

    /// Replace the persisted baseline with `snapshot`.
    pub fn save(&self, snapshot: &Snapshot) -> Result<()> {
        if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create state directory: {}", dir.display()))?;
        }

        let mut body = String::new();
        for path in &snapshot.paths {
            body.push_str(path);
            body.push('\n');
        }

        let tmp = self.tmp_path();
        std::fs::write(&tmp, body)
            .with_context(|| format!("Failed to write state file: {}", tmp.display()))?;
        std::fs::rename(&tmp, &self.path)
            .with_context(|| format!("Failed to replace state file: {}", self.path.display()))?;
        Ok(())
    }

    /// Truncate the baseline so the next cycle treats everything as new.
    pub fn reset(&self) -> Result<()> {
        self.save(&Snapshot::new())
    }
}
