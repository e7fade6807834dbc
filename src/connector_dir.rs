use anyhow::Result;
use std::path::PathBuf;

use crate::config::Config;
use crate::models::CorpusState;
use crate::snapshot::{enumerate_templates, SnapshotSource, SourceMode};

/// Enumeration over a local directory that is refreshed by something else
/// (a cron'd `rsync`, a mounted volume). Nothing is fetched.
pub struct DirectorySource {
    root: PathBuf,
    suffixes: Vec<String>,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>, suffixes: Vec<String>) -> Self {
        Self {
            root: root.into(),
            suffixes,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.corpus.corpus_root(), config.corpus.suffixes.clone())
    }
}

impl SnapshotSource for DirectorySource {
    fn name(&self) -> &str {
        "directory"
    }

    fn mode(&self) -> SourceMode {
        SourceMode::Enumeration
    }

    fn acquire(&self) -> Result<CorpusState> {
        let snapshot = enumerate_templates(&self.root, &self.suffixes)?;
        Ok(CorpusState::snapshot(&self.root, snapshot))
    }
}
