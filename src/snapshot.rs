//! Corpus acquisition seam and full-tree enumeration.
//!
//! Every acquisition strategy implements [`SnapshotSource`]. The cycle in
//! [`crate::ingest`] only sees the trait, so the archive, directory and git
//! strategies share the delta computer, extractor, sanitizer and store.
//!
//! ```text
//! ┌────────────┐ ┌────────────┐ ┌────────────┐
//! │  Archive   │ │ Directory  │ │ Git history│
//! │ (zip+walk) │ │   (walk)   │ │ (log -24h) │
//! └─────┬──────┘ └─────┬──────┘ └─────┬──────┘
//!       └──── SnapshotSource::acquire ┘
//!                      ▼
//!               delta → store → state
//! ```

use anyhow::{bail, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use std::path::Path;
use walkdir::WalkDir;

use crate::config::{Config, CorpusMode};
use crate::connector_archive::ArchiveSource;
use crate::connector_dir::DirectorySource;
use crate::connector_git::GitHistorySource;
use crate::models::{CorpusState, Snapshot};

/// How a source reports change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourceMode {
    /// Full snapshot each cycle, diffed against the persisted baseline.
    Enumeration,
    /// Change set from a trailing history window; no baseline.
    History,
}

impl SourceMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceMode::Enumeration => "enumeration",
            SourceMode::History => "history",
        }
    }
}

/// A strategy for bringing the corpus up to date and reporting its state.
pub trait SnapshotSource: Send + Sync {
    /// Short label used in logs and the status listing.
    fn name(&self) -> &str;

    fn mode(&self) -> SourceMode;

    /// Refresh the mirror (if the strategy owns one) and report the current
    /// state. Any error here aborts the cycle before state is touched.
    fn acquire(&self) -> Result<CorpusState>;
}

/// Build the source selected by `config.corpus.mode`.
pub fn source_from_config(config: &Config) -> Result<Box<dyn SnapshotSource>> {
    let source: Box<dyn SnapshotSource> = match config.corpus.mode {
        CorpusMode::Archive => Box::new(ArchiveSource::from_config(config)?),
        CorpusMode::Directory => Box::new(DirectorySource::from_config(config)),
        CorpusMode::Git => Box::new(GitHistorySource::from_config(config)?),
    };
    Ok(source)
}

/// Recursively collect every file under `root` whose name ends in one of
/// `suffixes`. Paths are relative to `root` and `/`-separated.
pub fn enumerate_templates(root: &Path, suffixes: &[String]) -> Result<Snapshot> {
    if !root.is_dir() {
        bail!("Corpus root does not exist: {}", root.display());
    }

    let include_set = build_suffix_set(suffixes)?;
    let mut snapshot = Snapshot::new();

    let walker = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || e.file_name() != ".git");
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        let Some(rel_str) = normalize_relative(relative) else {
            tracing::warn!(
                path = %relative.display(),
                "skipping file whose name is not valid UTF-8 or contains a line break"
            );
            continue;
        };

        if include_set.is_match(&rel_str) {
            snapshot.paths.insert(rel_str);
        }
    }

    Ok(snapshot)
}

/// `true` when `path` ends in one of the accepted suffixes.
pub fn has_template_suffix(path: &str, suffixes: &[String]) -> bool {
    suffixes.iter().any(|s| path.ends_with(s.as_str()))
}

/// `/`-joined form of `relative`, or `None` when a component is not valid
/// UTF-8 or holds a line break. Such names cannot be mapped back to the file
/// on disk or stored one per line in the state file.
fn normalize_relative(relative: &Path) -> Option<String> {
    let parts = relative
        .components()
        .map(|c| c.as_os_str().to_str())
        .collect::<Option<Vec<_>>>()?;
    if parts.iter().any(|p| p.contains(['\n', '\r'])) {
        return None;
    }
    Some(parts.join("/"))
}

fn build_suffix_set(suffixes: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for suffix in suffixes {
        builder.add(Glob::new(&format!("**/*{}", globset::escape(suffix)))?);
    }
    Ok(builder.build()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn suffixes() -> Vec<String> {
        vec![".yaml".to_string(), ".yml".to_string()]
    }

    #[test]
    fn collects_both_suffixes_recursively() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path();
        fs::create_dir_all(root.join("http/cves/2024")).unwrap();
        fs::create_dir_all(root.join("dns")).unwrap();
        fs::write(root.join("http/cves/2024/CVE-2024-1.yaml"), "id: a\n").unwrap();
        fs::write(root.join("dns/zone.yml"), "id: b\n").unwrap();
        fs::write(root.join("README.md"), "# readme\n").unwrap();
        fs::write(root.join("top.yaml"), "id: c\n").unwrap();

        let snap = enumerate_templates(root, &suffixes()).unwrap();
        let paths: Vec<&str> = snap.paths.iter().map(String::as_str).collect();
        assert_eq!(
            paths,
            vec!["dns/zone.yml", "http/cves/2024/CVE-2024-1.yaml", "top.yaml"]
        );
    }

    #[test]
    fn skips_git_metadata() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join(".git/refs")).unwrap();
        fs::write(tmp.path().join(".git/refs/x.yaml"), "").unwrap();
        fs::write(tmp.path().join("keep.yaml"), "").unwrap();

        let snap = enumerate_templates(tmp.path(), &suffixes()).unwrap();
        assert_eq!(snap, Snapshot::from_iter(["keep.yaml"]));
    }

    #[cfg(unix)]
    #[test]
    fn skips_names_that_do_not_round_trip() {
        use std::ffi::OsStr;
        use std::os::unix::ffi::OsStrExt;

        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join(OsStr::from_bytes(b"bad\xff.yaml")), "id: bad\n").unwrap();
        fs::write(tmp.path().join("two\nlines.yaml"), "id: split\n").unwrap();
        fs::write(tmp.path().join("good.yaml"), "id: good\n").unwrap();

        let snap = enumerate_templates(tmp.path(), &suffixes()).unwrap();
        assert_eq!(snap, Snapshot::from_iter(["good.yaml"]));
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let err = enumerate_templates(&tmp.path().join("nope"), &suffixes()).unwrap_err();
        assert!(err.to_string().contains("does not exist"));
    }

    #[test]
    fn suffix_check() {
        assert!(has_template_suffix("a/b.yaml", &suffixes()));
        assert!(has_template_suffix("b.yml", &suffixes()));
        assert!(!has_template_suffix("b.yaml.bak", &suffixes()));
    }
}
