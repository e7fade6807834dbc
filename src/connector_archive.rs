//! Archive connector: download a zip of the corpus and enumerate it.
//!
//! Workflow per cycle:
//! 1. GET the configured archive URL (bounded by `http.timeout_secs`).
//! 2. Remove the previously unpacked tree.
//! 3. Unpack the archive into the mirror directory.
//! 4. Check the expected top-level directory exists.
//! 5. Enumerate template files under it.

use anyhow::{bail, Context, Result};
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::Config;
use crate::models::CorpusState;
use crate::snapshot::{enumerate_templates, SnapshotSource, SourceMode};

pub struct ArchiveSource {
    url: String,
    mirror_dir: PathBuf,
    archive_root: String,
    suffixes: Vec<String>,
    client: reqwest::blocking::Client,
}

impl ArchiveSource {
    pub fn from_config(config: &Config) -> Result<Self> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.http.timeout_secs))
            .user_agent(concat!("tplwatch/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            url: config.corpus.url().to_string(),
            mirror_dir: config.corpus.mirror_dir(),
            archive_root: config.corpus.archive_root.clone(),
            suffixes: config.corpus.suffixes.clone(),
            client,
        })
    }

    fn download(&self) -> Result<Vec<u8>> {
        tracing::info!(url = %self.url, "downloading template archive");
        let response = self
            .client
            .get(&self.url)
            .send()
            .with_context(|| format!("Failed to download {}", self.url))?
            .error_for_status()
            .with_context(|| format!("Archive request to {} was rejected", self.url))?;
        let bytes = response
            .bytes()
            .with_context(|| format!("Failed to read archive body from {}", self.url))?;
        tracing::info!(bytes = bytes.len(), "archive downloaded");
        Ok(bytes.to_vec())
    }
}

impl SnapshotSource for ArchiveSource {
    fn name(&self) -> &str {
        "archive"
    }

    fn mode(&self) -> SourceMode {
        SourceMode::Enumeration
    }

    fn acquire(&self) -> Result<CorpusState> {
        let bytes = self.download()?;
        let root = install_archive(&bytes, &self.mirror_dir, &self.archive_root)?;
        let snapshot = enumerate_templates(&root, &self.suffixes)?;
        Ok(CorpusState::snapshot(root, snapshot))
    }
}

/// Replace `<mirror_dir>/<archive_root>` with the contents of a zip archive.
///
/// Returns the unpacked corpus root. Fails if the archive is unreadable or
/// does not contain `archive_root` at its top level. An unreadable archive
/// leaves the previous tree in place.
pub fn install_archive(bytes: &[u8], mirror_dir: &Path, archive_root: &str) -> Result<PathBuf> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).context("Downloaded file is not a zip archive")?;

    let root = mirror_dir.join(archive_root);
    if root.exists() {
        std::fs::remove_dir_all(&root)
            .with_context(|| format!("Failed to remove old mirror: {}", root.display()))?;
    }
    std::fs::create_dir_all(mirror_dir)
        .with_context(|| format!("Failed to create mirror directory: {}", mirror_dir.display()))?;

    archive
        .extract(mirror_dir)
        .with_context(|| format!("Failed to unpack archive into {}", mirror_dir.display()))?;

    if !root.is_dir() {
        bail!(
            "Archive did not contain the expected top-level directory '{}'",
            archive_root
        );
    }
    tracing::info!(root = %root.display(), files = archive.len(), "archive unpacked");
    Ok(root)
}
