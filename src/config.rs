//! TOML configuration.
//!
//! Every key has a default matching the stock deployment (nuclei-templates
//! archive, hourly checks, `nuclei_pocs/` output), so an empty file is a
//! valid configuration.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ARCHIVE_URL: &str =
    "https://github.com/projectdiscovery/nuclei-templates/archive/refs/heads/master.zip";

/// Ten years; keeps the window arithmetic far from overflow.
const MAX_WINDOW_HOURS: u64 = 24 * 365 * 10;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub history: HistoryConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub http: HttpConfig,
}

/// How the corpus is acquired each cycle.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum CorpusMode {
    /// Download and unpack a zip archive, then enumerate it.
    #[default]
    Archive,
    /// Enumerate a local directory that is kept up to date externally.
    Directory,
    /// Clone/pull a git repository and query its recent history.
    Git,
}

impl CorpusMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            CorpusMode::Archive => "archive",
            CorpusMode::Directory => "directory",
            CorpusMode::Git => "git",
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CorpusConfig {
    #[serde(default)]
    pub mode: CorpusMode,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_branch")]
    pub branch: String,
    /// Local mirror location. For git mode it defaults to
    /// `.corpus-cache/<hash of url>`.
    #[serde(default)]
    pub mirror_dir: Option<PathBuf>,
    /// Top-level directory expected inside the unpacked archive.
    #[serde(default = "default_archive_root")]
    pub archive_root: String,
    /// Corpus root for directory mode.
    #[serde(default)]
    pub root: Option<PathBuf>,
    #[serde(default = "default_suffixes")]
    pub suffixes: Vec<String>,
}

impl Default for CorpusConfig {
    fn default() -> Self {
        Self {
            mode: CorpusMode::default(),
            url: None,
            branch: default_branch(),
            mirror_dir: None,
            archive_root: default_archive_root(),
            root: None,
            suffixes: default_suffixes(),
        }
    }
}

fn default_branch() -> String {
    "main".to_string()
}
fn default_archive_root() -> String {
    "nuclei-templates-master".to_string()
}
fn default_suffixes() -> Vec<String> {
    vec![".yaml".to_string(), ".yml".to_string()]
}

impl CorpusConfig {
    /// Archive URL or repository URL, falling back to the stock archive.
    pub fn url(&self) -> &str {
        self.url.as_deref().unwrap_or(DEFAULT_ARCHIVE_URL)
    }

    /// Directory the remote corpus is mirrored into.
    pub fn mirror_dir(&self) -> PathBuf {
        if let Some(dir) = &self.mirror_dir {
            return dir.clone();
        }
        match self.mode {
            CorpusMode::Git => PathBuf::from(".corpus-cache").join(short_hash(self.url())),
            _ => PathBuf::from("."),
        }
    }

    /// Root that snapshot paths are relative to.
    pub fn corpus_root(&self) -> PathBuf {
        match self.mode {
            CorpusMode::Archive => self.mirror_dir().join(&self.archive_root),
            CorpusMode::Directory => self.root.clone().unwrap_or_else(|| PathBuf::from(".")),
            CorpusMode::Git => self.mirror_dir(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HistoryConfig {
    #[serde(default = "default_window_hours")]
    pub window_hours: u64,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self {
            window_hours: default_window_hours(),
        }
    }
}

fn default_window_hours() -> u64 {
    24
}

#[derive(Debug, Deserialize, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_output_dir")]
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: default_output_dir(),
        }
    }
}

fn default_output_dir() -> PathBuf {
    PathBuf::from("nuclei_pocs")
}

#[derive(Debug, Deserialize, Clone)]
pub struct StateConfig {
    #[serde(default = "default_state_path")]
    pub path: PathBuf,
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            path: default_state_path(),
        }
    }
}

fn default_state_path() -> PathBuf {
    PathBuf::from("old_files.txt")
}

#[derive(Debug, Deserialize, Clone)]
pub struct ScheduleConfig {
    #[serde(default = "default_interval_secs")]
    pub interval_secs: u64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_interval_secs(),
        }
    }
}

fn default_interval_secs() -> u64 {
    3600
}

impl ScheduleConfig {
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_timeout_secs() -> u64 {
    300
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

/// Load `path` if it exists, otherwise use the built-in defaults.
///
/// Only used for the implicit default location; an explicitly requested
/// file that is missing goes through [`load_config`] and fails.
pub fn load_or_default(path: &Path) -> Result<Config> {
    if path.exists() {
        load_config(path)
    } else {
        Ok(Config::default())
    }
}

fn validate(config: &Config) -> Result<()> {
    if config.corpus.suffixes.is_empty() {
        bail!("corpus.suffixes must not be empty");
    }
    if let Some(bad) = config.corpus.suffixes.iter().find(|s| !s.starts_with('.')) {
        bail!("corpus.suffixes entries must start with '.', got '{}'", bad);
    }

    match config.corpus.mode {
        CorpusMode::Archive => {
            if config.corpus.archive_root.trim().is_empty() {
                bail!("corpus.archive_root must not be empty in archive mode");
            }
        }
        CorpusMode::Directory => {
            if config.corpus.root.is_none() {
                bail!("corpus.root must be set in directory mode");
            }
        }
        CorpusMode::Git => {
            if config.corpus.url.is_none() {
                bail!("corpus.url must be set in git mode");
            }
            if !(1..=MAX_WINDOW_HOURS).contains(&config.history.window_hours) {
                bail!("history.window_hours must be in [1, {}]", MAX_WINDOW_HOURS);
            }
        }
    }

    if config.schedule.interval_secs == 0 {
        bail!("schedule.interval_secs must be > 0");
    }
    if config.http.timeout_secs == 0 {
        bail!("http.timeout_secs must be > 0");
    }

    Ok(())
}

fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    format!("{:x}", hasher.finalize())[..12].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn parse(toml_src: &str) -> Result<Config> {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("tplwatch.toml");
        std::fs::write(&path, toml_src).unwrap();
        load_config(&path)
    }

    #[test]
    fn empty_file_uses_stock_defaults() {
        let cfg = parse("").unwrap();
        assert_eq!(cfg.corpus.mode, CorpusMode::Archive);
        assert_eq!(cfg.corpus.url(), DEFAULT_ARCHIVE_URL);
        assert_eq!(cfg.corpus.suffixes, vec![".yaml", ".yml"]);
        assert_eq!(
            cfg.corpus.corpus_root(),
            PathBuf::from("./nuclei-templates-master")
        );
        assert_eq!(cfg.output.dir, PathBuf::from("nuclei_pocs"));
        assert_eq!(cfg.state.path, PathBuf::from("old_files.txt"));
        assert_eq!(cfg.schedule.interval(), Duration::from_secs(3600));
        assert_eq!(cfg.history.window_hours, 24);
    }

    #[test]
    fn directory_mode_requires_root() {
        let err = parse("[corpus]\nmode = \"directory\"\n").unwrap_err();
        assert!(err.to_string().contains("corpus.root"));

        let cfg = parse("[corpus]\nmode = \"directory\"\nroot = \"/srv/templates\"\n").unwrap();
        assert_eq!(cfg.corpus.corpus_root(), PathBuf::from("/srv/templates"));
    }

    #[test]
    fn git_mode_requires_url_and_derives_cache_dir() {
        assert!(parse("[corpus]\nmode = \"git\"\n").is_err());

        let cfg = parse(
            "[corpus]\nmode = \"git\"\nurl = \"https://github.com/projectdiscovery/nuclei-templates.git\"\n",
        )
        .unwrap();
        let root = cfg.corpus.corpus_root();
        assert!(root.starts_with(".corpus-cache"));
        assert_eq!(root, cfg.corpus.mirror_dir());
    }

    #[test]
    fn rejects_bad_values() {
        assert!(parse("[schedule]\ninterval_secs = 0\n").is_err());
        assert!(parse("[corpus]\nsuffixes = []\n").is_err());
        assert!(parse("[corpus]\nsuffixes = [\"yaml\"]\n").is_err());
        assert!(parse("[corpus]\nmode = \"ftp\"\n").is_err());
    }

    #[test]
    fn example_config_parses() {
        let cfg = parse(include_str!("../config/tplwatch.example.toml")).unwrap();
        assert_eq!(cfg.corpus.mode, CorpusMode::Archive);
        assert_eq!(cfg.http.timeout_secs, 300);
    }

    #[test]
    fn missing_default_file_falls_back() {
        let tmp = TempDir::new().unwrap();
        let cfg = load_or_default(&tmp.path().join("absent.toml")).unwrap();
        assert_eq!(cfg.corpus.mode, CorpusMode::Archive);
        assert!(load_config(&tmp.path().join("absent.toml")).is_err());
    }
}
