//! Git history connector: mirror a repository and report what changed in a
//! trailing time window.
//!
//! Workflow per cycle:
//! 1. Clone the repository (first run) or fetch + hard reset (later runs).
//! 2. `git log --since=<now - window> --name-status` over the mirror.
//! 3. Keep paths added (`A`) or modified (`M`) with a template suffix.
//!
//! There is no persisted baseline in this mode; overlapping windows can
//! report the same file twice, which the store absorbs by overwriting.

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Duration, SecondsFormat, Utc};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::process::Command;

use crate::config::Config;
use crate::models::CorpusState;
use crate::snapshot::{has_template_suffix, SnapshotSource, SourceMode};

/// Prefix of the per-commit header line emitted by [`log_format`].
const COMMIT_MARKER: &str = "@@commit ";

pub struct GitHistorySource {
    url: String,
    branch: String,
    mirror_dir: PathBuf,
    window: Duration,
    suffixes: Vec<String>,
}

impl GitHistorySource {
    pub fn new(
        url: impl Into<String>,
        branch: impl Into<String>,
        mirror_dir: impl Into<PathBuf>,
        window: Duration,
        suffixes: Vec<String>,
    ) -> Self {
        Self {
            url: url.into(),
            branch: branch.into(),
            mirror_dir: mirror_dir.into(),
            window,
            suffixes,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        let hours = i64::try_from(config.history.window_hours)
            .context("history.window_hours is too large")?;
        Ok(Self::new(
            config.corpus.url(),
            config.corpus.branch.clone(),
            config.corpus.mirror_dir(),
            Duration::hours(hours),
            config.corpus.suffixes.clone(),
        ))
    }

    /// Clone or update the mirror.
    pub fn refresh(&self) -> Result<()> {
        if self.mirror_dir.join(".git").exists() {
            git_pull(&self.mirror_dir, &self.branch)
        } else {
            git_clone(&self.url, &self.branch, &self.mirror_dir)
        }
    }

    /// Template paths added or modified at or after `since`.
    pub fn changed_since(&self, since: DateTime<Utc>) -> Result<BTreeSet<String>> {
        let output = git_log_since(&self.mirror_dir, since)?;
        Ok(parse_name_status_log(
            &output,
            since.timestamp(),
            &self.suffixes,
        ))
    }
}

impl SnapshotSource for GitHistorySource {
    fn name(&self) -> &str {
        "git"
    }

    fn mode(&self) -> SourceMode {
        SourceMode::History
    }

    fn acquire(&self) -> Result<CorpusState> {
        self.refresh()?;

        let head = git_head_sha(&self.mirror_dir).unwrap_or_else(|_| "unknown".to_string());
        let since = Utc::now() - self.window;
        tracing::info!(
            head = %head,
            since = %since.to_rfc3339_opts(SecondsFormat::Secs, true),
            "querying corpus history"
        );

        let changes = self.changed_since(since)?;
        Ok(CorpusState::changes(&self.mirror_dir, changes))
    }
}

fn git_clone(url: &str, branch: &str, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create cache directory: {}", parent.display()))?;
    }

    tracing::info!(url = %url, dest = %dest.display(), "cloning corpus repository");
    let output = Command::new("git")
        .args(["clone", "--branch", branch, "--single-branch"])
        .arg(url)
        .arg(dest)
        .output()
        .with_context(|| "Failed to execute 'git clone'. Is git installed?")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git clone failed: {}", stderr.trim());
    }

    Ok(())
}

fn git_pull(repo_dir: &Path, branch: &str) -> Result<()> {
    tracing::debug!(repo = %repo_dir.display(), "updating corpus mirror");
    let output = Command::new("git")
        .args(["fetch", "origin", branch])
        .current_dir(repo_dir)
        .output()
        .with_context(|| "Failed to execute 'git fetch'")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git fetch failed: {}", stderr.trim());
    }

    let remote_ref = format!("origin/{}", branch);
    let output = Command::new("git")
        .args(["reset", "--hard", &remote_ref])
        .current_dir(repo_dir)
        .output()
        .with_context(|| "Failed to execute 'git reset'")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git reset failed: {}", stderr.trim());
    }

    Ok(())
}

fn git_head_sha(repo_dir: &Path) -> Result<String> {
    let output = Command::new("git")
        .args(["rev-parse", "HEAD"])
        .current_dir(repo_dir)
        .output()
        .with_context(|| "Failed to get HEAD SHA")?;

    if !output.status.success() {
        bail!("git rev-parse HEAD failed");
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

fn log_format() -> String {
    format!("--format={}%H %ct", COMMIT_MARKER)
}

fn git_log_since(repo_dir: &Path, since: DateTime<Utc>) -> Result<String> {
    let since_arg = format!(
        "--since={}",
        since.to_rfc3339_opts(SecondsFormat::Secs, true)
    );
    let output = Command::new("git")
        .args(["-c", "core.quotePath=false", "log", "--name-status"])
        .arg(log_format())
        .arg(since_arg)
        .current_dir(repo_dir)
        .output()
        .with_context(|| "Failed to execute 'git log'")?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("git log failed: {}", stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Parse `git log --name-status` output produced with [`log_format`].
///
/// Keeps `A` and `M` entries with a template suffix whose commit time is at
/// or after `since` (unix seconds). The boundary is inclusive, the same as
/// git's own `--since` filter, so a commit stamped exactly `since` counts.
pub fn parse_name_status_log(output: &str, since: i64, suffixes: &[String]) -> BTreeSet<String> {
    let mut changed = BTreeSet::new();
    let mut commit_time: Option<i64> = None;

    for line in output.lines() {
        if let Some(header) = line.strip_prefix(COMMIT_MARKER) {
            commit_time = header
                .split_whitespace()
                .nth(1)
                .and_then(|ts| ts.parse::<i64>().ok());
            continue;
        }
        if line.trim().is_empty() {
            continue;
        }

        match commit_time {
            Some(ts) if ts >= since => {}
            _ => continue,
        }

        let mut cols = line.split('\t');
        let (Some(status), Some(path)) = (cols.next(), cols.next()) else {
            continue;
        };
        if !matches!(status, "A" | "M") {
            continue;
        }
        let Some(path) = unquote_path(path) else {
            tracing::warn!(path = %path, "cannot decode quoted path from git log, skipping");
            continue;
        };
        if has_template_suffix(&path, suffixes) {
            changed.insert(path);
        }
    }

    changed
}

/// Undo git's C-style quoting (`"a\tb.yaml"`), which `core.quotePath=false`
/// still applies to names containing control characters, `"` or `\`.
///
/// Unquoted input is returned unchanged. Malformed escapes, or bytes that do
/// not form UTF-8, yield `None`.
fn unquote_path(raw: &str) -> Option<String> {
    let Some(inner) = raw
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
    else {
        return Some(raw.to_string());
    };

    let mut bytes = Vec::with_capacity(inner.len());
    let mut iter = inner.bytes();
    while let Some(b) = iter.next() {
        if b != b'\\' {
            bytes.push(b);
            continue;
        }
        let decoded = match iter.next()? {
            b'a' => 0x07,
            b'b' => 0x08,
            b'f' => 0x0c,
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            b'v' => 0x0b,
            b'"' => b'"',
            b'\\' => b'\\',
            first @ b'0'..=b'3' => {
                let mid = iter.next().filter(|d| (b'0'..=b'7').contains(d))?;
                let low = iter.next().filter(|d| (b'0'..=b'7').contains(d))?;
                (first - b'0') * 64 + (mid - b'0') * 8 + (low - b'0')
            }
            _ => return None,
        };
        bytes.push(decoded);
    }

    String::from_utf8(bytes).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn suffixes() -> Vec<String> {
        vec![".yaml".to_string(), ".yml".to_string()]
    }

    const LOG: &str = "\
@@commit 3f1c2a 1700000300

A\thttp/cves/2023/CVE-2023-1.yaml
M\tdns/zone.yml
D\thttp/old.yaml
R087\thttp/a.yaml\thttp/b.yaml
M\tREADME.md
@@commit 9b8e7d 1700000200

M\thttp/cves/2023/CVE-2023-1.yaml
A\tnetwork/ssh.yaml
";

    #[test]
    fn keeps_added_and_modified_templates_once() {
        let changed = parse_name_status_log(LOG, 0, &suffixes());
        let got: Vec<&str> = changed.iter().map(String::as_str).collect();
        assert_eq!(
            got,
            vec!["dns/zone.yml", "http/cves/2023/CVE-2023-1.yaml", "network/ssh.yaml"]
        );
    }

    #[test]
    fn window_boundary_is_inclusive() {
        let at_boundary = parse_name_status_log(LOG, 1_700_000_200, &suffixes());
        assert!(at_boundary.contains("network/ssh.yaml"));

        let just_after = parse_name_status_log(LOG, 1_700_000_201, &suffixes());
        assert!(!just_after.contains("network/ssh.yaml"));
        assert!(just_after.contains("dns/zone.yml"));
    }

    #[test]
    fn ignores_lines_before_first_header_and_garbage() {
        let log = "M\tstray.yaml\n@@commit abc notanumber\nA\tx.yaml\n@@commit def 10\nA\n";
        assert!(parse_name_status_log(log, 0, &suffixes()).is_empty());
    }

    #[test]
    fn quoted_paths_are_decoded() {
        let log = concat!(
            "@@commit abc 100\n",
            "\n",
            "A\t\"http/a\\tb.yaml\"\n",
            "M\t\"dns/say \\\"hi\\\".yml\"\n",
            "A\t\"caf\\303\\251.yaml\"\n",
            "A\t\"broken\\q.yaml\"\n",
            "A\tplain.yaml\n",
        );
        let changed = parse_name_status_log(log, 0, &suffixes());
        let got: Vec<&str> = changed.iter().map(String::as_str).collect();
        assert_eq!(
            got,
            vec!["café.yaml", "dns/say \"hi\".yml", "http/a\tb.yaml", "plain.yaml"]
        );
    }

    #[test]
    fn unquote_leaves_plain_paths_alone() {
        assert_eq!(unquote_path("a/b.yaml").as_deref(), Some("a/b.yaml"));
        assert_eq!(unquote_path("\"back\\\\slash\"").as_deref(), Some("back\\slash"));
        assert_eq!(unquote_path("\"\\377\""), None);
    }

    #[test]
    fn empty_log_means_no_changes() {
        assert!(parse_name_status_log("", 0, &suffixes()).is_empty());
    }

    #[test]
    fn log_format_starts_with_marker() {
        assert_eq!(log_format(), "--format=@@commit %H %ct");
    }
}
