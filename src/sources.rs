use anyhow::Result;
use std::path::Path;

use crate::config::{Config, CorpusMode};
use crate::state::StateFile;

/// One row of the `tplwatch status` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusRow {
    pub item: &'static str,
    pub value: String,
    pub healthy: bool,
}

pub fn collect_status(config: &Config) -> Result<Vec<StatusRow>> {
    let corpus = &config.corpus;
    let mut rows = vec![StatusRow {
        item: "mode",
        value: corpus.mode.as_str().to_string(),
        healthy: true,
    }];

    if corpus.mode != CorpusMode::Directory {
        rows.push(StatusRow {
            item: "url",
            value: corpus.url().to_string(),
            healthy: true,
        });
    }

    let root = corpus.corpus_root();
    let root_ok = root.is_dir();
    rows.push(StatusRow {
        item: "corpus root",
        value: describe_dir(&root, root_ok),
        healthy: root_ok || corpus.mode != CorpusMode::Directory,
    });

    let state = StateFile::new(&config.state.path);
    let (state_value, state_ok) = match corpus.mode {
        CorpusMode::Git => ("unused in git mode".to_string(), true),
        _ => match state.load() {
            Ok(loaded) => (
                format!("{} ({})", state.path().display(), loaded.describe()),
                true,
            ),
            Err(e) => (format!("{} ({:#})", state.path().display(), e), false),
        },
    };
    rows.push(StatusRow {
        item: "state",
        value: state_value,
        healthy: state_ok,
    });

    let output = &config.output.dir;
    let saved = std::fs::read_dir(output)
        .map(|entries| {
            entries
                .filter_map(|e| e.ok())
                .filter(|e| e.path().extension().is_some_and(|ext| ext == "yaml"))
                .count()
        })
        .ok();
    rows.push(StatusRow {
        item: "output",
        value: match saved {
            Some(n) => format!("{} ({} templates)", output.display(), n),
            None => format!("{} (not created yet)", output.display()),
        },
        healthy: true,
    });

    rows.push(StatusRow {
        item: "interval",
        value: format!("{}s", config.schedule.interval_secs),
        healthy: true,
    });

    Ok(rows)
}

pub fn list_status(config: &Config) -> Result<()> {
    let rows = collect_status(config)?;
    println!("{:<14} {:<8} VALUE", "ITEM", "HEALTHY");
    for row in rows {
        println!("{:<14} {:<8} {}", row.item, row.healthy, row.value);
    }
    Ok(())
}

fn describe_dir(path: &Path, exists: bool) -> String {
    if exists {
        path.display().to_string()
    } else {
        format!("{} (missing)", path.display())
    }
}
