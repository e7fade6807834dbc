//! # tplwatch CLI
//!
//! ## Usage
//!
//! ```bash
//! tplwatch [--config ./config/tplwatch.toml] <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `tplwatch sync` | Run one cycle: fetch, diff, ingest, save baseline |
//! | `tplwatch watch` | Run cycles forever, sleeping `schedule.interval_secs` in between |
//! | `tplwatch status` | Show mirror, baseline and output store state |
//! | `tplwatch reset` | Empty the baseline so the next cycle re-ingests everything |
//!
//! Logs go to stderr (`RUST_LOG` controls the level); the cycle summary goes
//! to stdout.

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::time::Duration;

use tplwatch::config::{self, Config};
use tplwatch::ingest::{run_sync, SyncOptions};
use tplwatch::progress::ProgressMode;
use tplwatch::sources;
use tplwatch::state::StateFile;
use tplwatch::watch::run_watch;

const DEFAULT_CONFIG: &str = "./config/tplwatch.toml";

/// tplwatch: mirror a detection-template corpus and collect new templates
/// under their declared ids.
#[derive(Parser)]
#[command(
    name = "tplwatch",
    about = "Mirror a detection-template corpus and collect new or changed templates",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    ///
    /// Defaults to `./config/tplwatch.toml`; if that file does not exist the
    /// built-in defaults (nuclei-templates archive, hourly) are used.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Progress output on stderr. Defaults to `human` on a TTY, else `off`.
    #[arg(long, global = true, value_enum)]
    progress: Option<ProgressMode>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single sync cycle.
    ///
    /// Fetches the corpus, computes what is new since the last baseline (or
    /// inside the history window), copies those templates into the output
    /// directory and saves the new baseline.
    Sync {
        /// Show what would be saved without writing templates or state.
        #[arg(long)]
        dry_run: bool,

        /// Print the cycle report as JSON instead of the text summary.
        #[arg(long)]
        json: bool,
    },

    /// Run sync cycles forever.
    ///
    /// A failed cycle is logged and retried after the next interval. Stop
    /// with Ctrl-C.
    Watch {
        /// Seconds between cycles; overrides `schedule.interval_secs`.
        #[arg(long)]
        interval: Option<u64>,
    },

    /// Show configuration and on-disk state.
    Status,

    /// Empty the persisted baseline.
    ///
    /// The next enumeration cycle treats every template as new.
    Reset,
}

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn load(path: Option<&Path>) -> anyhow::Result<Config> {
    match path {
        Some(path) => config::load_config(path),
        None => config::load_or_default(Path::new(DEFAULT_CONFIG)),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing();

    let cfg = load(cli.config.as_deref())?;
    let progress = cli.progress.unwrap_or_else(ProgressMode::default_for_tty);

    match cli.command {
        Commands::Sync { dry_run, json } => {
            let options = SyncOptions { dry_run };
            let report = tokio::task::spawn_blocking(move || {
                let reporter = progress.reporter();
                run_sync(&cfg, reporter.as_ref(), options)
            })
            .await
            .context("sync cycle panicked")??;

            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", report.render_summary());
            }
        }
        Commands::Watch { interval } => {
            if interval == Some(0) {
                anyhow::bail!("--interval must be > 0");
            }
            let interval = interval
                .map(Duration::from_secs)
                .unwrap_or_else(|| cfg.schedule.interval());
            let stats = run_watch(cfg, interval, progress).await?;
            println!(
                "watch stopped after {} cycles ({} failed, {} templates saved)",
                stats.cycles, stats.failed_cycles, stats.saved
            );
        }
        Commands::Status => {
            sources::list_status(&cfg)?;
        }
        Commands::Reset => {
            let state = StateFile::new(&cfg.state.path);
            state.reset()?;
            println!("Baseline reset: {}", state.path().display());
        }
    }

    Ok(())
}
