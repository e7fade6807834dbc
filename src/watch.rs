//! Long-running scheduler: run a cycle, sleep, repeat.
//!
//! Cycles are blocking (HTTP, `git` subprocesses, file copies) and run on
//! tokio's blocking pool one at a time. A failed cycle is logged and the
//! loop carries on; only Ctrl-C ends it.

use anyhow::{Context, Result};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::ingest::{run_sync, CycleError, CycleReport, SyncOptions};
use crate::progress::ProgressMode;

/// Totals across all cycles of one `watch` run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct WatchStats {
    pub cycles: u64,
    pub failed_cycles: u64,
    pub saved: u64,
}

impl WatchStats {
    /// Count one cycle; `saved` is `None` when the cycle failed.
    fn record(&mut self, saved: Option<usize>) {
        self.cycles += 1;
        match saved {
            Some(n) => self.saved += n as u64,
            None => self.failed_cycles += 1,
        }
    }
}

/// Run cycles every `interval` until Ctrl-C.
pub async fn run_watch(
    config: Config,
    interval: Duration,
    progress: ProgressMode,
) -> Result<WatchStats> {
    let config = Arc::new(config);
    run_loop(
        move || {
            let config = Arc::clone(&config);
            async move {
                tokio::task::spawn_blocking(move || {
                    let reporter = progress.reporter();
                    run_sync(&config, reporter.as_ref(), SyncOptions::default())
                })
                .await
                .context("sync cycle panicked")
            }
        },
        interval,
        shutdown_signal(),
        None,
    )
    .await
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("received ctrl-c, shutting down"),
        Err(err) => {
            tracing::error!(error = %err, "ctrl-c handler failed; running until killed");
            std::future::pending::<()>().await
        }
    }
}

/// The scheduling loop, parameterised for tests.
///
/// `cycle` runs one sync; its inner result is the cycle outcome and its outer
/// result a join failure (the cycle panicked). Both kinds of failure count as
/// a failed cycle. The loop stops when `shutdown` resolves during a sleep, or
/// after `max_cycles` cycles if given.
pub(crate) async fn run_loop<C, Fut, S>(
    mut cycle: C,
    interval: Duration,
    shutdown: S,
    max_cycles: Option<u64>,
) -> Result<WatchStats>
where
    C: FnMut() -> Fut,
    Fut: Future<Output = Result<Result<CycleReport, CycleError>>>,
    S: Future<Output = ()>,
{
    tokio::pin!(shutdown);
    let mut stats = WatchStats::default();

    loop {
        let started = chrono::Utc::now();
        tracing::info!(at = %started.format("%Y-%m-%d %H:%M:%S"), "starting check");

        let saved = match cycle().await {
            Ok(Ok(report)) => {
                print!("{}", report.render_summary());
                Some(report.saved())
            }
            Ok(Err(err)) => {
                tracing::error!(error = %err, "cycle failed; will retry next interval");
                None
            }
            Err(err) => {
                tracing::error!(error = %format!("{:#}", err), "cycle aborted; will retry next interval");
                None
            }
        };
        stats.record(saved);

        if max_cycles.is_some_and(|max| stats.cycles >= max) {
            break;
        }

        tracing::info!(minutes = interval.as_secs_f64() / 60.0, "waiting before next check");
        tokio::select! {
            _ = tokio::time::sleep(interval) => {}
            _ = &mut shutdown => break,
        }
    }

    Ok(stats)
}
