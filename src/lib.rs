//! # tplwatch
//!
//! Keeps a local mirror of a remote detection-template corpus (such as
//! nuclei-templates) and copies every new or changed template into a flat
//! output directory, named after the template's declared `id`.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐   ┌─────────┐   ┌───────────────────┐   ┌─────────┐
//! │ SnapshotSrc  │──▶│  Delta  │──▶│ extract+sanitize  │──▶│  Store  │
//! │ zip/dir/git  │   │ (diff)  │   │  → <id>.yaml      │   │ (copy)  │
//! └──────────────┘   └────▲────┘   └───────────────────┘   └────┬────┘
//!                         │                                     │
//!                    ┌────┴────┐                                │
//!                    │  State  │◀───────── new baseline ────────┘
//!                    └─────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! tplwatch sync            # one cycle with ./config/tplwatch.toml (or defaults)
//! tplwatch watch           # cycle every schedule.interval_secs until Ctrl-C
//! tplwatch status          # mirror, baseline and output store at a glance
//! tplwatch reset           # forget the baseline; next cycle re-ingests all
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`snapshot`] | `SnapshotSource` trait and tree enumeration |
//! | [`connector_archive`] | Zip archive download + unpack |
//! | [`connector_dir`] | Local directory enumeration |
//! | [`connector_git`] | Git clone/pull + history window |
//! | [`delta`] | New-or-changed file computation |
//! | [`extract`] | Template `id` extraction |
//! | [`sanitize`] | Identifier → file name |
//! | [`store`] | Output store writes |
//! | [`state`] | Persisted baseline |
//! | [`ingest`] | One sync cycle |
//! | [`watch`] | Scheduling loop |
//! | [`progress`] | Cycle progress on stderr |
//! | [`sources`] | `status` listing |

pub mod config;
pub mod connector_archive;
pub mod connector_dir;
pub mod connector_git;
pub mod delta;
pub mod extract;
pub mod ingest;
pub mod models;
pub mod progress;
pub mod sanitize;
pub mod snapshot;
pub mod sources;
pub mod state;
pub mod store;
pub mod watch;
