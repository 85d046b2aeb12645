//! 🧳 stow: back up local directory trees into an object-storage bucket.
//!
//! Discover every file under the configured roots, slice the list into
//! batches, upload each batch on its own task under a timestamped prefix,
//! and print what happened. That's it. No restore, no dedup, no encryption.
//! Just the files, the bucket, and a summary.

pub mod app_config;
pub mod backends;
pub mod common;
pub mod discovery;
pub mod partition;
mod progress;
pub mod report;
mod supervisors;

use anyhow::{Context, Result};
use tracing::info;

use crate::app_config::AppConfig;
use crate::report::RunReport;
use crate::supervisors::Supervisor;

/// 🚀 One full backup run: discover, upload, report.
///
/// 💀 Returns `Err` only for setup failures (walk errors, destination setup).
/// Individual file failures end up in the report, not here.
pub async fn run(app_config: AppConfig) -> Result<RunReport> {
    let the_manifest = discovery::discover(&app_config.directories)
        .context("💀 Couldn't build the list of files to back up")?;
    info!("📜 discovered {} files", the_manifest.len());

    Supervisor::new(app_config).run(the_manifest).await
}
