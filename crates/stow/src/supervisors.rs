//! 🎬 *[camera pans across a dimly lit server room]*
//! 🎬 "In a world where workers toil endlessly..."
//! 🎬 "One supervisor dared to manage them all." 🦆
//!
//! 📦 The Supervisor is the run coordinator. It builds the destination, stamps
//! the run prefix, partitions the manifest, spawns one worker per unit, waits
//! for every last one of them, then folds their tallies into the report.
//!
//! ⚠️ Workers are the supervisor's private minions. Nobody outside this module
//! gets to spawn one.

mod aggregator;
mod workers;

use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use futures::future::join_all;
use tracing::{error, info};

use crate::app_config::AppConfig;
use crate::backends::{Destination, DestinationBackend};
use crate::common::{Manifest, RunContext, RunPrefix};
use crate::partition::partition;
use crate::progress::UploadProgress;
use crate::report::RunReport;
use aggregator::ResultAggregator;
use workers::{UploadWorker, Worker};

/// 📦 The Supervisor: hovers over the workers asking "is it done yet?"
/// and, unusually for management, waits for the answer.
pub(crate) struct Supervisor {
    app_config: AppConfig,
}

impl Supervisor {
    pub(crate) fn new(app_config: AppConfig) -> Self {
        Self { app_config }
    }

    /// 🚀 Build the destination from config, then back up `manifest`.
    ///
    /// 💀 Only destination setup can fail. Once workers are out the door, the
    /// run always ends in a report.
    pub(crate) async fn run(&self, manifest: Manifest) -> Result<RunReport> {
        let the_destination = DestinationBackend::from_config(&self.app_config.destination)
            .await
            .context("💀 Couldn't set up the destination. Nothing was uploaded.")?;
        Ok(self.run_with(manifest, the_destination).await)
    }

    /// 🧵 The fan-out / fan-in. Spawns exactly one task per work unit.
    pub(crate) async fn run_with(
        &self,
        manifest: Manifest,
        destination: DestinationBackend,
    ) -> RunReport {
        let the_runtime = &self.app_config.runtime;
        let the_total_files = manifest.len() as u64;

        let the_context = Arc::new(RunContext {
            prefix: RunPrefix::now(),
            destination,
            key_style: the_runtime.key_style,
            transfer_timeout: the_runtime.transfer_timeout(),
            started_at: Instant::now(),
            progress: UploadProgress::new(
                the_total_files,
                the_runtime.show_progress && !manifest.is_empty(),
            ),
        });

        let the_units = partition(manifest.len(), the_runtime.batch_size);
        info!(
            "🚀 backing up {} files to {} under '{}' with {} workers",
            the_total_files,
            the_context.destination.describe(),
            the_context.prefix,
            the_units.len()
        );

        let the_handles: Vec<_> = the_units
            .into_iter()
            .map(|unit| UploadWorker::new(unit, manifest.clone(), the_context.clone()).start())
            .collect();
        let the_worker_count = the_handles.len();

        // 🚧 the barrier: nothing gets reported until every worker is back
        let mut the_aggregator = ResultAggregator::default();
        for (index, result) in join_all(the_handles).await.into_iter().enumerate() {
            match result {
                Ok(tally) => the_aggregator.absorb(tally),
                Err(err) => {
                    error!("💀 worker {} died before reporting back: {}", index, err);
                    the_aggregator.lost_worker();
                }
            }
        }
        let the_elapsed = the_context.started_at.elapsed();
        the_context.progress.finish();

        let the_totals = the_aggregator.totals();
        info!(
            "🏁 {} workers reported: {} attempted, {} copied, {} failed, {} skipped",
            the_aggregator.workers_reported(),
            the_totals.attempted(),
            the_totals.succeeded,
            the_totals.failed,
            the_totals.skipped
        );

        let the_report = RunReport {
            run_prefix: the_context.prefix.to_string(),
            destination: the_context.destination.describe(),
            total_files: the_total_files,
            succeeded: the_totals.succeeded,
            failed: the_totals.failed,
            skipped: the_totals.skipped,
            bytes_uploaded: the_totals.bytes_uploaded,
            workers: the_worker_count,
            workers_lost: the_aggregator.workers_lost(),
            elapsed: the_elapsed,
        };
        println!("{}", the_report);
        the_report
    }
}
