//! 🎬 *[a worker receives its slice of the manifest. twenty paths. maybe more.]*
//! *[it does not know how many siblings it has. it does not ask.]*
//!
//! 📤 The UploadWorker walks its work unit in order, one file at a time:
//! check the file is still there, open it, stream it to the destination
//! under a fresh timeout, count what happened, move on. A failed file is a
//! line in the log and a +1 in the tally, never a reason to stop.
//!
//! 🦆 (the duck has no comment at this time)

use std::io::ErrorKind;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::fs::{self, File};
use tokio::io::AsyncReadExt;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use super::Worker;
use crate::backends::{Destination, ObjectWriter, ObjectWriterBackend};
use crate::common::{Manifest, RunContext, UploadOutcome, WorkUnit};
use crate::progress::{failed_file_line, missing_file_line, ok_line};
use crate::supervisors::aggregator::Tally;

/// 📏 Read buffer per file. Big enough to keep the pipe full, small enough to not care.
const CHUNK_SIZE: usize = 256 * 1024;

/// 📤 Uploads one contiguous slice of the manifest.
#[derive(Debug)]
pub(crate) struct UploadWorker {
    unit: WorkUnit,
    manifest: Manifest,
    context: Arc<RunContext>,
}

impl UploadWorker {
    pub(crate) fn new(unit: WorkUnit, manifest: Manifest, context: Arc<RunContext>) -> Self {
        Self {
            unit,
            manifest,
            context,
        }
    }

    /// 🔁 Every path in the unit, in index order. Always finishes the whole range.
    async fn run(self) -> Tally {
        debug!(
            "📤 worker {} starting on [{}, {}] ({} files)",
            self.unit.index,
            self.unit.first(),
            self.unit.last(),
            self.unit.len()
        );

        let mut the_tally = Tally::default();
        for path in self.manifest.slice(&self.unit) {
            let the_outcome = self.upload_one(path).await;
            self.announce(path, &the_outcome);
            the_tally.record(&the_outcome);
        }

        debug!("🏁 worker {} done: {:?}", self.unit.index, the_tally);
        the_tally
    }

    /// 🎯 One file, start to finish. Never returns an error, only an outcome.
    async fn upload_one(&self, path: &Path) -> UploadOutcome {
        // -- it was there at discovery. is it still?
        if matches!(fs::try_exists(path).await, Ok(false)) {
            return UploadOutcome::SkippedMissing;
        }

        let mut the_file = match File::open(path).await {
            Ok(file) => file,
            Err(err) => return open_failure(err),
        };

        let the_key = self.context.object_key(path);
        let the_budget = self.context.transfer_timeout;
        // ⏱️ a fresh timeout per file. the previous file's slowness is not our problem.
        match tokio::time::timeout(the_budget, self.transfer(&mut the_file, &the_key)).await {
            Ok(Ok(bytes)) => UploadOutcome::Success { bytes },
            Ok(Err(err)) => UploadOutcome::TransferError {
                reason: format!("{:#}", err),
            },
            Err(_elapsed) => UploadOutcome::TransferError {
                reason: format!("transfer timed out after {:?}", the_budget),
            },
        }
        // -- the_file drops here on every path
    }

    /// 🚰 Open the remote object, pour the file in, commit. Abort on a failed pour.
    async fn transfer(&self, file: &mut File, key: &str) -> Result<u64> {
        let mut the_writer = self
            .context
            .destination
            .open_writer(key)
            .await
            .context("couldn't open remote object")?;

        match pump(file, &mut the_writer).await {
            Ok(bytes) => {
                // -- close cleans up after itself when the commit fails
                the_writer.close().await.context("couldn't commit remote object")?;
                Ok(bytes)
            }
            Err(err) => {
                the_writer.abort().await;
                Err(err)
            }
        }
    }

    /// 🖨️ One console line and one tick of the progress bar per file.
    fn announce(&self, path: &Path, outcome: &UploadOutcome) {
        let the_progress = &self.context.progress;
        match outcome {
            UploadOutcome::Success { bytes } => {
                trace!("✅ {} ({} bytes)", path.display(), bytes);
                the_progress.println(&ok_line(&self.context.object_key(path)));
                the_progress.file_done(*bytes);
            }
            UploadOutcome::SkippedMissing => {
                debug!("⚠️ {} vanished before upload", path.display());
                the_progress.println(&missing_file_line(path));
                the_progress.file_done(0);
            }
            UploadOutcome::TransferError { reason } => {
                debug!("💀 {} failed: {}", path.display(), reason);
                the_progress.println(&failed_file_line(path, reason));
                the_progress.file_done(0);
            }
        }
    }
}

/// 🚪 What a failed `File::open` means for the tally.
fn open_failure(err: std::io::Error) -> UploadOutcome {
    match err.kind() {
        // -- deleted between the existence check and the open. same story as a missing file.
        ErrorKind::NotFound => UploadOutcome::SkippedMissing,
        _ => UploadOutcome::TransferError {
            reason: format!("couldn't open for reading: {}", err),
        },
    }
}

/// 🚰 Copy `file` into `writer` chunk by chunk. Returns bytes moved.
async fn pump(file: &mut File, writer: &mut ObjectWriterBackend) -> Result<u64> {
    let mut the_buffer = vec![0u8; CHUNK_SIZE];
    let mut the_total = 0u64;
    loop {
        let the_read = file
            .read(&mut the_buffer)
            .await
            .context("couldn't read local file")?;
        if the_read == 0 {
            return Ok(the_total);
        }
        writer
            .write(&the_buffer[..the_read])
            .await
            .context("couldn't write to remote object")?;
        the_total += the_read as u64;
    }
}

impl Worker for UploadWorker {
    type Output = Tally;

    fn start(self) -> JoinHandle<Tally> {
        tokio::spawn(self.run())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::{Duration, Instant};

    use crate::backends::{DestinationBackend, InMemoryDestination};
    use crate::common::{KeyStyle, RunPrefix};
    use crate::progress::UploadProgress;

    fn the_context(destination: InMemoryDestination, timeout: Duration) -> Arc<RunContext> {
        Arc::new(RunContext {
            prefix: RunPrefix::now(),
            destination: DestinationBackend::InMemory(destination),
            key_style: KeyStyle::Verbatim,
            transfer_timeout: timeout,
            started_at: Instant::now(),
            progress: UploadProgress::hidden(),
        })
    }

    fn the_files(dir: &Path, names: &[&str]) -> Vec<PathBuf> {
        names
            .iter()
            .map(|name| {
                let the_path = dir.join(name);
                std::fs::write(&the_path, format!("contents of {}", name))
                    .expect("💀 couldn't write fixture");
                the_path
            })
            .collect()
    }

    fn the_whole_manifest_as_one_unit(paths: Vec<PathBuf>) -> (WorkUnit, Manifest) {
        let the_len = paths.len();
        (WorkUnit::new(0, 0..the_len), Manifest::new(paths))
    }

    #[tokio::test]
    async fn the_one_where_every_file_makes_it_under_its_prefixed_key() -> Result<()> {
        let the_scratch = tempfile::tempdir()?;
        let the_paths = the_files(the_scratch.path(), &["a.txt", "b.txt", "c.txt"]);
        let the_destination = InMemoryDestination::new();
        let the_context = the_context(the_destination.clone(), Duration::from_secs(5));
        let (the_unit, the_manifest) = the_whole_manifest_as_one_unit(the_paths.clone());

        let the_tally = UploadWorker::new(the_unit, the_manifest, the_context.clone())
            .start()
            .await?;

        assert_eq!(the_tally.succeeded, 3);
        assert_eq!(the_tally.failed, 0);
        let the_objects = the_destination.snapshot().await;
        for path in &the_paths {
            let the_key = format!("{}{}", the_context.prefix, path.display());
            assert_eq!(
                the_objects.get(&the_key),
                Some(&std::fs::read(path)?),
                "missing or wrong object for {}",
                the_key
            );
        }
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_deleted_file_is_skipped_without_touching_the_counters() -> Result<()> {
        let the_scratch = tempfile::tempdir()?;
        let the_paths = the_files(
            the_scratch.path(),
            &["stays.txt", "leaves.txt", "also_stays.txt"],
        );
        std::fs::remove_file(&the_paths[1])?;

        let the_destination = InMemoryDestination::new();
        let (the_unit, the_manifest) = the_whole_manifest_as_one_unit(the_paths);
        let the_tally = UploadWorker::new(
            the_unit,
            the_manifest,
            the_context(the_destination.clone(), Duration::from_secs(5)),
        )
        .start()
        .await?;

        assert_eq!(the_tally.succeeded, 2);
        assert_eq!(the_tally.failed, 0);
        assert_eq!(the_tally.skipped, 1);
        assert_eq!(the_destination.snapshot().await.len(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_write_failure_counts_once_and_the_show_goes_on() -> Result<()> {
        let the_scratch = tempfile::tempdir()?;
        let the_paths = the_files(the_scratch.path(), &["fine1.txt", "cursed.txt", "fine2.txt"]);
        let the_destination = InMemoryDestination::new().failing_writes_on("cursed");
        let (the_unit, the_manifest) = the_whole_manifest_as_one_unit(the_paths);

        let the_tally = UploadWorker::new(
            the_unit,
            the_manifest,
            the_context(the_destination.clone(), Duration::from_secs(5)),
        )
        .start()
        .await?;

        assert_eq!(the_tally.succeeded, 2);
        assert_eq!(the_tally.failed, 1);
        let the_aborted = the_destination.aborted.lock().await.clone();
        assert_eq!(the_aborted.len(), 1);
        assert!(the_aborted[0].ends_with("cursed.txt"));
        assert!(!the_destination.snapshot().await.keys().any(|k| k.contains("cursed")));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_commit_failure_is_still_just_one_failure() -> Result<()> {
        let the_scratch = tempfile::tempdir()?;
        let the_paths = the_files(the_scratch.path(), &["a.txt", "uncommittable.txt"]);
        let the_destination = InMemoryDestination::new().failing_closes_on("uncommittable");
        let (the_unit, the_manifest) = the_whole_manifest_as_one_unit(the_paths);

        let the_tally = UploadWorker::new(
            the_unit,
            the_manifest,
            the_context(the_destination, Duration::from_secs(5)),
        )
        .start()
        .await?;

        assert_eq!(the_tally.succeeded, 1);
        assert_eq!(the_tally.failed, 1);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_stalled_transfer_times_out_alone() -> Result<()> {
        let the_scratch = tempfile::tempdir()?;
        let the_paths = the_files(the_scratch.path(), &["slowpoke.txt", "speedy.txt"]);
        let the_destination = InMemoryDestination::new().stalling_on("slowpoke");
        let (the_unit, the_manifest) = the_whole_manifest_as_one_unit(the_paths);

        let the_tally = UploadWorker::new(
            the_unit,
            the_manifest,
            the_context(the_destination.clone(), Duration::from_millis(100)),
        )
        .start()
        .await?;

        assert_eq!(the_tally.failed, 1);
        assert_eq!(the_tally.succeeded, 1);
        let the_objects = the_destination.snapshot().await;
        assert!(the_objects.keys().any(|k| k.ends_with("speedy.txt")));
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_path_through_a_regular_file_fails_at_open() -> Result<()> {
        let the_scratch = tempfile::tempdir()?;
        let the_paths = the_files(the_scratch.path(), &["a.txt"]);
        // -- ENOTDIR at open, even for root
        let the_impossible = the_paths[0].join("child");
        let the_destination = InMemoryDestination::new();
        let the_worker = UploadWorker::new(
            WorkUnit::new(0, 0..1),
            Manifest::new(vec![the_impossible.clone()]),
            the_context(the_destination.clone(), Duration::from_secs(5)),
        );

        match the_worker.upload_one(&the_impossible).await {
            UploadOutcome::TransferError { reason } => {
                assert!(reason.starts_with("couldn't open for reading"), "reason was {}", reason);
            }
            honestly_who_knows => {
                panic!("💀 Expected an open failure, got {:?}", honestly_who_knows)
            }
        }
        // -- nothing was opened remotely, so nothing needed aborting
        assert!(the_destination.snapshot().await.is_empty());
        assert!(the_destination.aborted.lock().await.is_empty());

        let the_tally = the_worker.start().await?;
        assert_eq!(the_tally.failed, 1);
        assert_eq!(the_tally.skipped, 0);
        Ok(())
    }

    #[test]
    fn the_one_where_a_file_vanishing_right_before_open_is_a_skip_not_a_failure() {
        let the_vanished = std::io::Error::from(ErrorKind::NotFound);
        assert_eq!(open_failure(the_vanished), UploadOutcome::SkippedMissing);

        let the_forbidden = std::io::Error::from(ErrorKind::PermissionDenied);
        match open_failure(the_forbidden) {
            UploadOutcome::TransferError { reason } => {
                assert!(reason.starts_with("couldn't open for reading"), "reason was {}", reason);
            }
            honestly_who_knows => {
                panic!("💀 Expected a transfer error, got {:?}", honestly_who_knows)
            }
        }
    }

    #[tokio::test]
    async fn the_one_where_a_directory_opens_fine_and_fails_on_read() -> Result<()> {
        let the_scratch = tempfile::tempdir()?;
        let the_dir = the_scratch.path().join("not_a_file");
        std::fs::create_dir(&the_dir)?;
        let (the_unit, the_manifest) = the_whole_manifest_as_one_unit(vec![the_dir]);
        let the_destination = InMemoryDestination::new();

        let the_tally = UploadWorker::new(
            the_unit,
            the_manifest,
            the_context(the_destination.clone(), Duration::from_secs(5)),
        )
        .start()
        .await?;

        assert_eq!(the_tally.failed, 1);
        assert_eq!(the_tally.succeeded, 0);
        // -- the remote object was opened, then aborted once the read blew up
        assert_eq!(the_destination.aborted.lock().await.len(), 1);
        Ok(())
    }

    #[tokio::test]
    async fn the_one_where_a_worker_only_touches_its_own_slice() -> Result<()> {
        let the_scratch = tempfile::tempdir()?;
        let the_paths = the_files(the_scratch.path(), &["0", "1", "2", "3", "4"]);
        let the_destination = InMemoryDestination::new();

        let the_tally = UploadWorker::new(
            WorkUnit::new(1, 1..3),
            Manifest::new(the_paths),
            the_context(the_destination.clone(), Duration::from_secs(5)),
        )
        .start()
        .await?;

        assert_eq!(the_tally.succeeded, 2);
        let the_keys: Vec<String> = the_destination.snapshot().await.into_keys().collect();
        assert_eq!(the_keys.len(), 2);
        assert!(the_keys.iter().any(|k| k.ends_with("/1")));
        assert!(the_keys.iter().any(|k| k.ends_with("/2")));
        Ok(())
    }
}
