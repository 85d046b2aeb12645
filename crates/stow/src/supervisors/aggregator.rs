//! 🧮 Tallies and the aggregator that folds them.
//!
//! Each worker counts its own files in a private `Tally`. Nobody shares a
//! counter, nobody takes a lock. After every worker has come home, the
//! supervisor folds the tallies into one `ResultAggregator`. Addition is
//! commutative, so the order workers finish in doesn't matter. Math: undefeated.

use crate::common::UploadOutcome;

/// 🧮 One worker's private scorecard.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Tally {
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
    pub bytes_uploaded: u64,
}

impl Tally {
    pub(crate) fn record(&mut self, outcome: &UploadOutcome) {
        match outcome {
            UploadOutcome::Success { bytes } => {
                self.succeeded += 1;
                self.bytes_uploaded += bytes;
            }
            UploadOutcome::SkippedMissing => self.skipped += 1,
            UploadOutcome::TransferError { .. } => self.failed += 1,
        }
    }

    /// Files that were present at upload time and got a real attempt.
    pub(crate) fn attempted(&self) -> u64 {
        self.succeeded + self.failed
    }

    fn absorb(&mut self, other: &Tally) {
        self.succeeded += other.succeeded;
        self.failed += other.failed;
        self.skipped += other.skipped;
        self.bytes_uploaded += other.bytes_uploaded;
    }
}

/// 📥 The run-wide totals, only touched once every worker is done.
#[derive(Debug, Default)]
pub(crate) struct ResultAggregator {
    totals: Tally,
    workers_reported: usize,
    workers_lost: usize,
}

impl ResultAggregator {
    pub(crate) fn absorb(&mut self, tally: Tally) {
        self.totals.absorb(&tally);
        self.workers_reported += 1;
    }

    /// 💀 A worker that panicked. Its files stay uncounted.
    pub(crate) fn lost_worker(&mut self) {
        self.workers_lost += 1;
    }

    pub(crate) fn totals(&self) -> Tally {
        self.totals
    }

    pub(crate) fn workers_reported(&self) -> usize {
        self.workers_reported
    }

    pub(crate) fn workers_lost(&self) -> usize {
        self.workers_lost
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn the_one_where_every_outcome_lands_in_exactly_one_bucket() {
        let mut the_tally = Tally::default();
        the_tally.record(&UploadOutcome::Success { bytes: 10 });
        the_tally.record(&UploadOutcome::Success { bytes: 5 });
        the_tally.record(&UploadOutcome::SkippedMissing);
        the_tally.record(&UploadOutcome::TransferError {
            reason: "nope".to_string(),
        });

        assert_eq!(
            the_tally,
            Tally {
                succeeded: 2,
                failed: 1,
                skipped: 1,
                bytes_uploaded: 15,
            }
        );
        assert_eq!(the_tally.attempted(), 3);
    }

    #[test]
    fn the_one_where_folding_many_tallies_loses_nothing() {
        let mut the_aggregator = ResultAggregator::default();
        let mut the_expected = Tally::default();

        for i in 0..64u64 {
            let the_tally = Tally {
                succeeded: i,
                failed: i % 3,
                skipped: i % 2,
                bytes_uploaded: i * 100,
            };
            the_expected.absorb(&the_tally);
            the_aggregator.absorb(the_tally);
        }
        the_aggregator.lost_worker();

        assert_eq!(the_aggregator.totals(), the_expected);
        assert_eq!(the_aggregator.totals().succeeded, (0..64).sum::<u64>());
        assert_eq!(the_aggregator.workers_reported(), 64);
        assert_eq!(the_aggregator.workers_lost(), 1);
    }
}
