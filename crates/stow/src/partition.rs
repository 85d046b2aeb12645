//! 🔪 The Partitioner: slices the manifest into one contiguous chunk per worker.
//!
//! `W = round(M / B)`, halves round up, never below 1. Every unit but the last
//! holds exactly `B` paths; the last one soaks up whatever rounding left over.
//! Like the last slice of pizza. Bigger, smaller, nobody knows until it's served. 🍕

use crate::common::WorkUnit;

/// 📦 Default files per worker.
pub const DEFAULT_BATCH_SIZE: usize = 20;

/// 🔢 How many workers a manifest of `manifest_len` paths gets at `batch_size` per worker.
///
/// Never zero, even for an empty manifest. A `batch_size` of zero is treated as one.
pub fn worker_count(manifest_len: usize, batch_size: usize) -> usize {
    let the_batch = batch_size.max(1);
    // -- round-half-up in integer land: floor(M/B + 1/2) == (2M + B) / 2B
    let the_rounded = (2 * manifest_len + the_batch) / (2 * the_batch);
    the_rounded.max(1)
}

/// 🔪 Split `[0, manifest_len)` into `worker_count(manifest_len, batch_size)` contiguous units.
///
/// An empty manifest yields no units at all, so nothing can index past the end.
pub fn partition(manifest_len: usize, batch_size: usize) -> Vec<WorkUnit> {
    if manifest_len == 0 {
        return Vec::new();
    }

    let the_batch = batch_size.max(1);
    let the_workers = worker_count(manifest_len, the_batch);

    (0..the_workers)
        .map(|i| {
            let start = i * the_batch;
            let end = if i + 1 == the_workers {
                manifest_len
            } else {
                start + the_batch
            };
            WorkUnit::new(i, start..end)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inclusive(units: &[WorkUnit]) -> Vec<(usize, usize)> {
        units.iter().map(|u| (u.first(), u.last())).collect()
    }

    #[test]
    fn the_one_where_45_files_make_two_workers_and_the_last_one_works_overtime() {
        let the_units = partition(45, 20);
        assert_eq!(worker_count(45, 20), 2);
        assert_eq!(inclusive(&the_units), vec![(0, 19), (20, 44)]);
    }

    #[test]
    fn the_one_where_5_files_round_to_zero_and_get_clamped_to_one() {
        assert_eq!(worker_count(5, 20), 1);
        let the_units = partition(5, 20);
        assert_eq!(inclusive(&the_units), vec![(0, 4)]);
    }

    #[test]
    fn the_one_where_exactly_half_rounds_up() {
        // 50 / 20 = 2.5 → 3
        assert_eq!(worker_count(50, 20), 3);
        let the_units = partition(50, 20);
        assert_eq!(inclusive(&the_units), vec![(0, 19), (20, 39), (40, 49)]);

        // 30 / 20 = 1.5 → 2
        assert_eq!(inclusive(&partition(30, 20)), vec![(0, 19), (20, 29)]);
    }

    #[test]
    fn the_one_where_the_empty_manifest_still_counts_one_worker_but_gets_no_units() {
        assert_eq!(worker_count(0, 20), 1);
        assert!(partition(0, 20).is_empty());
    }

    #[test]
    fn the_one_where_a_zero_batch_size_does_not_divide_by_zero() {
        assert_eq!(worker_count(3, 0), 3);
        assert_eq!(inclusive(&partition(3, 0)), vec![(0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn the_one_where_every_partition_covers_the_manifest_exactly_once() {
        for the_len in 1..=250 {
            for the_batch in 1..=40 {
                let the_units = partition(the_len, the_batch);
                assert_eq!(the_units.len(), worker_count(the_len, the_batch));
                assert!(!the_units.is_empty());
                assert_eq!(the_units[0].range.start, 0);
                assert_eq!(the_units.last().map(|u| u.range.end), Some(the_len));

                for (i, pair) in the_units.windows(2).enumerate() {
                    assert_eq!(
                        pair[0].range.end, pair[1].range.start,
                        "gap or overlap between units {} and {} for M={} B={}",
                        i,
                        i + 1,
                        the_len,
                        the_batch
                    );
                    assert_eq!(pair[0].len(), the_batch);
                }

                assert!(
                    the_units.iter().all(|u| !u.is_empty()),
                    "empty unit for M={} B={}",
                    the_len,
                    the_batch
                );
                let the_total: usize = the_units.iter().map(WorkUnit::len).sum();
                assert_eq!(the_total, the_len);
            }
        }
    }
}
