//! 🧾 The RunReport: what the run has to show for itself.
//!
//! Produced exactly once, after every worker has come home. Printed even if
//! every single file failed. Especially then.

use std::time::Duration;

use comfy_table::{Cell, CellAlignment, ContentArrangement, Table, presets::NOTHING};

use crate::progress::{format_bytes, format_duration, format_number};

/// 🧾 Aggregate outcome of one backup run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunReport {
    pub run_prefix: String,
    pub destination: String,
    pub total_files: u64,
    pub succeeded: u64,
    pub failed: u64,
    pub skipped: u64,
    pub bytes_uploaded: u64,
    pub workers: usize,
    /// Workers whose task died before handing back a tally. Their files stay uncounted.
    pub workers_lost: usize,
    pub elapsed: Duration,
}

impl RunReport {
    /// Files that never got a verdict: uncounted because their worker was lost.
    pub fn unaccounted(&self) -> u64 {
        self.total_files
            .saturating_sub(self.succeeded + self.failed + self.skipped)
    }

    fn table(&self) -> Table {
        let mut table = Table::new();
        table.load_preset(NOTHING);
        table.set_content_arrangement(ContentArrangement::Dynamic);

        let mut row = |label: &str, value: String| {
            table.add_row(vec![
                Cell::new(label),
                Cell::new(value).set_alignment(CellAlignment::Right),
            ]);
        };

        row("Run prefix", self.run_prefix.clone());
        row("Destination", self.destination.clone());
        row("Total files to copy", format_number(self.total_files));
        row("Total files copied", format_number(self.succeeded));
        row("Total files with errors", format_number(self.failed));
        row("Total files skipped", format_number(self.skipped));
        if self.workers_lost > 0 {
            row("Workers lost", format_number(self.workers_lost as u64));
            row("Files unaccounted", format_number(self.unaccounted()));
        }
        row("Bytes uploaded", format_bytes(self.bytes_uploaded));
        row("Workers", format_number(self.workers as u64));
        row("Copy files took", format_duration(self.elapsed));
        table
    }
}

impl std::fmt::Display for RunReport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f)?;
        write!(f, "{}", self.table())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn the_report() -> RunReport {
        RunReport {
            run_prefix: "2024-05-06_07:08:09".to_string(),
            destination: "memory://".to_string(),
            total_files: 1200,
            succeeded: 1100,
            failed: 90,
            skipped: 10,
            bytes_uploaded: 3 * 1024 * 1024,
            workers: 60,
            workers_lost: 0,
            elapsed: Duration::from_millis(83_500),
        }
    }

    #[test]
    fn the_one_where_the_summary_says_everything_it_should() {
        let the_rendered = the_report().to_string();
        for the_expected in [
            "Total files to copy",
            "1,200",
            "Total files copied",
            "1,100",
            "Total files with errors",
            "90",
            "Total files skipped",
            "3.00 MiB",
            "01:23.500",
            "2024-05-06_07:08:09",
        ] {
            assert!(
                the_rendered.contains(the_expected),
                "summary is missing '{}':\n{}",
                the_expected,
                the_rendered
            );
        }
        assert!(!the_rendered.contains("Workers lost"));
    }

    #[test]
    fn the_one_where_lost_workers_get_a_mention() {
        let the_report = RunReport {
            succeeded: 1000,
            workers_lost: 1,
            ..the_report()
        };
        assert_eq!(the_report.unaccounted(), 100);
        let the_rendered = the_report.to_string();
        assert!(the_rendered.contains("Workers lost"));
        assert!(the_rendered.contains("Files unaccounted"));
    }
}
