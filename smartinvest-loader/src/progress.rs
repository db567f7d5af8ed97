//! Per-batch progress reporting.

use crate::orchestrator::{BatchOutcome, BatchReport, RunReport};

/// Progress callback for a load run.
pub trait LoadProgress: Send {
    /// Called before a batch is read.
    fn on_start(&self, batch: &str, index: usize, total: usize);

    /// Called once a batch is loaded or skipped.
    fn on_complete(&self, report: &BatchReport, index: usize, total: usize);

    /// Called when the run ends, including after an abort.
    fn on_run_complete(&self, report: &RunReport);
}

/// Prints one line per batch to stdout.
pub struct StdoutProgress;

impl LoadProgress for StdoutProgress {
    fn on_start(&self, batch: &str, index: usize, total: usize) {
        println!("[{}/{}] Loading {batch}...", index + 1, total);
    }

    fn on_complete(&self, report: &BatchReport, _index: usize, _total: usize) {
        match &report.outcome {
            BatchOutcome::Loaded(stats) => println!(
                "  [OK] {}: {} records, {} facts, {} new dates",
                report.batch, stats.records, stats.facts_written, stats.new_dates
            ),
            BatchOutcome::Skipped { reason, .. } => println!("  [SKIP] {}: {reason}", report.batch),
        }
    }

    fn on_run_complete(&self, report: &RunReport) {
        let total = report.batches.len();
        println!(
            "\n{} load complete: {}/{total} loaded, {} skipped{}",
            report.domain,
            report.loaded(),
            report.skipped(),
            if report.aborted { " (aborted)" } else { "" }
        );
    }
}

/// Discards all progress events.
pub struct NoProgress;

impl LoadProgress for NoProgress {
    fn on_start(&self, _batch: &str, _index: usize, _total: usize) {}
    fn on_complete(&self, _report: &BatchReport, _index: usize, _total: usize) {}
    fn on_run_complete(&self, _report: &RunReport) {}
}
