//! Batch load orchestration.
//!
//! Each batch runs normalize → validate → time dimension → entity
//! resolution → fact upsert, strictly one batch at a time. Every write group
//! is its own transaction, so a failing batch never rolls back batches that
//! already completed. What happens after a failure is decided by
//! [`FailurePolicy`].

use crate::config::{ConfigError, LoaderConfig};
use crate::dimension::upsert_time_dimension;
use crate::error::{ErrorKind, LoadError};
use crate::progress::LoadProgress;
use crate::resolver::{resolve_assets, resolve_macro_series};
use crate::store::WarehouseStore;
use crate::upsert::{upsert_macro, upsert_market, MergePolicy};
use serde::{Deserialize, Serialize};
use smartinvest_core::data::{
    normalize, validate_macro, validate_market, BatchSource, CsvBatchSource, IngestError, RawBatch,
};
use smartinvest_core::domain::Domain;
use tracing::{info, warn};

/// What the orchestrator does after a batch fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Record the failure and continue with the next batch.
    #[default]
    SkipBatch,
    /// Stop the run at the first failed batch.
    Abort,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoadOptions {
    pub merge_policy: MergePolicy,
    pub failure_policy: FailurePolicy,
}

impl From<&LoaderConfig> for LoadOptions {
    fn from(config: &LoaderConfig) -> Self {
        Self {
            merge_policy: config.merge_policy,
            failure_policy: config.failure_policy,
        }
    }
}

/// Counts for one successfully loaded batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchStats {
    /// Rows in the raw batch.
    pub rows: usize,
    /// Records that passed validation.
    pub records: usize,
    pub dropped_empty: usize,
    pub dropped_duplicates: usize,
    /// Distinct dates referenced.
    pub dates: usize,
    /// Dates that were new to `dim_time`.
    pub new_dates: usize,
    /// Distinct entities (tickers or series) referenced.
    pub entities: usize,
    pub facts_written: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchOutcome {
    Loaded(BatchStats),
    Skipped { kind: ErrorKind, reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BatchReport {
    /// Batch identity (source file name).
    pub batch: String,
    /// BLAKE3 hex digest of the batch contents, when the source provides one.
    pub fingerprint: Option<String>,
    pub outcome: BatchOutcome,
}

impl BatchReport {
    pub fn is_loaded(&self) -> bool {
        matches!(self.outcome, BatchOutcome::Loaded(_))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub domain: Domain,
    pub source: String,
    pub batches: Vec<BatchReport>,
    /// True when [`FailurePolicy::Abort`] stopped the run early.
    pub aborted: bool,
}

impl RunReport {
    pub fn loaded(&self) -> usize {
        self.batches.iter().filter(|b| b.is_loaded()).count()
    }

    pub fn skipped(&self) -> usize {
        self.batches.len() - self.loaded()
    }

    pub fn facts_written(&self) -> usize {
        self.batches
            .iter()
            .filter_map(|b| match &b.outcome {
                BatchOutcome::Loaded(stats) => Some(stats.facts_written),
                BatchOutcome::Skipped { .. } => None,
            })
            .sum()
    }
}

pub struct LoadOrchestrator<'a> {
    store: &'a mut dyn WarehouseStore,
    options: LoadOptions,
}

impl<'a> LoadOrchestrator<'a> {
    pub fn new(store: &'a mut dyn WarehouseStore, options: LoadOptions) -> Self {
        Self { store, options }
    }

    /// Load one batch end to end.
    pub fn load_batch(&mut self, batch: &RawBatch) -> Result<BatchStats, LoadError> {
        match batch.domain() {
            Domain::Market => self.load_market(batch),
            Domain::Macro => self.load_macro(batch),
        }
    }

    fn load_market(&mut self, batch: &RawBatch) -> Result<BatchStats, LoadError> {
        let normalized = normalize(batch)?;
        let validated = validate_market(&normalized)?;
        let records = &validated.records;

        let dates: Vec<_> = records.iter().map(|r| r.date).collect();
        let distinct_dates = count_distinct(&dates);
        let new_dates = upsert_time_dimension(&mut *self.store, dates)?;

        let asset_ids = resolve_assets(&mut *self.store, records.iter().map(|r| r.ticker.as_str()))?;
        let facts_written = upsert_market(
            &mut *self.store,
            records,
            &asset_ids,
            self.options.merge_policy,
        )?;

        Ok(BatchStats {
            rows: batch.height(),
            records: records.len(),
            dropped_empty: validated.dropped_empty,
            dropped_duplicates: validated.dropped_duplicates,
            dates: distinct_dates,
            new_dates,
            entities: asset_ids.len(),
            facts_written,
        })
    }

    fn load_macro(&mut self, batch: &RawBatch) -> Result<BatchStats, LoadError> {
        let normalized = normalize(batch)?;
        let validated = validate_macro(&normalized)?;
        let records = &validated.records;

        let dates: Vec<_> = records.iter().map(|r| r.date).collect();
        let distinct_dates = count_distinct(&dates);
        let new_dates = upsert_time_dimension(&mut *self.store, dates)?;

        let series = resolve_macro_series(
            &mut *self.store,
            records.iter().map(|r| r.series_id.as_str()),
        )?;
        let facts_written = upsert_macro(&mut *self.store, records, self.options.merge_policy)?;

        Ok(BatchStats {
            rows: batch.height(),
            records: records.len(),
            dropped_empty: validated.dropped_empty,
            dropped_duplicates: validated.dropped_duplicates,
            dates: distinct_dates,
            new_dates,
            entities: series.len(),
            facts_written,
        })
    }

    /// Load every batch `source` discovers, in discovery order.
    ///
    /// Returns `Err` only when the source itself cannot be enumerated. Batch
    /// failures are recorded in the report and handled per
    /// [`FailurePolicy`].
    pub fn run(
        &mut self,
        source: &dyn BatchSource,
        progress: &dyn LoadProgress,
    ) -> Result<RunReport, LoadError> {
        let domain = source.domain();
        let names = source.discover().map_err(|e| match e {
            IngestError::MissingDirectory { path, domain } => {
                LoadError::Config(ConfigError::MissingSourceDir { domain, path })
            }
            other => LoadError::Ingest(other),
        })?;
        let total = names.len();
        info!(
            %domain,
            source = %source.describe(),
            batches = total,
            merge_policy = %self.options.merge_policy,
            "starting load"
        );

        let mut batches = Vec::with_capacity(total);
        let mut aborted = false;
        for (index, name) in names.iter().enumerate() {
            progress.on_start(name, index, total);

            let (fingerprint, result) = match source.read(name) {
                Ok(batch) => (
                    batch.fingerprint().map(str::to_string),
                    self.load_batch(&batch),
                ),
                Err(e) => (None, Err(LoadError::from(e))),
            };

            let outcome = match result {
                Ok(stats) => {
                    info!(
                        batch = %name,
                        records = stats.records,
                        facts = stats.facts_written,
                        new_dates = stats.new_dates,
                        "batch loaded"
                    );
                    BatchOutcome::Loaded(stats)
                }
                Err(err) if err.is_fatal() => return Err(err),
                Err(err) => {
                    warn!(batch = %name, kind = ?err.kind(), error = %err, "batch skipped");
                    BatchOutcome::Skipped {
                        kind: err.kind(),
                        reason: err.to_string(),
                    }
                }
            };

            let report = BatchReport {
                batch: name.clone(),
                fingerprint,
                outcome,
            };
            progress.on_complete(&report, index, total);
            let failed = !report.is_loaded();
            batches.push(report);

            if failed && self.options.failure_policy == FailurePolicy::Abort {
                warn!(batch = %name, remaining = total - index - 1, "aborting run");
                aborted = true;
                break;
            }
        }

        let report = RunReport {
            domain,
            source: source.describe(),
            batches,
            aborted,
        };
        info!(
            %domain,
            loaded = report.loaded(),
            skipped = report.skipped(),
            facts = report.facts_written(),
            aborted,
            "load finished"
        );
        progress.on_run_complete(&report);
        Ok(report)
    }
}

fn count_distinct(dates: &[chrono::NaiveDate]) -> usize {
    dates
        .iter()
        .collect::<std::collections::BTreeSet<_>>()
        .len()
}

/// Load one domain's hand-off directory as configured.
///
/// A missing directory is a configuration error raised before any batch.
pub fn run_domain(
    store: &mut dyn WarehouseStore,
    config: &LoaderConfig,
    domain: Domain,
    progress: &dyn LoadProgress,
) -> Result<RunReport, LoadError> {
    let dir = config.require_source_dir(domain)?;
    let source = CsvBatchSource::new(dir, domain);
    LoadOrchestrator::new(store, LoadOptions::from(config)).run(&source, progress)
}
