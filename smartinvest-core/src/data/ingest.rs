//! Batch sources: where raw batches come from.
//!
//! The [`BatchSource`] trait abstracts over the hand-off location (a directory
//! of CSV files written by the provider clients, or batches already in memory)
//! so the orchestrator can be driven the same way in production and in tests.

use super::batch::{fingerprint_bytes, RawBatch};
use crate::domain::Domain;
use polars::prelude::*;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors raised while discovering or reading batches.
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("source directory not found: {} (run the {domain} ingestion first)", .path.display())]
    MissingDirectory { path: PathBuf, domain: Domain },

    #[error("failed to list {}: {source}", .path.display())]
    Listing {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("unknown batch: {0}")]
    UnknownBatch(String),
}

/// Anything that can enumerate and produce raw batches for one domain.
pub trait BatchSource {
    fn domain(&self) -> Domain;

    /// Human-readable location, for logs.
    fn describe(&self) -> String;

    /// Batch names in load order. Failing here means the source itself is
    /// unusable, not just one batch.
    fn discover(&self) -> Result<Vec<String>, IngestError>;

    /// Read one discovered batch.
    fn read(&self, name: &str) -> Result<RawBatch, IngestError>;
}

/// Directory of `*.csv` files, one per entity, loaded in file-name order.
#[derive(Debug, Clone)]
pub struct CsvBatchSource {
    dir: PathBuf,
    domain: Domain,
}

impl CsvBatchSource {
    pub fn new(dir: impl Into<PathBuf>, domain: Domain) -> Self {
        Self {
            dir: dir.into(),
            domain,
        }
    }
}

impl BatchSource for CsvBatchSource {
    fn domain(&self) -> Domain {
        self.domain
    }

    fn describe(&self) -> String {
        self.dir.display().to_string()
    }

    fn discover(&self) -> Result<Vec<String>, IngestError> {
        if !self.dir.is_dir() {
            return Err(IngestError::MissingDirectory {
                path: self.dir.clone(),
                domain: self.domain,
            });
        }

        let listing_err = |source| IngestError::Listing {
            path: self.dir.clone(),
            source,
        };
        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir).map_err(listing_err)? {
            let path = entry.map_err(listing_err)?.path();
            let is_csv = path
                .extension()
                .and_then(|e| e.to_str())
                .is_some_and(|e| e.eq_ignore_ascii_case("csv"));
            if !is_csv || !path.is_file() {
                continue;
            }
            if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
                names.push(name.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn read(&self, name: &str) -> Result<RawBatch, IngestError> {
        let path = self.dir.join(name);
        let bytes = std::fs::read(&path).map_err(|source| IngestError::Read {
            path: path.clone(),
            source,
        })?;
        let fingerprint = fingerprint_bytes(&bytes);

        let frame = CsvReadOptions::default()
            .with_has_header(true)
            .with_infer_schema_length(None)
            .into_reader_with_file_handle(Cursor::new(bytes))
            .finish()
            .map_err(|e| IngestError::Parse {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let batch = RawBatch::new(name, self.domain, frame).with_fingerprint(fingerprint);
        // Macro files are named after their series. Market stems can't carry
        // index tickers (`GSPC.csv` holds `^GSPC`), so those keep the key column.
        let stem = Path::new(name).file_stem().and_then(|s| s.to_str());
        Ok(match (self.domain, stem) {
            (Domain::Macro, Some(stem)) if !stem.trim().is_empty() => batch.with_entity(stem),
            _ => batch,
        })
    }
}

/// Batches already held in memory, loaded in insertion order.
#[derive(Debug, Clone)]
pub struct InMemorySource {
    domain: Domain,
    batches: Vec<RawBatch>,
}

impl InMemorySource {
    pub fn new(domain: Domain) -> Self {
        Self {
            domain,
            batches: Vec::new(),
        }
    }

    pub fn push(mut self, batch: RawBatch) -> Self {
        self.batches.push(batch);
        self
    }
}

impl BatchSource for InMemorySource {
    fn domain(&self) -> Domain {
        self.domain
    }

    fn describe(&self) -> String {
        format!("{} in-memory batch(es)", self.batches.len())
    }

    fn discover(&self) -> Result<Vec<String>, IngestError> {
        Ok(self.batches.iter().map(|b| b.name().to_string()).collect())
    }

    fn read(&self, name: &str) -> Result<RawBatch, IngestError> {
        self.batches
            .iter()
            .find(|b| b.name() == name)
            .cloned()
            .ok_or_else(|| IngestError::UnknownBatch(name.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, name: &str, content: &str) {
        fs::write(dir.join(name), content).unwrap();
    }

    #[test]
    fn discover_lists_csv_files_sorted() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "MSFT.csv", "ticker,date,close\n");
        write(tmp.path(), "AAPL.csv", "ticker,date,close\n");
        write(tmp.path(), "notes.txt", "ignore me");
        fs::create_dir(tmp.path().join("nested.csv")).unwrap();

        let source = CsvBatchSource::new(tmp.path(), Domain::Market);
        assert_eq!(source.discover().unwrap(), vec!["AAPL.csv", "MSFT.csv"]);
    }

    #[test]
    fn missing_directory_is_reported() {
        let tmp = tempfile::tempdir().unwrap();
        let source = CsvBatchSource::new(tmp.path().join("fred"), Domain::Macro);
        assert!(matches!(
            source.discover().unwrap_err(),
            IngestError::MissingDirectory {
                domain: Domain::Macro,
                ..
            }
        ));
    }

    #[test]
    fn read_parses_csv_with_fingerprint() {
        let tmp = tempfile::tempdir().unwrap();
        let content = "ticker,date,open,close,adj_close\n\
                       AAPL,2024-01-02,187.15,185.64,\n\
                       AAPL,2024-01-03,184.22,184.25,183.9\n";
        write(tmp.path(), "AAPL.csv", content);

        let source = CsvBatchSource::new(tmp.path(), Domain::Market);
        let batch = source.read("AAPL.csv").unwrap();
        assert_eq!(batch.name(), "AAPL.csv");
        assert_eq!(batch.domain(), Domain::Market);
        assert_eq!(batch.height(), 2);
        assert_eq!(batch.frame().width(), 5);
        assert_eq!(batch.fingerprint(), Some(fingerprint_bytes(content.as_bytes()).as_str()));
    }

    #[test]
    fn macro_batches_take_series_from_file_stem() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "FEDFUNDS.csv", "observation_date,FEDFUNDS\n2024-01-01,5.33\n");
        write(tmp.path(), "GSPC.csv", "ticker,date,close\n^GSPC,2024-01-02,4742.83\n");

        let fred = CsvBatchSource::new(tmp.path(), Domain::Macro);
        assert_eq!(fred.read("FEDFUNDS.csv").unwrap().entity(), Some("FEDFUNDS"));

        let market = CsvBatchSource::new(tmp.path(), Domain::Market);
        assert_eq!(market.read("GSPC.csv").unwrap().entity(), None);
    }

    #[test]
    fn read_missing_file_is_read_error() {
        let tmp = tempfile::tempdir().unwrap();
        let source = CsvBatchSource::new(tmp.path(), Domain::Market);
        assert!(matches!(
            source.read("GONE.csv").unwrap_err(),
            IngestError::Read { .. }
        ));
    }

    #[test]
    fn in_memory_source_preserves_order() {
        let df = df!("ticker" => &["AAPL"], "date" => &["2024-01-02"], "close" => &[1.0]).unwrap();
        let source = InMemorySource::new(Domain::Market)
            .push(RawBatch::new("b", Domain::Market, df.clone()))
            .push(RawBatch::new("a", Domain::Market, df));
        assert_eq!(source.discover().unwrap(), vec!["b", "a"]);
        assert_eq!(source.read("a").unwrap().name(), "a");
        assert!(matches!(
            source.read("c").unwrap_err(),
            IngestError::UnknownBatch(_)
        ));
    }
}
