//! Canonical column contracts for each domain.
//!
//! The hand-off between source adapters and the loader is one table per
//! entity. After normalization every batch carries exactly a subset of the
//! columns declared here, in the declared order.

use crate::domain::Domain;

/// Column every canonical batch must be keyed on.
pub const DATE_COLUMN: &str = "date";

/// Canonical column set for one domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CanonicalSchema {
    pub domain: Domain,
    /// Entity-identity column (ticker or series identifier).
    pub key: &'static str,
    /// Measure columns, in warehouse column order.
    pub measures: &'static [&'static str],
    /// Measures whose absence makes the batch unloadable.
    pub required_measures: &'static [&'static str],
}

pub const MARKET_SCHEMA: CanonicalSchema = CanonicalSchema {
    domain: Domain::Market,
    key: "ticker",
    measures: &[
        "open",
        "high",
        "low",
        "close",
        "adj_close",
        "volume",
        "dividends",
        "stock_splits",
    ],
    required_measures: &[],
};

pub const MACRO_SCHEMA: CanonicalSchema = CanonicalSchema {
    domain: Domain::Macro,
    key: "series_id",
    measures: &["value"],
    required_measures: &["value"],
};

impl CanonicalSchema {
    pub fn for_domain(domain: Domain) -> &'static CanonicalSchema {
        match domain {
            Domain::Market => &MARKET_SCHEMA,
            Domain::Macro => &MACRO_SCHEMA,
        }
    }

    /// Key, date, then measures.
    pub fn columns(&self) -> impl Iterator<Item = &'static str> + '_ {
        [self.key, DATE_COLUMN]
            .into_iter()
            .chain(self.measures.iter().copied())
    }

    /// Returns the `'static` canonical spelling of `name`, if it is canonical.
    pub fn canonical(&self, name: &str) -> Option<&'static str> {
        self.columns().find(|c| *c == name)
    }

    pub fn is_measure(&self, name: &str) -> bool {
        self.measures.contains(&name)
    }
}

/// Errors raised while mapping raw columns onto the canonical schema.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    #[error("no date column could be established (columns: {columns:?})")]
    MissingDateColumn { columns: Vec<String> },

    #[error("missing required column: {0}")]
    MissingColumn(String),

    #[error("no measure columns mapped; only {key} and date remain (columns: {columns:?})")]
    NoMeasures { key: String, columns: Vec<String> },

    #[error("label count {labels} does not match column count {columns}")]
    LabelMismatch { labels: usize, columns: usize },

    #[error("frame error: {0}")]
    Frame(String),
}

impl From<polars::prelude::PolarsError> for SchemaError {
    fn from(e: polars::prelude::PolarsError) -> Self {
        SchemaError::Frame(e.to_string())
    }
}
