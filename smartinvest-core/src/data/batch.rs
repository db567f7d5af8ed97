//! Raw tabular batches as handed over by source adapters.

use super::schema::SchemaError;
use crate::domain::Domain;
use polars::prelude::*;

/// Column label as produced by a source.
///
/// Sources that batch several entities together emit multi-part labels such
/// as `("Close", "AAPL")`; single-entity sources emit flat strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnLabel {
    Flat(String),
    Composite(Vec<String>),
}

impl ColumnLabel {
    /// Join non-empty parts with `_`, trim, lowercase, and replace inner
    /// whitespace with `_`.
    pub fn flatten(&self) -> String {
        let joined = match self {
            ColumnLabel::Flat(s) => s.trim().to_string(),
            ColumnLabel::Composite(parts) => parts
                .iter()
                .map(|p| p.trim())
                .filter(|p| !p.is_empty())
                .collect::<Vec<_>>()
                .join("_"),
        };
        joined
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join("_")
    }
}

impl From<&str> for ColumnLabel {
    fn from(s: &str) -> Self {
        ColumnLabel::Flat(s.to_string())
    }
}

impl From<Vec<&str>> for ColumnLabel {
    fn from(parts: Vec<&str>) -> Self {
        ColumnLabel::Composite(parts.into_iter().map(str::to_string).collect())
    }
}

/// One untyped table for one source entity (or one provider download).
///
/// `labels[i]` names `frame`'s i-th column. By default the labels are the
/// frame's own column names.
#[derive(Debug, Clone)]
pub struct RawBatch {
    name: String,
    domain: Domain,
    entity: Option<String>,
    labels: Vec<ColumnLabel>,
    frame: DataFrame,
    fingerprint: Option<String>,
}

impl RawBatch {
    pub fn new(name: impl Into<String>, domain: Domain, frame: DataFrame) -> Self {
        let labels = frame
            .get_column_names()
            .iter()
            .map(|n| ColumnLabel::Flat(n.to_string()))
            .collect();
        Self {
            name: name.into(),
            domain,
            entity: None,
            labels,
            frame,
            fingerprint: None,
        }
    }

    /// Replace the column labels, e.g. with composite labels from a
    /// multi-entity download. Must supply one label per frame column.
    pub fn with_labels(mut self, labels: Vec<ColumnLabel>) -> Result<Self, SchemaError> {
        if labels.len() != self.frame.width() {
            return Err(SchemaError::LabelMismatch {
                labels: labels.len(),
                columns: self.frame.width(),
            });
        }
        self.labels = labels;
        Ok(self)
    }

    /// Entity the batch was fetched for (ticker or series identifier).
    pub fn with_entity(mut self, entity: impl Into<String>) -> Self {
        self.entity = Some(entity.into());
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = Some(fingerprint.into());
        self
    }

    /// Batch identity used in logs and reports (usually the source file name).
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn domain(&self) -> Domain {
        self.domain
    }

    pub fn entity(&self) -> Option<&str> {
        self.entity.as_deref()
    }

    pub fn labels(&self) -> &[ColumnLabel] {
        &self.labels
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// BLAKE3 hex digest of the source bytes, when known.
    pub fn fingerprint(&self) -> Option<&str> {
        self.fingerprint.as_deref()
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }
}

/// BLAKE3 hex digest of a batch's source bytes.
pub fn fingerprint_bytes(bytes: &[u8]) -> String {
    blake3::hash(bytes).to_hex().to_string()
}
