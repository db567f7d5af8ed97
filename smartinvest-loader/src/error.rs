//! Top-level loader error.

use crate::config::ConfigError;
use crate::store::StoreError;
use serde::Serialize;
use smartinvest_core::data::{IngestError, SchemaError, ValidationError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("ingest error: {0}")]
    Ingest(#[from] IngestError),

    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),

    #[error("validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Coarse error class, as reported per batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    Ingest,
    Schema,
    Validation,
    Integrity,
    Store,
}

impl LoadError {
    /// Fatal errors stop the process before (or instead of) any batch work.
    /// Everything else is local to the batch that raised it.
    pub fn is_fatal(&self) -> bool {
        matches!(self, LoadError::Config(_))
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            LoadError::Config(_) => ErrorKind::Configuration,
            LoadError::Ingest(_) => ErrorKind::Ingest,
            LoadError::Schema(_) => ErrorKind::Schema,
            LoadError::Validation(_) => ErrorKind::Validation,
            LoadError::Store(StoreError::Integrity(_)) => ErrorKind::Integrity,
            LoadError::Store(StoreError::Backend(_)) => ErrorKind::Store,
        }
    }
}
