//! Batch pipeline: ingest, normalize, validate, derive calendar rows.

pub mod batch;
pub mod calendar;
pub mod ingest;
pub mod normalize;
pub mod schema;
pub mod validate;

pub use batch::{fingerprint_bytes, ColumnLabel, RawBatch};
pub use calendar::time_rows;
pub use ingest::{BatchSource, CsvBatchSource, InMemorySource, IngestError};
pub use normalize::{canonical_labels, map_labels, normalize, ColumnMapping, LabelRule, NormalizedBatch};
pub use schema::{CanonicalSchema, SchemaError, MACRO_SCHEMA, MARKET_SCHEMA};
pub use validate::{validate_macro, validate_market, Validated, ValidationError};
