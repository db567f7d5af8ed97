//! Warehouse persistence.
//!
//! [`WarehouseStore`] is the seam between the loader and the relational
//! store. Each mutating method runs in its own transaction: it either fully
//! commits or leaves the store untouched.

pub mod postgres;
pub mod sql;
pub mod sqlite;

pub use postgres::PostgresStore;
pub use sqlite::{SqliteStore, WarehouseSnapshot};

use crate::config::{Backend, LoaderConfig, WarehouseConfig};
use crate::error::LoadError;
use crate::upsert::MergePolicy;
use smartinvest_core::domain::{
    AssetType, MacroFactRow, MacroSeriesDimensionRow, MarketFactRow, TimeDimensionRow,
};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    /// A uniqueness, foreign-key, or check constraint rejected the write.
    #[error("integrity violation: {0}")]
    Integrity(String),

    #[error("store error: {0}")]
    Backend(String),
}

pub trait WarehouseStore {
    /// Short backend name for logs.
    fn backend(&self) -> &'static str;

    /// Round-trip a trivial query.
    fn ping(&mut self) -> Result<(), StoreError>;

    /// Create the namespace and star-schema tables if absent.
    fn ensure_schema(&mut self) -> Result<(), StoreError>;

    /// Insert calendar rows whose date is not yet present. Returns the
    /// number of rows actually inserted.
    fn insert_time_rows(&mut self, rows: &[TimeDimensionRow]) -> Result<usize, StoreError>;

    /// Surrogate id for `ticker`, creating the dimension row if needed.
    fn get_or_create_asset(
        &mut self,
        ticker: &str,
        asset_type: AssetType,
    ) -> Result<i64, StoreError>;

    fn get_or_create_macro_series(
        &mut self,
        series: &MacroSeriesDimensionRow,
    ) -> Result<String, StoreError>;

    /// Upsert on (date_id, asset_id). Returns rows written.
    fn upsert_market_facts(
        &mut self,
        rows: &[MarketFactRow],
        policy: MergePolicy,
    ) -> Result<usize, StoreError>;

    /// Upsert on (date_id, series_id). Returns rows written.
    fn upsert_macro_facts(
        &mut self,
        rows: &[MacroFactRow],
        policy: MergePolicy,
    ) -> Result<usize, StoreError>;
}

/// Open the backend selected in `config`. Postgres credentials are resolved
/// from the environment; a missing password fails here, before any batch.
pub fn open_store(config: &LoaderConfig) -> Result<Box<dyn WarehouseStore>, LoadError> {
    config.validate()?;
    if config.backend.is_ephemeral() {
        warn!("sqlite backend has no path; writes go to an in-memory warehouse");
    }
    match &config.backend {
        Backend::Postgres => {
            let warehouse = WarehouseConfig::from_env()?;
            let store = PostgresStore::connect(&warehouse, &config.namespace)?;
            Ok(Box::new(store))
        }
        Backend::Sqlite { path } => {
            let store = match path {
                Some(path) => SqliteStore::open(path)?,
                None => SqliteStore::open_in_memory()?,
            };
            Ok(Box::new(store))
        }
    }
}
