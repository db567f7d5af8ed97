//! SmartInvest Loader: star-schema warehouse loading.
//!
//! This crate builds on `smartinvest-core` to provide:
//! - Warehouse stores (Postgres, embedded SQLite) behind one trait
//! - Time dimension upserts and entity resolution (get-or-create)
//! - Idempotent fact upserts under a named merge policy
//! - Batch orchestration with a named failure policy and per-batch reports
//! - Environment and TOML configuration

pub mod config;
pub mod dimension;
pub mod error;
pub mod orchestrator;
pub mod progress;
pub mod resolver;
pub mod store;
pub mod upsert;

pub use config::{Backend, ConfigError, LoaderConfig, WarehouseConfig};
pub use dimension::upsert_time_dimension;
pub use error::{ErrorKind, LoadError};
pub use orchestrator::{
    run_domain, BatchOutcome, BatchReport, BatchStats, FailurePolicy, LoadOptions,
    LoadOrchestrator, RunReport,
};
pub use progress::{LoadProgress, NoProgress, StdoutProgress};
pub use resolver::{resolve_assets, resolve_macro_series};
pub use store::{open_store, PostgresStore, SqliteStore, StoreError, WarehouseSnapshot, WarehouseStore};
pub use upsert::MergePolicy;
