//! SmartInvest Core: canonical warehouse records and the batch pipeline that
//! produces them.
//!
//! This crate owns everything that happens before the warehouse is touched:
//! - Domain types (canonical records, dimension rows, fact rows)
//! - Raw batch representation and CSV ingestion
//! - Column normalization driven by a declarative rule table
//! - Record validation and type coercion
//! - Calendar derivation for the time dimension

pub mod data;
pub mod domain;

#[cfg(test)]
mod tests {
    use super::*;

    /// Records cross from the ingest side into the store layer; keep them thread-safe.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::MarketRecord>();
        require_sync::<domain::MarketRecord>();
        require_send::<domain::MacroRecord>();
        require_sync::<domain::MacroRecord>();
        require_send::<domain::TimeDimensionRow>();
        require_sync::<domain::TimeDimensionRow>();
        require_send::<domain::MarketFactRow>();
        require_sync::<domain::MarketFactRow>();
        require_send::<domain::MacroFactRow>();
        require_sync::<domain::MacroFactRow>();

        require_send::<data::RawBatch>();
        require_send::<data::NormalizedBatch>();
        require_send::<data::SchemaError>();
        require_sync::<data::SchemaError>();
        require_send::<data::ValidationError>();
        require_sync::<data::ValidationError>();
    }
}
