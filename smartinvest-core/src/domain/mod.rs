//! Domain types: canonical records, dimension rows, fact rows.

pub mod dimension;
pub mod fact;
pub mod record;

pub use dimension::{AssetDimensionRow, AssetType, MacroSeriesDimensionRow, TimeDimensionRow};
pub use fact::{MacroFactRow, MarketFactRow};
pub use record::{Domain, MacroRecord, MarketRecord};
