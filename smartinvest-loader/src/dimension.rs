//! Time dimension upsert.

use crate::store::{StoreError, WarehouseStore};
use chrono::NaiveDate;
use smartinvest_core::data::time_rows;
use tracing::debug;

/// Ensure every date in `dates` has a `dim_time` row.
///
/// All new rows for one call land in a single transaction. Returns how many
/// rows were new.
pub fn upsert_time_dimension<I>(store: &mut dyn WarehouseStore, dates: I) -> Result<usize, StoreError>
where
    I: IntoIterator<Item = NaiveDate>,
{
    let rows = time_rows(dates);
    if rows.is_empty() {
        return Ok(0);
    }
    let inserted = store.insert_time_rows(&rows)?;
    debug!(distinct = rows.len(), inserted, "time dimension updated");
    Ok(inserted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SqliteStore;

    #[test]
    fn repeated_dates_insert_once() {
        let mut store = SqliteStore::open_in_memory().unwrap();
        store.ensure_schema().unwrap();
        let d = |day| NaiveDate::from_ymd_opt(2024, 3, day).unwrap();

        assert_eq!(upsert_time_dimension(&mut store, [d(1), d(1), d(4)]).unwrap(), 2);
        assert_eq!(upsert_time_dimension(&mut store, [d(4), d(5)]).unwrap(), 1);
        assert_eq!(upsert_time_dimension(&mut store, Vec::new()).unwrap(), 0);

        let time = store.snapshot().unwrap().time;
        assert_eq!(time.len(), 3);
        assert_eq!(time[0].quarter, 1);
        assert_eq!(time[2].week, 10);
    }
}
