//! Calendar derivation for the shared time dimension.

use crate::domain::TimeDimensionRow;
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// One [`TimeDimensionRow`] per distinct date, ascending.
pub fn time_rows<I>(dates: I) -> Vec<TimeDimensionRow>
where
    I: IntoIterator<Item = NaiveDate>,
{
    dates
        .into_iter()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .map(TimeDimensionRow::from_date)
        .collect()
}
