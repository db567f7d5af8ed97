//! Property tests for the batch pipeline.
//!
//! Uses proptest to verify:
//! 1. Label normalization is insensitive to vendor casing and spacing
//! 2. Entity suffixes strip for any ticker, and only for the batch's ticker
//! 3. Calendar attributes agree with chrono's ISO-8601 week numbering
//! 4. Validation output is sorted and free of duplicate keys

use chrono::{Datelike, NaiveDate};
use polars::prelude::*;
use proptest::prelude::*;
use smartinvest_core::data::{
    canonical_labels, normalize, time_rows, validate_market, RawBatch, MARKET_SCHEMA,
};
use smartinvest_core::domain::{Domain, TimeDimensionRow};

// ── Strategies (proptest) ────────────────────────────────────────────

/// A canonical measure rendered the way some vendor might print it.
fn arb_vendor_measure() -> impl Strategy<Value = (String, &'static str)> {
    (0..MARKET_SCHEMA.measures.len(), any::<bool>(), any::<bool>()).prop_map(
        |(i, title_case, pad)| {
            let canonical = MARKET_SCHEMA.measures[i];
            let words: Vec<String> = canonical
                .split('_')
                .map(|w| {
                    if title_case {
                        let mut c = w.chars();
                        match c.next() {
                            Some(first) => first.to_ascii_uppercase().to_string() + c.as_str(),
                            None => String::new(),
                        }
                    } else {
                        w.to_ascii_uppercase()
                    }
                })
                .collect();
            let mut label = words.join(" ");
            if pad {
                label = format!("  {label} ");
            }
            (label, canonical)
        },
    )
}

fn arb_ticker() -> impl Strategy<Value = String> {
    ("[A-Z]{1,5}", any::<bool>()).prop_map(|(t, index)| if index { format!("^{t}") } else { t })
}

fn arb_date() -> impl Strategy<Value = NaiveDate> {
    (0i64..20_000).prop_map(|offset| {
        NaiveDate::from_ymd_opt(1990, 1, 1).unwrap() + chrono::Duration::days(offset)
    })
}

// ── 1. Vendor labels ─────────────────────────────────────────────────

proptest! {
    #[test]
    fn vendor_spelling_maps_to_canonical(measures in prop::collection::vec(arb_vendor_measure(), 1..8)) {
        let mut seen = Vec::new();
        let mut labels = Vec::new();
        let mut expected = Vec::new();
        for (label, canonical) in measures {
            if seen.contains(&canonical) {
                continue;
            }
            seen.push(canonical);
            labels.push(label);
            expected.push(canonical);
        }
        let refs: Vec<&str> = labels.iter().map(String::as_str).collect();

        prop_assert_eq!(canonical_labels(Domain::Market, &refs, None), expected);
    }
}

// ── 2. Entity suffixes ───────────────────────────────────────────────

proptest! {
    #[test]
    fn suffix_strips_for_own_ticker(ticker in arb_ticker(), (label, canonical) in arb_vendor_measure()) {
        let suffixed = format!("{label}_{}", ticker.to_lowercase());
        prop_assert_eq!(
            canonical_labels(Domain::Market, &[suffixed.as_str()], Some(&ticker)),
            vec![canonical]
        );
    }

    #[test]
    fn suffix_for_other_ticker_is_dropped(
        ticker in "[A-Z]{2,5}",
        other in "[A-Z]{2,5}",
        (label, _) in arb_vendor_measure(),
    ) {
        prop_assume!(ticker != other);
        let suffixed = format!("{label}_{other}");
        prop_assert!(canonical_labels(Domain::Market, &[suffixed.as_str()], Some(&ticker)).is_empty());
    }
}

// ── 3. Calendar attributes ───────────────────────────────────────────

proptest! {
    #[test]
    fn time_row_matches_iso_calendar(date in arb_date()) {
        let row = TimeDimensionRow::from_date(date);
        let iso = date.iso_week();

        prop_assert_eq!(row.year, date.year());
        prop_assert!((1..=12).contains(&row.month));
        prop_assert!((1..=4).contains(&row.quarter));
        prop_assert_eq!(row.quarter, (row.month + 2) / 3);
        prop_assert!((1..=53).contains(&row.week));
        prop_assert_eq!(
            NaiveDate::from_isoywd_opt(iso.year(), row.week as u32, date.weekday()),
            Some(date)
        );
    }

    #[test]
    fn time_rows_are_distinct(dates in prop::collection::vec(arb_date(), 0..50)) {
        let rows = time_rows(dates.clone());
        let mut expected = dates;
        expected.sort();
        expected.dedup();
        let ids: Vec<_> = rows.iter().map(|r| r.date_id).collect();
        prop_assert_eq!(ids, expected);
    }
}

// ── 4. Validation ordering ───────────────────────────────────────────

proptest! {
    #[test]
    fn validated_records_sorted_and_unique(
        rows in prop::collection::vec(("(AAPL|MSFT|\\^GSPC)", arb_date(), 1.0..500.0f64), 1..40)
    ) {
        let tickers: Vec<&str> = rows.iter().map(|(t, _, _)| t.as_str()).collect();
        let dates: Vec<String> = rows.iter().map(|(_, d, _)| d.to_string()).collect();
        let closes: Vec<f64> = rows.iter().map(|(_, _, c)| *c).collect();
        let df = DataFrame::new(vec![
            Column::new("ticker".into(), tickers),
            Column::new("date".into(), dates),
            Column::new("close".into(), closes),
        ])
        .unwrap();

        let batch = normalize(&RawBatch::new("prop.csv", Domain::Market, df)).unwrap();
        let validated = validate_market(&batch).unwrap();
        let keys: Vec<_> = validated.records.iter().map(|r| (r.ticker.clone(), r.date)).collect();

        prop_assert!(keys.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(validated.records.len() + validated.dropped_duplicates, rows.len());
    }
}
