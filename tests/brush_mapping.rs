use chartflow::brush::{apply_brush, brush_dates, synthetic_date, BrushDomain};
use chartflow::{Scalar, SeriesRow, SeriesView};
use chrono::NaiveDate;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
}

fn dated_view(days: &[u32]) -> SeriesView {
    SeriesView {
        rows: days
            .iter()
            .map(|d| SeriesRow {
                x: Scalar::Text(format!("2024-01-{d:02}")),
                date: Some(day(*d)),
                values: [("v".to_string(), *d as f64)].into_iter().collect(),
            })
            .collect(),
        series_keys: vec!["v".to_string()],
    }
}

#[test]
fn interval_subset_is_inclusive() {
    let view = dated_view(&[1, 2, 3, 4, 5]);
    let brushed = apply_brush(&view, &BrushDomain::select(day(2), day(4)));
    assert_eq!(brushed.len(), 3);
    assert_eq!(brushed.rows[0].date, Some(day(2)));
    assert_eq!(brushed.rows[2].date, Some(day(4)));
}

#[test]
fn endpoints_normalize_drag_direction() {
    let view = dated_view(&[1, 2, 3]);
    let forward = apply_brush(&view, &BrushDomain::select(day(1), day(2)));
    let backward = apply_brush(&view, &BrushDomain::select(day(2), day(1)));
    assert_eq!(forward, backward);
}

/// Applying the same interval twice yields the same subset.
#[test]
fn brush_is_idempotent() {
    let view = dated_view(&[1, 2, 3, 4, 5]);
    let brush = BrushDomain::select(day(2), day(4));
    let once = apply_brush(&view, &brush);
    let twice = apply_brush(&view, &brush);
    assert_eq!(once, twice);
}

/// Clearing the brush restores exactly the pre-brush view.
#[test]
fn clearing_restores_unbrushed_view() {
    let view = dated_view(&[1, 2, 3]);
    let mut brush = BrushDomain::select(day(2), day(2));
    assert_eq!(apply_brush(&view, &brush).len(), 1);
    brush.clear();
    assert_eq!(apply_brush(&view, &brush), view);
}

/// An interval excluding every row yields an empty subset with series keys
/// intact, not an error.
#[test]
fn excluding_interval_is_empty_not_error() {
    let view = dated_view(&[1, 2, 3]);
    let brushed = apply_brush(&view, &BrushDomain::select(day(20), day(25)));
    assert!(brushed.is_empty());
    assert_eq!(brushed.series_keys, view.series_keys);
}

/// Ordinal x-domains brush over a synthetic day sequence derived purely
/// from row order.
#[test]
fn ordinal_rows_use_synthetic_dates() {
    let view = SeriesView {
        rows: ["DEX", "Lending", "NFT"]
            .iter()
            .map(|name| SeriesRow {
                x: Scalar::Text(name.to_string()),
                date: None,
                values: [("v".to_string(), 1.0)].into_iter().collect(),
            })
            .collect(),
        series_keys: vec!["v".to_string()],
    };
    let dates = brush_dates(&view);
    assert_eq!(dates[0], synthetic_date(0));
    assert_eq!(dates[2], synthetic_date(2));
    assert_eq!(dates, brush_dates(&view));

    let brush = BrushDomain::select(synthetic_date(1), synthetic_date(2));
    let brushed = apply_brush(&view, &brush);
    assert_eq!(brushed.len(), 2);
    assert_eq!(brushed.rows[0].x.canonical(), "Lending");
    assert_eq!(apply_brush(&view, &brush), brushed);
}
