//! Brush range mapping: a pointer-dragged continuous date interval to the
//! concrete row subset inside it.
//!
//! The brush is orthogonal to discrete filters. It restricts what is
//! displayed without touching the precompute cache, and clearing it restores
//! the unbrushed view. Ordinal x-domains get a synthetic evenly-spaced day
//! sequence derived from row order, so the brush control always has a
//! continuous coordinate space and repeated selections are deterministic.

use crate::models::SeriesView;
use chrono::NaiveDate;

/// An optional inclusive `[start, end]` date interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BrushDomain {
    range: Option<(NaiveDate, NaiveDate)>,
}

impl BrushDomain {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Select an interval; endpoints may arrive in either drag direction.
    pub fn select(a: NaiveDate, b: NaiveDate) -> Self {
        let range = if a <= b { (a, b) } else { (b, a) };
        Self { range: Some(range) }
    }

    pub fn clear(&mut self) {
        self.range = None;
    }

    pub fn is_active(&self) -> bool {
        self.range.is_some()
    }

    pub fn range(&self) -> Option<(NaiveDate, NaiveDate)> {
        self.range
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        match self.range {
            Some((start, end)) => start <= date && date <= end,
            None => true,
        }
    }
}

/// Synthetic brush coordinate for ordinal x-domains: row 0 is day 0, row 1
/// is day 1, counted from the Unix epoch. Depends only on row order.
pub fn synthetic_date(index: usize) -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap() + chrono::Days::new(index as u64)
}

/// The brushable date per row of a view: the classified instant when the
/// x-domain is date-like, the synthetic sequence otherwise.
pub fn brush_dates(view: &SeriesView) -> Vec<NaiveDate> {
    view.rows
        .iter()
        .enumerate()
        .map(|(i, row)| row.date.unwrap_or_else(|| synthetic_date(i)))
        .collect()
}

/// Subset a view to the rows inside the brush interval, inclusive.
///
/// An inactive brush returns the view unchanged; an interval that excludes
/// every row returns an empty view with the series keys intact, which is a
/// "no data in range" condition, not an error.
pub fn apply_brush(view: &SeriesView, brush: &BrushDomain) -> SeriesView {
    if !brush.is_active() {
        return view.clone();
    }
    let dates = brush_dates(view);
    let rows = view
        .rows
        .iter()
        .zip(dates)
        .filter(|(_, d)| brush.contains(*d))
        .map(|(row, _)| row.clone())
        .collect();
    SeriesView {
        rows,
        series_keys: view.series_keys.clone(),
    }
}
