//! Series aggregation: raw fetched rows to per-series columns.
//!
//! One pass per (dataset, mapping, filter) combination. Rows with a missing
//! x are dropped, date-like x-domains are sorted chronologically, duplicate
//! x-values are merged under an explicit [`MergePolicy`], an optional
//! group-by pivots distinct group values into their own series columns, and
//! percent mode normalizes each x to percent-of-total.

use crate::dates::{self, DateClass};
use crate::error::PipelineError;
use crate::fields::resolve_field;
use crate::models::{
    DisplayMode, FieldMapping, MergePolicy, RawDataset, Record, Scalar, SeriesRow, SeriesView,
};
use ahash::AHashMap;

/// Build the [`SeriesView`] for one dataset under one filter combination.
///
/// Zero usable rows is not an error: callers render an empty state. A
/// declared field that cannot be resolved against the first row is a
/// configuration error and propagates.
pub fn build_series_view(
    dataset: &RawDataset,
    mapping: &FieldMapping,
    merge: MergePolicy,
    display: DisplayMode,
) -> Result<SeriesView, PipelineError> {
    let declared_keys: Vec<String> = mapping.ys.iter().map(|y| y.key.clone()).collect();

    let Some(first) = dataset.rows.first() else {
        // No group-by pivot has run, so only ungrouped keys are knowable here.
        let keys = if mapping.group.is_some() { Vec::new() } else { declared_keys };
        return Ok(SeriesView::empty(keys));
    };

    let x_key = resolve_field(first, &mapping.x.key)?.to_string();
    let y_keys: Vec<String> = mapping
        .ys
        .iter()
        .map(|y| resolve_field(first, &y.key).map(str::to_string))
        .collect::<Result<_, _>>()?;
    let group_key = match &mapping.group {
        Some(g) => Some(resolve_field(first, &g.key)?.to_string()),
        None => None,
    };

    // Step 1: drop rows without an x-value.
    let mut rows: Vec<(&Record, &Scalar, DateClass)> = dataset
        .rows
        .iter()
        .filter_map(|r| match r.get(&x_key) {
            Some(x) if !x.is_null() => Some((r, x, dates::classify(x))),
            _ => None,
        })
        .collect();

    if rows.is_empty() {
        let keys = if mapping.group.is_some() { Vec::new() } else { declared_keys };
        return Ok(SeriesView::empty(keys));
    }

    // Step 2: chronological sort when the whole x-domain is date-like;
    // ordinal domains keep fetch order.
    let datelike = rows.iter().all(|(_, _, c)| c.kind.is_datelike());
    if datelike {
        rows.sort_by_key(|(_, _, c)| c.instant);
    }

    let mut view = match &group_key {
        Some(gk) => pivot_grouped(&rows, &declared_keys, &y_keys, gk, datelike),
        None => merge_ungrouped(&rows, &declared_keys, &y_keys, merge, datelike),
    };

    // Step 5: percent-of-total per x. A zero total leaves values untouched.
    if display == DisplayMode::Percent {
        for row in &mut view.rows {
            let total: f64 = row.values.values().sum();
            if total != 0.0 {
                for v in row.values.values_mut() {
                    *v = *v / total * 100.0;
                }
            }
        }
    }

    Ok(view)
}

/// Steps 3: partition by (x, group), sum within partitions, pivot group
/// values into series columns. With multiple y-fields the series keys are the
/// cartesian `yfield_groupvalue` combinations.
fn pivot_grouped(
    rows: &[(&Record, &Scalar, DateClass)],
    declared_keys: &[String],
    y_keys: &[String],
    group_key: &str,
    datelike: bool,
) -> SeriesView {
    let multi_y = y_keys.len() > 1;
    let mut out: Vec<SeriesRow> = Vec::new();
    let mut x_index: AHashMap<String, usize> = AHashMap::new();
    let mut series_keys: Vec<String> = Vec::new();

    for &(record, x, class) in rows {
        let group_value = match record.get(group_key) {
            Some(g) if !g.is_null() => g.canonical(),
            _ => continue,
        };
        let row_idx = row_slot(&mut out, &mut x_index, x, &class, datelike);
        for (declared, actual) in declared_keys.iter().zip(y_keys) {
            let Some(v) = record.get(actual).and_then(Scalar::as_f64) else {
                continue;
            };
            let series = if multi_y {
                format!("{declared}_{group_value}")
            } else {
                group_value.clone()
            };
            if !series_keys.contains(&series) {
                series_keys.push(series.clone());
            }
            *out[row_idx].values.entry(series).or_insert(0.0) += v;
        }
    }

    SeriesView { rows: out, series_keys }
}

/// Step 4: no group-by; duplicate x-values merge per the chart's policy.
fn merge_ungrouped(
    rows: &[(&Record, &Scalar, DateClass)],
    declared_keys: &[String],
    y_keys: &[String],
    merge: MergePolicy,
    datelike: bool,
) -> SeriesView {
    let mut out: Vec<SeriesRow> = Vec::new();
    let mut x_index: AHashMap<String, usize> = AHashMap::new();

    for &(record, x, class) in rows {
        let row_idx = row_slot(&mut out, &mut x_index, x, &class, datelike);
        for (declared, actual) in declared_keys.iter().zip(y_keys) {
            let Some(v) = record.get(actual).and_then(Scalar::as_f64) else {
                continue;
            };
            use std::collections::btree_map::Entry;
            match out[row_idx].values.entry(declared.clone()) {
                Entry::Vacant(e) => {
                    e.insert(v);
                }
                Entry::Occupied(mut e) => {
                    let cur = e.get_mut();
                    match merge {
                        MergePolicy::Sum => *cur += v,
                        MergePolicy::Max => *cur = cur.max(v),
                    }
                }
            }
        }
    }

    SeriesView {
        rows: out,
        series_keys: declared_keys.to_vec(),
    }
}

/// Find or append the output row for an x-value. Identity is the canonical
/// textual form, so `2024` the number and `"2024"` the string merge.
fn row_slot(
    out: &mut Vec<SeriesRow>,
    x_index: &mut AHashMap<String, usize>,
    x: &Scalar,
    class: &DateClass,
    datelike: bool,
) -> usize {
    let canon = if datelike {
        // Date identity, so "2024-01-01" and "1/1/2024" land in one row.
        class
            .instant
            .map(|d| d.to_string())
            .unwrap_or_else(|| x.canonical())
    } else {
        x.canonical()
    };
    match x_index.get(&canon) {
        Some(idx) => *idx,
        None => {
            out.push(SeriesRow {
                x: x.clone(),
                date: class.instant,
                values: Default::default(),
            });
            let idx = out.len() - 1;
            x_index.insert(canon, idx);
            idx
        }
    }
}
