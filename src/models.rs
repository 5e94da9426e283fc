use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// A loosely-typed cell value as it arrives from a remote tabular source.
///
/// Sources are inconsistent about types: numeric columns may arrive as JSON
/// strings, booleans occasionally stand in for 0/1 flags. `Scalar` keeps the
/// original shape and offers tolerant numeric coercion via [`Scalar::as_f64`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Scalar {
    Null,
    Number(f64),
    Text(String),
}

impl Scalar {
    /// Numeric view of the value. Text that parses as a number (with optional
    /// thousands commas) is accepted; everything else is `None`.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) => Some(*n),
            Scalar::Text(s) => s.trim().replace(',', "").parse::<f64>().ok(),
            Scalar::Null => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Scalar::Null)
    }

    /// Canonical textual form, used for duplicate-x detection and cache keys.
    pub fn canonical(&self) -> String {
        match self {
            Scalar::Null => String::new(),
            Scalar::Number(n) => {
                if n.fract() == 0.0 && n.is_finite() {
                    format!("{}", *n as i64)
                } else {
                    format!("{n}")
                }
            }
            Scalar::Text(s) => s.clone(),
        }
    }
}

impl From<&serde_json::Value> for Scalar {
    fn from(v: &serde_json::Value) -> Self {
        match v {
            serde_json::Value::Null => Scalar::Null,
            serde_json::Value::Number(n) => Scalar::Number(n.as_f64().unwrap_or(f64::NAN)),
            serde_json::Value::String(s) => Scalar::Text(s.clone()),
            serde_json::Value::Bool(b) => Scalar::Number(if *b { 1.0 } else { 0.0 }),
            other => Scalar::Text(other.to_string()),
        }
    }
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.canonical())
    }
}

/// One row of a raw dataset: field names to scalar values.
///
/// Lookup is linear; rows are narrow (a handful of columns) and iteration
/// order is the insertion order, which keeps row handling deterministic.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Record {
    fields: Vec<(String, Scalar)>,
}

impl Record {
    pub fn new() -> Self {
        Self { fields: Vec::new() }
    }

    pub fn push(&mut self, key: impl Into<String>, value: Scalar) {
        self.fields.push((key.into(), value));
    }

    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(|(k, _)| k.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl FromIterator<(String, Scalar)> for Record {
    fn from_iter<T: IntoIterator<Item = (String, Scalar)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

static DATASET_IDENTITY: AtomicU64 = AtomicU64::new(1);

/// An ordered sequence of fetched records plus an identity nonce.
///
/// The identity changes with every fetch (or fallback synthesis) and is what
/// downstream caches key their mass-invalidation on. Row order is fetch
/// order, not guaranteed chronological.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RawDataset {
    pub rows: Vec<Record>,
    identity: u64,
}

impl RawDataset {
    pub fn new(rows: Vec<Record>) -> Self {
        Self {
            rows,
            identity: DATASET_IDENTITY.fetch_add(1, Ordering::Relaxed),
        }
    }

    pub fn identity(&self) -> u64 {
        self.identity
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Role a declared field plays in the chart.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldRole {
    X,
    Y,
    Group,
}

/// How a y-series is drawn by the rendering layer. Carried through the
/// pipeline untouched; the pipeline itself never draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayType {
    Bar,
    Line,
}

/// A caller-declared field: which column to read and how to treat it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub key: String,
    pub role: FieldRole,
    pub display: DisplayType,
    pub unit: Option<String>,
    /// Caller-pinned palette index; wins over any derived assignment.
    pub preferred_color: Option<usize>,
}

impl FieldSpec {
    pub fn x(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            role: FieldRole::X,
            display: DisplayType::Line,
            unit: None,
            preferred_color: None,
        }
    }

    pub fn y(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            role: FieldRole::Y,
            display: DisplayType::Line,
            unit: None,
            preferred_color: None,
        }
    }

    pub fn y_bar(key: impl Into<String>) -> Self {
        Self {
            display: DisplayType::Bar,
            ..Self::y(key)
        }
    }

    pub fn group(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            role: FieldRole::Group,
            display: DisplayType::Bar,
            unit: None,
            preferred_color: None,
        }
    }

    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    pub fn with_color(mut self, index: usize) -> Self {
        self.preferred_color = Some(index);
        self
    }
}

/// Validated field mapping for one chart: exactly one x, one or more y,
/// at most one group-by.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMapping {
    pub x: FieldSpec,
    pub ys: Vec<FieldSpec>,
    pub group: Option<FieldSpec>,
}

impl FieldMapping {
    pub fn from_specs(specs: Vec<FieldSpec>) -> Result<Self, crate::error::PipelineError> {
        use crate::error::PipelineError;
        let mut x = None;
        let mut ys = Vec::new();
        let mut group = None;
        for spec in specs {
            match spec.role {
                FieldRole::X => {
                    if x.replace(spec).is_some() {
                        return Err(PipelineError::InvalidMapping(
                            "more than one x-field declared".into(),
                        ));
                    }
                }
                FieldRole::Y => ys.push(spec),
                FieldRole::Group => {
                    if group.replace(spec).is_some() {
                        return Err(PipelineError::InvalidMapping(
                            "more than one group-by field declared".into(),
                        ));
                    }
                }
            }
        }
        let x = x.ok_or_else(|| PipelineError::InvalidMapping("no x-field declared".into()))?;
        if ys.is_empty() {
            return Err(PipelineError::InvalidMapping("no y-field declared".into()));
        }
        Ok(Self { x, ys, group })
    }

    /// Canonical one-line description of the mapping, used in cache keys.
    pub fn describe(&self) -> String {
        let ys: Vec<&str> = self.ys.iter().map(|y| y.key.as_str()).collect();
        match &self.group {
            Some(g) => format!("x={};y={};group={}", self.x.key, ys.join("+"), g.key),
            None => format!("x={};y={}", self.x.key, ys.join("+")),
        }
    }
}

/// The currently selected option for each discrete filter axis
/// (time window, currency, display mode, ...).
///
/// Axes are kept sorted so the canonical serialization is stable regardless
/// of insertion order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct FilterState {
    axes: BTreeMap<String, String>,
}

impl FilterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, axis: impl Into<String>, option: impl Into<String>) {
        self.axes.insert(axis.into(), option.into());
    }

    pub fn get(&self, axis: &str) -> Option<&str> {
        self.axes.get(axis).map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.axes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Canonical `axis=option&...` form, sorted by axis name.
    pub fn canonical(&self) -> String {
        self.axes
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect::<Vec<_>>()
            .join("&")
    }
}

/// Duplicate-x reconciliation policy, explicit per chart.
///
/// The source dashboards use both: cumulative metrics sum duplicate rows,
/// level metrics keep the maximum observation. The policy is a parameter,
/// never inferred.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MergePolicy {
    Sum,
    Max,
}

/// Absolute values, or percent-of-total per x-value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    #[default]
    Absolute,
    Percent,
}

/// Chart family; selects the built-in fallback dataset on fetch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartKind {
    Bar,
    Line,
    Area,
    Pie,
    Table,
}

/// One output row: the resolved x-value, its comparable instant when the
/// x-domain is date-like, and one numeric value per series key present at
/// this x.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SeriesRow {
    pub x: Scalar,
    pub date: Option<NaiveDate>,
    pub values: BTreeMap<String, f64>,
}

impl SeriesRow {
    pub fn value(&self, series: &str) -> Option<f64> {
        self.values.get(series).copied()
    }
}

/// The materialized output for one combination of filters (and optionally a
/// brush): ordered rows plus the series key order fixed at aggregation time.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct SeriesView {
    pub rows: Vec<SeriesRow>,
    pub series_keys: Vec<String>,
}

impl SeriesView {
    pub fn empty(series_keys: Vec<String>) -> Self {
        Self {
            rows: Vec::new(),
            series_keys,
        }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
