//! Chart orchestration: one instance per chart, wiring the pipeline stages
//! into an explicit directed flow.
//!
//! Fetch → Resolve → Aggregate → Precompute/Brush → Color. Recomputation
//! happens on named triggers rather than cascading reactive effects, so
//! ordering and idempotence are structural: a dataset replacement rebuilds
//! the precompute cache and clears the brush, a filter change clears the
//! brush and (for server-side axes) debounces a refetch, a brush change
//! touches nothing but the displayed subset.

use crate::aggregate::build_series_view;
use crate::brush::{self, BrushDomain};
use crate::color::{ColorAssignment, Rgb};
use crate::error::PipelineError;
use crate::fetch::{Client, Debouncer, FetchGate, FetchRequest};
use crate::models::{
    ChartKind, DisplayMode, FieldMapping, FieldSpec, FilterState, MergePolicy, RawDataset,
    SeriesView,
};
use crate::precompute::PrecomputeCache;
use ahash::AHashMap;
use chrono::NaiveDate;
use regex::Regex;
use std::sync::LazyLock;
use std::time::Duration;

/// Filter axis holding the time-window option; this is the precomputed axis.
pub const WINDOW_AXIS: &str = "window";
/// Filter axis holding the display mode (`absolute` / `percent`).
pub const DISPLAY_AXIS: &str = "display";

/// Why a recomputation ran; logged, never branched on downstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecomputeTrigger {
    DatasetReplaced,
    FilterChanged,
    BrushChanged,
}

/// Static description of one chart instance.
#[derive(Debug, Clone)]
pub struct ChartConfig {
    pub request: FetchRequest,
    pub fields: Vec<FieldSpec>,
    pub kind: ChartKind,
    pub merge: MergePolicy,
    /// Every selectable time-window option, e.g. `["7D", "30D", "ALL"]`.
    pub window_options: Vec<String>,
    pub default_window: String,
    /// Axes whose change requires a server refetch (debounced) rather than a
    /// local recomputation, e.g. a server-side currency toggle.
    pub refetch_axes: Vec<String>,
    pub debounce: Duration,
}

impl ChartConfig {
    pub fn new(request: FetchRequest, fields: Vec<FieldSpec>, kind: ChartKind) -> Self {
        Self {
            request,
            fields,
            kind,
            merge: MergePolicy::Sum,
            window_options: vec!["ALL".to_string()],
            default_window: "ALL".to_string(),
            refetch_axes: Vec::new(),
            debounce: Duration::from_millis(250),
        }
    }

    pub fn with_merge(mut self, merge: MergePolicy) -> Self {
        self.merge = merge;
        self
    }

    pub fn with_windows(mut self, options: &[&str], default: &str) -> Self {
        self.window_options = options.iter().map(|s| s.to_string()).collect();
        self.default_window = default.to_string();
        self
    }

    pub fn with_refetch_axis(mut self, axis: &str) -> Self {
        self.refetch_axes.push(axis.to_string());
        self
    }
}

/// The pipeline's output for one consistent (FilterState, BrushDomain)
/// snapshot: the rows to draw, a color per series key, and the non-error
/// display conditions the consumer distinguishes.
#[derive(Debug, Clone)]
pub struct ChartView {
    pub series: SeriesView,
    pub colors: Vec<(String, Rgb)>,
    /// Brush active and it excludes every row, while the unbrushed view has
    /// data. Distinct from loading/empty and from a fetch-failure notice.
    pub no_data_in_range: bool,
    /// Non-blocking notice, set when the dataset is fetch-failure fallback.
    pub notice: Option<String>,
}

/// One chart instance. Owns its dataset, caches, and interaction state;
/// nothing is shared across charts.
pub struct Chart {
    config: ChartConfig,
    mapping: FieldMapping,
    client: Client,
    dataset: Option<RawDataset>,
    filters: FilterState,
    brush: BrushDomain,
    cache: PrecomputeCache,
    colors: ColorAssignment,
    gate: FetchGate,
    debouncer: Debouncer,
    notice: Option<String>,
}

impl Chart {
    pub fn new(config: ChartConfig) -> Result<Self, PipelineError> {
        let mapping = FieldMapping::from_specs(config.fields.clone())?;
        let mut filters = FilterState::new();
        filters.set(WINDOW_AXIS, config.default_window.clone());
        let debouncer = Debouncer::new(config.debounce);
        Ok(Self {
            config,
            mapping,
            client: Client::default(),
            dataset: None,
            filters,
            brush: BrushDomain::empty(),
            cache: PrecomputeCache::new(),
            colors: ColorAssignment::new(),
            gate: FetchGate::new(),
            debouncer,
            notice: None,
        })
    }

    /// Fetch (or re-fetch) the dataset and rebuild every derived structure.
    pub fn load(&mut self) -> Result<(), PipelineError> {
        let ticket = self.gate.issue();
        let outcome =
            self.client
                .fetch(&self.config.request, &self.mapping, &self.filters, self.config.kind);
        if !self.gate.admits(ticket) {
            // Superseded while in flight; discard without touching state.
            return Ok(());
        }
        self.notice = outcome.notice;
        self.dataset = Some(outcome.dataset);
        self.rebuild(RecomputeTrigger::DatasetReplaced)
    }

    /// Install an already-materialized dataset, bypassing the network. Used
    /// by embedders that source rows elsewhere, and by tests.
    pub fn adopt_dataset(&mut self, dataset: RawDataset) -> Result<(), PipelineError> {
        self.notice = None;
        self.dataset = Some(dataset);
        self.rebuild(RecomputeTrigger::DatasetReplaced)
    }

    /// Change one filter axis. The brush resets; server-side axes request a
    /// debounced refetch, everything else recomputes locally right away.
    pub fn set_filter(&mut self, axis: &str, option: &str) -> Result<(), PipelineError> {
        self.filters.set(axis, option);
        self.brush.clear();
        if self.config.refetch_axes.iter().any(|a| a == axis) {
            self.debouncer.request();
            log::debug!("filter {axis}={option} queued for debounced refetch");
            return Ok(());
        }
        if axis == WINDOW_AXIS {
            // Precomputed axis: switching is a cache lookup in `view`.
            return Ok(());
        }
        self.rebuild(RecomputeTrigger::FilterChanged)
    }

    /// Drive deferred work: a due debounced refetch, else one cache-warming
    /// step. Returns whether any work was done.
    pub fn poll(&mut self) -> Result<bool, PipelineError> {
        if self.debouncer.take_ready() {
            self.load()?;
            return Ok(true);
        }
        self.warm_step()
    }

    /// Compute one queued precompute entry. Returns whether work remains.
    pub fn warm_step(&mut self) -> Result<bool, PipelineError> {
        let Some(dataset) = self.dataset.as_ref() else {
            return Ok(false);
        };
        let mapping = &self.mapping;
        let merge = self.config.merge;
        let display = display_mode(&self.filters);
        self.cache
            .warm_step(|option| compute_view(dataset, mapping, merge, display, option))
    }

    /// Drain all deferred precompute work.
    pub fn warm_all(&mut self) -> Result<(), PipelineError> {
        while self.warm_step()? {}
        Ok(())
    }

    pub fn set_brush(&mut self, start: NaiveDate, end: NaiveDate) {
        self.brush = BrushDomain::select(start, end);
        log::debug!("recompute: {:?}", RecomputeTrigger::BrushChanged);
    }

    pub fn clear_brush(&mut self) {
        self.brush.clear();
    }

    pub fn brush(&self) -> &BrushDomain {
        &self.brush
    }

    pub fn filters(&self) -> &FilterState {
        &self.filters
    }

    pub fn is_warm(&self) -> bool {
        self.cache.is_warm()
    }

    /// Materialize the view for the current (FilterState, BrushDomain)
    /// snapshot. Both are read here and nowhere else, so a consumer can
    /// never observe a view computed from a stale combination.
    pub fn view(&mut self) -> Result<ChartView, PipelineError> {
        let Some(dataset) = self.dataset.as_ref() else {
            // Not loaded yet: an empty view is the loading state.
            return Ok(ChartView {
                series: SeriesView::default(),
                colors: Vec::new(),
                no_data_in_range: false,
                notice: self.notice.clone(),
            });
        };
        let window = self
            .filters
            .get(WINDOW_AXIS)
            .unwrap_or(self.config.default_window.as_str())
            .to_string();
        let mapping = &self.mapping;
        let merge = self.config.merge;
        let display = display_mode(&self.filters);
        let unbrushed = self
            .cache
            .ensure(&window, |option| {
                compute_view(dataset, mapping, merge, display, option)
            })?
            .clone();

        let preferred: AHashMap<String, usize> = self
            .mapping
            .ys
            .iter()
            .filter_map(|y| y.preferred_color.map(|c| (y.key.clone(), c)))
            .collect();
        self.colors.observe(&unbrushed.series_keys, &preferred);

        let series = brush::apply_brush(&unbrushed, &self.brush);
        let no_data_in_range =
            self.brush.is_active() && series.is_empty() && !unbrushed.is_empty();
        let colors = series
            .series_keys
            .iter()
            .filter_map(|k| self.colors.color_of(k).map(|c| (k.clone(), c)))
            .collect();
        Ok(ChartView {
            series,
            colors,
            no_data_in_range,
            notice: self.notice.clone(),
        })
    }

    /// Rebuild the precompute cache against the current dataset identity:
    /// the active window synchronously, the rest queued.
    fn rebuild(&mut self, trigger: RecomputeTrigger) -> Result<(), PipelineError> {
        log::debug!("recompute: {trigger:?}");
        self.brush.clear();
        let Some(dataset) = self.dataset.as_ref() else {
            self.cache.invalidate();
            return Ok(());
        };
        let mapping = &self.mapping;
        let merge = self.config.merge;
        let display = display_mode(&self.filters);
        let active = self
            .filters
            .get(WINDOW_AXIS)
            .unwrap_or(self.config.default_window.as_str())
            .to_string();
        self.cache.rebuild(
            dataset.identity(),
            &self.config.window_options,
            &active,
            |option| compute_view(dataset, mapping, merge, display, option),
        )?;
        Ok(())
    }
}

fn display_mode(filters: &FilterState) -> DisplayMode {
    match filters.get(DISPLAY_AXIS) {
        Some("percent") => DisplayMode::Percent,
        _ => DisplayMode::Absolute,
    }
}

/// Aggregate the full dataset, then restrict to the time window.
fn compute_view(
    dataset: &RawDataset,
    mapping: &FieldMapping,
    merge: MergePolicy,
    display: DisplayMode,
    window: &str,
) -> Result<SeriesView, PipelineError> {
    let full = build_series_view(dataset, mapping, merge, display)?;
    Ok(apply_window(full, window))
}

static WINDOW_SPAN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)([DWMY])$").unwrap());

/// Span in days for a window option; `None` means unrestricted.
///
/// Accepts explicit spans (`7D`, `12W`, `6M`, `1Y`) and the bare granularity
/// letters the dashboards use as shorthand: `D` is the last 30 days, `W` the
/// last 12 weeks, `M` the last 12 months. `ALL`/`MAX` show everything.
pub fn window_days(option: &str) -> Option<u64> {
    let upper = option.to_uppercase();
    match upper.as_str() {
        "ALL" | "MAX" => return None,
        "D" => return Some(30),
        "W" => return Some(84),
        "M" => return Some(365),
        _ => {}
    }
    let caps = WINDOW_SPAN.captures(&upper)?;
    let n: u64 = caps[1].parse().ok()?;
    let per = match &caps[2] {
        "D" => 1,
        "W" => 7,
        "M" => 30,
        _ => 365,
    };
    Some(n * per)
}

/// Keep the trailing `days`-long slice, anchored at the newest classified
/// date in the view rather than the wall clock, so output depends only on
/// the data. Ordinal domains pass through untouched.
fn apply_window(view: SeriesView, option: &str) -> SeriesView {
    let Some(days) = window_days(option) else {
        return view;
    };
    let Some(anchor) = view.rows.iter().filter_map(|r| r.date).max() else {
        return view;
    };
    let cutoff = anchor - chrono::Days::new(days.saturating_sub(1));
    let rows = view
        .rows
        .into_iter()
        .filter(|r| r.date.is_none_or(|d| d >= cutoff))
        .collect();
    SeriesView {
        rows,
        series_keys: view.series_keys,
    }
}
