//! chartflow
//!
//! The interactive time-series data pipeline behind a dashboard's charts:
//! turn one remotely-fetched tabular dataset into many simultaneously
//! available views (time windows, brushed sub-ranges, display-mode toggles,
//! group-by pivots, percent normalization) while keeping interaction cheap
//! and series colors stable across every view.
//!
//! ### Stages
//! - Fetch & cache raw rows, tolerating several response shapes
//! - Resolve declared field names against loosely-typed rows
//! - Classify date-like x-values with one shared classifier
//! - Aggregate rows into per-series columns (group-by, merge policy, percent)
//! - Precompute a view per discrete filter option; brush on demand
//! - Assign stable colors per logical series
//!
//! ### Example
//! ```no_run
//! use chartflow::{Chart, ChartConfig, ChartKind, FieldSpec, FetchRequest};
//!
//! let config = ChartConfig::new(
//!     FetchRequest::new("https://api.example.com/metrics/revenue"),
//!     vec![FieldSpec::x("date"), FieldSpec::y("revenue_usd")],
//!     ChartKind::Line,
//! )
//! .with_windows(&["7D", "30D", "ALL"], "30D");
//!
//! let mut chart = Chart::new(config)?;
//! chart.load()?;
//! let view = chart.view()?;
//! for (key, color) in &view.colors {
//!     println!("{key} -> {}", color.hex());
//! }
//! # Ok::<(), chartflow::PipelineError>(())
//! ```

pub mod aggregate;
pub mod brush;
pub mod color;
pub mod dates;
pub mod error;
pub mod fetch;
pub mod fields;
pub mod models;
pub mod pipeline;
pub mod precompute;
pub mod storage;

pub use brush::BrushDomain;
pub use color::{ColorAssignment, Rgb};
pub use error::PipelineError;
pub use fetch::{Client, FetchOutcome, FetchRequest};
pub use models::{
    ChartKind, DisplayMode, FieldMapping, FieldSpec, FilterState, MergePolicy, RawDataset, Record,
    Scalar, SeriesRow, SeriesView,
};
pub use pipeline::{Chart, ChartConfig, ChartView};
